//! Command-line counterpart of the enrichment server: uploads a listing,
//! follows the progress stream into a [`ProcessingSession`] and downloads the
//! collected records as CSV or XLSX.
//!
//! [`ProcessingSession`]: common::session::ProcessingSession

pub mod error;
pub mod uploader;

pub use error::ClientError;
pub use uploader::{UploadOutcome, Uploader};
