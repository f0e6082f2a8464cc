//! Types shared between the enrichment server and its clients.
//!
//! Nothing in this crate performs I/O: it holds the product and record model,
//! the column descriptors and the schema built from them, the progress event
//! framing used on the wire, run status, the cooperative cancel handle and the
//! client-side processing session.

pub mod cancel;
pub mod frame;
pub mod jobs;
pub mod model;
pub mod requests;
pub mod schema;
pub mod session;
