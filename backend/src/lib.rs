//! Product listing enrichment server.
//!
//! An upload is parsed by [`ingest`], enriched row by row in [`pipeline`]
//! through an [`enrich::Enricher`], and streamed back by the handlers in
//! [`services`]. [`export`] turns collected records into downloadable files.

pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod ingest;
pub mod job_controller;
pub mod pipeline;
pub mod services;
