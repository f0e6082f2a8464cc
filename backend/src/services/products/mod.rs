//! # Product Listing Service Module
//!
//! HTTP endpoints for enriching uploaded product listings. Everything lives
//! under `/api/products`.
//!
//! ## Sub-modules:
//! - `process`: accepts an upload and streams enriched records back as it goes.
//! - `export`: turns the records a client collected into a CSV or XLSX download.
//! - `cancel`: stops a run that is streaming on another connection.
//! - `get_status`: reports a run's progress from the shared `RunsState`.

mod cancel;
mod export;
mod get_status;
mod process;

use crate::error::ServiceError;
use actix_web::web::{self, get, post, scope};
use actix_web::Scope;

/// The base path for all product-related API endpoints.
const API_PATH: &str = "/api/products";

/// Settings the handlers read from application data.
#[derive(Debug, Clone, Copy)]
pub struct ProductsConfig {
    /// Maximum accepted size of the uploaded file, in bytes.
    pub upload_limit: usize,
}

/// JSON body settings for the product routes. Bodies that fail to extract are
/// answered with the same `{"error": ...}` object as every other failure.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| ServiceError::from(err).into())
}

/// Configures and returns the Actix `Scope` for the product routes.
///
/// # Registered Routes:
///
/// *   **`POST /process`**:
///     - **Handler**: `process::process`
///     - **Description**: Multipart upload with a `file` part (`.csv`, `.xlsx`
///       or `.xls`), an optional `isDynamic` flag and, in dynamic mode, a
///       `columns` part holding the JSON column descriptors. The response is
///       a `text/event-stream` of progress events; the run id is returned in
///       the `X-Run-Id` header.
///
/// *   **`POST /export`**:
///     - **Handler**: `export::process`
///     - **Description**: Takes `{"products": [...]}` and returns them as an
///       attachment. `?format=xlsx` selects a workbook, anything else CSV;
///       `?fields=a,b` restricts and orders the exported columns.
///
/// *   **`POST /cancel/{run_id}`**:
///     - **Handler**: `cancel::process`
///     - **Description**: Requests cooperative cancellation of a run.
///
/// *   **`GET /status/{run_id}`**:
///     - **Handler**: `get_status::process`
///     - **Description**: Returns the run's current `RunStatus`.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/process", post().to(process::process))
        .route("/export", post().to(export::process))
        .route("/cancel/{run_id}", post().to(cancel::process))
        .route("/status/{run_id}", get().to(get_status::process))
}
