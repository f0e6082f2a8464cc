use common::frame::FrameError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed progress stream: {0}")]
    Frame(#[from] FrameError),
    #[error("invalid column descriptors: {0}")]
    Columns(#[from] serde_json::Error),
}
