//! The external enrichment collaborator.
//!
//! The pipeline only sees the [`Enricher`] trait: hand it a normalized row and
//! the schema of the run, get back a JSON object meant to match that schema.
//! [`openai::OpenAiEnricher`] talks to a chat-completions endpoint with
//! structured output; [`mock::MockEnricher`] works offline.

pub mod mock;
pub mod openai;

use crate::config::{EnrichmentConfig, Provider};
use crate::ingest::NormalizedRow;
use async_trait::async_trait;
use common::schema::{DynamicSchema, SchemaError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response format: {0}")]
    InvalidResponse(String),
    #[error("missing API key")]
    MissingApiKey,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Produces a structured listing for one row, shaped by `schema`.
    async fn enrich(&self, row: &NormalizedRow, schema: &DynamicSchema) -> Result<Value, EnrichError>;
}

/// Builds the collaborator selected in configuration.
pub fn from_config(config: &EnrichmentConfig) -> Result<Arc<dyn Enricher>, EnrichError> {
    match config.provider {
        Provider::OpenAi => Ok(Arc::new(openai::OpenAiEnricher::new(config)?)),
        Provider::Mock => Ok(Arc::new(mock::MockEnricher::new(config.mock_delay))),
    }
}
