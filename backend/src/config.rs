//! Server configuration read from the environment.
//!
//! `main` loads an optional `.env` file with `dotenvy` before calling
//! [`AppConfig::from_env`], so every setting can live in either place.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_JSON_LIMIT: usize = 10 * 1024 * 1024; // 10 MB
const DEFAULT_UPLOAD_LIMIT: usize = 20 * 1024 * 1024;
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RUN_RETENTION_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("OPENAI_API_KEY must be set when ENRICHER_PROVIDER is 'openai'")]
    MissingApiKey,
}

/// Which enrichment collaborator the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    /// Offline collaborator that copies row values into the schema, for demos
    /// and local development.
    Mock,
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "mock" => Ok(Provider::Mock),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub request_timeout: Duration,
    pub mock_delay: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Body limit of JSON requests (the export endpoint).
    pub json_limit: usize,
    /// Largest accepted upload, in bytes.
    pub upload_limit: usize,
    /// How long a finished run stays queryable through the status endpoint.
    pub run_retention: Duration,
    pub enrichment: EnrichmentConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enrichment = EnrichmentConfig {
            provider: parse_or(&lookup, "ENRICHER_PROVIDER", Provider::OpenAi)?,
            base_url: lookup("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            temperature: parse_opt(&lookup, "ENRICHER_TEMPERATURE")?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ENRICHER_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            mock_delay: parse_opt::<u64, _>(&lookup, "ENRICHER_MOCK_DELAY_MS")?
                .map(Duration::from_millis),
        };

        if enrichment.provider == Provider::OpenAi && enrichment.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self {
            host: lookup("ENRICHER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "ENRICHER_PORT", DEFAULT_PORT)?,
            json_limit: parse_or(&lookup, "ENRICHER_JSON_LIMIT", DEFAULT_JSON_LIMIT)?,
            upload_limit: parse_or(&lookup, "ENRICHER_UPLOAD_LIMIT", DEFAULT_UPLOAD_LIMIT)?,
            run_retention: Duration::from_secs(parse_or(
                &lookup,
                "ENRICHER_RUN_RETENTION_SECS",
                DEFAULT_RUN_RETENTION_SECS,
            )?),
            enrichment,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn parse_opt<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
