use super::{EnrichError, Enricher};
use crate::config::EnrichmentConfig;
use crate::ingest::NormalizedRow;
use async_trait::async_trait;
use common::schema::DynamicSchema;
use serde::Deserialize;
use serde_json::{json, Value};

const SCHEMA_NAME: &str = "refactoredProduct";

const SYSTEM_PROMPT: &str = "You turn second-hand furniture listings into structured product \
data. Write all descriptive text in Finnish. Leave a field null when the listing does not \
support it; never invent facts.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Chat-completions client that asks for strict JSON-schema output.
pub struct OpenAiEnricher {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
}

impl OpenAiEnricher {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichError> {
        let api_key = config.api_key.clone().ok_or(EnrichError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            url: chat_url(&config.base_url),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, row: &NormalizedRow, schema: &DynamicSchema) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(row) },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": SCHEMA_NAME,
                    "description": "Information for product listings",
                    "strict": true,
                    "schema": schema.json_schema(),
                },
            },
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl Enricher for OpenAiEnricher {
    async fn enrich(&self, row: &NormalizedRow, schema: &DynamicSchema) -> Result<Value, EnrichError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(row, schema))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EnrichError::InvalidResponse("missing message content".to_string()))?;

        serde_json::from_str(&content).map_err(|e| EnrichError::InvalidResponse(e.to_string()))
    }
}

fn chat_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}chat/completions", base_url)
    } else {
        format!("{}/chat/completions", base_url)
    }
}

fn user_prompt(row: &NormalizedRow) -> String {
    let lines: Vec<String> = row
        .fields()
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: {}", key, s),
            Value::Null => format!("{}: ", key),
            other => format!("{}: {}", key, other),
        })
        .collect();

    format!(
        "Analyse the following product data and write a detailed structured product \
         description in Finnish:\n\n{}\n\n\
         If a field has no information, leave it empty.\n\
         Convert dimensions (width, depth, height) to centimetres if they are given in other units.\n\
         The category field is a furniture type such as \"sohva\" or \"tuoli\".",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use crate::ingest::normalize;
    use std::time::Duration;

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            provider: Provider::OpenAi,
            base_url: "http://localhost:1234/v1/".to_string(),
            model: "test-model".to_string(),
            api_key: Some("sk-test".to_string()),
            temperature: Some(0.2),
            request_timeout: Duration::from_secs(5),
            mock_delay: None,
        }
    }

    fn row() -> NormalizedRow {
        let raw = json!({"title": "Tuoli", "price": 25}).as_object().cloned().unwrap();
        normalize(vec![raw]).remove(0)
    }

    #[test]
    fn url_joins_with_or_without_slash() {
        assert_eq!(chat_url("http://x/v1"), "http://x/v1/chat/completions");
        assert_eq!(chat_url("http://x/v1/"), "http://x/v1/chat/completions");
    }

    #[test]
    fn request_carries_schema_and_row() {
        let enricher = OpenAiEnricher::new(&config()).unwrap();
        let body = enricher.request_body(&row(), &DynamicSchema::product());

        assert_eq!(enricher.url, "http://localhost:1234/v1/chat/completions");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["properties"]["title"]["type"],
            json!(["string", "null"])
        );
        let prompt = body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("title: Tuoli\nprice: 25"));
    }

    #[test]
    fn response_content_is_read_from_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"title\":\"Tuoli\"}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(r#"{"title":"Tuoli"}"#)
        );
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut config = config();
        config.api_key = None;
        assert!(matches!(OpenAiEnricher::new(&config), Err(EnrichError::MissingApiKey)));
    }
}
