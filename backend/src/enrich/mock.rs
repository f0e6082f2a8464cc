use super::{EnrichError, Enricher};
use crate::ingest::NormalizedRow;
use async_trait::async_trait;
use common::schema::DynamicSchema;
use serde_json::{Map, Value};
use std::time::Duration;

/// Offline collaborator: every schema field takes the row value whose key
/// matches the field name, ignoring case, or null.
#[derive(Debug, Clone, Default)]
pub struct MockEnricher {
    delay: Option<Duration>,
}

impl MockEnricher {
    /// `delay` is slept before answering each row, to make streaming visible.
    pub fn new(delay: Option<Duration>) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(&self, row: &NormalizedRow, schema: &DynamicSchema) -> Result<Value, EnrichError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let output: Map<String, Value> = schema
            .fields()
            .iter()
            .map(|field| {
                let value = row
                    .fields()
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&field.name))
                    .map(|(_, value)| value.clone())
                    .unwrap_or(Value::Null);
                (field.name.clone(), value)
            })
            .collect();
        Ok(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize;
    use serde_json::json;

    #[tokio::test]
    async fn copies_matching_columns() {
        let raw = json!({"Title": "Hylly", "Price": "15", "kunto": "hyvä"})
            .as_object()
            .cloned()
            .unwrap();
        let row = normalize(vec![raw]).remove(0);

        let output = MockEnricher::default()
            .enrich(&row, &DynamicSchema::product())
            .await
            .unwrap();
        assert_eq!(output["title"], json!("Hylly"));
        assert_eq!(output["price"], json!("15"));
        assert_eq!(output["condition"], Value::Null);
    }
}
