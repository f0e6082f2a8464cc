use crate::model::product::Product;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder used in record ids when the enriched title is missing or empty.
pub const UNTITLED: &str = "untitled";

/// One enriched row of a processing run.
///
/// `fields` follows either the fixed product schema or the dynamic schema of
/// the run. On the wire the id and the fields form a single flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EnrichedRecord {
    /// Builds the record for row `index` of a run, deriving its id from the
    /// position and the resolved title.
    ///
    /// A declared `id` field would collide with the record id on the wire, so
    /// it is dropped from `fields`.
    pub fn new(index: usize, mut fields: Map<String, Value>) -> Self {
        fields.shift_remove("id");
        let id = record_id(index, &fields);
        Self { id, fields }
    }

    /// Reads the record as a fixed-schema product. Fails when a product field
    /// holds something other than a string or null.
    pub fn to_product(&self) -> Result<Product, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

pub fn record_id(index: usize, fields: &Map<String, Value>) -> String {
    format!("{}-{}", index, resolve_title(fields))
}

fn resolve_title(fields: &Map<String, Value>) -> String {
    match fields.get("title") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => UNTITLED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn id_combines_index_and_title() {
        let record = EnrichedRecord::new(3, fields(json!({"title": "Tuoli", "price": "20"})));
        assert_eq!(record.id, "3-Tuoli");
    }

    #[test]
    fn missing_or_empty_title_is_untitled() {
        assert_eq!(EnrichedRecord::new(0, fields(json!({"title": null}))).id, "0-untitled");
        assert_eq!(EnrichedRecord::new(1, fields(json!({"title": ""}))).id, "1-untitled");
        assert_eq!(EnrichedRecord::new(2, fields(json!({"color": "red"}))).id, "2-untitled");
    }

    #[test]
    fn wire_format_is_flat() {
        let record = EnrichedRecord::new(0, fields(json!({"title": "Pöytä", "id": "x"})));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "0-Pöytä", "title": "Pöytä"}));

        let back: EnrichedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn product_view_reads_known_fields() {
        let record = EnrichedRecord::new(0, fields(json!({"title": "Sohva", "postalCode": "00100"})));
        let product = record.to_product().unwrap();
        assert_eq!(product.title.as_deref(), Some("Sohva"));
        assert_eq!(product.postal_code.as_deref(), Some("00100"));
        assert!(product.price.is_none());
    }
}
