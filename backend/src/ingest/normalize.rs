use super::RawRow;
use serde_json::{Map, Value};

/// A row with trimmed keys and string values, holding at least one
/// non-empty value. Only [`normalize`] creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow(Map<String, Value>);

impl NormalizedRow {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

/// Trims every row and drops the ones left without content, keeping order.
pub fn normalize(rows: Vec<RawRow>) -> Vec<NormalizedRow> {
    rows.into_iter().filter_map(normalize_row).collect()
}

fn normalize_row(row: RawRow) -> Option<NormalizedRow> {
    let cleaned: Map<String, Value> = row
        .into_iter()
        .map(|(key, value)| (key.trim().to_string(), trim_value(value)))
        .collect();

    cleaned
        .values()
        .any(has_content)
        .then_some(NormalizedRow(cleaned))
}

fn trim_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn blank_rows_are_dropped() {
        let rows = vec![
            row(json!({"nimi": "Tuoli", "materiaali": "Puu", "kunto": "Hyvä"})),
            row(json!({"nimi": "Pöytä", "materiaali": "Lasi", "kunto": "Uusi"})),
            row(json!({"nimi": "", "materiaali": "", "kunto": ""})),
        ];
        let normalized = normalize(rows);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[1].fields()["nimi"], json!("Pöytä"));
    }

    #[test]
    fn keys_and_strings_are_trimmed() {
        let normalized = normalize(vec![row(json!({" title ": "  Sohva ", "price": 12, "ok": false}))]);
        assert_eq!(
            Value::Object(normalized[0].clone().into_fields()),
            json!({"title": "Sohva", "price": 12, "ok": false})
        );
    }

    #[test]
    fn whitespace_only_and_cell_less_rows_count_as_blank() {
        let normalized = normalize(vec![
            row(json!({"a": "   ", "b": null})),
            RawRow::new(),
            row(json!({"a": 0})),
        ]);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].fields()["a"], json!(0));
    }
}
