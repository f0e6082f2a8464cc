use crate::model::record::EnrichedRecord;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/products/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub products: Vec<EnrichedRecord>,
}

/// Query string of `POST /api/products/export`.
///
/// `format` is `csv` or `xlsx`; anything else, or nothing, means csv.
/// `fields` is a comma separated allow-list of field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub fields: Option<String>,
}

impl ExportQuery {
    /// The allow-list, or `None` when it is absent or names no field.
    pub fn field_list(&self) -> Option<Vec<String>> {
        let fields: Vec<String> = self
            .fields
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        (!fields.is_empty()).then_some(fields)
    }
}

/// Response header of `POST /api/products/process` carrying the run id that
/// the cancel and status endpoints take.
pub const RUN_ID_HEADER: &str = "X-Run-Id";

/// Response body of the cancel endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_list_drops_blank_entries() {
        let query = ExportQuery {
            format: None,
            fields: Some("title, price,,".to_string()),
        };
        assert_eq!(query.field_list(), Some(vec!["title".to_string(), "price".to_string()]));

        let empty = ExportQuery {
            format: None,
            fields: Some(" , ".to_string()),
        };
        assert_eq!(empty.field_list(), None);
        assert_eq!(ExportQuery::default().field_list(), None);
    }
}
