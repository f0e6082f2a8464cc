use serde::{Deserialize, Serialize};

/// A user-declared output column, sent by the uploader when the upload runs in
/// dynamic schema mode.
///
/// The uploader sends an ordered list of these as the JSON-encoded `columns`
/// multipart field. The backend turns the list into a
/// [`DynamicSchema`](crate::schema::DynamicSchema) which then shapes every
/// enriched record of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Field name in the enriched record and header in exported files.
    pub name: String,
    /// Declared value kind. Tags other than `string`, `number` and `boolean`
    /// are kept as [`ColumnType::Unrecognized`] and treated as text.
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Boolean,
    #[serde(other)]
    Unrecognized,
}
