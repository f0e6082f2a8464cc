//! Serialization of an accumulated record set for download.
//!
//! Records are first flattened into [`Row`]s (`id` first, then the record's
//! own fields), optionally projected onto an allow-list of field names, and
//! finally written as a `;` separated ISO-8859-1 CSV or as a single-sheet
//! XLSX workbook. Encoding either succeeds completely or returns an
//! [`ExportError`]; a partial buffer is never handed out.

use common::model::record::EnrichedRecord;
use csv::WriterBuilder;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde_json::{Map, Value};
use thiserror::Error;

pub const SHEET_NAME: &str = "Products";
const CSV_DELIMITER: u8 = b';';
const UNMAPPABLE: u8 = b'?';

/// A record flattened into an ordered field map.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV buffer: {0}")]
    Flush(String),
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to write XLSX: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("too many {what} for a worksheet: {count}")]
    SheetLimit { what: &'static str, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// `xlsx` (any case) selects XLSX; everything else, absent included, is CSV.
    pub fn from_query(format: Option<&str>) -> Self {
        match format {
            Some(f) if f.trim().eq_ignore_ascii_case("xlsx") => ExportFormat::Xlsx,
            _ => ExportFormat::Csv,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=ISO-8859-1",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "processed_products.csv",
            ExportFormat::Xlsx => "processed_products.xlsx",
        }
    }
}

/// Flattens records into rows with `id` as the first field.
pub fn record_rows(records: &[EnrichedRecord]) -> Vec<Row> {
    records
        .iter()
        .map(|record| {
            let mut row = Row::with_capacity(record.fields.len() + 1);
            row.insert("id".to_string(), Value::String(record.id.clone()));
            for (key, value) in &record.fields {
                row.insert(key.clone(), value.clone());
            }
            row
        })
        .collect()
}

/// Restricts every row to `fields`, in that order; fields a row lacks become
/// null. Without an allow-list (or with an empty one) rows are returned
/// unchanged.
pub fn project(rows: &[Row], fields: Option<&[String]>) -> Vec<Row> {
    match fields {
        Some(fields) if !fields.is_empty() => rows
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect(),
        _ => rows.to_vec(),
    }
}

/// Column headers of an export: the allow-list when given, otherwise every
/// field name in order of first appearance across the rows.
pub fn headers(rows: &[Row], fields: Option<&[String]>) -> Vec<String> {
    if let Some(fields) = fields.filter(|f| !f.is_empty()) {
        return fields.to_vec();
    }
    let mut headers: Vec<String> = Vec::new();
    for key in rows.iter().flat_map(Map::keys) {
        if !headers.contains(key) {
            headers.push(key.clone());
        }
    }
    headers
}

/// Encodes `rows` in `format`, projected onto `fields` when given.
pub fn encode(rows: &[Row], format: ExportFormat, fields: Option<&[String]>) -> Result<Vec<u8>, ExportError> {
    let rows = project(rows, fields);
    let headers = headers(&rows, fields);
    match format {
        ExportFormat::Csv => to_csv(&headers, &rows),
        ExportFormat::Xlsx => to_xlsx(&headers, &rows),
    }
}

/// Writes a `;` separated CSV with a header row and re-encodes it from UTF-8
/// to ISO-8859-1.
pub fn to_csv(headers: &[String], rows: &[Row]) -> Result<Vec<u8>, ExportError> {
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .delimiter(CSV_DELIMITER)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(headers.iter().map(|h| cell_text(row.get(h))))?;
    }

    let utf8 = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    Ok(encode_latin1(&String::from_utf8(utf8)?))
}

/// Writes a workbook with a single `Products` sheet: headers on the first row,
/// one row per record. Numbers and booleans keep their cell type.
pub fn to_xlsx(headers: &[String], rows: &[Row]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, column_number(col, headers.len())?, header.as_str())?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_number = u32::try_from(index + 1).map_err(|_| ExportError::SheetLimit {
            what: "rows",
            count: rows.len(),
        })?;
        for (col, header) in headers.iter().enumerate() {
            let col = column_number(col, headers.len())?;
            match row.get(header) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => {
                    worksheet.write_string(row_number, col, s.as_str())?;
                }
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(row_number, col, *b)?;
                }
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        worksheet.write_number(row_number, col, f)?;
                    }
                    None => {
                        worksheet.write_string(row_number, col, n.to_string())?;
                    }
                },
                Some(nested) => {
                    worksheet.write_string(row_number, col, nested.to_string())?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_number(col: usize, count: usize) -> Result<u16, ExportError> {
    u16::try_from(col).map_err(|_| ExportError::SheetLimit {
        what: "columns",
        count,
    })
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// ISO-8859-1 bytes for `text`; characters above U+00FF become `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    if encoding_rs::mem::is_str_latin1(text) {
        return encoding_rs::mem::encode_latin1_lossy(text).into_owned();
    }
    text.chars()
        .map(|c| u8::try_from(c).unwrap_or(UNMAPPABLE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use serde_json::json;
    use std::io::Cursor;

    fn records() -> Vec<EnrichedRecord> {
        vec![
            EnrichedRecord::new(
                0,
                json!({"title": "Tuoli", "price": "25", "color": "ruskea"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            EnrichedRecord::new(
                1,
                json!({"title": "Pöytä; iso", "price": null, "brand": "Isku"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
        ]
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn format_defaults_to_csv() {
        assert_eq!(ExportFormat::from_query(None), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_query(Some("pdf")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_query(Some("XLSX")), ExportFormat::Xlsx);
    }

    #[test]
    fn headers_are_union_in_first_seen_order() {
        let rows = record_rows(&records());
        assert_eq!(headers(&rows, None), ["id", "title", "price", "color", "brand"]);
        assert_eq!(headers(&rows, Some(fields(&["price", "id"]).as_slice())), ["price", "id"]);
    }

    #[test]
    fn csv_is_semicolon_separated_latin1() {
        let rows = record_rows(&records());
        let bytes = encode(&rows, ExportFormat::Csv, Some(fields(&["id", "title", "missing"]).as_slice())).unwrap();

        let expected = "id;title;missing\n0-Tuoli;Tuoli;\n\"1-Pöytä; iso\";\"Pöytä; iso\";\n";
        assert_eq!(bytes, encode_latin1(expected));
        assert!(bytes.contains(&0xF6)); // 'ö' as a single byte
    }

    #[test]
    fn characters_outside_latin1_become_question_marks() {
        assert_eq!(encode_latin1("a€b"), b"a?b");
        assert_eq!(encode_latin1("Hyvä"), [b'H', b'y', b'v', 0xE4]);
    }

    #[test]
    fn projection_is_idempotent() {
        let rows = record_rows(&records());
        let allow = fields(&["title", "brand", "nope"]);

        let first = encode(&rows, ExportFormat::Csv, Some(allow.as_slice())).unwrap();
        let projected = project(&rows, Some(allow.as_slice()));
        let second = encode(&projected, ExportFormat::Csv, Some(allow.as_slice())).unwrap();
        assert_eq!(first, second);
        assert!(projected.iter().all(|row| row["nope"] == Value::Null));
        assert_eq!(projected[0].keys().collect::<Vec<_>>(), ["title", "brand", "nope"]);
    }

    #[test]
    fn empty_allow_list_keeps_every_field() {
        let rows = record_rows(&records());
        assert_eq!(project(&rows, Some(&[][..])), rows);
        assert_eq!(
            encode(&rows, ExportFormat::Csv, Some(&[][..])).unwrap(),
            encode(&rows, ExportFormat::Csv, None).unwrap()
        );
    }

    #[test]
    fn nothing_to_export_is_an_empty_csv() {
        assert!(encode(&[], ExportFormat::Csv, None).unwrap().is_empty());
    }

    #[test]
    fn xlsx_has_products_sheet_with_header_row() {
        let rows = record_rows(&records());
        let bytes = encode(&rows, ExportFormat::Xlsx, None).unwrap();

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);

        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        let table: Vec<Vec<Data>> = range.rows().map(<[Data]>::to_vec).collect();
        assert_eq!(table[0][0], Data::String("id".to_string()));
        assert_eq!(table[1][1], Data::String("Tuoli".to_string()));
        assert_eq!(table[2][2], Data::Empty);
        assert_eq!(table[2][4], Data::String("Isku".to_string()));
    }
}
