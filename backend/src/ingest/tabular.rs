use super::{IngestError, RawRow};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{ReaderBuilder, Trim};
use log::debug;
use serde_json::{Number, Value};
use std::io::Cursor;
use std::path::Path;

const CSV_DELIMITER: u8 = b';';
const EMPTY_HEADER: &str = "__EMPTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// Picks the decoding path from the declared file name, ignoring case.
    pub fn from_filename(filename: &str) -> Result<Self, IngestError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(SourceFormat::Csv),
            Some("xlsx") | Some("xls") => Ok(SourceFormat::Spreadsheet),
            _ => Err(IngestError::UnsupportedFormat {
                filename: filename.to_string(),
            }),
        }
    }
}

/// Decodes an uploaded buffer into rows, choosing the format from `filename`.
pub fn parse(bytes: &[u8], filename: &str) -> Result<Vec<RawRow>, IngestError> {
    let rows = match SourceFormat::from_filename(filename)? {
        SourceFormat::Csv => parse_csv(bytes)?,
        SourceFormat::Spreadsheet => parse_spreadsheet(bytes)?,
    };
    debug!("decoded {} rows from {}", rows.len(), filename);
    Ok(rows)
}

/// Parses an ISO-8859-1 encoded, semicolon separated export.
///
/// The first physical line is a preamble and is skipped; the header is the
/// line after it. Rows with missing cells keep only the cells present, surplus
/// cells are dropped, and sloppy quoting is read as-is.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>, IngestError> {
    let text = encoding_rs::mem::decode_latin1(bytes);
    let body = match text.find('\n') {
        Some(pos) => &text[pos + 1..],
        None => "",
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(CSV_DELIMITER)
        .quote(b'"')
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Reads the first sheet of an `.xlsx` or `.xls` workbook, using its first row
/// as headers. Empty cells are left out of the row.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<RawRow>, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_cells) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers = header_names(header_cells);

    let rows = sheet_rows
        .map(|cells| {
            headers
                .iter()
                .zip(cells)
                .filter_map(|(header, cell)| cell_value(cell).map(|v| (header.clone(), v)))
                .collect::<RawRow>()
        })
        .collect();
    Ok(rows)
}

// Blank headers become `__EMPTY`, `__EMPTY_1`, …; repeated headers get a
// numeric suffix so no column is silently overwritten.
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(cells.len());
    for cell in cells {
        let base = match cell {
            Data::Empty => EMPTY_HEADER.to_string(),
            other => other.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while names.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }
    names
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::Int(i) => Some(Value::Number(Number::from(*i))),
        Data::Float(f) => Some(float_value(*f)),
        other => Some(Value::String(other.to_string())),
    }
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}
