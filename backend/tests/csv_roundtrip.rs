use backend::export::{encode, encode_latin1, record_rows, ExportFormat};
use backend::ingest::parse;
use common::model::record::EnrichedRecord;
use serde_json::{json, Map, Value};

fn record(index: usize, fields: Value) -> EnrichedRecord {
    let fields: Map<String, Value> = fields.as_object().cloned().unwrap();
    EnrichedRecord::new(index, fields)
}

fn records() -> Vec<EnrichedRecord> {
    vec![
        record(
            0,
            json!({
                "title": "Pöytä; iso",
                "description": "Sanoi \"hyvä\"\nToinen rivi",
                "color": "ruskea",
            }),
        ),
        record(
            1,
            json!({
                "title": "Tuoli",
                "description": "Jalat: 4; väri \"musta\"",
                "color": "",
            }),
        ),
    ]
}

#[test]
fn exported_csv_reads_back_after_a_preamble_line() {
    let rows = record_rows(&records());
    let exported = encode(&rows, ExportFormat::Csv, None).unwrap();

    let mut upload = encode_latin1("Tuotteet\n");
    upload.extend_from_slice(&exported);
    let parsed = parse(&upload, "processed_products.csv").unwrap();

    assert_eq!(parsed, rows);
    assert_eq!(parsed[0]["description"], json!("Sanoi \"hyvä\"\nToinen rivi"));
    assert_eq!(parsed[1]["id"], json!("1-Tuoli"));
}

#[test]
fn exported_csv_without_a_preamble_loses_its_header_line() {
    let rows = record_rows(&records()[..1]);
    let exported = encode(&rows, ExportFormat::Csv, None).unwrap();

    // The header line is consumed as the preamble and the only record is
    // read as the header.
    let parsed = parse(&exported, "processed_products.csv").unwrap();
    assert!(parsed.is_empty());
}
