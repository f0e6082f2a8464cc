use crate::model::record::EnrichedRecord;
use serde::{Deserialize, Serialize};

/// Counts reported once a run has gone through every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Rows that produced a record.
    pub emitted: usize,
    /// Rows dropped because the enrichment call failed.
    pub skipped: usize,
}

/// One unit of the progress stream.
///
/// A run emits one `Record` per successfully enriched row, in row order, and a
/// single trailing `Summary` when it finishes without being cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Record {
        progress: u8,
        product: EnrichedRecord,
    },
    Summary {
        progress: u8,
        summary: RunSummary,
    },
}

impl ProgressEvent {
    pub fn progress(&self) -> u8 {
        match self {
            ProgressEvent::Record { progress, .. } | ProgressEvent::Summary { progress, .. } => {
                *progress
            }
        }
    }
}

/// Percentage of rows handled after row `index` (zero based) out of `total`,
/// rounded half up.
pub fn progress_after(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (((index + 1) as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_rounds_per_row() {
        assert_eq!(progress_after(0, 3), 33);
        assert_eq!(progress_after(1, 3), 67);
        assert_eq!(progress_after(2, 3), 100);
        assert_eq!(progress_after(0, 8), 13);
    }

    #[test]
    fn variants_decode_by_shape() {
        let record: ProgressEvent =
            serde_json::from_value(json!({"progress": 50, "product": {"id": "0-a", "title": "a"}}))
                .unwrap();
        assert!(matches!(record, ProgressEvent::Record { progress: 50, .. }));

        let summary: ProgressEvent = serde_json::from_value(
            json!({"progress": 100, "summary": {"emitted": 4, "skipped": 1}}),
        )
        .unwrap();
        assert_eq!(
            summary,
            ProgressEvent::Summary {
                progress: 100,
                summary: RunSummary { emitted: 4, skipped: 1 }
            }
        );
    }
}
