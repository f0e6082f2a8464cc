//! Client-held state of one processing run.
//!
//! The uploader owns a [`ProcessingSession`] and passes it by reference to
//! whatever needs the accumulated records (the export step, a result table).
//! Its lifecycle is explicit: [`reset`](ProcessingSession::reset) when an
//! upload starts, [`apply`](ProcessingSession::apply) for each decoded event,
//! read through the accessors, and [`discard`](ProcessingSession::discard) or
//! drop when done.

use crate::model::column::ColumnDescriptor;
use crate::model::event::{ProgressEvent, RunSummary};
use crate::model::record::EnrichedRecord;

#[derive(Debug, Clone, Default)]
pub struct ProcessingSession {
    records: Vec<EnrichedRecord>,
    columns: Vec<ColumnDescriptor>,
    is_dynamic: bool,
    progress: u8,
    summary: Option<RunSummary>,
}

impl ProcessingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything from a previous upload and records the mode of the
    /// new one.
    pub fn reset(&mut self, columns: Vec<ColumnDescriptor>, is_dynamic: bool) {
        self.records.clear();
        self.columns = columns;
        self.is_dynamic = is_dynamic;
        self.progress = 0;
        self.summary = None;
    }

    /// Folds one stream event into the session.
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Record { progress, product } => {
                self.progress = progress;
                self.records.push(product);
            }
            ProgressEvent::Summary { progress, summary } => {
                self.progress = progress;
                self.summary = Some(summary);
            }
        }
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Present only when the server reported the run as finished. A stream
    /// that ended without a summary was cancelled or cut off.
    pub fn summary(&self) -> Option<RunSummary> {
        self.summary
    }

    pub fn is_complete(&self) -> bool {
        self.summary.is_some()
    }

    /// Hands the accumulated records over and empties the session.
    pub fn discard(&mut self) -> Vec<EnrichedRecord> {
        let records = std::mem::take(&mut self.records);
        self.reset(Vec::new(), false);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::column::ColumnType;
    use serde_json::json;

    fn record(index: usize, title: &str) -> EnrichedRecord {
        EnrichedRecord::new(index, json!({ "title": title }).as_object().cloned().unwrap())
    }

    #[test]
    fn events_accumulate_until_reset() {
        let mut session = ProcessingSession::new();
        session.reset(vec![ColumnDescriptor::new("title", ColumnType::String)], true);

        session.apply(ProgressEvent::Record { progress: 50, product: record(0, "a") });
        session.apply(ProgressEvent::Record { progress: 100, product: record(1, "b") });
        assert_eq!(session.records().len(), 2);
        assert!(!session.is_complete());

        session.apply(ProgressEvent::Summary {
            progress: 100,
            summary: RunSummary { emitted: 2, skipped: 0 },
        });
        assert!(session.is_complete());
        assert!(session.is_dynamic());

        session.reset(Vec::new(), false);
        assert!(session.records().is_empty());
        assert_eq!(session.progress(), 0);
        assert!(session.summary().is_none());
    }

    #[test]
    fn discard_returns_records() {
        let mut session = ProcessingSession::new();
        session.apply(ProgressEvent::Record { progress: 100, product: record(0, "a") });
        let records = session.discard();
        assert_eq!(records[0].id, "0-a");
        assert!(session.records().is_empty());
    }
}
