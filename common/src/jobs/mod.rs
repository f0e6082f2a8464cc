use crate::model::event::RunSummary;
use serde::{Deserialize, Serialize};

/// Server-side view of a processing run, served by the status endpoint.
///
/// Holds progress only; the enriched records live with the client that
/// consumed the stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    InProgress(u8),
    Completed(RunSummary),
    Cancelled,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Completed(_) | RunStatus::Cancelled)
    }
}
