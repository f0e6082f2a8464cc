//! Shared registry of processing runs.
//!
//! Every upload registers a run here before its progress stream starts. The
//! registry is what lets a second request reach a run that is streaming on
//! another connection: `GET /api/products/status/{run_id}` reads its
//! [`RunStatus`] and `POST /api/products/cancel/{run_id}` trips its
//! [`CancelHandle`].
//!
//! The main components are:
//! - `RunsState`: a clonable, thread-safe handle injected into the Actix
//!   application state in `main.rs`.
//! - `RunUpdate`: a status change sent by a running pipeline.
//! - `start_run_updater`: a long-running task that applies `RunUpdate`
//!   messages to the shared map.
//!
//! Only progress is kept here; the enriched records belong to the client that
//! consumes the stream. A finished run stays visible for the retention period
//! given to [`RunsState::new`] and is then swept by the updater.

use common::cancel::CancelHandle;
use common::jobs::RunStatus;
use log::debug;
use std::time::{Duration, Instant};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Registry entry of one run.
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub status: RunStatus,
    pub cancel: CancelHandle,
    /// Set when the status first becomes finished.
    pub finished_at: Option<Instant>,
}

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// A thread-safe, shareable container for the state of all runs.
#[derive(Clone)]
pub struct RunsState {
    /// Run id to its current entry.
    ///
    /// Behind an `Arc<RwLock>` so the status and cancel endpoints can read
    /// concurrently while `start_run_updater` is the only regular writer.
    pub runs: Arc<RwLock<HashMap<String, RunEntry>>>,

    /// Pipelines push `RunUpdate` messages through this sender instead of
    /// taking the write lock themselves.
    pub tx: mpsc::Sender<RunUpdate>,

    /// How long a finished run is kept for the status endpoint.
    retention: Duration,
}

/// A status change for one run.
#[derive(Debug)]
pub struct RunUpdate {
    pub(crate) run_id: String,
    pub(crate) status: RunStatus,
}

impl RunsState {
    /// Creates an empty registry plus the receiving end that must be handed to
    /// [`start_run_updater`].
    pub fn new(buffer: usize, retention: Duration) -> (Self, mpsc::Receiver<RunUpdate>) {
        let (tx, rx) = mpsc::channel(buffer);
        let state = Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            tx,
            retention,
        };
        (state, rx)
    }

    /// Registers a new pending run and returns its id.
    pub async fn register(&self, cancel: CancelHandle) -> String {
        let run_id = Uuid::new_v4().to_string();
        self.runs.write().await.insert(
            run_id.clone(),
            RunEntry {
                status: RunStatus::Pending,
                cancel,
                finished_at: None,
            },
        );
        run_id
    }

    pub async fn status(&self, run_id: &str) -> Option<RunStatus> {
        self.runs.read().await.get(run_id).map(|entry| entry.status.clone())
    }

    /// Requests cancellation of a run. Returns `false` for an unknown id.
    pub async fn cancel(&self, run_id: &str) -> bool {
        match self.runs.read().await.get(run_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Applies one update. Unknown ids are ignored and a finished run keeps
    /// its final status.
    async fn apply(&self, update: RunUpdate) {
        let mut runs = self.runs.write().await;
        if let Some(entry) = runs.get_mut(&update.run_id) {
            if entry.status.is_finished() {
                return;
            }
            if update.status.is_finished() {
                entry.finished_at = Some(Instant::now());
            }
            entry.status = update.status;
        }
    }

    /// Removes runs that finished at least the retention period before `now`
    /// and returns how many were removed. Unfinished runs are never removed.
    pub async fn evict_finished(&self, now: Instant) -> usize {
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, entry| {
            entry
                .finished_at
                .map_or(true, |at| now.saturating_duration_since(at) < self.retention)
        });
        before - runs.len()
    }

    pub fn reporter(&self, run_id: impl Into<String>) -> RunReporter {
        RunReporter {
            run_id: run_id.into(),
            tx: self.tx.clone(),
        }
    }
}

/// Sending half given to a pipeline so it can publish its progress.
#[derive(Debug, Clone)]
pub struct RunReporter {
    run_id: String,
    tx: mpsc::Sender<RunUpdate>,
}

impl RunReporter {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Publishes a status. A closed registry is not an error for the run.
    pub async fn report(&self, status: RunStatus) {
        let _ = self
            .tx
            .send(RunUpdate {
                run_id: self.run_id.clone(),
                status,
            })
            .await;
    }
}

/// Applies `RunUpdate` messages to the registry until every sender is gone,
/// sweeping expired finished runs in between.
///
/// Spawned once from `main.rs`. Updates for ids that were never registered are
/// ignored, and a finished run keeps its final status.
pub async fn start_run_updater(state: RunsState, mut rx: mpsc::Receiver<RunUpdate>) {
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(update) => state.apply(update).await,
                None => break,
            },
            _ = sweep.tick() => {
                let evicted = state.evict_finished(Instant::now()).await;
                if evicted > 0 {
                    debug!("evicted {} finished runs", evicted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::event::RunSummary;

    #[tokio::test]
    async fn updates_flow_into_registry() {
        let (state, rx) = RunsState::new(8, Duration::from_secs(60));
        let updater = tokio::spawn(start_run_updater(state.clone(), rx));

        let run_id = state.register(CancelHandle::new()).await;
        assert_eq!(state.status(&run_id).await, Some(RunStatus::Pending));

        let reporter = state.reporter(run_id.clone());
        reporter.report(RunStatus::InProgress(50)).await;
        let summary = RunSummary { emitted: 1, skipped: 0 };
        reporter.report(RunStatus::Completed(summary)).await;
        reporter.report(RunStatus::InProgress(10)).await;

        for _ in 0..50 {
            if state.status(&run_id).await == Some(RunStatus::Completed(summary)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(state.status(&run_id).await, Some(RunStatus::Completed(summary)));
        updater.abort();
    }

    #[tokio::test]
    async fn cancel_trips_the_handle() {
        let (state, _rx) = RunsState::new(1, Duration::from_secs(60));
        let handle = CancelHandle::new();
        let run_id = state.register(handle.clone()).await;

        assert!(state.cancel(&run_id).await);
        assert!(handle.is_cancelled());
        assert!(!state.cancel("missing").await);
    }

    #[tokio::test]
    async fn finished_runs_are_evicted_after_retention() {
        let (state, _rx) = RunsState::new(1, Duration::from_secs(60));
        let done = state.register(CancelHandle::new()).await;
        let cancelled = state.register(CancelHandle::new()).await;
        let running = state.register(CancelHandle::new()).await;

        let summary = RunSummary { emitted: 2, skipped: 0 };
        for (run_id, status) in [
            (&done, RunStatus::Completed(summary)),
            (&cancelled, RunStatus::Cancelled),
            (&running, RunStatus::InProgress(40)),
        ] {
            state
                .apply(RunUpdate {
                    run_id: run_id.clone(),
                    status,
                })
                .await;
        }

        assert_eq!(state.evict_finished(Instant::now()).await, 0);
        assert_eq!(state.runs.read().await.len(), 3);

        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(state.evict_finished(later).await, 2);
        assert_eq!(state.status(&done).await, None);
        assert_eq!(state.status(&cancelled).await, None);
        assert_eq!(state.status(&running).await, Some(RunStatus::InProgress(40)));
    }
}
