//! Sequential enrichment of normalized rows.
//!
//! [`EnrichmentPipeline::run`] spawns one producer task per upload. The task
//! walks the rows in order, awaits a single collaborator call per row and
//! pushes a [`ProgressEvent`] for every row that enriched cleanly into a
//! channel of capacity one, so at most one finished row waits for the
//! consumer. The receiver is the lazy, finite sequence handed to the HTTP
//! layer; a run cannot be restarted, a new upload builds a new one.
//!
//! Rows whose enrichment fails are logged and skipped. Cancellation is
//! checked before each row and again before each send; once it is observed
//! nothing else is emitted, not even the closing summary. A consumer that
//! drops the receiver cancels the run as well, noticed at the next row
//! boundary even when no row has produced a record yet.

use crate::enrich::{EnrichError, Enricher};
use crate::ingest::NormalizedRow;
use crate::job_controller::state::RunReporter;
use common::cancel::CancelHandle;
use common::jobs::RunStatus;
use common::model::event::{progress_after, ProgressEvent, RunSummary};
use common::model::record::EnrichedRecord;
use common::schema::DynamicSchema;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Output shape of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentMode {
    /// The fixed product listing schema.
    Product,
    /// Columns declared with the upload.
    Dynamic(DynamicSchema),
}

impl EnrichmentMode {
    fn into_schema(self) -> DynamicSchema {
        match self {
            EnrichmentMode::Product => DynamicSchema::product(),
            EnrichmentMode::Dynamic(schema) => schema,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            EnrichmentMode::Product => "product",
            EnrichmentMode::Dynamic(_) => "dynamic",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Cancelled { emitted: usize, skipped: usize },
}

/// A started run: the event receiver and the producer task.
pub struct RunHandle {
    pub events: mpsc::Receiver<ProgressEvent>,
    pub task: JoinHandle<RunOutcome>,
}

pub struct EnrichmentPipeline {
    enricher: Arc<dyn Enricher>,
    schema: DynamicSchema,
    mode: &'static str,
}

impl EnrichmentPipeline {
    pub fn new(enricher: Arc<dyn Enricher>, mode: EnrichmentMode) -> Self {
        let label = mode.label();
        Self {
            enricher,
            schema: mode.into_schema(),
            mode: label,
        }
    }

    /// Starts the producer task for `rows`.
    ///
    /// Must be called inside a Tokio runtime. `reporter`, when given, receives
    /// a [`RunStatus`] at every row boundary.
    pub fn run(
        self,
        rows: Vec<NormalizedRow>,
        cancel: CancelHandle,
        reporter: Option<RunReporter>,
    ) -> RunHandle {
        let (tx, events) = mpsc::channel(1);
        let task = tokio::spawn(async move { self.drive(rows, cancel, tx, reporter).await });
        RunHandle { events, task }
    }

    async fn drive(
        self,
        rows: Vec<NormalizedRow>,
        cancel: CancelHandle,
        tx: mpsc::Sender<ProgressEvent>,
        reporter: Option<RunReporter>,
    ) -> RunOutcome {
        let total = rows.len();
        let run_id = reporter.as_ref().map_or("-", |r| r.run_id()).to_string();
        info!("run {}: enriching {} rows in {} mode", run_id, total, self.mode);
        report(&reporter, RunStatus::InProgress(0)).await;

        let mut emitted = 0;
        let mut skipped = 0;

        for (index, row) in rows.iter().enumerate() {
            if tx.is_closed() {
                info!("run {}: consumer went away before row {}", run_id, index);
                cancel.cancel();
            }
            if cancel.is_cancelled() {
                return cancelled(&run_id, &reporter, emitted, skipped).await;
            }

            let result = self.enrich_row(index, row).await;
            let progress = progress_after(index, total);

            match result {
                Ok(product) => {
                    if cancel.is_cancelled() {
                        return cancelled(&run_id, &reporter, emitted, skipped).await;
                    }
                    debug!("run {}: row {} -> {}", run_id, index, product.id);
                    if tx.send(ProgressEvent::Record { progress, product }).await.is_err() {
                        info!("run {}: consumer went away after row {}", run_id, index);
                        cancel.cancel();
                        return cancelled(&run_id, &reporter, emitted, skipped).await;
                    }
                    emitted += 1;
                }
                Err(e) => {
                    warn!("run {}: skipping row {}: {}", run_id, index, e);
                    skipped += 1;
                }
            }
            report(&reporter, RunStatus::InProgress(progress)).await;
        }

        let summary = RunSummary { emitted, skipped };
        // the consumer may already be gone; the run is complete either way
        let _ = tx
            .send(ProgressEvent::Summary {
                progress: 100,
                summary,
            })
            .await;
        report(&reporter, RunStatus::Completed(summary)).await;
        info!(
            "run {}: finished, {} records emitted, {} rows skipped",
            run_id, emitted, skipped
        );
        RunOutcome::Completed(summary)
    }

    async fn enrich_row(&self, index: usize, row: &NormalizedRow) -> Result<EnrichedRecord, EnrichError> {
        let output = self.enricher.enrich(row, &self.schema).await?;
        let fields = self.schema.shape(output)?;
        Ok(EnrichedRecord::new(index, fields))
    }
}

async fn report(reporter: &Option<RunReporter>, status: RunStatus) {
    if let Some(reporter) = reporter {
        reporter.report(status).await;
    }
}

async fn cancelled(
    run_id: &str,
    reporter: &Option<RunReporter>,
    emitted: usize,
    skipped: usize,
) -> RunOutcome {
    info!("run {}: cancelled after {} records", run_id, emitted);
    report(reporter, RunStatus::Cancelled).await;
    RunOutcome::Cancelled { emitted, skipped }
}
