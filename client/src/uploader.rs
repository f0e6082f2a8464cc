//! HTTP side of the client.
//!
//! [`Uploader`] owns the [`ProcessingSession`] of the current upload. An
//! upload resets it, then every frame decoded from the response body is
//! applied to it in arrival order. Cancellation is polled between chunks and
//! on a short timer, so a stalled stream can still be abandoned; the server
//! is told through its cancel endpoint and the response is dropped unread.

use crate::error::ClientError;
use common::cancel::CancelHandle;
use common::frame::FrameDecoder;
use common::model::column::ColumnDescriptor;
use common::model::event::{ProgressEvent, RunSummary};
use common::model::record::EnrichedRecord;
use common::requests::{CancelResponse, RUN_ID_HEADER};
use common::session::ProcessingSession;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

const API_PATH: &str = "/api/products";
const CANCEL_POLL: Duration = Duration::from_millis(250);

/// How an upload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The server went through every row.
    Completed(RunSummary),
    /// The cancel handle was tripped before the stream finished.
    Cancelled,
    /// The stream closed without a summary.
    Interrupted,
}

pub struct Uploader {
    client: reqwest::Client,
    base_url: String,
    session: ProcessingSession,
}

impl Uploader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: ProcessingSession::new(),
        }
    }

    pub fn session(&self) -> &ProcessingSession {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PATH, path)
    }

    /// Uploads `path` and follows the progress stream until it ends or
    /// `cancel` is tripped. `on_progress` sees each event before it is
    /// applied to the session.
    pub async fn upload<F>(
        &mut self,
        path: &Path,
        columns: Vec<ColumnDescriptor>,
        is_dynamic: bool,
        cancel: &CancelHandle,
        mut on_progress: F,
    ) -> Result<UploadOutcome, ClientError>
    where
        F: FnMut(&ProgressEvent),
    {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        let bytes = tokio::fs::read(path).await?;

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(filename.clone()));
        if is_dynamic {
            form = form
                .text("isDynamic", "true")
                .text("columns", serde_json::to_string(&columns)?);
        }
        self.session.reset(columns, is_dynamic);

        info!("uploading {}", filename);
        let response = self
            .client
            .post(self.endpoint("/process"))
            .multipart(form)
            .send()
            .await?;
        let response = check(response).await?;
        let run_id = response
            .headers()
            .get(RUN_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!("run id: {:?}", run_id);

        let mut chunks = Box::pin(response.bytes_stream());
        let mut decoder = FrameDecoder::new();
        let mut ticker = tokio::time::interval(CANCEL_POLL);

        loop {
            if cancel.is_cancelled() {
                drop(chunks);
                self.notify_cancel(run_id.as_deref()).await;
                return Ok(UploadOutcome::Cancelled);
            }

            tokio::select! {
                chunk = chunks.next() => match chunk {
                    Some(chunk) => {
                        for event in decoder.push(&chunk?) {
                            let event = event?;
                            on_progress(&event);
                            self.session.apply(event);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {}
            }
        }

        if decoder.has_pending() {
            warn!("progress stream ended inside a frame");
        }
        Ok(match self.session.summary() {
            Some(summary) => UploadOutcome::Completed(summary),
            None => UploadOutcome::Interrupted,
        })
    }

    async fn notify_cancel(&self, run_id: Option<&str>) {
        let Some(run_id) = run_id else {
            warn!("cancelled before the server assigned a run id");
            return;
        };
        match self.cancel_run(run_id).await {
            Ok(_) => info!("run {} cancelled", run_id),
            Err(e) => warn!("could not cancel run {}: {}", run_id, e),
        }
    }

    pub async fn cancel_run(&self, run_id: &str) -> Result<CancelResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint(&format!("/cancel/{}", run_id)))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Exports `records` through the server and writes the file to `dest`.
    /// Returns the number of bytes written.
    pub async fn download(
        &self,
        records: &[EnrichedRecord],
        format: &str,
        fields: Option<&[String]>,
        dest: &Path,
    ) -> Result<usize, ClientError> {
        let mut request = self
            .client
            .post(self.endpoint("/export"))
            .query(&[("format", format)]);
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            request = request.query(&[("fields", fields.join(","))]);
        }

        let response = request
            .json(&json!({ "products": records }))
            .send()
            .await?;
        let bytes = check(response).await?.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;
        info!("wrote {} records to {}", records.len(), dest.display());
        Ok(bytes.len())
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Server {
        status,
        message: error_message(&body),
    })
}

// The server answers failures with `{"error": "..."}`; anything else is
// passed through as-is.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
