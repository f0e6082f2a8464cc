//! # Upload Processing Service
//!
//! `POST /api/products/process` reads the multipart form, parses and
//! normalizes the uploaded file, registers a run in `RunsState` and hands the
//! rows to an `EnrichmentPipeline`. The response body is the pipeline's event
//! channel rendered as server-sent-event frames, so records reach the client
//! while later rows are still being enriched.
//!
//! Everything that can fail before the first row (bad extension, bad columns,
//! unreadable file) is answered with a JSON error instead of a stream. Once
//! the stream has started, dropping the connection cancels the run.

use super::ProductsConfig;
use crate::enrich::Enricher;
use crate::error::ServiceError;
use crate::ingest::{normalize, parse};
use crate::job_controller::state::RunsState;
use crate::pipeline::{EnrichmentMode, EnrichmentPipeline};
use actix_multipart::{Field, Multipart};
use actix_web::http::header;
use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use common::cancel::CancelHandle;
use common::frame;
use common::model::event::ProgressEvent;
use common::requests::RUN_ID_HEADER;
use common::schema::DynamicSchema;
use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use log::info;
use tokio::sync::mpsc;

/// The decoded multipart form of an upload.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    is_dynamic: bool,
    columns: Option<String>,
}

impl UploadForm {
    fn mode(&self) -> Result<EnrichmentMode, ServiceError> {
        if !self.is_dynamic {
            return Ok(EnrichmentMode::Product);
        }
        let columns = self.columns.as_deref().ok_or(ServiceError::MissingColumns)?;
        Ok(EnrichmentMode::Dynamic(DynamicSchema::from_json(columns)?))
    }
}

pub(crate) async fn process(
    payload: Multipart,
    state: web::Data<RunsState>,
    enricher: web::Data<dyn Enricher>,
    config: web::Data<ProductsConfig>,
) -> Result<HttpResponse, ServiceError> {
    let form = read_form(payload, config.upload_limit).await?;
    let mode = form.mode()?;
    let (filename, bytes) = form.file.ok_or(ServiceError::MissingFile)?;

    let rows = normalize(parse(&bytes, &filename)?);
    let cancel = CancelHandle::new();
    let run_id = state.register(cancel.clone()).await;
    info!("run {}: accepted '{}' with {} rows", run_id, filename, rows.len());

    let handle = EnrichmentPipeline::new(enricher.into_inner(), mode).run(
        rows,
        cancel,
        Some(state.reporter(run_id.clone())),
    );

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .insert_header((RUN_ID_HEADER, run_id))
        .streaming(event_stream(handle.events)))
}

/// Renders pipeline events as frames until the producer closes the channel.
fn event_stream(
    events: mpsc::Receiver<ProgressEvent>,
) -> impl Stream<Item = Result<Bytes, serde_json::Error>> {
    stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((frame::encode(&event).map(Bytes::from), events))
    })
}

async fn read_form(mut payload: Multipart, limit: usize) -> Result<UploadForm, ServiceError> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();
                let bytes = read_field(&mut field, limit).await?;
                form.file = Some((filename, bytes));
            }
            Some("isDynamic") => {
                form.is_dynamic = read_text(&mut field, limit).await?.trim() == "true";
            }
            Some("columns") => {
                form.columns = Some(read_text(&mut field, limit).await?);
            }
            _ => {
                read_field(&mut field, limit).await?;
            }
        }
    }

    Ok(form)
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, ServiceError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > limit {
            return Err(ServiceError::UploadTooLarge { limit });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text(field: &mut Field, limit: usize) -> Result<String, ServiceError> {
    String::from_utf8(read_field(field, limit).await?)
        .map_err(|e| ServiceError::Multipart(format!("form field is not UTF-8: {}", e)))
}
