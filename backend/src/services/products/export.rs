use crate::error::ServiceError;
use crate::export::{self, ExportFormat};
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use common::requests::{ExportQuery, ExportRequest};
use log::info;

pub(crate) async fn process(
    query: web::Query<ExportQuery>,
    body: web::Json<ExportRequest>,
) -> Result<HttpResponse, ServiceError> {
    let format = ExportFormat::from_query(query.format.as_deref());
    let fields = query.field_list();

    let rows = export::record_rows(&body.products);
    let bytes = export::encode(&rows, format, fields.as_deref())?;
    info!(
        "exported {} records as {} ({} bytes)",
        rows.len(),
        format.file_name(),
        bytes.len()
    );

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", format.file_name()),
        ))
        .body(bytes))
}
