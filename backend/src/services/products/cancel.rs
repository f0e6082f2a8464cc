use crate::error::ServiceError;
use crate::job_controller::state::RunsState;
use actix_web::{web, HttpResponse};
use common::requests::CancelResponse;
use log::info;

/// Trips the cancel handle of a run. The run notices it at its next row
/// boundary, so a record already being enriched may still be dropped.
pub(crate) async fn process(
    run_id: web::Path<String>,
    state: web::Data<RunsState>,
) -> Result<HttpResponse, ServiceError> {
    let run_id = run_id.into_inner();
    if !state.cancel(&run_id).await {
        return Err(ServiceError::RunNotFound(run_id));
    }
    info!("run {}: cancellation requested", run_id);
    Ok(HttpResponse::Ok().json(CancelResponse {
        run_id,
        cancelled: true,
    }))
}
