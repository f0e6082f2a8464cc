use crate::error::ServiceError;
use crate::job_controller::state::RunsState;
use actix_web::{web, HttpResponse};

pub(crate) async fn process(
    run_id: web::Path<String>,
    state: web::Data<RunsState>,
) -> Result<HttpResponse, ServiceError> {
    get_run_status(run_id.into_inner(), &state).await
}

async fn get_run_status(run_id: String, state: &RunsState) -> Result<HttpResponse, ServiceError> {
    match state.status(&run_id).await {
        Some(status) => Ok(HttpResponse::Ok().json(status)),
        None => Err(ServiceError::RunNotFound(run_id)),
    }
}
