use crate::state::AppState;
use axum::{extract::State, Json};
use sched_types::SolveRequest;
use utoipa::ToSchema;

#[derive(serde::Serialize, ToSchema)]
pub struct JobCreated {
    pub job_id: String,
    pub status: &'static str,
}

#[utoipa::path(
    post,
    path = "/v1/solve",
    request_body = SolveRequest,
    responses((status = 200, description = "Job enqueued", body = JobCreated))
)]
pub async fn solve(
    State(state): State<AppState>,
    Json(request): Json<SolveRequest>,
) -> Json<JobCreated> {
    let id = state.jobs.enqueue_solve(request);
    Json(JobCreated {
        job_id: id.0,
        status: "queued",
    })
}
