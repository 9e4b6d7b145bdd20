use crate::routes::solve::JobCreated;
use crate::state::AppState;
use axum::{extract::State, Json};
use sched_types::WhatIfRequest;

#[utoipa::path(
    post,
    path = "/v1/whatif",
    request_body = WhatIfRequest,
    responses((status = 200, description = "What-if job enqueued", body = JobCreated))
)]
pub async fn whatif(
    State(state): State<AppState>,
    Json(request): Json<WhatIfRequest>,
) -> Json<JobCreated> {
    let id = state.jobs.enqueue_whatif(request);
    Json(JobCreated {
        job_id: id.0,
        status: "queued",
    })
}
