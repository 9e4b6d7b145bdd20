use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use sched_jobs::JobStatus;

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses((status = 200, description = "Job status", body = JobStatus))
)]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    Json(match state.jobs.get(&id) {
        None => serde_json::json!({"status": "not_found"}),
        Some(s) => serde_json::to_value(s).unwrap(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}/result",
    params(("id" = String, Path, description = "Job ID")),
    responses((status = 200, description = "Solve or what-if result (if ready)"))
)]
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    Json(match state.jobs.get(&id) {
        Some(JobStatus::Solved { report }) => serde_json::to_value(report).unwrap(),
        Some(JobStatus::WhatIfDone { report }) => serde_json::to_value(report).unwrap(),
        Some(JobStatus::Failed { message }) => serde_json::json!({"status": "failed", "message": message}),
        Some(_) => serde_json::json!({"status": "not_ready"}),
        None => serde_json::json!({"status": "not_found"}),
    })
}
