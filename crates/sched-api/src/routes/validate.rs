use axum::{http::StatusCode, Json};
use sched_core::error::ScheduleError;
use sched_core::normalize::normalize;
use sched_types::RawInstance;
use serde::Serialize;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ValidationReport {
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = RawInstance,
    responses(
        (status = 200, description = "Validation result", body = ValidationReport)
    )
)]
pub async fn validate_handler(
    Json(inst): Json<RawInstance>,
) -> (StatusCode, Json<ValidationReport>) {
    match normalize(&inst) {
        Ok(_) => (
            StatusCode::OK,
            Json(ValidationReport {
                ok: true,
                errors: vec![],
            }),
        ),
        Err(ScheduleError::InvalidInput(msg)) => {
            let errs = msg
                .split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (
                StatusCode::OK,
                Json(ValidationReport {
                    ok: false,
                    errors: errs,
                }),
            )
        }
        Err(other) => (
            StatusCode::OK,
            Json(ValidationReport {
                ok: false,
                errors: vec![other.to_string()],
            }),
        ),
    }
}
