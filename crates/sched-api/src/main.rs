mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod health;
    pub mod jobs;
    pub mod solve;
    pub mod validate;
    pub mod whatif;
}

use axum::{
    routing::{get, post},
    Router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::solve::solve,
        routes::whatif::whatif,
        routes::jobs::status,
        routes::jobs::result,
        routes::validate::validate_handler,
    ),
    components(schemas(
        sched_types::RawInstance,
        sched_types::TermConfig,
        sched_types::Classroom,
        sched_types::ClassroomId,
        sched_types::AvailabilitySlot,
        sched_types::Instructor,
        sched_types::InstructorId,
        sched_types::CourseType,
        sched_types::Course,
        sched_types::CourseId,
        sched_types::StudentEnrollment,
        sched_types::ConflictWeights,
        sched_types::SolveRequest,
        sched_types::SolveReport,
        sched_types::SolveStatus,
        sched_types::PenaltyBreakdown,
        sched_types::Assignment,
        sched_types::SolverConfig,
        sched_types::QueryConstraint,
        sched_types::WhatIfRequest,
        sched_types::WhatIfReport,
        sched_types::WhatIfStatus,
        sched_types::IisTag,
        sched_types::IisItem,
        sched_jobs::JobId,
        sched_jobs::JobStatus,
        routes::validate::ValidationReport,
        routes::solve::JobCreated,
    )),
    tags(
        (name = "unischedule", description = "Course scheduling optimization API")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let app_state = state::AppState::new_default();

    let app = Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/solve", post(routes::solve::solve))
        .route("/v1/whatif", post(routes::whatif::whatif))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .route("/v1/jobs/:id", get(routes::jobs::status))
        .route("/v1/jobs/:id/result", get(routes::jobs::result))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(app_state);

    let port = std::env::var("UNISCHEDULE__SERVER__PORT").unwrap_or_else(|_| "8080".into());
    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", port)
        .parse()
        .expect("invalid listen addr");
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
