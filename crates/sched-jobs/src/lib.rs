//! Ambient async job queue: dispatches against `sched-core`'s
//! `Solver`/`WhatIfSolver` traits as trait objects so either backend
//! (`sched-milp::MilpSolver`, `sched-heur::HeurSolver`,
//! `sched-whatif::WhatIfAnalyzer`) can be swapped in without this crate
//! knowing about any of them. Supports two job kinds: a `/v1/solve` run and
//! a `/v1/whatif` run.

use parking_lot::RwLock;
use schemars::JsonSchema;
use sched_core::{Solver, WhatIfSolver};
use sched_types::{SolveReport, SolveRequest, WhatIfReport, WhatIfRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// `Queued -> Running -> {Solved | WhatIfDone | Failed}`. A MILP/heuristic
/// run that comes back `SolveStatus::Infeasible` is still `Solved`: the
/// report carries that status. `Failed` is reserved for the solver call
/// itself erroring out (bad input, solver crash), matching
/// `ScheduleError`/`WhatIfError` semantics one layer down.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema, JsonSchema)]
#[serde(tag = "status")]
pub enum JobStatus {
    Queued,
    Running,
    Solved { report: SolveReport },
    WhatIfDone { report: WhatIfReport },
    Failed { message: String },
}

/// Thread-safe, process-local job table. No persistence across restarts —
/// per §1/§4.G's ambient-stack scope, run-history persistence is out of
/// bounds for this workspace.
#[derive(Clone)]
pub struct InMemJobs {
    inner: Arc<RwLock<HashMap<String, JobStatus>>>,
    solver: Arc<dyn Solver>,
    whatif: Arc<dyn WhatIfSolver>,
}

impl InMemJobs {
    pub fn new(solver: Arc<dyn Solver>, whatif: Arc<dyn WhatIfSolver>) -> Self {
        Self {
            inner: Default::default(),
            solver,
            whatif,
        }
    }

    pub fn enqueue_solve(&self, request: SolveRequest) -> JobId {
        let id = Uuid::new_v4().to_string();
        self.inner.write().insert(id.clone(), JobStatus::Queued);

        let map = self.inner.clone();
        let solver = self.solver.clone();
        let id_for_task = id.clone();

        tokio::spawn(async move {
            map.write().insert(id_for_task.clone(), JobStatus::Running);
            match solver.solve(request).await {
                Ok(report) => {
                    map.write().insert(id_for_task, JobStatus::Solved { report });
                }
                Err(e) => {
                    error!(error = %e, "solve job failed");
                    map.write().insert(
                        id_for_task,
                        JobStatus::Failed {
                            message: e.to_string(),
                        },
                    );
                }
            }
        });

        JobId(id)
    }

    pub fn enqueue_whatif(&self, request: WhatIfRequest) -> JobId {
        let id = Uuid::new_v4().to_string();
        self.inner.write().insert(id.clone(), JobStatus::Queued);

        let map = self.inner.clone();
        let whatif = self.whatif.clone();
        let id_for_task = id.clone();

        tokio::spawn(async move {
            map.write().insert(id_for_task.clone(), JobStatus::Running);
            match whatif.whatif(request).await {
                Ok(report) => {
                    map.write()
                        .insert(id_for_task, JobStatus::WhatIfDone { report });
                }
                Err(e) => {
                    error!(error = %e, "what-if job failed");
                    map.write().insert(
                        id_for_task,
                        JobStatus::Failed {
                            message: e.to_string(),
                        },
                    );
                }
            }
        });

        JobId(id)
    }

    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.inner.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sched_types::{PenaltyBreakdown, SolveStatus};
    use std::time::Duration;

    struct StubSolver;

    #[async_trait]
    impl Solver for StubSolver {
        async fn solve(&self, _request: SolveRequest) -> anyhow::Result<SolveReport> {
            Ok(SolveReport {
                status: SolveStatus::Optimal,
                objective_value: 0.0,
                improvement_summary: "stub".into(),
                penalty_breakdown: PenaltyBreakdown::default(),
                assignments: Vec::new(),
                solver_status_detail: None,
            })
        }
    }

    struct StubWhatIf;

    #[async_trait]
    impl WhatIfSolver for StubWhatIf {
        async fn whatif(&self, _request: WhatIfRequest) -> anyhow::Result<WhatIfReport> {
            anyhow::bail!("stub always fails")
        }
    }

    fn raw_instance() -> sched_types::RawInstance {
        sched_types::RawInstance {
            term_config: sched_types::TermConfig {
                num_weeks: 1,
                days: vec!["mon".into()],
                day_start_time: "09:00".into(),
                day_end_time: "10:30".into(),
                period_length_minutes: 30,
            },
            classrooms: vec![],
            instructors: vec![],
            courses: vec![],
            students: vec![],
            conflict_weights: sched_types::ConflictWeights::default(),
        }
    }

    #[tokio::test]
    async fn solve_job_transitions_to_solved() {
        let jobs = InMemJobs::new(Arc::new(StubSolver), Arc::new(StubWhatIf));
        let id = jobs.enqueue_solve(SolveRequest {
            instance: raw_instance(),
            solver_config: None,
        });
        for _ in 0..50 {
            if matches!(jobs.get(&id.0), Some(JobStatus::Solved { .. })) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached Solved");
    }

    #[tokio::test]
    async fn whatif_job_transitions_to_failed_on_error() {
        let jobs = InMemJobs::new(Arc::new(StubSolver), Arc::new(StubWhatIf));
        let id = jobs.enqueue_whatif(WhatIfRequest {
            instance: raw_instance(),
            queries: Vec::new(),
            solver_config: None,
            original_objective: None,
        });
        for _ in 0..50 {
            if matches!(jobs.get(&id.0), Some(JobStatus::Failed { .. })) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached Failed");
    }

    #[test]
    fn unknown_job_id_is_none() {
        let jobs = InMemJobs::new(Arc::new(StubSolver), Arc::new(StubWhatIf));
        assert!(jobs.get("missing").is_none());
    }
}
