use sched_jobs::InMemJobs;
use sched_milp::MilpSolver;
use sched_whatif::WhatIfAnalyzer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs>,
}

impl AppState {
    pub fn new_default() -> Self {
        let jobs = InMemJobs::new(Arc::new(MilpSolver::new()), Arc::new(WhatIfAnalyzer::new()));
        Self { jobs: Arc::new(jobs) }
    }
}
