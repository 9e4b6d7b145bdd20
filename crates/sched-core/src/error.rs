use thiserror::Error;

/// `TimeLimitFeasible` is not here: a time-limited run with a feasible
/// incumbent is a successful status with a non-null schedule, not an error.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("solver reported infeasible")]
    Infeasible,

    #[error("solver exhausted time limit with no feasible incumbent")]
    TimeLimitNoSolution,

    #[error("solver error: {0}")]
    SolverError(String),
}

impl ScheduleError {
    pub fn invalid(errors: Vec<String>) -> Self {
        ScheduleError::InvalidInput(errors.join("; "))
    }
}
