pub mod domain;
pub mod error;
pub mod normalize;
pub mod prune;
pub mod scoring;

use async_trait::async_trait;

pub use domain::{
    BlockId, ClassroomData, CourseData, InstructorData, ProblemInstance, ScheduleAssignment,
    ScheduledSession, StudentConflictMatrix, TermDerived, Weights, BLOCK_1, BLOCK_2,
};
pub use error::ScheduleError;
pub use normalize::normalize;
pub use prune::{valid_tuples, ValidTuple};
pub use scoring::{evaluate, ScoreBreakdown};

pub use sched_types::{
    Assignment, Classroom, ClassroomId, ConflictWeights, Course, CourseId, CourseType,
    Instructor, InstructorId, PenaltyBreakdown, QueryConstraint, RawInstance, SolveReport,
    SolveRequest, SolveStatus, SolverConfig, StudentEnrollment, TermConfig, WhatIfReport,
    WhatIfRequest, WhatIfStatus,
};

/// The black-box solver contract every algorithm crate in this workspace
/// implements: take a validated request, produce a report. Callers never see
/// the solver's internal model; `sched-jobs` dispatches against this trait
/// alone.
#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(&self, request: SolveRequest) -> anyhow::Result<SolveReport>;
}

/// The analogous contract for the what-if / UDSP analyzer, kept separate from
/// `Solver` since a what-if run needs the original objective and query
/// constraints rather than a bare instance.
#[async_trait]
pub trait WhatIfSolver: Send + Sync + 'static {
    async fn whatif(&self, request: WhatIfRequest) -> anyhow::Result<WhatIfReport>;
}
