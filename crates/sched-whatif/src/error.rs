use thiserror::Error;

/// Failures in compiling a what-if request into a model, distinct from the
/// solver's own feasibility verdict (that's `good_lp::ResolutionError`,
/// handled directly in `lib.rs`).
#[derive(Debug, Error)]
pub enum WhatIfError {
    #[error("query references unknown course {0}")]
    UnknownCourse(String),
    #[error("query references unknown room {0}")]
    UnknownRoom(String),
    #[error("query references unknown day {0}")]
    UnknownDay(String),
    #[error("week {0} is outside the term")]
    WeekOutOfRange(u32),
}
