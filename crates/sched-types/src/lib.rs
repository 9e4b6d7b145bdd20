use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
id_newtype!(InstructorId);
id_newtype!(ClassroomId);
id_newtype!(CourseId);
id_newtype!(StudentId);

/// Section 3 term configuration: the wire shape of `term_config`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct TermConfig {
    pub num_weeks: u32,
    pub days: Vec<String>,
    pub day_start_time: String,
    pub day_end_time: String,
    pub period_length_minutes: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    pub capacity: u32,
}

/// 0-based on the wire; the normalizer converts to 1-based internally (§4.A).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct AvailabilitySlot {
    pub day: String,
    pub period_index: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Instructor {
    pub id: InstructorId,
    pub name: String,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    #[serde(default)]
    pub back_to_back_preference: u32,
    #[serde(default)]
    pub allow_lunch_teaching: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    FullTerm,
    FirstHalfTerm,
    SecondHalfTerm,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub instructor_id: InstructorId,
    pub expected_enrollment: u32,
    #[serde(rename = "type")]
    pub course_type: CourseType,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct StudentEnrollment {
    pub enrolled_course_ids: Vec<CourseId>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ConflictWeights {
    #[serde(default)]
    pub global_student_conflict_weight: f64,
    #[serde(default)]
    pub instructor_compactness_weight: f64,
    #[serde(default)]
    pub preferred_time_slots_weight: f64,
}

/// The exact input schema of §6: a nested configuration parsed once per run.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct RawInstance {
    pub term_config: TermConfig,
    pub classrooms: Vec<Classroom>,
    pub instructors: Vec<Instructor>,
    pub courses: Vec<Course>,
    #[serde(default)]
    pub students: Vec<StudentEnrollment>,
    pub conflict_weights: ConflictWeights,
}

/// One scheduled session, on the wire: week/day/period_start are 0-based (§6).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
pub struct Assignment {
    pub course_id: CourseId,
    pub course_session_id: String,
    pub session_number: u32,
    pub room_id: ClassroomId,
    pub week: u32,
    pub day: String,
    pub period_start: u32,
    pub period_length: u32,
    pub instructor_id: InstructorId,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    TimeLimitFeasible,
    Infeasible,
    Error,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct PenaltyBreakdown {
    pub s1_student_conflicts: f64,
    pub s2_instructor_compactness: f64,
    pub s3_lunch: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub objective_value: f64,
    pub improvement_summary: String,
    pub penalty_breakdown: PenaltyBreakdown,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub solver_status_detail: Option<String>,
}

/// Solver tuning knobs (§4.E "Solver invocation contract", §5 concurrency model).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SolverConfig {
    pub time_limit_secs: u64,
    pub threads: u32,
    pub presolve: bool,
    pub mip_focus_feasibility: bool,
    #[serde(default)]
    pub use_warm_start: bool,
    #[serde(default = "default_iis_timeout_secs")]
    pub iis_timeout_secs: u64,
}

fn default_iis_timeout_secs() -> u64 {
    10
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 30,
            threads: 1,
            presolve: true,
            mip_focus_feasibility: true,
            use_warm_start: true,
            iis_timeout_secs: 10,
        }
    }
}

/// §4.G user query constraints for the what-if / UDSP analyzer.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryConstraint {
    EnforceTimeSlot {
        course: CourseId,
        week: u32,
        day: String,
        period_start: u32,
    },
    VetoTimeSlot {
        course: CourseId,
        #[serde(default)]
        week: Option<u32>,
        day: String,
        period_start: u32,
    },
    VetoDay {
        course: CourseId,
        day: String,
    },
    EnforceRoom {
        course: CourseId,
        room: ClassroomId,
    },
    EnforceBeforeTime {
        course: CourseId,
        period_end: u32,
    },
    EnforceAfterTime {
        course: CourseId,
        period_start: u32,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct WhatIfRequest {
    pub instance: RawInstance,
    pub queries: Vec<QueryConstraint>,
    #[serde(default)]
    pub solver_config: Option<SolverConfig>,
    /// The optimum of the original (unconstrained-by-query) run; required to
    /// state the minimality bound. If omitted, it is recomputed by solving
    /// the base model first.
    #[serde(default)]
    pub original_objective: Option<f64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WhatIfStatus {
    FeasibleQuery,
    InfeasibleQuery,
    UdspError,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IisTag {
    Query { index: usize },
    Minimality,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct IisItem {
    pub tag: IisTag,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct WhatIfReport {
    pub status: WhatIfStatus,
    #[serde(default)]
    pub alternative: Option<SolveReport>,
    #[serde(default)]
    pub objective_difference: Option<f64>,
    #[serde(default)]
    pub iis: Vec<IisItem>,
    #[serde(default)]
    pub interpretation: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SolveRequest {
    pub instance: RawInstance,
    #[serde(default)]
    pub solver_config: Option<SolverConfig>,
}
