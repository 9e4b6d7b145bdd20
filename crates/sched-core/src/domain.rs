use sched_types::{ClassroomId, CourseId, CourseType, InstructorId};
use std::collections::HashMap;

/// One of the two half-term partitions of a term's weeks.
pub type BlockId = u8;
pub const BLOCK_1: BlockId = 1;
pub const BLOCK_2: BlockId = 2;

#[derive(Clone, Debug)]
pub struct TermDerived {
    pub num_weeks: u32,
    pub days: Vec<String>,
    /// P = floor((day_end - day_start) / period_length).
    pub num_periods: u32,
    /// 1-based period indices whose window intersects [12:00, 12:30).
    pub lunch_periods: Vec<u32>,
    pub period_length_minutes: u32,
    pub half_point: u32,
    /// Length in weeks of block 1 and block 2, used to scale soft penalties.
    pub block_weight: [u32; 2],
}

impl TermDerived {
    pub fn block_weeks(&self, block: BlockId) -> u32 {
        self.block_weight[(block - 1) as usize]
    }

    /// Inclusive week range covered by a block (1-based); may be empty.
    pub fn block_week_range(&self, block: BlockId) -> (u32, u32) {
        if block == BLOCK_1 {
            (1, self.half_point)
        } else {
            (self.half_point + 1, self.num_weeks)
        }
    }

    pub fn is_lunch_period(&self, p: u32) -> bool {
        self.lunch_periods.contains(&p)
    }
}

#[derive(Clone, Debug)]
pub struct ClassroomData {
    pub id: ClassroomId,
    pub name: String,
    pub capacity: u32,
}

#[derive(Clone, Debug)]
pub struct InstructorData {
    pub id: InstructorId,
    pub name: String,
    /// `avail[day_idx][period-1]`, already expanded to the default-true /
    /// listed-flips-default-false rule.
    pub avail: Vec<Vec<bool>>,
    pub back_to_back_preference: u32,
    /// 1.0 if `!allow_lunch_teaching`, else 0.0.
    pub lunch_penalty: f64,
}

impl InstructorData {
    pub fn is_available(&self, day: usize, period_1based: u32) -> bool {
        self.avail
            .get(day)
            .and_then(|d| d.get((period_1based - 1) as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn available_for_session(&self, day: usize, period_start: u32, dur: u32) -> bool {
        (period_start..period_start + dur).all(|p| self.is_available(day, p))
    }
}

#[derive(Clone, Debug)]
pub struct CourseData {
    pub id: CourseId,
    pub name: String,
    pub instructor_idx: usize,
    pub expected_enrollment: u32,
    pub course_type: CourseType,
    pub periods_per_session: u32,
    pub total_sessions: u32,
    pub week_start: u32,
    pub week_end: u32,
    pub sessions_per_week: u32,
    pub blocks: Vec<BlockId>,
}

impl CourseData {
    pub fn duration(&self) -> u32 {
        self.periods_per_session
    }

    pub fn in_block(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    pub fn spans_both_blocks(&self) -> bool {
        self.blocks.len() == 2
    }
}

/// Sparse symmetric student-conflict matrix, `(lo, hi)` keyed with `lo < hi`.
#[derive(Clone, Debug, Default)]
pub struct StudentConflictMatrix {
    pairs: HashMap<(usize, usize), u32>,
}

impl StudentConflictMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: usize, b: usize) -> (usize, usize) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn increment(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        *self.pairs.entry(Self::key(a, b)).or_insert(0) += 1;
    }

    pub fn get(&self, a: usize, b: usize) -> u32 {
        if a == b {
            return 0;
        }
        self.pairs.get(&Self::key(a, b)).copied().unwrap_or(0)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.pairs.iter().map(|(&(a, b), &n)| (a, b, n))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Weights {
    pub w1: f64,
    pub w2: f64,
    pub w3: f64,
}

#[derive(Clone, Debug)]
pub struct ProblemInstance {
    pub term: TermDerived,
    pub classrooms: Vec<ClassroomData>,
    pub instructors: Vec<InstructorData>,
    pub courses: Vec<CourseData>,
    pub students_cc: StudentConflictMatrix,
    pub weights: Weights,
}

impl ProblemInstance {
    pub fn course_index(&self, id: &CourseId) -> Option<usize> {
        self.courses.iter().position(|c| &c.id == id)
    }

    pub fn classroom_index(&self, id: &ClassroomId) -> Option<usize> {
        self.classrooms.iter().position(|r| &r.id == id)
    }

    pub fn day_index(&self, day: &str) -> Option<usize> {
        self.term.days.iter().position(|d| d == day)
    }
}

/// One scheduled session in internal (index-based, 1-based period) form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScheduledSession {
    pub course: usize,
    pub block: BlockId,
    pub day: usize,
    pub period_start: u32,
    pub room: usize,
}

pub type ScheduleAssignment = Vec<ScheduledSession>;
