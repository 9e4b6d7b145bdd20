//! Greedy warm starter, plus a seeded local-search improver built on
//! (course, day, period, room) units, matching this problem's half-term
//! block decomposition.

use async_trait::async_trait;
use rand::{seq::SliceRandom, Rng};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::domain::{BlockId, ProblemInstance, ScheduleAssignment, ScheduledSession};
use sched_core::prune::occupied_periods;
use sched_core::{normalize, Solver};
use sched_types::{CourseId, SolveReport, SolveRequest, SolveStatus, SolverConfig};
use std::collections::{HashMap, HashSet};

/// One (course, day, period_start, room) placement decision. A course that
/// spans both blocks repeats this same unit in each block per H5; a
/// single-block course expands to one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PlacedUnit {
    course: usize,
    day: usize,
    period_start: u32,
    room: usize,
}

fn expand(units: &[PlacedUnit], inst: &ProblemInstance) -> ScheduleAssignment {
    let mut out = Vec::with_capacity(units.len() * 2);
    for u in units {
        for &b in &inst.courses[u.course].blocks {
            out.push(ScheduledSession {
                course: u.course,
                block: b,
                day: u.day,
                period_start: u.period_start,
                room: u.room,
            });
        }
    }
    out
}

/// All `(day, period_start, room)` triples that trivially satisfy the hard
/// constraints for this course — block-independent, since instructor
/// availability and room capacity don't vary by block — sorted by room
/// capacity ascending per §4.C step 3, then room index for determinism.
fn course_candidates(inst: &ProblemInstance, course: usize) -> Vec<(usize, u32, usize)> {
    let c = &inst.courses[course];
    let dur = c.duration();
    let p_max = inst.term.num_periods;
    if dur == 0 || dur > p_max {
        return Vec::new();
    }
    let instructor = &inst.instructors[c.instructor_idx];

    let mut rooms: Vec<usize> = inst
        .classrooms
        .iter()
        .enumerate()
        .filter(|(_, r)| r.capacity >= c.expected_enrollment)
        .map(|(i, _)| i)
        .collect();
    rooms.sort_by_key(|&i| (inst.classrooms[i].capacity, i));

    let mut out = Vec::new();
    for day in 0..inst.term.days.len() {
        for p in 1..=(p_max - dur + 1) {
            if !instructor.available_for_session(day, p, dur) {
                continue;
            }
            for &r in &rooms {
                out.push((day, p, r));
            }
        }
    }
    out
}

/// §4.C deterministic greedy construction: one feasible (possibly partial)
/// assignment, used as the MILP warm start and as the seed for local search.
#[derive(Clone, Debug, Default)]
pub struct WarmStartReport {
    pub assignment: ScheduleAssignment,
    pub courses_unplaced: Vec<CourseId>,
}

pub fn warm_start(inst: &ProblemInstance) -> WarmStartReport {
    let mut order: Vec<usize> = (0..inst.courses.len()).collect();
    order.sort_by(|&a, &b| {
        let ca = &inst.courses[a];
        let cb = &inst.courses[b];
        ca.spans_both_blocks()
            .cmp(&cb.spans_both_blocks())
            .then(cb.expected_enrollment.cmp(&ca.expected_enrollment))
            .then(ca.id.0.cmp(&cb.id.0))
    });

    let mut rooms_used: HashSet<(BlockId, usize, u32, usize)> = HashSet::new();
    let mut instructor_busy: HashSet<(usize, BlockId, usize, u32)> = HashSet::new();
    let mut units: Vec<PlacedUnit> = Vec::new();
    let mut courses_unplaced = Vec::new();

    for &ci in &order {
        let c = &inst.courses[ci];
        let dur = c.duration();
        let target = c.sessions_per_week;
        if target == 0 || dur == 0 {
            continue;
        }
        let candidates = course_candidates(inst, ci);
        let mut placed_days: HashSet<usize> = HashSet::new();

        'days: for day in 0..inst.term.days.len() {
            if placed_days.len() as u32 >= target {
                break 'days;
            }
            if placed_days.contains(&day) {
                continue;
            }
            for &(cand_day, p, r) in candidates.iter().filter(|&&(d, _, _)| d == day) {
                let free = c.blocks.iter().all(|&b| {
                    occupied_periods(p, dur).all(|t| {
                        !rooms_used.contains(&(b, cand_day, t, r))
                            && !instructor_busy.contains(&(c.instructor_idx, b, cand_day, t))
                    })
                });
                if !free {
                    continue;
                }
                for &b in &c.blocks {
                    for t in occupied_periods(p, dur) {
                        rooms_used.insert((b, cand_day, t, r));
                        instructor_busy.insert((c.instructor_idx, b, cand_day, t));
                    }
                }
                units.push(PlacedUnit {
                    course: ci,
                    day: cand_day,
                    period_start: p,
                    room: r,
                });
                placed_days.insert(cand_day);
                continue 'days;
            }
        }

        if (placed_days.len() as u32) < target {
            courses_unplaced.push(c.id.clone());
        }
    }

    WarmStartReport {
        assignment: expand(&units, inst),
        courses_unplaced,
    }
}

fn units_from_assignment(inst: &ProblemInstance, assignment: &ScheduleAssignment) -> Vec<PlacedUnit> {
    let mut seen: HashMap<(usize, usize), (u32, usize)> = HashMap::new();
    for s in assignment {
        seen.entry((s.course, s.day)).or_insert((s.period_start, s.room));
    }
    seen.into_iter()
        .map(|((course, day), (period_start, room))| PlacedUnit {
            course,
            day,
            period_start,
            room,
        })
        .filter(|u| inst.courses[u.course].duration() > 0)
        .collect()
}

struct Occupancy {
    rooms: HashSet<(BlockId, usize, u32, usize)>,
    instructors: HashSet<(usize, BlockId, usize, u32)>,
}

impl Occupancy {
    fn build(inst: &ProblemInstance, units: &[PlacedUnit]) -> Self {
        let mut rooms = HashSet::new();
        let mut instructors = HashSet::new();
        for u in units {
            let c = &inst.courses[u.course];
            for &b in &c.blocks {
                for t in occupied_periods(u.period_start, c.duration()) {
                    rooms.insert((b, u.day, t, u.room));
                    instructors.insert((c.instructor_idx, b, u.day, t));
                }
            }
        }
        Self { rooms, instructors }
    }

    fn remove(&mut self, inst: &ProblemInstance, u: &PlacedUnit) {
        let c = &inst.courses[u.course];
        for &b in &c.blocks {
            for t in occupied_periods(u.period_start, c.duration()) {
                self.rooms.remove(&(b, u.day, t, u.room));
                self.instructors.remove(&(c.instructor_idx, b, u.day, t));
            }
        }
    }

    fn insert(&mut self, inst: &ProblemInstance, u: &PlacedUnit) {
        let c = &inst.courses[u.course];
        for &b in &c.blocks {
            for t in occupied_periods(u.period_start, c.duration()) {
                self.rooms.insert((b, u.day, t, u.room));
                self.instructors.insert((c.instructor_idx, b, u.day, t));
            }
        }
    }

    fn fits(&self, inst: &ProblemInstance, u: &PlacedUnit) -> bool {
        let c = &inst.courses[u.course];
        c.blocks.iter().all(|&b| {
            occupied_periods(u.period_start, c.duration()).all(|t| {
                !self.rooms.contains(&(b, u.day, t, u.room))
                    && !self.instructors.contains(&(c.instructor_idx, b, u.day, t))
            })
        })
    }
}

/// Seeded hill-climbing repair: relocate one course-day unit at a time to a
/// candidate slot that keeps the assignment feasible, keeping the move only
/// if it does not worsen the objective. Deterministic given `seed`.
pub fn improve(
    inst: &ProblemInstance,
    start: ScheduleAssignment,
    seed: u64,
    iterations: usize,
) -> ScheduleAssignment {
    let mut units = units_from_assignment(inst, &start);
    if units.is_empty() {
        return start;
    }
    let mut occ = Occupancy::build(inst, &units);
    let mut best_score = sched_core::evaluate(inst, &expand(&units, inst)).objective();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut candidates_by_course: HashMap<usize, Vec<(usize, u32, usize)>> = HashMap::new();

    for _ in 0..iterations {
        if units.is_empty() {
            break;
        }
        let idx = rng.gen_range(0..units.len());
        let old = units[idx];

        let cands = candidates_by_course
            .entry(old.course)
            .or_insert_with(|| course_candidates(inst, old.course));
        if cands.is_empty() {
            continue;
        }
        let mut shuffled = cands.clone();
        shuffled.shuffle(&mut rng);

        occ.remove(inst, &old);
        let mut applied = false;
        for &(day, p, r) in shuffled.iter().take(12) {
            let candidate = PlacedUnit {
                course: old.course,
                day,
                period_start: p,
                room: r,
            };
            if candidate == old || !occ.fits(inst, &candidate) {
                continue;
            }
            units[idx] = candidate;
            occ.insert(inst, &candidate);
            let score = sched_core::evaluate(inst, &expand(&units, inst)).objective();
            if score <= best_score {
                best_score = score;
                applied = true;
                break;
            }
            occ.remove(inst, &candidate);
            units[idx] = old;
        }
        if !applied {
            occ.insert(inst, &old);
        }
    }

    expand(&units, inst)
}

/// Standalone heuristic solver: greedy construction followed by seeded local
/// search, exposed through the same `Solver` contract as the MILP builder so
/// it can be swapped in behind the job queue. A single-chain hill climb over
/// course-day units is enough to repair a greedy start on this domain.
pub struct HeurSolver {
    seed: u64,
    iterations: usize,
}

impl HeurSolver {
    pub fn new() -> Self {
        Self {
            seed: 0x5EED,
            iterations: 2000,
        }
    }

    pub fn with_params(seed: u64, iterations: usize) -> Self {
        Self { seed, iterations }
    }
}

impl Default for HeurSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Solver for HeurSolver {
    async fn solve(&self, request: SolveRequest) -> anyhow::Result<SolveReport> {
        let config = request.solver_config.unwrap_or_default();
        let inst = normalize(&request.instance)?;
        let warm = warm_start(&inst);
        let heuristic_score = sched_core::evaluate(&inst, &warm.assignment).objective();

        let improved = improve(&inst, warm.assignment, self.seed, self.iterations);
        let status = if warm.courses_unplaced.is_empty() {
            SolveStatus::Optimal
        } else {
            SolveStatus::TimeLimitFeasible
        };
        tracing::info!(
            unplaced = warm.courses_unplaced.len(),
            "heuristic solver produced a schedule"
        );
        Ok(report::build(
            &inst,
            improved,
            status,
            heuristic_score,
            &config,
        ))
    }
}

/// Minimal version of `sched-milp`'s output formatter. Duplicated rather
/// than depended on: `sched-milp` depends on this crate for warm starts, so
/// the reverse dependency would be cyclic.
mod report {
    use sched_core::domain::{ProblemInstance, ScheduleAssignment};
    use sched_types::{Assignment, PenaltyBreakdown, SolveReport, SolveStatus, SolverConfig};
    use std::collections::HashMap;

    pub fn build(
        inst: &ProblemInstance,
        assignment: ScheduleAssignment,
        status: SolveStatus,
        heuristic_score: f64,
        _config: &SolverConfig,
    ) -> SolveReport {
        let breakdown = sched_core::evaluate(inst, &assignment);
        let objective = breakdown.objective();
        SolveReport {
            status,
            objective_value: objective,
            improvement_summary: format!("{heuristic_score} -> {objective}"),
            penalty_breakdown: PenaltyBreakdown {
                s1_student_conflicts: breakdown.s1_student_conflicts,
                s2_instructor_compactness: breakdown.s2_instructor_compactness,
                s3_lunch: breakdown.s3_lunch,
            },
            assignments: expand_to_wire(inst, &assignment),
            solver_status_detail: Some("sched-heur local search".into()),
        }
    }

    fn expand_to_wire(inst: &ProblemInstance, assignment: &ScheduleAssignment) -> Vec<Assignment> {
        let mut per_course_session: HashMap<usize, u32> = HashMap::new();
        let mut sessions = assignment.clone();
        sessions.sort_by_key(|s| (s.course, s.block, s.day, s.period_start));

        let mut out = Vec::new();
        for s in &sessions {
            let course = &inst.courses[s.course];
            let (lo, hi) = inst.term.block_week_range(s.block);
            let lo = lo.max(course.week_start);
            let hi = hi.min(course.week_end);
            if lo > hi {
                continue;
            }
            for week in lo..=hi {
                let n = per_course_session.entry(s.course).or_insert(0);
                *n += 1;
                out.push(Assignment {
                    course_id: course.id.clone(),
                    course_session_id: format!("{}-s{}", course.id.0, *n),
                    session_number: *n,
                    room_id: inst.classrooms[s.room].id.clone(),
                    week: week - 1,
                    day: inst.term.days[s.day].clone(),
                    period_start: s.period_start - 1,
                    period_length: course.periods_per_session,
                    instructor_id: inst.instructors[course.instructor_idx].id.clone(),
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::normalize;
    use sched_types::{
        Classroom, ClassroomId, ConflictWeights, Course, CourseId, CourseType, Instructor,
        InstructorId, RawInstance, TermConfig,
    };

    fn trivial_instance() -> ProblemInstance {
        let raw = RawInstance {
            term_config: TermConfig {
                num_weeks: 1,
                days: vec!["mon".into()],
                day_start_time: "09:00".into(),
                day_end_time: "10:30".into(),
                period_length_minutes: 30,
            },
            classrooms: vec![Classroom {
                id: ClassroomId("r1".into()),
                name: "R1".into(),
                capacity: 30,
            }],
            instructors: vec![Instructor {
                id: InstructorId("i1".into()),
                name: "I1".into(),
                availability: vec![],
                back_to_back_preference: 0,
                allow_lunch_teaching: true,
            }],
            courses: vec![Course {
                id: CourseId("c1".into()),
                name: "C1".into(),
                instructor_id: InstructorId("i1".into()),
                expected_enrollment: 10,
                course_type: CourseType::FullTerm,
            }],
            students: vec![],
            conflict_weights: ConflictWeights::default(),
        };
        normalize(&raw).unwrap()
    }

    #[test]
    fn warm_start_places_the_only_feasible_course() {
        let inst = trivial_instance();
        let report = warm_start(&inst);
        assert!(report.courses_unplaced.is_empty());
        assert_eq!(report.assignment.len(), 1);
        assert_eq!(report.assignment[0].period_start, 1);
    }

    #[test]
    fn warm_start_tuples_are_in_valid_domain() {
        let inst = trivial_instance();
        let report = warm_start(&inst);
        let valid: HashSet<_> = sched_core::prune::valid_tuples(&inst)
            .into_iter()
            .map(|t| (t.course, t.block, t.day, t.period_start, t.room))
            .collect();
        for s in &report.assignment {
            assert!(valid.contains(&(s.course, s.block, s.day, s.period_start, s.room)));
        }
    }

    /// Two courses share the single room; a full-term course needs the slot
    /// free in both blocks while a first-half-term course needs it in block
    /// 1 only. §4.C orders single-block courses first, so the half-term
    /// course should claim the slot and the full-term course is left
    /// unplaced rather than the other way around.
    #[test]
    fn single_block_courses_are_placed_before_full_term() {
        let raw = RawInstance {
            term_config: TermConfig {
                num_weeks: 4,
                days: vec!["mon".into()],
                day_start_time: "09:00".into(),
                day_end_time: "12:00".into(),
                period_length_minutes: 90,
            },
            classrooms: vec![Classroom {
                id: ClassroomId("r1".into()),
                name: "R1".into(),
                capacity: 30,
            }],
            instructors: vec![
                Instructor {
                    id: InstructorId("i1".into()),
                    name: "I1".into(),
                    availability: vec![],
                    back_to_back_preference: 0,
                    allow_lunch_teaching: true,
                },
                Instructor {
                    id: InstructorId("i2".into()),
                    name: "I2".into(),
                    availability: vec![],
                    back_to_back_preference: 0,
                    allow_lunch_teaching: true,
                },
            ],
            courses: vec![
                Course {
                    id: CourseId("full".into()),
                    name: "Full".into(),
                    instructor_id: InstructorId("i1".into()),
                    expected_enrollment: 10,
                    course_type: CourseType::FullTerm,
                },
                Course {
                    id: CourseId("half".into()),
                    name: "Half".into(),
                    instructor_id: InstructorId("i2".into()),
                    expected_enrollment: 10,
                    course_type: CourseType::FirstHalfTerm,
                },
            ],
            students: vec![],
            conflict_weights: ConflictWeights::default(),
        };
        let inst = normalize(&raw).unwrap();
        let report = warm_start(&inst);

        assert!(report.courses_unplaced.contains(&CourseId("full".into())));
        assert!(!report.courses_unplaced.contains(&CourseId("half".into())));
        assert!(report.assignment.iter().all(|s| s.course == 1));
    }

    #[test]
    fn unplaceable_course_is_reported() {
        let mut inst = trivial_instance();
        inst.instructors[0].avail = vec![vec![false; inst.term.num_periods as usize]];
        let report = warm_start(&inst);
        assert!(report.assignment.is_empty());
        assert_eq!(report.courses_unplaced, vec![CourseId("c1".into())]);
    }

    #[test]
    fn improve_never_worsens_the_warm_start() {
        let inst = trivial_instance();
        let report = warm_start(&inst);
        let before = sched_core::evaluate(&inst, &report.assignment).objective();
        let improved = improve(&inst, report.assignment, 7, 100);
        let after = sched_core::evaluate(&inst, &improved).objective();
        assert!(after <= before + 1e-9);
    }

    use proptest::prelude::*;

    fn contention_instance(enrollments: &[u32], course_types: &[u8]) -> Option<ProblemInstance> {
        let n = enrollments.len().min(course_types.len());
        let raw = RawInstance {
            term_config: TermConfig {
                num_weeks: 4,
                days: vec!["mon".into(), "tue".into()],
                day_start_time: "09:00".into(),
                day_end_time: "12:00".into(),
                period_length_minutes: 45,
            },
            classrooms: vec![
                Classroom {
                    id: ClassroomId("r1".into()),
                    name: "R1".into(),
                    capacity: 30,
                },
                Classroom {
                    id: ClassroomId("r2".into()),
                    name: "R2".into(),
                    capacity: 30,
                },
            ],
            instructors: vec![
                Instructor {
                    id: InstructorId("i1".into()),
                    name: "I1".into(),
                    availability: vec![],
                    back_to_back_preference: 0,
                    allow_lunch_teaching: true,
                },
                Instructor {
                    id: InstructorId("i2".into()),
                    name: "I2".into(),
                    availability: vec![],
                    back_to_back_preference: 0,
                    allow_lunch_teaching: true,
                },
            ],
            courses: (0..n)
                .map(|i| Course {
                    id: CourseId(format!("c{i}")),
                    name: format!("C{i}"),
                    instructor_id: InstructorId(if i % 2 == 0 { "i1".into() } else { "i2".into() }),
                    expected_enrollment: enrollments[i],
                    course_type: match course_types[i] % 3 {
                        0 => CourseType::FullTerm,
                        1 => CourseType::FirstHalfTerm,
                        _ => CourseType::SecondHalfTerm,
                    },
                })
                .collect(),
            students: vec![],
            conflict_weights: ConflictWeights::default(),
        };
        normalize(&raw).ok()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]
        #[test]
        fn warm_start_never_double_books_a_room_or_instructor(
            enrollments in proptest::collection::vec(1u32..20, 1..4),
            course_types in proptest::collection::vec(0u8..3, 1..4),
        ) {
            let Some(inst) = contention_instance(&enrollments, &course_types) else { return Ok(()); };
            let report = warm_start(&inst);

            for (i, a) in report.assignment.iter().enumerate() {
                for b in report.assignment.iter().skip(i + 1) {
                    if a.block != b.block || a.day != b.day {
                        continue;
                    }
                    let dur_a = inst.courses[a.course].duration();
                    let dur_b = inst.courses[b.course].duration();
                    let ra = occupied_periods(a.period_start, dur_a);
                    let rb = occupied_periods(b.period_start, dur_b);
                    let overlap = ra.start < rb.end && rb.start < ra.end;
                    if overlap {
                        prop_assert_ne!(a.room, b.room, "two sessions double-booked a room");
                        prop_assert_ne!(
                            inst.courses[a.course].instructor_idx,
                            inst.courses[b.course].instructor_idx,
                            "two sessions double-booked an instructor"
                        );
                    }
                }
            }
        }
    }
}
