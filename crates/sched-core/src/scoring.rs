use crate::domain::{BlockId, ProblemInstance, ScheduleAssignment, BLOCK_1, BLOCK_2};
use crate::prune::occupied_periods;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub s1_student_conflicts: f64,
    pub s2_instructor_compactness: f64,
    pub s3_lunch: f64,
}

impl ScoreBreakdown {
    pub fn objective(&self) -> f64 {
        self.s1_student_conflicts + self.s2_instructor_compactness + self.s3_lunch
    }
}

fn overlap_len(a_start: u32, a_dur: u32, b_start: u32, b_dur: u32) -> u32 {
    let a_end = a_start + a_dur;
    let b_end = b_start + b_dur;
    let lo = a_start.max(b_start);
    let hi = a_end.min(b_end);
    hi.saturating_sub(lo)
}

/// Evaluates the weighted soft-constraint objective for a concrete schedule.
/// This must match the MILP's linearized objective term-for-term; any
/// divergence here silently breaks warm-start verification and the reported
/// improvement summary.
pub fn evaluate(inst: &ProblemInstance, assignment: &ScheduleAssignment) -> ScoreBreakdown {
    // (course, block, day) -> (period_start, dur); at most one per course/day/block.
    let mut by_course_block_day: HashMap<(usize, BlockId, usize), (u32, u32)> = HashMap::new();
    for s in assignment {
        let dur = inst.courses[s.course].duration();
        by_course_block_day.insert((s.course, s.block, s.day), (s.period_start, dur));
    }

    let s1 = score_s1(inst, &by_course_block_day);
    let s2 = score_s2(inst, assignment);
    let s3 = score_s3(inst, assignment);

    ScoreBreakdown {
        s1_student_conflicts: inst.weights.w1 * s1,
        s2_instructor_compactness: inst.weights.w2 * s2,
        s3_lunch: inst.weights.w3 * s3,
    }
}

fn score_s1(
    inst: &ProblemInstance,
    by_course_block_day: &HashMap<(usize, BlockId, usize), (u32, u32)>,
) -> f64 {
    if inst.weights.w1 == 0.0 {
        return 0.0;
    }
    let mut total = 0.0f64;
    for (c1, c2, n) in inst.students_cc.pairs() {
        if n == 0 {
            continue;
        }
        let common_blocks: Vec<BlockId> = inst.courses[c1]
            .blocks
            .iter()
            .filter(|b| inst.courses[c2].blocks.contains(b))
            .copied()
            .collect();
        for b in common_blocks {
            for day in 0..inst.term.days.len() {
                let s1 = by_course_block_day.get(&(c1, b, day));
                let s2 = by_course_block_day.get(&(c2, b, day));
                if let (Some(&(p1, d1)), Some(&(p2, d2))) = (s1, s2) {
                    let overlap = overlap_len(p1, d1, p2, d2);
                    if overlap > 0 {
                        total += n as f64 * inst.term.block_weeks(b) as f64 * overlap as f64;
                    }
                }
            }
        }
    }
    total
}

fn score_s2(inst: &ProblemInstance, assignment: &ScheduleAssignment) -> f64 {
    if inst.weights.w2 == 0.0 {
        return 0.0;
    }
    // (instructor, block, day) -> list of (period_start, dur)
    let mut by_instr: HashMap<(usize, BlockId, usize), Vec<(u32, u32)>> = HashMap::new();
    for s in assignment {
        let instr = inst.courses[s.course].instructor_idx;
        if inst.instructors[instr].back_to_back_preference == 0 {
            continue;
        }
        let dur = inst.courses[s.course].duration();
        by_instr
            .entry((instr, s.block, s.day))
            .or_default()
            .push((s.period_start, dur));
    }

    let mut total = 0.0f64;
    for ((instr, block, _day), mut intervals) in by_instr {
        let t = intervals.len();
        if t < 2 {
            continue;
        }
        intervals.sort_by_key(|&(p, _)| p);
        let mut b = 0u32;
        for w in intervals.windows(2) {
            let (p0, d0) = w[0];
            let (p1, _d1) = w[1];
            if p0 + d0 == p1 {
                b += 1;
            }
        }
        let pref = inst.instructors[instr].back_to_back_preference as f64;
        let metric = 2.0 * b as f64 - (t as f64 - 1.0);
        total += pref * inst.term.block_weeks(block) as f64 * metric;
    }
    total
}

fn score_s3(inst: &ProblemInstance, assignment: &ScheduleAssignment) -> f64 {
    if inst.weights.w3 == 0.0 {
        return 0.0;
    }
    let mut total = 0.0f64;
    for s in assignment {
        let instr = inst.courses[s.course].instructor_idx;
        let penalty = inst.instructors[instr].lunch_penalty;
        if penalty == 0.0 {
            continue;
        }
        let dur = inst.courses[s.course].duration();
        let hit = occupied_periods(s.period_start, dur)
            .filter(|p| inst.term.is_lunch_period(*p))
            .count();
        if hit > 0 {
            total += penalty * inst.term.block_weeks(s.block) as f64 * hit as f64;
        }
    }
    total
}

pub fn is_valid_block(b: BlockId) -> bool {
    b == BLOCK_1 || b == BLOCK_2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScheduledSession;
    use crate::normalize::normalize;
    use sched_types::{
        Classroom, ClassroomId, ConflictWeights, Course, CourseId, CourseType, Instructor,
        InstructorId, RawInstance, StudentEnrollment, TermConfig,
    };

    fn two_course_instance(w1: f64) -> crate::domain::ProblemInstance {
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
                capacity: 50,
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
                    id: CourseId("c1".into()),
                    name: "C1".into(),
                    instructor_id: InstructorId("i1".into()),
                    expected_enrollment: 10,
                    course_type: CourseType::FullTerm,
                },
                Course {
                    id: CourseId("c2".into()),
                    name: "C2".into(),
                    instructor_id: InstructorId("i2".into()),
                    expected_enrollment: 10,
                    course_type: CourseType::FullTerm,
                },
            ],
            students: vec![StudentEnrollment {
                enrolled_course_ids: vec![CourseId("c1".into()), CourseId("c2".into())],
            }],
            conflict_weights: ConflictWeights {
                global_student_conflict_weight: w1,
                instructor_compactness_weight: 0.0,
                preferred_time_slots_weight: 0.0,
            },
        };
        normalize(&raw).unwrap()
    }

    #[test]
    fn s1_counts_overlap_weighted_by_students_and_block() {
        let inst = two_course_instance(2.0);
        let assignment: ScheduleAssignment = vec![
            ScheduledSession { course: 0, block: BLOCK_2, day: 0, period_start: 1, room: 0 },
            ScheduledSession { course: 1, block: BLOCK_2, day: 0, period_start: 1, room: 0 },
        ];
        let score = evaluate(&inst, &assignment);
        // overlap_length = 3 (both 3-period sessions fully overlap), 1 student, block_weight=1
        assert_eq!(score.s1_student_conflicts, 2.0 * 1.0 * 3.0);
        assert_eq!(score.objective(), score.s1_student_conflicts);
    }

    #[test]
    fn disjoint_days_yield_no_penalty() {
        let inst = two_course_instance(5.0);
        let assignment: ScheduleAssignment = vec![ScheduledSession {
            course: 0,
            block: BLOCK_2,
            day: 0,
            period_start: 1,
            room: 0,
        }];
        let score = evaluate(&inst, &assignment);
        assert_eq!(score.s1_student_conflicts, 0.0);
    }

    #[test]
    fn back_to_back_pairs_increase_compactness_score() {
        let mut inst = two_course_instance(0.0);
        inst.weights.w1 = 0.0;
        inst.weights.w2 = 1.0;
        inst.instructors[0].back_to_back_preference = 3;
        inst.courses[1].instructor_idx = 0;
        let assignment: ScheduleAssignment = vec![
            ScheduledSession { course: 0, block: BLOCK_2, day: 0, period_start: 1, room: 0 },
            ScheduledSession { course: 1, block: BLOCK_2, day: 0, period_start: 1, room: 0 },
        ];
        // Both occupy the same 3-period slot (overlapping, not back-to-back):
        // b=0, t=2 => metric = 2*0 - (2-1) = -1.
        let score = evaluate(&inst, &assignment);
        assert_eq!(score.s2_instructor_compactness, 3.0 * 1.0 * -1.0);
    }
}
