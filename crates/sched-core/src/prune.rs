use crate::domain::{BlockId, ProblemInstance};

/// A `(course, block, day, period_start, room)` tuple that trivially passes
/// the hard constraints checkable in isolation. Only these become MILP
/// variables; everything else is implicitly zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidTuple {
    pub course: usize,
    pub block: BlockId,
    pub day: usize,
    pub period_start: u32,
    pub room: usize,
}

/// Enumerates the valid tuple domain in deterministic `(course, block, day,
/// period, room)` order — this fixes MILP variable declaration order across
/// runs of the same instance.
pub fn valid_tuples(inst: &ProblemInstance) -> Vec<ValidTuple> {
    let mut out = Vec::new();
    let p_max = inst.term.num_periods;

    for (ci, c) in inst.courses.iter().enumerate() {
        let dur = c.duration();
        if dur == 0 || dur > p_max {
            continue;
        }
        let instructor = &inst.instructors[c.instructor_idx];

        for &block in &c.blocks {
            for day in 0..inst.term.days.len() {
                for p in 1..=(p_max - dur + 1) {
                    if !instructor.available_for_session(day, p, dur) {
                        continue;
                    }
                    for (ri, room) in inst.classrooms.iter().enumerate() {
                        if room.capacity < c.expected_enrollment {
                            continue;
                        }
                        out.push(ValidTuple {
                            course: ci,
                            block,
                            day,
                            period_start: p,
                            room: ri,
                        });
                    }
                }
            }
        }
    }
    out
}

/// Periods occupied by a session with the given start (inclusive, 1-based).
pub fn occupied_periods(period_start: u32, dur: u32) -> std::ops::Range<u32> {
    period_start..(period_start + dur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use sched_types::{Classroom, ClassroomId, ConflictWeights, Course, CourseId, CourseType,
        Instructor, InstructorId, RawInstance, TermConfig};

    fn instance() -> crate::domain::ProblemInstance {
        let raw = RawInstance {
            term_config: TermConfig {
                num_weeks: 1,
                days: vec!["mon".into()],
                day_start_time: "09:00".into(),
                day_end_time: "10:30".into(),
                period_length_minutes: 30,
            },
            classrooms: vec![
                Classroom { id: ClassroomId("small".into()), name: "S".into(), capacity: 5 },
                Classroom { id: ClassroomId("big".into()), name: "B".into(), capacity: 50 },
            ],
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
    fn prunes_undersized_rooms() {
        let inst = instance();
        let tuples = valid_tuples(&inst);
        assert!(tuples.iter().all(|t| t.room == 1), "small room must be pruned");
        assert!(!tuples.is_empty());
    }

    #[test]
    fn only_one_start_fits_whole_day() {
        let inst = instance();
        let tuples = valid_tuples(&inst);
        // num_periods=3, dur=3 => only period_start=1 fits.
        assert!(tuples.iter().all(|t| t.period_start == 1));
    }

    use proptest::prelude::*;

    fn instance_with(capacity: u32, enrollment: u32, period_length: u32) -> crate::domain::ProblemInstance {
        let raw = RawInstance {
            term_config: TermConfig {
                num_weeks: 2,
                days: vec!["mon".into(), "tue".into()],
                day_start_time: "09:00".into(),
                day_end_time: "12:00".into(),
                period_length_minutes: period_length,
            },
            classrooms: vec![Classroom {
                id: ClassroomId("r1".into()),
                name: "R1".into(),
                capacity,
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
                expected_enrollment: enrollment,
                course_type: CourseType::FullTerm,
            }],
            students: vec![],
            conflict_weights: ConflictWeights::default(),
        };
        normalize(&raw).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn valid_tuples_only_contain_capacity_fitting_duration_fitting_rooms(
            capacity in 1u32..80,
            enrollment in 1u32..80,
            period_length in 15u32..91,
        ) {
            let inst = instance_with(capacity, enrollment, period_length);
            let tuples = valid_tuples(&inst);
            let dur = inst.courses[0].duration();
            for t in &tuples {
                prop_assert!(inst.classrooms[t.room].capacity >= inst.courses[t.course].expected_enrollment);
                prop_assert!(t.period_start + dur - 1 <= inst.term.num_periods);
                prop_assert!(t.period_start >= 1);
            }
        }
    }
}
