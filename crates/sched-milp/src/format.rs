//! §4.F output formatter: turns an internal `ScheduleAssignment` (or a
//! terminal solver status with no assignment) into the wire-shape
//! `SolveReport`.

use sched_core::domain::{ProblemInstance, ScheduleAssignment};
use sched_types::{Assignment, PenaltyBreakdown, SolveReport, SolveStatus, SolverConfig};
use std::collections::HashMap;

pub fn build_report(
    inst: &ProblemInstance,
    assignment: ScheduleAssignment,
    status: SolveStatus,
    heuristic_score: f64,
    config: &SolverConfig,
) -> SolveReport {
    let breakdown = sched_core::evaluate(inst, &assignment);
    let objective = breakdown.objective();
    let improvement_summary = if heuristic_score > 0.0 {
        let pct = 100.0 * (heuristic_score - objective) / heuristic_score;
        format!(
            "warm start {heuristic_score:.2} -> MILP {objective:.2} ({pct:.1}% improvement)"
        )
    } else {
        format!("MILP objective {objective:.2}")
    };

    SolveReport {
        status,
        objective_value: objective,
        improvement_summary,
        penalty_breakdown: PenaltyBreakdown {
            s1_student_conflicts: breakdown.s1_student_conflicts,
            s2_instructor_compactness: breakdown.s2_instructor_compactness,
            s3_lunch: breakdown.s3_lunch,
        },
        assignments: expand_to_wire(inst, &assignment),
        solver_status_detail: Some(format!(
            "coin_cbc, time_limit={}s, threads={}",
            config.time_limit_secs, config.threads
        )),
    }
}

pub fn infeasible_report() -> SolveReport {
    SolveReport {
        status: SolveStatus::Infeasible,
        objective_value: 0.0,
        improvement_summary: "no feasible schedule exists for this instance".into(),
        penalty_breakdown: PenaltyBreakdown::default(),
        assignments: Vec::new(),
        solver_status_detail: Some("coin_cbc reported infeasible".into()),
    }
}

pub fn error_report(message: &str) -> SolveReport {
    SolveReport {
        status: SolveStatus::Error,
        objective_value: 0.0,
        improvement_summary: "solver error, no schedule produced".into(),
        penalty_breakdown: PenaltyBreakdown::default(),
        assignments: Vec::new(),
        solver_status_detail: Some(message.to_string()),
    }
}

/// Expands one internal session per course/block into one wire `Assignment`
/// per calendar week it actually occurs in, numbering sessions in week order.
pub fn expand_to_wire(inst: &ProblemInstance, assignment: &ScheduleAssignment) -> Vec<Assignment> {
    let mut sessions = assignment.clone();
    sessions.sort_by_key(|s| (s.course, s.block, s.day, s.period_start));

    let mut per_course_session: HashMap<usize, u32> = HashMap::new();
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

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::domain::{ScheduledSession, BLOCK_2};
    use sched_core::normalize;
    use sched_types::{
        Classroom, ClassroomId, ConflictWeights, Course, CourseId, CourseType, Instructor,
        InstructorId, RawInstance, TermConfig,
    };

    fn instance() -> ProblemInstance {
        let raw = RawInstance {
            term_config: TermConfig {
                num_weeks: 2,
                days: vec!["mon".into(), "wed".into()],
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
    fn expands_one_session_per_active_week() {
        let inst = instance();
        let assignment = vec![ScheduledSession {
            course: 0,
            block: BLOCK_2,
            day: 0,
            period_start: 1,
            room: 0,
        }];
        let wire = expand_to_wire(&inst, &assignment);
        // block 2 covers weeks [half_point+1, num_weeks] = [2, 2].
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].week, 1);
        assert_eq!(wire[0].session_number, 1);
        assert_eq!(wire[0].period_start, 0);
    }

    #[test]
    fn infeasible_report_has_no_assignments() {
        let report = infeasible_report();
        assert_eq!(report.status, SolveStatus::Infeasible);
        assert!(report.assignments.is_empty());
    }
}
