//! What-if / UDSP analyzer: rebuilds the MILP model with extra user-supplied
//! query constraints and a minimality bound, reporting either a feasible
//! alternative schedule or (on infeasibility) a minimal conflicting subset of
//! constraints found via deletion-filter IIS extraction.

pub mod error;
pub mod iis;
pub mod model;

pub use error::WhatIfError;

use async_trait::async_trait;
use good_lp::ResolutionError;
use sched_core::{normalize, WhatIfSolver};
use sched_types::{
    IisItem, IisTag, QueryConstraint, SolveStatus, WhatIfReport, WhatIfRequest, WhatIfStatus,
};
use std::collections::HashSet;
use tracing::{info, warn};

pub struct WhatIfAnalyzer;

impl WhatIfAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WhatIfAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhatIfSolver for WhatIfAnalyzer {
    async fn whatif(&self, request: WhatIfRequest) -> anyhow::Result<WhatIfReport> {
        let inst = normalize(&request.instance)?;
        let config = request.solver_config.clone().unwrap_or_default();
        let prep = sched_milp::milp_core::build_prep(&inst);

        let original_objective = match request.original_objective {
            Some(v) => v,
            None => match model::attempt(&prep, &inst, &[], &HashSet::new(), 0.0, 0.0, &config)? {
                Ok(baseline) => sched_core::evaluate(&inst, &baseline).objective(),
                Err(_) => {
                    return Ok(WhatIfReport {
                        status: WhatIfStatus::UdspError,
                        alternative: None,
                        objective_difference: None,
                        iis: Vec::new(),
                        interpretation: Some(
                            "base instance (with no query constraints) is already infeasible; \
                             there is no optimum to hold the what-if run minimal against"
                                .into(),
                        ),
                    });
                }
            },
        };
        let eps = 1e-6 * original_objective.abs().max(1.0);

        let all_tags: HashSet<IisTag> = (0..request.queries.len())
            .map(|i| IisTag::Query { index: i })
            .chain(std::iter::once(IisTag::Minimality))
            .collect();

        let verdict = match model::attempt(
            &prep,
            &inst,
            &request.queries,
            &all_tags,
            original_objective,
            eps,
            &config,
        ) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "what-if query failed to compile");
                return Ok(WhatIfReport {
                    status: WhatIfStatus::UdspError,
                    alternative: None,
                    objective_difference: None,
                    iis: Vec::new(),
                    interpretation: Some(e.to_string()),
                });
            }
        };

        match verdict {
            Ok(assignment) => {
                let report = sched_milp::format::build_report(
                    &inst,
                    assignment,
                    SolveStatus::Optimal,
                    0.0,
                    &config,
                );
                let diff = report.objective_value - original_objective;
                info!(diff, "what-if query is feasible");
                Ok(WhatIfReport {
                    status: WhatIfStatus::FeasibleQuery,
                    objective_difference: Some(diff),
                    interpretation: Some(format!(
                        "query is satisfiable; objective changed by {diff:+.2} relative to the original optimum"
                    )),
                    alternative: Some(report),
                    iis: Vec::new(),
                })
            }
            Err(ResolutionError::Infeasible) => {
                let (tags, timed_out) = iis::extract(
                    &prep,
                    &inst,
                    &request.queries,
                    &all_tags,
                    original_objective,
                    eps,
                    &config,
                );
                let iis_items: Vec<IisItem> = tags
                    .iter()
                    .map(|t| IisItem {
                        tag: t.clone(),
                        label: label_for(t, &request.queries),
                    })
                    .collect();
                let interpretation = if timed_out {
                    "IIS search exceeded its time budget; every tagged constraint is reported \
                     as a potential conflict rather than a confirmed minimal set"
                        .to_string()
                } else {
                    format!(
                        "{} tagged constraint(s) form a minimal conflicting set",
                        iis_items.len()
                    )
                };
                Ok(WhatIfReport {
                    status: WhatIfStatus::InfeasibleQuery,
                    alternative: None,
                    objective_difference: None,
                    iis: iis_items,
                    interpretation: Some(interpretation),
                })
            }
            Err(other) => {
                warn!(error = %other, "what-if solve failed for a reason other than infeasibility");
                Ok(WhatIfReport {
                    status: WhatIfStatus::Error,
                    alternative: None,
                    objective_difference: None,
                    iis: Vec::new(),
                    interpretation: Some(other.to_string()),
                })
            }
        }
    }
}

fn label_for(tag: &IisTag, queries: &[QueryConstraint]) -> String {
    match tag {
        IisTag::Query { index } => match queries.get(*index) {
            Some(q) => format!("query[{index}]: {q:?}"),
            None => format!("query[{index}]: <out of range>"),
        },
        IisTag::Minimality => {
            "minimality bound: objective <= original optimum + epsilon".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_types::{
        Classroom, ClassroomId, ConflictWeights, Course, CourseId, CourseType, Instructor,
        InstructorId, RawInstance, TermConfig,
    };

    fn trivial_request(queries: Vec<QueryConstraint>) -> WhatIfRequest {
        WhatIfRequest {
            instance: RawInstance {
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
            },
            queries,
            solver_config: None,
            original_objective: None,
        }
    }

    #[tokio::test]
    async fn feasible_query_reports_no_iis() {
        let analyzer = WhatIfAnalyzer::new();
        let report = analyzer
            .whatif(trivial_request(vec![QueryConstraint::EnforceTimeSlot {
                course: CourseId("c1".into()),
                week: 0,
                day: "mon".into(),
                period_start: 0,
            }]))
            .await
            .unwrap();
        assert_eq!(report.status, WhatIfStatus::FeasibleQuery);
        assert!(report.iis.is_empty());
        assert!(report.alternative.is_some());
    }

    #[tokio::test]
    async fn impossible_slot_is_reported_infeasible_with_iis() {
        let analyzer = WhatIfAnalyzer::new();
        // only one room fits the enrollment, and this pins the course to two
        // different periods at once on the only day the term has.
        let report = analyzer
            .whatif(trivial_request(vec![
                QueryConstraint::EnforceTimeSlot {
                    course: CourseId("c1".into()),
                    week: 0,
                    day: "mon".into(),
                    period_start: 0,
                },
                QueryConstraint::VetoDay {
                    course: CourseId("c1".into()),
                    day: "mon".into(),
                },
            ]))
            .await
            .unwrap();
        assert_eq!(report.status, WhatIfStatus::InfeasibleQuery);
        assert!(!report.iis.is_empty());
        assert!(report.iis.iter().any(|i| i.tag == IisTag::Query { index: 0 }));
        assert!(report.iis.iter().any(|i| i.tag == IisTag::Query { index: 1 }));
    }

    #[tokio::test]
    async fn unknown_course_is_reported_as_udsp_error() {
        let analyzer = WhatIfAnalyzer::new();
        let report = analyzer
            .whatif(trivial_request(vec![QueryConstraint::VetoDay {
                course: CourseId("missing".into()),
                day: "mon".into(),
            }]))
            .await
            .unwrap();
        assert_eq!(report.status, WhatIfStatus::UdspError);
    }

    use proptest::prelude::*;

    fn contention_request(enrollments: &[u32], veto_day: &str) -> WhatIfRequest {
        WhatIfRequest {
            instance: RawInstance {
                term_config: TermConfig {
                    num_weeks: 4,
                    days: vec!["mon".into(), "tue".into(), "wed".into()],
                    day_start_time: "09:00".into(),
                    day_end_time: "12:00".into(),
                    period_length_minutes: 45,
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
                courses: (0..enrollments.len())
                    .map(|i| Course {
                        id: CourseId(format!("c{i}")),
                        name: format!("C{i}"),
                        instructor_id: InstructorId("i1".into()),
                        expected_enrollment: enrollments[i],
                        course_type: CourseType::FullTerm,
                    })
                    .collect(),
                students: vec![],
                conflict_weights: ConflictWeights::default(),
            },
            queries: vec![QueryConstraint::VetoDay {
                course: CourseId("c0".into()),
                day: veto_day.into(),
            }],
            solver_config: None,
            original_objective: None,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]
        #[test]
        fn veto_day_query_is_never_violated_by_a_feasible_alternative(
            enrollments in proptest::collection::vec(1u32..20, 1..3),
            veto_day_idx in 0usize..3,
        ) {
            let days = ["mon", "tue", "wed"];
            let request = contention_request(&enrollments, days[veto_day_idx]);
            let analyzer = WhatIfAnalyzer::new();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let report = rt.block_on(analyzer.whatif(request)).unwrap();

            if report.status == WhatIfStatus::FeasibleQuery {
                let alt = report.alternative.unwrap();
                for a in &alt.assignments {
                    if a.course_id == CourseId("c0".into()) {
                        prop_assert_ne!(&a.day, days[veto_day_idx]);
                    }
                }
            }
        }
    }
}
