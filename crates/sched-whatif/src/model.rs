//! Rebuilds the full §4.E model from scratch and layers the what-if query
//! constraints and minimality bound on top, each tagged so the IIS search in
//! [`crate::iis`] can drop them one at a time. `good_lp::ProblemVariables` is
//! consumed by `.minimise(...)`, so there is no way to relax an already-built
//! model — every trial declares a fresh set of variables over the same
//! (reusable) valid-tuple domain.

use crate::error::WhatIfError;
use good_lp::{default_solver, Expression, ResolutionError, SolverModel, Variable};
use sched_core::domain::{BlockId, ProblemInstance, ScheduleAssignment, BLOCK_1, BLOCK_2};
use sched_core::prune::ValidTuple;
use sched_milp::milp_core::{self, Prep};
use sched_types::{ClassroomId, CourseId, IisTag, QueryConstraint, SolverConfig};
use std::collections::HashSet;

fn course_index(inst: &ProblemInstance, id: &CourseId) -> anyhow::Result<usize> {
    inst.course_index(id)
        .ok_or_else(|| WhatIfError::UnknownCourse(id.0.clone()).into())
}

fn room_index(inst: &ProblemInstance, id: &ClassroomId) -> anyhow::Result<usize> {
    inst.classroom_index(id)
        .ok_or_else(|| WhatIfError::UnknownRoom(id.0.clone()).into())
}

fn day_index(inst: &ProblemInstance, day: &str) -> anyhow::Result<usize> {
    inst.day_index(day)
        .ok_or_else(|| WhatIfError::UnknownDay(day.to_string()).into())
}

/// Maps a 1-based week to the block it falls in, `None` if out of range.
fn week_to_block(inst: &ProblemInstance, week_1based: u32) -> Option<BlockId> {
    let (lo1, hi1) = inst.term.block_week_range(BLOCK_1);
    let (lo2, hi2) = inst.term.block_week_range(BLOCK_2);
    if hi1 >= lo1 && week_1based >= lo1 && week_1based <= hi1 {
        Some(BLOCK_1)
    } else if hi2 >= lo2 && week_1based >= lo2 && week_1based <= hi2 {
        Some(BLOCK_2)
    } else {
        None
    }
}

fn sum_tuples(prep: &Prep, x: &[Variable], pred: impl Fn(&ValidTuple) -> bool) -> Expression {
    let mut sum = Expression::from(0.0);
    for (idx, t) in prep.tuples.iter().enumerate() {
        if pred(t) {
            sum = sum + x[idx];
        }
    }
    sum
}

/// Compiles one query constraint (§4.G, six kinds) into the model. Wire
/// `week`/`period_start`/`period_end` fields are 0-based like the rest of the
/// schema (`Assignment`); converted to this crate's 1-based internal period
/// and week numbering before matching against the valid-tuple domain.
fn add_query_constraint<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
    inst: &ProblemInstance,
    q: &QueryConstraint,
) -> anyhow::Result<M> {
    match q {
        QueryConstraint::EnforceTimeSlot {
            course,
            week,
            day,
            period_start,
        } => {
            let ci = course_index(inst, course)?;
            let d = day_index(inst, day)?;
            let p = period_start + 1;
            let block = week_to_block(inst, week + 1)
                .ok_or(WhatIfError::WeekOutOfRange(*week))?;
            let sum = sum_tuples(prep, x, |t| {
                t.course == ci && t.block == block && t.day == d && t.period_start == p
            });
            model = model.with(sum.eq(1.0));
        }
        QueryConstraint::VetoTimeSlot {
            course,
            week,
            day,
            period_start,
        } => {
            let ci = course_index(inst, course)?;
            let d = day_index(inst, day)?;
            let p = period_start + 1;
            let block = match week {
                Some(w) => Some(
                    week_to_block(inst, w + 1).ok_or(WhatIfError::WeekOutOfRange(*w))?,
                ),
                None => None,
            };
            let sum = sum_tuples(prep, x, |t| {
                t.course == ci
                    && t.day == d
                    && t.period_start == p
                    && block.map_or(true, |b| t.block == b)
            });
            model = model.with(sum.eq(0.0));
        }
        QueryConstraint::VetoDay { course, day } => {
            let ci = course_index(inst, course)?;
            let d = day_index(inst, day)?;
            let sum = sum_tuples(prep, x, |t| t.course == ci && t.day == d);
            model = model.with(sum.eq(0.0));
        }
        QueryConstraint::EnforceRoom { course, room } => {
            let ci = course_index(inst, course)?;
            let ri = room_index(inst, room)?;
            let sum = sum_tuples(prep, x, |t| t.course == ci && t.room == ri);
            model = model.with(sum.geq(1.0));
        }
        QueryConstraint::EnforceBeforeTime { course, period_end } => {
            let ci = course_index(inst, course)?;
            let limit = period_end + 1;
            let sum = sum_tuples(prep, x, |t| {
                if t.course != ci {
                    return false;
                }
                let dur = inst.courses[t.course].duration();
                t.period_start + dur > limit + 1
            });
            model = model.with(sum.eq(0.0));
        }
        QueryConstraint::EnforceAfterTime {
            course,
            period_start,
        } => {
            let ci = course_index(inst, course)?;
            let limit = period_start + 1;
            let sum = sum_tuples(prep, x, |t| t.course == ci && t.period_start < limit);
            model = model.with(sum.eq(0.0));
        }
    }
    Ok(model)
}

/// Builds the full H1-H5 model plus whichever tagged query/minimality
/// constraints are in `active`, and solves it. The outer `Result` is a
/// genuine construction failure (e.g. a query naming an unknown course); the
/// inner one is the solver's feasibility verdict.
pub fn attempt(
    prep: &Prep,
    inst: &ProblemInstance,
    queries: &[QueryConstraint],
    active: &HashSet<IisTag>,
    original_objective: f64,
    eps: f64,
    config: &SolverConfig,
) -> anyhow::Result<Result<ScheduleAssignment, ResolutionError>> {
    let mut pvars = good_lp::ProblemVariables::new();
    let x = milp_core::declare_x(prep, &mut pvars);
    let pi = milp_core::declare_pi(prep, &mut pvars);
    let phi = milp_core::declare_phi(prep, &mut pvars, &pi);
    let h = milp_core::declare_h(prep, &mut pvars);
    let has_teaching = milp_core::declare_has_teaching(prep, &mut pvars);
    let z = milp_core::declare_adjacency(prep, &mut pvars);
    let y = milp_core::declare_mccormick_y(prep, &mut pvars);

    let objective = milp_core::build_objective(prep, &phi, &x, &y);
    let mut model = pvars.minimise(objective.clone()).using(default_solver);
    model = model.set_parameter("sec", &config.time_limit_secs.to_string());
    model = model.set_parameter("threads", &config.threads.to_string());
    model = model.set_parameter("presolve", if config.presolve { "on" } else { "off" });
    if config.mip_focus_feasibility {
        model = model.set_parameter("passF", "50");
    }

    model = milp_core::add_session_count_constraints(model, prep, &x);
    model = milp_core::add_one_session_per_day_constraints(model, prep, &x);
    model = milp_core::add_room_occupancy_constraints(model, prep, &x);
    model = milp_core::add_full_term_consistency_constraints(model, prep, &x);
    model = milp_core::link_pi(model, prep, &x, &pi);
    model = milp_core::link_h(model, prep, &x, &h);
    model = milp_core::link_has_teaching(model, prep, &h, &has_teaching);
    model = milp_core::link_phi(model, &pi, &phi);
    model = milp_core::link_adjacency(model, &x, &z);
    model = milp_core::link_mccormick_y(model, prep, &x, &z, &has_teaching, &y);

    for (idx, q) in queries.iter().enumerate() {
        if active.contains(&IisTag::Query { index: idx }) {
            model = add_query_constraint(model, prep, &x, inst, q)?;
        }
    }
    if active.contains(&IisTag::Minimality) {
        model = model.with((objective - original_objective - eps).leq(0.0));
    }

    Ok(match model.solve() {
        Ok(sol) => Ok(milp_core::extract_solution(prep, &x, &sol)),
        Err(e) => Err(e),
    })
}
