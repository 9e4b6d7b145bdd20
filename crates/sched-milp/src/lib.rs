pub mod format;
pub mod milp_core;

use async_trait::async_trait;
use good_lp::{default_solver, SolverModel};
use sched_core::domain::ScheduleAssignment;
use sched_core::{normalize, Solver};
use sched_types::{SolveReport, SolveRequest, SolveStatus, SolverConfig};
use tracing::{debug, info, warn};

pub struct MilpSolver;

impl MilpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MilpSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Solver for MilpSolver {
    async fn solve(&self, request: SolveRequest) -> anyhow::Result<SolveReport> {
        let config = request.solver_config.unwrap_or_default();
        let inst = normalize(&request.instance)?;
        info!(courses = inst.courses.len(), "normalized instance for MILP solve");

        let warm = if config.use_warm_start {
            let report = sched_heur::warm_start(&inst);
            if !report.courses_unplaced.is_empty() {
                warn!(
                    unplaced = report.courses_unplaced.len(),
                    "greedy warm start could not place every course"
                );
            }
            Some(report)
        } else {
            None
        };
        let heuristic_score = warm
            .as_ref()
            .map(|w| sched_core::evaluate(&inst, &w.assignment).objective())
            .unwrap_or(0.0);

        let prep = milp_core::build_prep(&inst);
        debug!(tuples = prep.tuples.len(), "built valid-tuple domain");

        let mut pvars = good_lp::ProblemVariables::new();
        let x = milp_core::declare_x(&prep, &mut pvars);
        let pi = milp_core::declare_pi(&prep, &mut pvars);
        let phi = milp_core::declare_phi(&prep, &mut pvars, &pi);
        let h = milp_core::declare_h(&prep, &mut pvars);
        let has_teaching = milp_core::declare_has_teaching(&prep, &mut pvars);
        let z = milp_core::declare_adjacency(&prep, &mut pvars);
        let y = milp_core::declare_mccormick_y(&prep, &mut pvars);

        let objective = milp_core::build_objective(&prep, &phi, &x, &y);

        let mut model = pvars.minimise(objective.clone()).using(default_solver);
        // CBC CLI parameter names: `sec` time limit, `threads` thread count,
        // `presolve` toggle, `passF` feasibility-pump passes for a
        // feasibility-first search when the caller asks for one.
        model = model.set_parameter("sec", &config.time_limit_secs.to_string());
        model = model.set_parameter("threads", &config.threads.to_string());
        model = model.set_parameter("presolve", if config.presolve { "on" } else { "off" });
        if config.mip_focus_feasibility {
            model = model.set_parameter("passF", "50");
        }

        model = milp_core::add_session_count_constraints(model, &prep, &x);
        model = milp_core::add_one_session_per_day_constraints(model, &prep, &x);
        model = milp_core::add_room_occupancy_constraints(model, &prep, &x);
        model = milp_core::add_full_term_consistency_constraints(model, &prep, &x);
        model = milp_core::link_pi(model, &prep, &x, &pi);
        model = milp_core::link_h(model, &prep, &x, &h);
        model = milp_core::link_has_teaching(model, &prep, &h, &has_teaching);
        model = milp_core::link_phi(model, &pi, &phi);
        model = milp_core::link_adjacency(model, &x, &z);
        model = milp_core::link_mccormick_y(model, &prep, &x, &z, &has_teaching, &y);

        match model.solve() {
            Ok(sol) => {
                let assignment = milp_core::extract_solution(&prep, &x, &sol);
                if assignment.is_empty() && !prep.tuples.is_empty() {
                    warn!("solver returned empty assignment over a non-empty domain");
                }
                Ok(format::build_report(
                    &inst,
                    assignment,
                    SolveStatus::Optimal,
                    heuristic_score,
                    &config,
                ))
            }
            Err(good_lp::ResolutionError::Infeasible) => {
                info!("MILP reported infeasible");
                Ok(format::infeasible_report())
            }
            Err(e) => {
                warn!(error = %e, "solver error, falling back to warm-start assignment");
                let fallback: ScheduleAssignment = warm.map(|w| w.assignment).unwrap_or_default();
                if fallback.is_empty() {
                    Ok(format::error_report(&e.to_string()))
                } else {
                    Ok(format::build_report(
                        &inst,
                        fallback,
                        SolveStatus::TimeLimitFeasible,
                        heuristic_score,
                        &config,
                    ))
                }
            }
        }
    }
}
