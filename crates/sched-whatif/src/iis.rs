//! §4.G.2 deletion-filter IIS extraction.
//!
//! `good_lp`'s solver is consumed as a black box with no native conflict/IIS
//! API, so infeasibility is localized the classic way: repeatedly re-solve
//! with one tagged constraint removed. If removing a constraint restores
//! feasibility, that constraint was necessary for the conflict and is kept
//! in the reported set; if the system is still infeasible without it, it
//! plays no part in this conflict and is dropped for good. What remains when
//! no further drop is possible is an irreducible infeasible subsystem: every
//! member is necessary, because the loop proved it by removing it and
//! re-solving.
use crate::model::attempt;
use good_lp::ResolutionError;
use sched_core::domain::ProblemInstance;
use sched_milp::milp_core::Prep;
use sched_types::{IisTag, QueryConstraint, SolverConfig};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Returns the surviving tags (the IIS) and whether the search hit its time
/// budget and fell back to the conservative "everything's a suspect" report.
pub fn extract(
    prep: &Prep,
    inst: &ProblemInstance,
    queries: &[QueryConstraint],
    all_tags: &HashSet<IisTag>,
    original_objective: f64,
    eps: f64,
    config: &SolverConfig,
) -> (Vec<IisTag>, bool) {
    let deadline = Instant::now() + Duration::from_secs(config.iis_timeout_secs.max(1));
    let mut working: HashSet<IisTag> = all_tags.clone();

    let mut order: Vec<IisTag> = (0..queries.len()).map(|i| IisTag::Query { index: i }).collect();
    order.push(IisTag::Minimality);

    for tag in order {
        if !working.contains(&tag) {
            continue;
        }
        if Instant::now() >= deadline {
            tracing::warn!("IIS deletion filter hit its time budget, reporting all tags");
            return (sorted(all_tags.clone()), true);
        }

        let mut trial = working.clone();
        trial.remove(&tag);

        match attempt(prep, inst, queries, &trial, original_objective, eps, config) {
            Ok(Ok(_feasible)) => {
                // Removing `tag` restored feasibility: it's part of the conflict, keep it.
            }
            Ok(Err(ResolutionError::Infeasible)) => {
                // Still infeasible without it: not needed for this conflict.
                working = trial;
            }
            Ok(Err(_other)) | Err(_) => {
                // Inconclusive trial; don't risk wrongly exonerating this tag.
            }
        }
    }

    (sorted(working), false)
}

fn sorted(tags: HashSet<IisTag>) -> Vec<IisTag> {
    let mut out: Vec<IisTag> = tags.into_iter().collect();
    out.sort_by_key(|t| match t {
        IisTag::Query { index } => *index as i64,
        IisTag::Minimality => i64::MAX,
    });
    out
}
