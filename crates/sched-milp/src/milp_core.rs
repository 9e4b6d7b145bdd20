use good_lp::{Expression, ProblemVariables, Solution, SolverModel, Variable};
use sched_core::domain::{BlockId, ProblemInstance, ScheduleAssignment, ScheduledSession};
use sched_core::prune::{occupied_periods, valid_tuples, ValidTuple};
use std::collections::HashMap;

/// Course occupancy key: which (block, day, period) the valid tuple domain
/// considers reachable by a given course.
pub type CbdKey = (usize, BlockId, usize);
pub type CbdpKey = (usize, BlockId, usize, u32);
pub type IbdKey = (usize, BlockId, usize);
pub type IbdpKey = (usize, BlockId, usize, u32);

pub struct Prep<'a> {
    pub inst: &'a ProblemInstance,
    pub tuples: Vec<ValidTuple>,
    pub by_cbd: HashMap<CbdKey, Vec<usize>>,
    pub by_ibd: HashMap<IbdKey, Vec<usize>>,
    /// course pairs `(c1 < c2)` sharing at least one student and one block.
    pub conflict_pairs: Vec<(usize, usize, u32, Vec<BlockId>)>,
    /// back-to-back candidate pairs of tuple indices: same instructor/block/day,
    /// `tuples[a]` ends exactly where `tuples[b]` starts.
    pub adjacency_pairs: Vec<(usize, usize, usize, BlockId, usize)>,
}

pub struct Vars {
    pub x: Vec<Variable>,
    pub pi: HashMap<CbdpKey, Variable>,
    pub phi: HashMap<(usize, usize, BlockId, usize, u32), Variable>,
    pub h: HashMap<IbdpKey, Variable>,
    pub has_teaching: HashMap<IbdKey, Variable>,
    pub z: Vec<(Variable, usize, usize)>,
    pub y: HashMap<IbdKey, Variable>,
}

pub fn build_prep(inst: &ProblemInstance) -> Prep<'_> {
    let tuples = valid_tuples(inst);

    let mut by_cbd: HashMap<CbdKey, Vec<usize>> = HashMap::new();
    let mut by_ibd: HashMap<IbdKey, Vec<usize>> = HashMap::new();
    for (idx, t) in tuples.iter().enumerate() {
        by_cbd.entry((t.course, t.block, t.day)).or_default().push(idx);
        let instr = inst.courses[t.course].instructor_idx;
        by_ibd.entry((instr, t.block, t.day)).or_default().push(idx);
    }

    let mut conflict_pairs = Vec::new();
    for (c1, c2, n) in inst.students_cc.pairs() {
        if n == 0 {
            continue;
        }
        let common: Vec<BlockId> = inst.courses[c1]
            .blocks
            .iter()
            .filter(|b| inst.courses[c2].blocks.contains(b))
            .copied()
            .collect();
        if !common.is_empty() {
            let (lo, hi) = if c1 < c2 { (c1, c2) } else { (c2, c1) };
            conflict_pairs.push((lo, hi, n, common));
        }
    }

    let mut adjacency_pairs = Vec::new();
    for (&(instr, block, day), idxs) in &by_ibd {
        for &a in idxs {
            let ta = &tuples[a];
            let dur_a = inst.courses[ta.course].duration();
            let end_a = ta.period_start + dur_a;
            for &b in idxs {
                if a == b {
                    continue;
                }
                let tb = &tuples[b];
                if tb.period_start == end_a {
                    adjacency_pairs.push((a, b, instr, block, day));
                }
            }
        }
    }

    Prep {
        inst,
        tuples,
        by_cbd,
        by_ibd,
        conflict_pairs,
        adjacency_pairs,
    }
}

pub fn declare_x(prep: &Prep, vars: &mut ProblemVariables) -> Vec<Variable> {
    prep.tuples
        .iter()
        .map(|_| vars.add(good_lp::variable().binary()))
        .collect()
}

/// `pi[c,b,d,p] == sum of x[t]` over tuples of that course/block/day occupying
/// period `p`. One aux variable per reachable `(course, block, day, period)`.
pub fn declare_pi(
    prep: &Prep,
    vars: &mut ProblemVariables,
) -> HashMap<CbdpKey, Variable> {
    let mut pi = HashMap::new();
    for (&(c, b, d), idxs) in &prep.by_cbd {
        let mut periods: Vec<u32> = idxs
            .iter()
            .flat_map(|&i| {
                let t = &prep.tuples[i];
                occupied_periods(t.period_start, prep.inst.courses[t.course].duration())
            })
            .collect();
        periods.sort_unstable();
        periods.dedup();
        for p in periods {
            pi.insert((c, b, d, p), vars.add(good_lp::variable().binary()));
        }
    }
    pi
}

/// `h[i,b,d,p]` mirrors `pi` but keyed on the teaching instructor.
pub fn declare_h(
    prep: &Prep,
    vars: &mut ProblemVariables,
) -> HashMap<IbdpKey, Variable> {
    let mut h = HashMap::new();
    for (&(i, b, d), idxs) in &prep.by_ibd {
        let mut periods: Vec<u32> = idxs
            .iter()
            .flat_map(|&idx| {
                let t = &prep.tuples[idx];
                occupied_periods(t.period_start, prep.inst.courses[t.course].duration())
            })
            .collect();
        periods.sort_unstable();
        periods.dedup();
        for p in periods {
            h.insert((i, b, d, p), vars.add(good_lp::variable().binary()));
        }
    }
    h
}

pub fn declare_has_teaching(
    prep: &Prep,
    vars: &mut ProblemVariables,
) -> HashMap<IbdKey, Variable> {
    prep.by_ibd
        .keys()
        .map(|&k| (k, vars.add(good_lp::variable().binary())))
        .collect()
}

/// `phi[c1,c2,b,d,p]` is the AND of `pi[c1,...]` and `pi[c2,...]`, declared
/// only where both courses can reach the same period — the domain pruner
/// already keeps this sparse.
pub fn declare_phi(
    prep: &Prep,
    vars: &mut ProblemVariables,
    pi: &HashMap<CbdpKey, Variable>,
) -> HashMap<(usize, usize, BlockId, usize, u32), Variable> {
    let mut phi = HashMap::new();
    for &(c1, c2, _n, ref blocks) in &prep.conflict_pairs {
        for &b in blocks {
            for d in 0..prep.inst.term.days.len() {
                let periods: Vec<u32> = pi
                    .keys()
                    .filter(|&&(c, bb, dd, _)| (c == c1 || c == c2) && bb == b && dd == d)
                    .map(|&(_, _, _, p)| p)
                    .collect();
                let mut periods = periods;
                periods.sort_unstable();
                periods.dedup();
                for p in periods {
                    if pi.contains_key(&(c1, b, d, p)) && pi.contains_key(&(c2, b, d, p)) {
                        phi.insert((c1, c2, b, d, p), vars.add(good_lp::variable().binary()));
                    }
                }
            }
        }
    }
    phi
}

pub fn declare_adjacency(
    prep: &Prep,
    vars: &mut ProblemVariables,
) -> Vec<(Variable, usize, usize)> {
    prep.adjacency_pairs
        .iter()
        .map(|&(a, b, _, _, _)| (vars.add(good_lp::variable().binary()), a, b))
        .collect()
}

pub fn declare_mccormick_y(
    prep: &Prep,
    vars: &mut ProblemVariables,
) -> HashMap<IbdKey, Variable> {
    prep.by_ibd
        .iter()
        .map(|(&k, idxs)| {
            let cap = idxs.len() as f64;
            let lb = -(cap.max(1.0));
            let ub = cap + 1.0;
            (k, vars.add(good_lp::variable().min(lb).max(ub)))
        })
        .collect()
}

pub fn add_session_count_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
) -> M {
    for (ci, c) in prep.inst.courses.iter().enumerate() {
        for &b in &c.blocks {
            let mut sum = Expression::from(0.0);
            for day in 0..prep.inst.term.days.len() {
                if let Some(idxs) = prep.by_cbd.get(&(ci, b, day)) {
                    for &idx in idxs {
                        sum = sum + x[idx];
                    }
                }
            }
            model = model.with(sum.eq(c.sessions_per_week as f64));
        }
    }
    model
}

pub fn add_one_session_per_day_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
) -> M {
    for (&(_c, _b, _d), idxs) in &prep.by_cbd {
        let mut sum = Expression::from(0.0);
        for &idx in idxs {
            sum = sum + x[idx];
        }
        model = model.with(sum.leq(1.0));
    }
    model
}

pub fn add_room_occupancy_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
) -> M {
    for (ri, _room) in prep.inst.classrooms.iter().enumerate() {
        for &block in &[sched_core::domain::BLOCK_1, sched_core::domain::BLOCK_2] {
            for day in 0..prep.inst.term.days.len() {
                for p in 1..=prep.inst.term.num_periods {
                    let mut sum = Expression::from(0.0);
                    for (idx, t) in prep.tuples.iter().enumerate() {
                        if t.room != ri || t.block != block || t.day != day {
                            continue;
                        }
                        let dur = prep.inst.courses[t.course].duration();
                        if occupied_periods(t.period_start, dur).contains(&p) {
                            sum = sum + x[idx];
                        }
                    }
                    model = model.with(sum.leq(1.0));
                }
            }
        }
    }
    model
}

pub fn link_pi<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
    pi: &HashMap<CbdpKey, Variable>,
) -> M {
    for (&(c, b, d, p), &var) in pi {
        let mut sum = Expression::from(0.0);
        if let Some(idxs) = prep.by_cbd.get(&(c, b, d)) {
            for &idx in idxs {
                let t = &prep.tuples[idx];
                let dur = prep.inst.courses[t.course].duration();
                if occupied_periods(t.period_start, dur).contains(&p) {
                    sum = sum + x[idx];
                }
            }
        }
        model = model.with(sum.eq(var));
    }
    model
}

pub fn link_h<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
    h: &HashMap<IbdpKey, Variable>,
) -> M {
    for (&(i, b, d, p), &var) in h {
        let mut sum = Expression::from(0.0);
        if let Some(idxs) = prep.by_ibd.get(&(i, b, d)) {
            for &idx in idxs {
                let t = &prep.tuples[idx];
                let dur = prep.inst.courses[t.course].duration();
                if occupied_periods(t.period_start, dur).contains(&p) {
                    sum = sum + x[idx];
                }
            }
        }
        model = model.with(sum.eq(var));
        // instructor cannot be double-booked: the linked sum is itself <= 1
        // because h is binary, but declare it explicitly for clarity/defense.
        model = model.with(Expression::from(var).leq(1.0));
    }
    model
}

pub fn link_has_teaching<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    h: &HashMap<IbdpKey, Variable>,
    has_teaching: &HashMap<IbdKey, Variable>,
) -> M {
    for (&(i, b, d), &ht) in has_teaching {
        let periods_h: Vec<Variable> = h
            .iter()
            .filter(|(&(hi, hb, hd, _), _)| hi == i && hb == b && hd == d)
            .map(|(_, &v)| v)
            .collect();
        let mut sum = Expression::from(0.0);
        for &v in &periods_h {
            sum = sum + v;
            model = model.with((Expression::from(ht) - v).geq(0.0));
        }
        model = model.with((sum - ht).geq(0.0));
    }
    model
}

pub fn link_phi<M: SolverModel>(
    mut model: M,
    pi: &HashMap<CbdpKey, Variable>,
    phi: &HashMap<(usize, usize, BlockId, usize, u32), Variable>,
) -> M {
    for (&(c1, c2, b, d, p), &var) in phi {
        let p1 = pi[&(c1, b, d, p)];
        let p2 = pi[&(c2, b, d, p)];
        model = model.with((Expression::from(var) - p1).leq(0.0));
        model = model.with((Expression::from(var) - p2).leq(0.0));
        model = model.with((Expression::from(var) - p1 - p2).geq(-1.0));
    }
    model
}

pub fn link_adjacency<M: SolverModel>(
    mut model: M,
    x: &[Variable],
    z: &[(Variable, usize, usize)],
) -> M {
    for &(var, a, b) in z {
        model = model.with((Expression::from(var) - x[a]).leq(0.0));
        model = model.with((Expression::from(var) - x[b]).leq(0.0));
        model = model.with((Expression::from(var) - x[a] - x[b]).geq(-1.0));
    }
    model
}

/// H5: a full-term course must sit in the exact same (day, period, room) in
/// both blocks. Matched per room, not summed across rooms — summing would
/// let a course sit in room A in block 1 and room B in block 2 at the same
/// start period and still pass.
pub fn add_full_term_consistency_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
) -> M {
    for (ci, c) in prep.inst.courses.iter().enumerate() {
        if !c.spans_both_blocks() {
            continue;
        }
        for day in 0..prep.inst.term.days.len() {
            let mut block1_by_pr: HashMap<(u32, usize), usize> = HashMap::new();
            if let Some(idxs) = prep.by_cbd.get(&(ci, sched_core::domain::BLOCK_1, day)) {
                for &idx in idxs {
                    let t = &prep.tuples[idx];
                    block1_by_pr.insert((t.period_start, t.room), idx);
                }
            }
            let mut block2_by_pr: HashMap<(u32, usize), usize> = HashMap::new();
            if let Some(idxs) = prep.by_cbd.get(&(ci, sched_core::domain::BLOCK_2, day)) {
                for &idx in idxs {
                    let t = &prep.tuples[idx];
                    block2_by_pr.insert((t.period_start, t.room), idx);
                }
            }

            let mut keys: Vec<(u32, usize)> = block1_by_pr.keys().copied().collect();
            for k in block2_by_pr.keys() {
                if !keys.contains(k) {
                    keys.push(*k);
                }
            }

            for key in keys {
                let lhs = block1_by_pr
                    .get(&key)
                    .map(|&idx| Expression::from(x[idx]))
                    .unwrap_or_else(|| Expression::from(0.0));
                let rhs = block2_by_pr
                    .get(&key)
                    .map(|&idx| Expression::from(x[idx]))
                    .unwrap_or_else(|| Expression::from(0.0));
                model = model.with((lhs - rhs).eq(0.0));
            }
        }
    }
    model
}

/// McCormick envelope for `y[i,b,d] = has_teaching[i,b,d] * (2B - T + 1)`
/// where `B` is the sum of adjacency `z`s and `T` the session count, both
/// linear expressions over already-declared binaries.
pub fn link_mccormick_y<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    x: &[Variable],
    z: &[(Variable, usize, usize)],
    has_teaching: &HashMap<IbdKey, Variable>,
    y: &HashMap<IbdKey, Variable>,
) -> M {
    for (&(i, b, d), &yvar) in y {
        let ht = has_teaching[&(i, b, d)];

        let mut t_expr = Expression::from(0.0);
        let cap = prep
            .by_ibd
            .get(&(i, b, d))
            .map(|idxs| idxs.len() as f64)
            .unwrap_or(0.0);
        if let Some(idxs) = prep.by_ibd.get(&(i, b, d)) {
            for &idx in idxs {
                t_expr = t_expr + x[idx];
            }
        }

        let mut b_expr = Expression::from(0.0);
        for (&(_a, _b2, zi, zb, zd), &(zv, _, _)) in prep.adjacency_pairs.iter().zip(z.iter()) {
            if zi == i && zb == b && zd == d {
                b_expr = b_expr + zv;
            }
        }

        let e_expr = b_expr * 2.0 - t_expr + 1.0;
        let lb = -(cap.max(1.0));
        let ub = cap + 1.0;

        // McCormick envelope for y = ht * e_expr, ht binary, e_expr in [lb, ub].
        model = model.with((Expression::from(yvar) - ht * ub).leq(0.0));
        model = model.with((Expression::from(yvar) - ht * lb).geq(0.0));
        model = model.with((Expression::from(yvar) - e_expr.clone() - ht * lb + lb).leq(0.0));
        model = model.with((Expression::from(yvar) - e_expr - ht * ub + ub).geq(0.0));
    }
    model
}

pub fn build_objective(
    prep: &Prep,
    phi: &HashMap<(usize, usize, BlockId, usize, u32), Variable>,
    x: &[Variable],
    y: &HashMap<IbdKey, Variable>,
) -> Expression {
    let mut objective = Expression::from(0.0);
    let w1 = prep.inst.weights.w1;
    let w2 = prep.inst.weights.w2;
    let w3 = prep.inst.weights.w3;

    if w1 > 0.0 {
        for (&(c1, c2, b, _d, _p), &var) in phi {
            let n = prep
                .conflict_pairs
                .iter()
                .find(|&&(a, bb, _, _)| a == c1 && bb == c2)
                .map(|&(_, _, n, _)| n)
                .unwrap_or(0);
            objective = objective + w1 * n as f64 * prep.inst.term.block_weeks(b) as f64 * var;
        }
    }

    if w2 > 0.0 {
        for (&(i, b, _d), &yvar) in y {
            let pref = prep.inst.instructors[i].back_to_back_preference as f64;
            if pref == 0.0 {
                continue;
            }
            objective = objective + w2 * pref * prep.inst.term.block_weeks(b) as f64 * yvar;
        }
    }

    if w3 > 0.0 {
        for (idx, t) in prep.tuples.iter().enumerate() {
            let course = &prep.inst.courses[t.course];
            let instr = &prep.inst.instructors[course.instructor_idx];
            if instr.lunch_penalty == 0.0 {
                continue;
            }
            let dur = course.duration();
            let hit = occupied_periods(t.period_start, dur)
                .filter(|p| prep.inst.term.is_lunch_period(*p))
                .count();
            if hit > 0 {
                objective = objective
                    + w3 * instr.lunch_penalty
                        * prep.inst.term.block_weeks(t.block) as f64
                        * hit as f64
                        * x[idx];
            }
        }
    }

    objective
}

pub fn extract_solution(prep: &Prep, x: &[Variable], sol: &impl Solution) -> ScheduleAssignment {
    let mut out = Vec::new();
    for (idx, t) in prep.tuples.iter().enumerate() {
        if sol.value(x[idx]) > 0.5 {
            out.push(ScheduledSession {
                course: t.course,
                block: t.block,
                day: t.day,
                period_start: t.period_start,
                room: t.room,
            });
        }
    }
    out
}
