use std::time::Instant;

use amor_common::Rational;
use num_traits::{One, Signed, Zero};

use crate::problem::{LinearProgram, Relation};

/// Limits for one [`solve`] call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolveOptions {
    /// Give up with [`Outcome::TimedOut`] once this instant has passed.
    /// Checked before every pivot.
    pub deadline: Option<Instant>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LpSolution {
    /// One value per variable of the program, indexed by `VarId`.
    pub values: Vec<Rational>,
    pub objective: Rational,
    pub pivots: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Optimal(LpSolution),
    Infeasible,
    Unbounded,
    TimedOut,
}

// ── Standard form ────────────────────────────────────────────────────────

/// How an original variable maps onto non-negative tableau columns.
enum Column {
    /// `x = lower + x'`
    Shifted { col: usize, lower: Rational },
    /// `x = x⁺ − x⁻`
    Split { pos: usize, neg: usize },
}

enum Stop {
    Unbounded,
    TimedOut,
}

struct Tableau {
    /// `m` rows of `width + 1` entries; the last entry is the right-hand side.
    rows: Vec<Vec<Rational>>,
    basis: Vec<usize>,
    /// Reduced costs; the last entry is minus the current objective value.
    cost: Vec<Rational>,
    width: usize,
    pivots: usize,
}

impl Tableau {
    fn rhs(&self, row: usize) -> &Rational {
        &self.rows[row][self.width]
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c].clone();
        for entry in self.rows[r].iter_mut() {
            if !entry.is_zero() {
                *entry /= &p;
            }
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i != r {
                eliminate(row, &pivot_row, c);
            }
        }
        eliminate(&mut self.cost, &pivot_row, c);
        self.basis[r] = c;
        self.pivots += 1;
    }

    /// Primal simplex with Bland's rule. Columns for which `blocked`
    /// returns true never enter the basis.
    fn run(
        &mut self,
        blocked: impl Fn(usize) -> bool,
        deadline: Option<Instant>,
    ) -> Result<(), Stop> {
        loop {
            if deadline.map_or(false, |d| Instant::now() >= d) {
                return Err(Stop::TimedOut);
            }
            let entering = (0..self.width).find(|&j| !blocked(j) && self.cost[j].is_negative());
            let Some(c) = entering else {
                return Ok(());
            };

            let mut leaving: Option<(usize, Rational)> = None;
            for i in 0..self.rows.len() {
                let a = &self.rows[i][c];
                if !a.is_positive() {
                    continue;
                }
                let ratio = self.rhs(i) / a;
                let better = match &leaving {
                    None => true,
                    Some((best, best_ratio)) => {
                        ratio < *best_ratio || (ratio == *best_ratio && self.basis[i] < self.basis[*best])
                    }
                };
                if better {
                    leaving = Some((i, ratio));
                }
            }
            let Some((r, _)) = leaving else {
                return Err(Stop::Unbounded);
            };
            tracing::trace!(row = r, column = c, "pivot");
            self.pivot(r, c);
        }
    }

    /// Replace the cost row by `costs` expressed in terms of the current basis.
    fn price(&mut self, costs: &[Rational]) {
        let mut cost = vec![Rational::zero(); self.width + 1];
        cost[..costs.len()].clone_from_slice(costs);
        for (i, row) in self.rows.iter().enumerate() {
            let cb = match costs.get(self.basis[i]) {
                Some(cb) if !cb.is_zero() => cb.clone(),
                _ => continue,
            };
            for (entry, a) in cost.iter_mut().zip(row) {
                if !a.is_zero() {
                    *entry -= &cb * a;
                }
            }
        }
        self.cost = cost;
    }
}

fn eliminate(row: &mut [Rational], pivot_row: &[Rational], c: usize) {
    let factor = row[c].clone();
    if factor.is_zero() {
        return;
    }
    for (entry, p) in row.iter_mut().zip(pivot_row) {
        if !p.is_zero() {
            *entry -= &factor * p;
        }
    }
}

// ── Driver ───────────────────────────────────────────────────────────────

/// Minimize `lp`'s objective.
pub fn solve(lp: &LinearProgram, options: &SolveOptions) -> Outcome {
    let mut columns = Vec::with_capacity(lp.num_vars());
    let mut n = 0;
    for var in 0..lp.num_vars() {
        match lp.lower(var) {
            Some(lower) => {
                columns.push(Column::Shifted {
                    col: n,
                    lower: lower.clone(),
                });
                n += 1;
            }
            None => {
                columns.push(Column::Split { pos: n, neg: n + 1 });
                n += 2;
            }
        }
    }
    let n_struct = n;

    // Rewrite rows over the shifted columns with a non-negative right-hand side.
    let mut normalized = Vec::with_capacity(lp.rows().len());
    for row in lp.rows() {
        let mut dense = vec![Rational::zero(); n_struct];
        let mut rhs = row.rhs.clone();
        for (var, a) in &row.coeffs {
            match &columns[*var] {
                Column::Shifted { col, lower } => {
                    dense[*col] += a;
                    rhs -= a * lower;
                }
                Column::Split { pos, neg } => {
                    dense[*pos] += a;
                    dense[*neg] -= a;
                }
            }
        }
        let mut rel = row.rel;
        if rhs.is_negative() {
            dense = dense.into_iter().map(|a| -a).collect();
            rhs = -rhs;
            rel = rel.flipped();
        }
        normalized.push((dense, rel, rhs));
    }

    let slack_count = normalized.iter().filter(|(_, rel, _)| *rel != Relation::Eq).count();
    let art_count = normalized.iter().filter(|(_, rel, _)| *rel != Relation::Le).count();
    let art_start = n_struct + slack_count;
    let width = art_start + art_count;

    let mut rows = Vec::with_capacity(normalized.len());
    let mut basis = Vec::with_capacity(normalized.len());
    let mut next_slack = n_struct;
    let mut next_art = art_start;
    for (dense, rel, rhs) in normalized {
        let mut row = dense;
        row.resize(width + 1, Rational::zero());
        row[width] = rhs;
        match rel {
            Relation::Le => {
                row[next_slack] = Rational::one();
                basis.push(next_slack);
                next_slack += 1;
            }
            Relation::Ge => {
                row[next_slack] = -Rational::one();
                next_slack += 1;
                row[next_art] = Rational::one();
                basis.push(next_art);
                next_art += 1;
            }
            Relation::Eq => {
                row[next_art] = Rational::one();
                basis.push(next_art);
                next_art += 1;
            }
        }
        rows.push(row);
    }

    let mut tableau = Tableau {
        rows,
        basis,
        cost: Vec::new(),
        width,
        pivots: 0,
    };
    tracing::debug!(
        rows = tableau.rows.len(),
        columns = width,
        artificials = art_count,
        "simplex tableau built"
    );

    // Phase 1: drive the artificial variables to zero.
    if art_count > 0 {
        let mut phase1 = vec![Rational::zero(); width];
        for entry in &mut phase1[art_start..] {
            *entry = Rational::one();
        }
        tableau.price(&phase1);
        match tableau.run(|_| false, options.deadline) {
            Ok(()) => {}
            Err(Stop::TimedOut) => return Outcome::TimedOut,
            // The phase-1 objective is bounded below by zero.
            Err(Stop::Unbounded) => return Outcome::Infeasible,
        }
        if !tableau.cost[width].is_zero() {
            tracing::debug!(pivots = tableau.pivots, "phase 1 left artificials positive");
            return Outcome::Infeasible;
        }

        // Pivot remaining (zero-valued) artificials out of the basis; rows
        // where that is impossible are redundant.
        let mut redundant = Vec::new();
        for r in 0..tableau.rows.len() {
            if tableau.basis[r] < art_start {
                continue;
            }
            match (0..art_start).find(|&j| !tableau.rows[r][j].is_zero()) {
                Some(c) => tableau.pivot(r, c),
                None => redundant.push(r),
            }
        }
        for r in redundant.into_iter().rev() {
            tableau.rows.remove(r);
            tableau.basis.remove(r);
        }
    }

    // Phase 2: the real objective over the structural columns.
    let mut costs = vec![Rational::zero(); n_struct];
    for (var, c) in lp.objective() {
        match &columns[*var] {
            Column::Shifted { col, .. } => costs[*col] += c,
            Column::Split { pos, neg } => {
                costs[*pos] += c;
                costs[*neg] -= c;
            }
        }
    }
    tableau.price(&costs);
    match tableau.run(|j| j >= art_start, options.deadline) {
        Ok(()) => {}
        Err(Stop::TimedOut) => return Outcome::TimedOut,
        Err(Stop::Unbounded) => return Outcome::Unbounded,
    }

    let mut shifted = vec![Rational::zero(); width];
    for (r, &b) in tableau.basis.iter().enumerate() {
        shifted[b] = tableau.rhs(r).clone();
    }
    let values: Vec<Rational> = columns
        .iter()
        .map(|column| match column {
            Column::Shifted { col, lower } => lower + &shifted[*col],
            Column::Split { pos, neg } => &shifted[*pos] - &shifted[*neg],
        })
        .collect();
    let objective = lp.objective_value(&values);
    tracing::debug!(pivots = tableau.pivots, objective = %objective, "simplex optimal");
    Outcome::Optimal(LpSolution {
        values,
        objective,
        pivots: tableau.pivots,
    })
}
