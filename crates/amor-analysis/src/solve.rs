//! Solver adapter: constraint system in, rational assignment out.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use amor_common::Rational;
use amor_lp::{LinearProgram, Outcome, SolveOptions};

use crate::constraint::ConstraintSystem;
use crate::error::AnalysisError;
use crate::presolve::Presolved;
use crate::ty::AnnVar;

/// The LP capability. Implementations must be exact: values are used as
/// certified coefficients without rounding.
pub trait LpSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, lp: &LinearProgram, deadline: Option<Instant>) -> Outcome;
}

/// Exact two-phase simplex from `amor-lp`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexSolver;

impl LpSolver for SimplexSolver {
    fn name(&self) -> &'static str {
        "simplex"
    }

    fn solve(&self, lp: &LinearProgram, deadline: Option<Instant>) -> Outcome {
        amor_lp::solve(lp, &SolveOptions { deadline })
    }
}

/// A feasible, lexicographically optimal assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub values: BTreeMap<AnnVar, Rational>,
    /// Optimum of each objective stage, by stage degree.
    pub stage_optima: Vec<(u32, Rational)>,
}

impl Solution {
    pub fn value(&self, var: AnnVar) -> Option<&Rational> {
        self.values.get(&var)
    }
}

/// Minimize the system's objective stages in order, fixing each optimum
/// before the next stage.
pub fn solve_system(
    system: &ConstraintSystem,
    solver: &dyn LpSolver,
    timeout: Option<Duration>,
) -> Result<Solution, AnalysisError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let presolved = Presolved::new(system);
    if presolved.infeasible {
        return Err(no_bound(system));
    }

    let mut lp = presolved.lp.clone();
    let mut stage_optima = Vec::new();
    let mut last = None;
    let stages: Vec<(u32, Vec<_>)> = if system.stages().is_empty() {
        vec![(0, Vec::new())]
    } else {
        system
            .stages()
            .iter()
            .map(|stage| (stage.degree, presolved.map_expr(&stage.objective)))
            .collect()
    };

    for (degree, objective) in stages {
        lp.set_objective(objective.clone());
        let solution = match solver.solve(&lp, deadline) {
            Outcome::Optimal(solution) => solution,
            Outcome::Infeasible => return Err(no_bound(system)),
            Outcome::Unbounded => {
                return Err(AnalysisError::DegenerateObjective {
                    functions: system.functions.clone(),
                })
            }
            Outcome::TimedOut => {
                return Err(AnalysisError::SolverTimeout {
                    functions: system.functions.clone(),
                    timeout_ms: timeout.map_or(0, |t| t.as_millis() as u64),
                })
            }
        };
        tracing::debug!(
            functions = ?system.functions,
            solver = solver.name(),
            stage = degree,
            optimum = %solution.objective,
            pivots = solution.pivots,
            "objective stage solved"
        );
        if !objective.is_empty() {
            lp.add_row(objective, amor_lp::Relation::Eq, solution.objective.clone());
        }
        stage_optima.push((degree, solution.objective.clone()));
        last = Some(solution);
    }

    let values = last.map(|s| presolved.assignment(&s.values)).unwrap_or_default();
    Ok(Solution { values, stage_optima })
}

fn no_bound(system: &ConstraintSystem) -> AnalysisError {
    AnalysisError::NoBoundFound {
        functions: system.functions.clone(),
        degree: system.degree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, LinExpr, ObjectiveStage, Provenance, Relation, Rule};
    use crate::pool::{Registry, VarInfo};
    use amor_common::rational::int;
    use amor_common::{NodeId, Span};

    fn registry(n: u32) -> Registry {
        (0..n)
            .map(|v| {
                (
                    AnnVar(v),
                    VarInfo {
                        lower: Some(int(0)),
                        origin: "test".into(),
                    },
                )
            })
            .collect()
    }

    fn row(lhs: LinExpr, rel: Relation, rhs: i64) -> Constraint {
        Constraint {
            lhs,
            rel,
            rhs: int(rhs),
            provenance: Provenance {
                function: "f".into(),
                node: NodeId(1),
                span: Span::default(),
                rule: Rule::Tick,
            },
        }
    }

    #[test]
    fn stages_are_fixed_in_order() {
        // q0 + q1 >= 2, then minimize q0 first: q0 = 0 forces q1 = 2.
        let system = ConstraintSystem::new(
            vec!["f".into()],
            1,
            vec![row(LinExpr::var(AnnVar(0)).plus(AnnVar(1)), Relation::Ge, 2)],
            registry(2),
            vec![
                ObjectiveStage {
                    degree: 1,
                    objective: LinExpr::var(AnnVar(0)),
                },
                ObjectiveStage {
                    degree: 0,
                    objective: LinExpr::var(AnnVar(1)),
                },
            ],
        );
        let solution = solve_system(&system, &SimplexSolver, None).unwrap();
        assert_eq!(solution.value(AnnVar(0)), Some(&int(0)));
        assert_eq!(solution.value(AnnVar(1)), Some(&int(2)));
        assert_eq!(solution.stage_optima, vec![(1, int(0)), (0, int(2))]);
    }

    #[test]
    fn infeasible_system_has_no_bound() {
        let system = ConstraintSystem::new(
            vec!["f".into(), "g".into()],
            2,
            vec![row(LinExpr::var(AnnVar(0)), Relation::Le, -1)],
            registry(1),
            Vec::new(),
        );
        assert_eq!(
            solve_system(&system, &SimplexSolver, None),
            Err(AnalysisError::NoBoundFound {
                functions: vec!["f".into(), "g".into()],
                degree: 2,
            })
        );
    }

    struct StuckSolver;

    impl LpSolver for StuckSolver {
        fn name(&self) -> &'static str {
            "stuck"
        }

        fn solve(&self, _lp: &LinearProgram, _deadline: Option<Instant>) -> Outcome {
            Outcome::TimedOut
        }
    }

    #[test]
    fn timeouts_are_reported_with_the_budget() {
        let system = ConstraintSystem::new(vec!["f".into()], 1, Vec::new(), registry(1), Vec::new());
        assert_eq!(
            solve_system(&system, &StuckSolver, Some(Duration::from_millis(25))),
            Err(AnalysisError::SolverTimeout {
                functions: vec!["f".into()],
                timeout_ms: 25,
            })
        );
    }
}
