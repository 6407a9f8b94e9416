//! Exact linear programming over rationals.
//!
//! A [`LinearProgram`] is a minimization problem over variables that are
//! either bounded below by a rational or free, subject to rows of the form
//! `Σ aᵢ·xᵢ {=, ≤, ≥} b`. [`solve`] runs a two-phase primal simplex on a
//! dense tableau with Bland's anti-cycling rule. All arithmetic is exact;
//! the returned values satisfy every row without tolerance.

mod problem;
mod simplex;

pub use problem::{LinearProgram, Relation, Row, VarId};
pub use simplex::{solve, LpSolution, Outcome, SolveOptions};
