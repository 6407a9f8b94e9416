use std::fmt;

use amor_common::Rational;
use num_traits::Zero;

/// Index of a variable in a [`LinearProgram`].
pub type VarId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

impl Relation {
    /// The relation obtained by multiplying both sides by -1.
    pub fn flipped(self) -> Relation {
        match self {
            Relation::Eq => Relation::Eq,
            Relation::Le => Relation::Ge,
            Relation::Ge => Relation::Le,
        }
    }

    /// Whether `lhs rel rhs` holds.
    pub fn holds(self, lhs: &Rational, rhs: &Rational) -> bool {
        match self {
            Relation::Eq => lhs == rhs,
            Relation::Le => lhs <= rhs,
            Relation::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One constraint row. A variable may appear more than once in `coeffs`;
/// its coefficients add up.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub coeffs: Vec<(VarId, Rational)>,
    pub rel: Relation,
    pub rhs: Rational,
}

/// A minimization problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearProgram {
    lower: Vec<Option<Rational>>,
    rows: Vec<Row>,
    objective: Vec<(VarId, Rational)>,
}

impl LinearProgram {
    pub fn new() -> Self {
        LinearProgram::default()
    }

    /// Add a variable with the given lower bound (`None` for a free
    /// variable) and return its id.
    pub fn add_var(&mut self, lower: Option<Rational>) -> VarId {
        self.lower.push(lower);
        self.lower.len() - 1
    }

    /// Add a row. Panics if it mentions an unknown variable.
    pub fn add_row(&mut self, coeffs: Vec<(VarId, Rational)>, rel: Relation, rhs: Rational) {
        for (var, _) in &coeffs {
            assert!(*var < self.lower.len(), "row mentions unknown variable {}", var);
        }
        self.rows.push(Row { coeffs, rel, rhs });
    }

    /// Replace the objective (to be minimized).
    pub fn set_objective(&mut self, coeffs: Vec<(VarId, Rational)>) {
        self.objective = coeffs;
    }

    pub fn num_vars(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self, var: VarId) -> Option<&Rational> {
        self.lower[var].as_ref()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn objective(&self) -> &[(VarId, Rational)] {
        &self.objective
    }

    /// Evaluate the objective at `values`.
    pub fn objective_value(&self, values: &[Rational]) -> Rational {
        self.objective
            .iter()
            .fold(Rational::zero(), |acc, (var, c)| acc + c * &values[*var])
    }

    /// Check bounds and rows at `values`, exactly.
    pub fn is_feasible(&self, values: &[Rational]) -> bool {
        if values.len() != self.lower.len() {
            return false;
        }
        let bounds_ok = self
            .lower
            .iter()
            .zip(values)
            .all(|(lower, v)| lower.as_ref().map_or(true, |l| v >= l));
        bounds_ok
            && self.rows.iter().all(|row| {
                let lhs = row
                    .coeffs
                    .iter()
                    .fold(Rational::zero(), |acc, (var, c)| acc + c * &values[*var]);
                row.rel.holds(&lhs, &row.rhs)
            })
    }
}
