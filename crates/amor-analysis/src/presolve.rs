//! Equality presolve.
//!
//! The generator emits many pure equalities `a − b = 0` (variable rule,
//! argument binding, shifts). Those are merged with union-find before the
//! LP is built, so every class of equal variables becomes one LP column.
//! A class's lower bound is the largest bound among its members.

use std::collections::BTreeMap;

use amor_common::Rational;
use amor_lp::{LinearProgram, VarId};
use ena::unify::{InPlaceUnificationTable, UnifyKey};
use num_traits::Zero;

use crate::constraint::{ConstraintSystem, LinExpr};
use crate::ty::AnnVar;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct ClassKey(u32);

impl UnifyKey for ClassKey {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        ClassKey(u)
    }

    fn tag() -> &'static str {
        "ClassKey"
    }
}

/// The tighter of two lower bounds; `None` is unbounded below.
fn tighter(a: Option<&Rational>, b: Option<&Rational>) -> Option<Rational> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y).clone()),
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (None, None) => None,
    }
}

/// A constraint system reduced to an LP over equality classes.
#[derive(Debug)]
pub struct Presolved {
    pub lp: LinearProgram,
    columns: BTreeMap<AnnVar, VarId>,
    /// Constraints absorbed by merging.
    pub merged: usize,
    /// A row reduced to a false statement such as `0 >= 1`.
    pub infeasible: bool,
}

impl Presolved {
    pub fn new(system: &ConstraintSystem) -> Presolved {
        let mut table: InPlaceUnificationTable<ClassKey> = InPlaceUnificationTable::new();
        let keys: BTreeMap<AnnVar, ClassKey> = system
            .registry()
            .iter()
            .map(|(var, _)| (*var, table.new_key(())))
            .collect();

        let mut merged = 0;
        let mut rest = Vec::new();
        for constraint in system.constraints() {
            match constraint.is_pure_equality() {
                Some((a, b)) if keys.contains_key(&a) && keys.contains_key(&b) => {
                    table.union(keys[&a], keys[&b]);
                    merged += 1;
                }
                _ => rest.push(constraint),
            }
        }

        let mut roots: BTreeMap<AnnVar, u32> = BTreeMap::new();
        let mut class_bounds: BTreeMap<u32, Option<Rational>> = BTreeMap::new();
        for (var, info) in system.registry() {
            let root = table.find(keys[var]).index();
            let bound = match class_bounds.get(&root) {
                Some(seen) => tighter(seen.as_ref(), info.lower.as_ref()),
                None => info.lower.clone(),
            };
            class_bounds.insert(root, bound);
            roots.insert(*var, root);
        }

        let mut lp = LinearProgram::new();
        let mut class_column: BTreeMap<u32, VarId> = BTreeMap::new();
        let mut columns = BTreeMap::new();
        for (var, root) in &roots {
            let column = *class_column
                .entry(*root)
                .or_insert_with(|| lp.add_var(class_bounds.get(root).cloned().flatten()));
            columns.insert(*var, column);
        }

        let mut presolved = Presolved {
            lp,
            columns,
            merged,
            infeasible: false,
        };
        for constraint in rest {
            let coeffs = presolved.map_expr(&constraint.lhs);
            if coeffs.is_empty() {
                if !constraint.rel.holds(&Rational::zero(), &constraint.rhs) {
                    tracing::debug!(
                        function = %constraint.provenance.function,
                        node = %constraint.provenance.node,
                        rule = %constraint.provenance.rule,
                        "constraint reduced to a contradiction"
                    );
                    presolved.infeasible = true;
                }
                continue;
            }
            presolved
                .lp
                .add_row(coeffs, constraint.rel.to_lp(), constraint.rhs.clone());
        }
        tracing::debug!(
            constraints = system.len(),
            merged = presolved.merged,
            columns = presolved.lp.num_vars(),
            rows = presolved.lp.rows().len(),
            "presolved constraint system"
        );
        presolved
    }

    pub fn column(&self, var: AnnVar) -> Option<VarId> {
        self.columns.get(&var).copied()
    }

    /// `expr` over LP columns, coefficients of merged variables summed and
    /// zeros dropped. Unregistered variables are skipped; validation
    /// rejects them before presolve.
    pub fn map_expr(&self, expr: &LinExpr) -> Vec<(VarId, Rational)> {
        let mut summed: BTreeMap<VarId, Rational> = BTreeMap::new();
        for (var, coeff) in expr.terms() {
            if let Some(column) = self.column(var) {
                *summed.entry(column).or_insert_with(Rational::zero) += coeff;
            }
        }
        summed.into_iter().filter(|(_, c)| !c.is_zero()).collect()
    }

    /// Values of every registered variable given the LP column values.
    pub fn assignment(&self, values: &[Rational]) -> BTreeMap<AnnVar, Rational> {
        self.columns
            .iter()
            .filter_map(|(var, column)| values.get(*column).map(|v| (*var, v.clone())))
            .collect()
    }
}
