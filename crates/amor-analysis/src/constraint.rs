//! Linear constraints over annotation variables.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use amor_common::rational::{self, Rational};
use amor_common::{NodeId, Span};
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::pool::Registry;
use crate::ty::AnnVar;

// ── Linear expressions ───────────────────────────────────────────────────

/// `Σ cᵢ·aᵢ`, kept sorted by variable with no zero coefficients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Term>", into = "Vec<Term>")]
pub struct LinExpr {
    terms: BTreeMap<AnnVar, Rational>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Term {
    var: AnnVar,
    #[serde(with = "rational::serde_str")]
    coeff: Rational,
}

impl From<Vec<Term>> for LinExpr {
    fn from(terms: Vec<Term>) -> Self {
        let mut expr = LinExpr::new();
        for term in terms {
            expr.add_term(term.var, term.coeff);
        }
        expr
    }
}

impl From<LinExpr> for Vec<Term> {
    fn from(expr: LinExpr) -> Self {
        expr.terms
            .into_iter()
            .map(|(var, coeff)| Term { var, coeff })
            .collect()
    }
}

impl LinExpr {
    pub fn new() -> Self {
        LinExpr::default()
    }

    pub fn var(var: AnnVar) -> Self {
        let mut expr = LinExpr::new();
        expr.add_term(var, Rational::one());
        expr
    }

    /// `Σ vars`
    pub fn sum(vars: impl IntoIterator<Item = AnnVar>) -> Self {
        let mut expr = LinExpr::new();
        for var in vars {
            expr.add_term(var, Rational::one());
        }
        expr
    }

    pub fn add_term(&mut self, var: AnnVar, coeff: Rational) {
        let entry = self.terms.entry(var).or_insert_with(Rational::zero);
        *entry += coeff;
        if entry.is_zero() {
            self.terms.remove(&var);
        }
    }

    pub fn plus(mut self, var: AnnVar) -> Self {
        self.add_term(var, Rational::one());
        self
    }

    pub fn minus(mut self, var: AnnVar) -> Self {
        self.add_term(var, -Rational::one());
        self
    }

    pub fn minus_all(mut self, vars: impl IntoIterator<Item = AnnVar>) -> Self {
        for var in vars {
            self.add_term(var, -Rational::one());
        }
        self
    }

    pub fn terms(&self) -> impl Iterator<Item = (AnnVar, &Rational)> {
        self.terms.iter().map(|(v, c)| (*v, c))
    }

    pub fn coeff(&self, var: AnnVar) -> Option<&Rational> {
        self.terms.get(&var)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value under `assignment`; `None` if a variable is unassigned.
    pub fn eval(&self, assignment: &BTreeMap<AnnVar, Rational>) -> Option<Rational> {
        let mut total = Rational::zero();
        for (var, coeff) in &self.terms {
            total += coeff * assignment.get(var)?;
        }
        Some(total)
    }

    fn scaled(&self, factor: &Rational) -> LinExpr {
        LinExpr {
            terms: self.terms.iter().map(|(v, c)| (*v, c * factor)).collect(),
        }
    }

    fn fmt_with(&self, f: &mut impl fmt::Write, name: impl Fn(AnnVar) -> String) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (var, coeff)) in self.terms.iter().enumerate() {
            let magnitude = coeff.abs();
            match (i, coeff.is_negative()) {
                (0, false) => {}
                (0, true) => write!(f, "-")?,
                (_, false) => write!(f, " + ")?,
                (_, true) => write!(f, " - ")?,
            }
            if magnitude.is_one() {
                write!(f, "{}", name(*var))?;
            } else {
                write!(f, "{} {}", magnitude, name(*var))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, |v| v.to_string())
    }
}

// ── Constraints ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

impl Relation {
    pub fn holds(self, lhs: &Rational, rhs: &Rational) -> bool {
        match self {
            Relation::Eq => lhs == rhs,
            Relation::Le => lhs <= rhs,
            Relation::Ge => lhs >= rhs,
        }
    }

    pub fn to_lp(self) -> amor_lp::Relation {
        match self {
            Relation::Eq => amor_lp::Relation::Eq,
            Relation::Le => amor_lp::Relation::Le,
            Relation::Ge => amor_lp::Relation::Ge,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Eq => "=",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        })
    }
}

/// The typing rule that emitted a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    Const,
    Var,
    Share,
    Weaken,
    Nil,
    Cons,
    Leaf,
    Node,
    Prim,
    If,
    Match,
    Let,
    App,
    Instance,
    FnRef,
    Tick,
    Return,
    /// Ties a call's contract to the callee's cost-free signature.
    CostFree,
    /// Fixes the optimum of an earlier objective stage.
    Stage,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rule::Const => "const",
            Rule::Var => "var",
            Rule::Share => "share",
            Rule::Weaken => "weaken",
            Rule::Nil => "nil",
            Rule::Cons => "cons",
            Rule::Leaf => "leaf",
            Rule::Node => "node",
            Rule::Prim => "prim",
            Rule::If => "if",
            Rule::Match => "match",
            Rule::Let => "let",
            Rule::App => "app",
            Rule::Instance => "instance",
            Rule::FnRef => "fnref",
            Rule::Tick => "tick",
            Rule::Return => "return",
            Rule::CostFree => "cost-free",
            Rule::Stage => "stage",
        };
        f.write_str(name)
    }
}

/// Where a constraint came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub function: String,
    pub node: NodeId,
    pub span: Span,
    pub rule: Rule,
}

/// `lhs rel rhs`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub lhs: LinExpr,
    pub rel: Relation,
    #[serde(with = "rational::serde_str")]
    pub rhs: Rational,
    pub provenance: Provenance,
}

impl Constraint {
    /// Whether the constraint holds under `assignment`. Unassigned
    /// variables make it fail.
    pub fn holds(&self, assignment: &BTreeMap<AnnVar, Rational>) -> bool {
        self.lhs
            .eval(assignment)
            .is_some_and(|lhs| self.rel.holds(&lhs, &self.rhs))
    }

    /// `a − b = 0` for two distinct variables.
    pub fn is_pure_equality(&self) -> Option<(AnnVar, AnnVar)> {
        if self.rel != Relation::Eq || !self.rhs.is_zero() || self.lhs.len() != 2 {
            return None;
        }
        let mut terms = self.lhs.terms();
        let (a, ca) = terms.next()?;
        let (b, cb) = terms.next()?;
        (ca == &-cb.clone()).then_some((a, b))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}    [{} {} in {}]",
            self.lhs, self.rel, self.rhs, self.provenance.rule, self.provenance.node, self.provenance.function
        )
    }
}

// ── Systems ──────────────────────────────────────────────────────────────

/// One lexicographic objective stage: minimize `objective`.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectiveStage {
    /// Polynomial degree of the coefficients minimized; 0 is the cost stage.
    pub degree: u32,
    pub objective: LinExpr,
}

/// The constraints of one function group, the registry of every variable
/// they may mention, and the staged objective.
#[derive(Clone, Debug)]
pub struct ConstraintSystem {
    pub functions: Vec<String>,
    /// Degree of the annotations the system was generated with.
    pub degree: u32,
    constraints: Vec<Constraint>,
    registry: Registry,
    stages: Vec<ObjectiveStage>,
}

impl ConstraintSystem {
    pub fn new(
        functions: Vec<String>,
        degree: u32,
        constraints: Vec<Constraint>,
        registry: Registry,
        stages: Vec<ObjectiveStage>,
    ) -> Self {
        ConstraintSystem {
            functions,
            degree,
            constraints,
            registry,
            stages,
        }
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stages(&self) -> &[ObjectiveStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Every variable of every constraint and objective must have been
    /// registered by the pool that built this system.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for constraint in &self.constraints {
            if let Some((var, _)) = constraint
                .lhs
                .terms()
                .find(|(v, _)| !self.registry.contains_key(v))
            {
                let p = &constraint.provenance;
                return Err(AnalysisError::ProvenanceViolation {
                    function: p.function.clone(),
                    var,
                    node: p.node,
                    rule: p.rule,
                });
            }
        }
        for stage in &self.stages {
            if let Some((var, _)) = stage.objective.terms().find(|(v, _)| !self.registry.contains_key(v)) {
                return Err(AnalysisError::ProvenanceViolation {
                    function: self.functions.first().cloned().unwrap_or_default(),
                    var,
                    node: NodeId::default(),
                    rule: Rule::Stage,
                });
            }
        }
        Ok(())
    }

    /// Render as CPLEX LP text: the first objective stage, all constraints
    /// and the variables' bounds. Every row is scaled to integer
    /// coefficients; fractional lower bounds become rows of their own.
    pub fn to_lp_format(&self) -> String {
        let name = |v: AnnVar| v.to_string();
        let mut out = String::new();
        let _ = writeln!(out, "\\ functions: {}", self.functions.join(", "));
        for stage in &self.stages {
            let mut text = String::new();
            let _ = stage.objective.fmt_with(&mut text, name);
            let _ = writeln!(out, "\\ stage {}: {}", stage.degree, text);
        }
        let _ = writeln!(out, "Minimize");
        let mut objective = String::new();
        match self.stages.first() {
            Some(first) => {
                let coeffs = first.objective.terms().map(|(_, c)| c);
                let factor = Rational::from_integer(rational::common_denominator(coeffs));
                let _ = first.objective.scaled(&factor).fmt_with(&mut objective, name);
            }
            None => objective.push('0'),
        }
        let _ = writeln!(out, " obj: {}", objective);

        let _ = writeln!(out, "Subject To");
        let write_row = |out: &mut String, label: String, lhs: &LinExpr, rel: Relation, rhs: &Rational| {
            let factor = Rational::from_integer(rational::common_denominator(
                lhs.terms().map(|(_, c)| c).chain(std::iter::once(rhs)),
            ));
            let mut text = String::new();
            let _ = lhs.scaled(&factor).fmt_with(&mut text, name);
            let _ = writeln!(out, " {}: {} {} {}", label, text, rel, (rhs * &factor).numer());
        };
        for (i, c) in self.constraints.iter().enumerate() {
            write_row(&mut out, format!("c{}", i), &c.lhs, c.rel, &c.rhs);
        }
        let fractional: Vec<(AnnVar, &Rational)> = self
            .registry
            .iter()
            .filter_map(|(var, info)| info.lower.as_ref().map(|lower| (*var, lower)))
            .filter(|(_, lower)| !lower.is_integer())
            .collect();
        for (var, lower) in &fractional {
            write_row(&mut out, format!("lb_{}", var), &LinExpr::var(*var), Relation::Ge, *lower);
        }

        let _ = writeln!(out, "Bounds");
        for (var, info) in &self.registry {
            match &info.lower {
                Some(lower) if lower.is_zero() => {}
                Some(lower) if lower.is_integer() => {
                    let _ = writeln!(out, " {} >= {}", var, lower.numer());
                }
                _ => {
                    let _ = writeln!(out, " {} free", var);
                }
            }
        }
        let _ = writeln!(out, "End");
        out
    }

    /// A rendering invariant under consistent renaming of variables:
    /// variables are numbered by first occurrence.
    pub fn canonical_form(&self) -> String {
        let mut names: FxHashMap<AnnVar, usize> = FxHashMap::default();
        let mut name = |v: AnnVar| {
            let next = names.len();
            format!("v{}", *names.entry(v).or_insert(next))
        };
        let mut out = String::new();
        for c in &self.constraints {
            let terms: Vec<String> = c
                .lhs
                .terms()
                .map(|(v, coeff)| format!("{}*{}", coeff, name(v)))
                .collect();
            let _ = writeln!(
                out,
                "{} {} {} [{} {}]",
                terms.join(" + "),
                c.rel,
                c.rhs,
                c.provenance.rule,
                c.provenance.function
            );
        }
        for stage in &self.stages {
            let terms: Vec<String> = stage
                .objective
                .terms()
                .map(|(v, coeff)| format!("{}*{}", coeff, name(v)))
                .collect();
            let _ = writeln!(out, "min[{}] {}", stage.degree, terms.join(" + "));
        }
        out
    }
}
