//! Bound extraction.
//!
//! A solved signature `(A₁, …, Aₙ) -[c]-> B` bounds the cost of a call by
//! `c + Σ Φ(argᵢ : Aᵢ)`. The potential is rendered as a polynomial in size
//! parameters: `|x|` is the length (or node count) of parameter `x`, and
//! `|x.elem|` the largest size among its elements when those are lists or
//! trees themselves. Element potential is bounded by `|x|` times the
//! potential of the largest element.
//!
//! A function-typed parameter contributes no size. The bound holds for
//! arguments that fit the parameter's solved contract; those contracts are
//! listed as the bound's assumptions.

use std::collections::BTreeMap;
use std::fmt;

use amor_common::Rational;
use num_traits::{One, Zero};

use crate::error::AnalysisError;
use crate::poly::Polynomial;
use crate::signature::{DeclaredSignature, FunctionSignature};
use crate::ty::{AnnVar, Annotated, Coefficient, SolvedTy};

/// The terminal artifact: a closed-form cost bound for one function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionBound {
    pub function: String,
    pub signature: FunctionSignature,
    /// Expanded polynomial.
    pub bound: Polynomial,
    /// The same bound as a sum of binomial coefficients, e.g.
    /// `2 + 3*C(|xs|, 2)`.
    pub binomial: String,
    /// Contracts function arguments must fit for the bound to hold.
    pub assumptions: Vec<String>,
}

impl fmt::Display for FunctionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.function, self.bound)
    }
}

/// Substitute solved values into `sig`.
pub fn solve_signature(
    sig: &DeclaredSignature,
    values: &BTreeMap<AnnVar, Rational>,
) -> Result<FunctionSignature, AnalysisError> {
    let ty = sig.ty.try_map(&mut |var: &AnnVar| {
        values
            .get(var)
            .cloned()
            .map(Coefficient)
            .ok_or_else(|| AnalysisError::ExtractionError {
                function: sig.name.clone(),
                var: *var,
            })
    })?;
    Ok(FunctionSignature {
        name: sig.name.clone(),
        param_names: sig.param_names.clone(),
        ty,
    })
}

pub fn extract_bound(
    sig: &DeclaredSignature,
    values: &BTreeMap<AnnVar, Rational>,
) -> Result<FunctionBound, AnalysisError> {
    let signature = solve_signature(sig, values)?;
    let bound = bound_of(signature);
    tracing::info!(function = %bound.function, bound = %bound.bound, "derived bound");
    Ok(bound)
}

pub fn bound_of(signature: FunctionSignature) -> FunctionBound {
    let cost = signature.ty.cost.0.clone();
    let mut bound = Polynomial::constant(cost.clone());
    let mut terms = Vec::new();
    if !cost.is_zero() {
        terms.push(cost.to_string());
    }
    for (name, ty) in signature.param_names.iter().zip(&signature.ty.params) {
        potential(ty, name, &Polynomial::constant(Rational::one()), &[], &mut bound, &mut terms);
    }
    let binomial = if terms.is_empty() {
        "0".to_string()
    } else {
        terms.join(" + ")
    };
    let assumptions = signature
        .param_names
        .iter()
        .zip(&signature.ty.params)
        .filter_map(|(name, ty)| match ty {
            Annotated::Fun(contract) => Some(format!("every call of `{}` fits {}", name, contract)),
            _ => None,
        })
        .collect();
    FunctionBound {
        function: signature.name.clone(),
        signature,
        bound,
        binomial,
        assumptions,
    }
}

fn potential(
    ty: &SolvedTy,
    path: &str,
    multiplicity: &Polynomial,
    factors: &[String],
    bound: &mut Polynomial,
    terms: &mut Vec<String>,
) {
    let (Annotated::List { elem, coeffs } | Annotated::Tree { elem, coeffs }) = ty else {
        return;
    };
    let size = format!("|{}|", path);
    for (i, coeff) in coeffs.iter().enumerate() {
        if coeff.0.is_zero() {
            continue;
        }
        let k = i as u32 + 1;
        let term = Polynomial::binomial(&size, k).mul(multiplicity).scale(&coeff.0);
        *bound = bound.add(&term);
        terms.push(binomial_term(&coeff.0, &size, k, factors));
    }
    let mut inner = factors.to_vec();
    inner.push(size.clone());
    potential(
        elem,
        &format!("{}.elem", path),
        &multiplicity.mul(&Polynomial::var(&size)),
        &inner,
        bound,
        terms,
    );
}

fn binomial_term(coeff: &Rational, size: &str, k: u32, factors: &[String]) -> String {
    let mut parts = Vec::new();
    if !coeff.is_one() {
        parts.push(coeff.to_string());
    }
    parts.extend(factors.iter().cloned());
    if k == 1 {
        parts.push(size.to_string());
    } else {
        parts.push(format!("C({}, {})", size, k));
    }
    parts.join("*")
}
