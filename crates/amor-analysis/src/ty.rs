//! Annotated types.
//!
//! An annotated type decorates an ordinary [`Ty`] with potential
//! coefficients. Lists and trees carry one coefficient per degree `1..=d`
//! in the binomial basis:
//!
//! ```text
//! Φ(list of length n : L^q(A))   = Σᵢ qᵢ·C(n, i) + Σ Φ(elements : A)
//! Φ(leaf)                        = 0
//! Φ(node(l, x, r) : T^q(A))      = q₁ + Φ(l : T^◁q) + Φ(r : T^◁q) + Φ(x : A)
//! ◁(q₁, …, q_d)                  = (q₁ + q₂, …, q_{d-1} + q_d, q_d)
//! ```
//!
//! Function types carry a contract: calling such a value needs the
//! potential of its parameter types plus `cost` and yields the potential of
//! its result type.
//!
//! [`Annotated`] is generic over the coefficient so the same shape serves
//! for unsolved types ([`AnnTy`], coefficients are [`AnnVar`]s) and solved
//! ones ([`SolvedTy`], coefficients are exact rationals).

use std::fmt;

use amor_ast::Ty;
use amor_common::rational::{self, Rational};
use serde::{Deserialize, Serialize};

use crate::pool::GroupPool;

/// An annotation variable: an unknown rational coefficient solved for by
/// the LP.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnVar(pub u32);

impl fmt::Display for AnnVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// A solved coefficient.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coefficient(#[serde(with = "rational::serde_str")] pub Rational);

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Types that carry no potential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseKind {
    Unit,
    Bool,
    Int,
    /// Opaque element type variable.
    Param(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Annotated<C> {
    Base(BaseKind),
    List {
        elem: Box<Annotated<C>>,
        coeffs: Vec<C>,
    },
    Tree {
        elem: Box<Annotated<C>>,
        coeffs: Vec<C>,
    },
    Fun(Contract<C>),
}

/// A function type with its resource contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contract<C> {
    pub params: Vec<Annotated<C>>,
    pub ret: Box<Annotated<C>>,
    pub cost: C,
}

pub type AnnTy = Annotated<AnnVar>;
pub type AnnFun = Contract<AnnVar>;
pub type SolvedTy = Annotated<Coefficient>;
pub type SolvedFun = Contract<Coefficient>;

/// Why an ordinary type has no annotated counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsupported {
    pub ty: Ty,
    pub reason: &'static str,
}

// ── Construction ─────────────────────────────────────────────────────────

/// Annotate `ty` with fresh variables, `degree` coefficients per list or
/// tree. Named data types and function values stored inside lists or
/// trees are unsupported.
pub fn annotate(ty: &Ty, degree: u32, pool: &mut GroupPool<'_>, origin: &str) -> Result<AnnTy, Unsupported> {
    annotate_in(ty, degree, pool, origin, false)
}

fn annotate_in(
    ty: &Ty,
    degree: u32,
    pool: &mut GroupPool<'_>,
    origin: &str,
    inside_data: bool,
) -> Result<AnnTy, Unsupported> {
    match ty {
        Ty::Unit => Ok(Annotated::Base(BaseKind::Unit)),
        Ty::Bool => Ok(Annotated::Base(BaseKind::Bool)),
        Ty::Int => Ok(Annotated::Base(BaseKind::Int)),
        Ty::Param(name) => Ok(Annotated::Base(BaseKind::Param(name.clone()))),
        Ty::Named(_) => Err(Unsupported {
            ty: ty.clone(),
            reason: "user-defined data types have no potential model",
        }),
        Ty::List(elem) => {
            let coeffs = (0..degree).map(|_| pool.fresh(origin)).collect();
            let elem = annotate_in(elem, degree, pool, origin, true)?;
            Ok(Annotated::List {
                elem: Box::new(elem),
                coeffs,
            })
        }
        Ty::Tree(elem) => {
            let coeffs = (0..degree).map(|_| pool.fresh(origin)).collect();
            let elem = annotate_in(elem, degree, pool, origin, true)?;
            Ok(Annotated::Tree {
                elem: Box::new(elem),
                coeffs,
            })
        }
        Ty::Fun(params, ret) => {
            if inside_data {
                return Err(Unsupported {
                    ty: ty.clone(),
                    reason: "function values inside lists or trees are not supported",
                });
            }
            let params = params
                .iter()
                .map(|p| annotate_in(p, degree, pool, origin, false))
                .collect::<Result<Vec<_>, _>>()?;
            let ret = annotate_in(ret, degree, pool, origin, false)?;
            Ok(Annotated::Fun(Contract {
                params,
                ret: Box::new(ret),
                cost: pool.fresh(origin),
            }))
        }
    }
}

impl<C> Annotated<C> {
    /// Rebuild the type with every coefficient mapped through `f`, in
    /// [`AnnTy::vars`] order.
    pub fn try_map<D, E>(&self, f: &mut impl FnMut(&C) -> Result<D, E>) -> Result<Annotated<D>, E> {
        Ok(match self {
            Annotated::Base(kind) => Annotated::Base(kind.clone()),
            Annotated::List { elem, coeffs } => {
                let coeffs = coeffs.iter().map(&mut *f).collect::<Result<Vec<_>, _>>()?;
                Annotated::List {
                    elem: Box::new(elem.try_map(f)?),
                    coeffs,
                }
            }
            Annotated::Tree { elem, coeffs } => {
                let coeffs = coeffs.iter().map(&mut *f).collect::<Result<Vec<_>, _>>()?;
                Annotated::Tree {
                    elem: Box::new(elem.try_map(f)?),
                    coeffs,
                }
            }
            Annotated::Fun(contract) => Annotated::Fun(contract.try_map(f)?),
        })
    }

    /// Structural equality ignoring the coefficients.
    pub fn same_shape<D>(&self, other: &Annotated<D>) -> bool {
        match (self, other) {
            (Annotated::Base(a), Annotated::Base(b)) => a == b,
            (Annotated::List { elem: a, coeffs: ca }, Annotated::List { elem: b, coeffs: cb })
            | (Annotated::Tree { elem: a, coeffs: ca }, Annotated::Tree { elem: b, coeffs: cb }) => {
                ca.len() == cb.len() && a.same_shape(b)
            }
            (Annotated::Fun(a), Annotated::Fun(b)) => {
                a.params.len() == b.params.len()
                    && a.params.iter().zip(&b.params).all(|(x, y)| x.same_shape(y))
                    && a.ret.same_shape(&b.ret)
            }
            _ => false,
        }
    }

    /// The ordinary type.
    pub fn erase(&self) -> Ty {
        match self {
            Annotated::Base(BaseKind::Unit) => Ty::Unit,
            Annotated::Base(BaseKind::Bool) => Ty::Bool,
            Annotated::Base(BaseKind::Int) => Ty::Int,
            Annotated::Base(BaseKind::Param(name)) => Ty::Param(name.clone()),
            Annotated::List { elem, .. } => Ty::list(elem.erase()),
            Annotated::Tree { elem, .. } => Ty::tree(elem.erase()),
            Annotated::Fun(contract) => Ty::fun(
                contract.params.iter().map(Annotated::erase).collect(),
                contract.ret.erase(),
            ),
        }
    }

    /// Lists and trees carry potential; base types and functions do not.
    pub fn has_potential(&self) -> bool {
        matches!(self, Annotated::List { .. } | Annotated::Tree { .. })
    }

    /// Whether a function type occurs anywhere inside.
    pub fn mentions_function(&self) -> bool {
        match self {
            Annotated::Base(_) => false,
            Annotated::List { elem, .. } | Annotated::Tree { elem, .. } => elem.mentions_function(),
            Annotated::Fun(_) => true,
        }
    }

    pub fn coeffs(&self) -> Option<&[C]> {
        match self {
            Annotated::List { coeffs, .. } | Annotated::Tree { coeffs, .. } => Some(coeffs),
            _ => None,
        }
    }

    pub fn elem(&self) -> Option<&Annotated<C>> {
        match self {
            Annotated::List { elem, .. } | Annotated::Tree { elem, .. } => Some(elem),
            _ => None,
        }
    }
}

impl<C: Clone> Annotated<C> {
    /// Every coefficient in [`Annotated::try_map`] order.
    pub fn coefficients(&self) -> Vec<C> {
        let mut out = Vec::new();
        let _: Result<Annotated<()>, std::convert::Infallible> = self.try_map(&mut |c: &C| {
            out.push(c.clone());
            Ok(())
        });
        out
    }
}

impl<C: Clone> Contract<C> {
    pub fn coefficients(&self) -> Vec<C> {
        let mut out = Vec::new();
        let _: Result<Contract<()>, std::convert::Infallible> = self.try_map(&mut |c: &C| {
            out.push(c.clone());
            Ok(())
        });
        out
    }
}

impl<C> Contract<C> {
    pub fn try_map<D, E>(&self, f: &mut impl FnMut(&C) -> Result<D, E>) -> Result<Contract<D>, E> {
        let params = self
            .params
            .iter()
            .map(|p| p.try_map(f))
            .collect::<Result<Vec<_>, _>>()?;
        let ret = self.ret.try_map(f)?;
        let cost = f(&self.cost)?;
        Ok(Contract {
            params,
            ret: Box::new(ret),
            cost,
        })
    }

    pub fn same_shape<D>(&self, other: &Contract<D>) -> bool {
        self.params.len() == other.params.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a.same_shape(b))
            && self.ret.same_shape(&other.ret)
    }

    pub fn has_function_params(&self) -> bool {
        self.params.iter().any(Annotated::mentions_function)
    }

    pub fn erase(&self) -> Ty {
        Ty::fun(self.params.iter().map(Annotated::erase).collect(), self.ret.erase())
    }
}

impl AnnTy {
    /// A structurally identical copy with entirely fresh variables.
    pub fn instantiate(&self, pool: &mut GroupPool<'_>, origin: &str) -> AnnTy {
        let fresh: Result<AnnTy, std::convert::Infallible> = self.try_map(&mut |_| Ok(pool.fresh(origin)));
        match fresh {
            Ok(ty) => ty,
            Err(never) => match never {},
        }
    }

    /// All variables, data coefficients before their element types, then
    /// contract parameters, result and cost.
    pub fn vars(&self) -> Vec<AnnVar> {
        self.coefficients()
    }

    /// The polynomial degree each data coefficient contributes to a bound:
    /// coefficient `i` of a structure nested `k` levels inside other
    /// structures has degree `i + k`. Contract variables are not listed.
    pub fn degree_of(&self) -> Vec<(AnnVar, u32)> {
        let mut out = Vec::new();
        self.collect_degrees(0, &mut out);
        out
    }

    fn collect_degrees(&self, depth: u32, out: &mut Vec<(AnnVar, u32)>) {
        if let Annotated::List { elem, coeffs } | Annotated::Tree { elem, coeffs } = self {
            for (i, v) in coeffs.iter().enumerate() {
                out.push((*v, i as u32 + 1 + depth));
            }
            elem.collect_degrees(depth + 1, out);
        }
    }
}

impl AnnFun {
    pub fn instantiate(&self, pool: &mut GroupPool<'_>, origin: &str) -> AnnFun {
        let fresh: Result<AnnFun, std::convert::Infallible> = self.try_map(&mut |_| Ok(pool.fresh(origin)));
        match fresh {
            Ok(contract) => contract,
            Err(never) => match never {},
        }
    }

    pub fn vars(&self) -> Vec<AnnVar> {
        self.coefficients()
    }
}

/// The additive shift `◁q` as pairs: shifted coefficient `i` equals the sum
/// of the listed original coefficients.
pub fn shift<C: Clone>(coeffs: &[C]) -> Vec<Vec<C>> {
    (0..coeffs.len())
        .map(|i| coeffs[i..coeffs.len().min(i + 2)].to_vec())
        .collect()
}

// ── Display ──────────────────────────────────────────────────────────────

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseKind::Unit => write!(f, "Unit"),
            BaseKind::Bool => write!(f, "Bool"),
            BaseKind::Int => write!(f, "Int"),
            BaseKind::Param(name) => write!(f, "'{}", name),
        }
    }
}

fn write_coeffs<C: fmt::Display>(f: &mut fmt::Formatter<'_>, coeffs: &[C]) -> fmt::Result {
    write!(f, "^[")?;
    for (i, c) in coeffs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, "]")
}

impl<C: fmt::Display> fmt::Display for Annotated<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotated::Base(kind) => write!(f, "{}", kind),
            Annotated::List { elem, coeffs } => {
                write!(f, "List<{}>", elem)?;
                write_coeffs(f, coeffs)
            }
            Annotated::Tree { elem, coeffs } => {
                write!(f, "Tree<{}>", elem)?;
                write_coeffs(f, coeffs)
            }
            Annotated::Fun(contract) => write!(f, "{}", contract),
        }
    }
}

impl<C: fmt::Display> fmt::Display for Contract<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -[{}]-> {}", self.cost, self.ret)
    }
}
