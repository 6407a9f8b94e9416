//! Ordinary types of the term language.
//!
//! The analysis assumes programs are already well-typed in the ordinary
//! sense; these types are declared on function signatures and on the empty
//! constructors (`Nil`, `Leaf`) so that every expression's shape is known
//! without inference.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Unit,
    Bool,
    Int,
    /// An opaque element type such as `'a`. Carries no potential.
    Param(String),
    List(Box<Ty>),
    Tree(Box<Ty>),
    Fun(Vec<Ty>, Box<Ty>),
    /// A user-defined data type. Not supported by the resource analysis.
    Named(String),
}

impl Ty {
    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    pub fn tree(elem: Ty) -> Ty {
        Ty::Tree(Box::new(elem))
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun(params, Box::new(ret))
    }

    pub fn param(name: impl Into<String>) -> Ty {
        Ty::Param(name.into())
    }

    /// Base types: no structure, no potential.
    pub fn is_base(&self) -> bool {
        matches!(self, Ty::Unit | Ty::Bool | Ty::Int | Ty::Param(_))
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Unit => write!(f, "Unit"),
            Ty::Bool => write!(f, "Bool"),
            Ty::Int => write!(f, "Int"),
            Ty::Param(name) => write!(f, "'{}", name),
            Ty::List(elem) => write!(f, "List<{}>", elem),
            Ty::Tree(elem) => write!(f, "Tree<{}>", elem),
            Ty::Fun(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Ty::Named(name) => write!(f, "{}", name),
        }
    }
}
