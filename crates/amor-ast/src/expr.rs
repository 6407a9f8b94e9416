//! Expressions, patterns and definitions.

use std::fmt;

use amor_common::rational::{self, Rational};
use amor_common::{NodeId, Span};
use serde::{Deserialize, Serialize};

use crate::ty::Ty;

// ── Programs ─────────────────────────────────────────────────────────────

/// A whole program: an ordered list of top-level function definitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn new(functions: Vec<FunctionDef>) -> Self {
        Program { functions }
    }

    /// Look up a function definition by name.
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Names of all functions in definition order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }
}

/// A top-level function definition with its declared ordinary type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Ty,
    pub body: Expr,
    #[serde(default)]
    pub span: Span,
}

impl FunctionDef {
    /// The function's ordinary type.
    pub fn ty(&self) -> Ty {
        Ty::fun(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret.clone(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

// ── Expressions ──────────────────────────────────────────────────────────

/// An expression node. `id` is assigned by [`crate::number`]; front ends
/// may leave it out of the JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            id: NodeId::default(),
            span: Span::default(),
            kind,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Unit,
    Bool(bool),
    Int(i64),
    Var(String),
    /// The empty list with its element type.
    Nil(Ty),
    Cons {
        head: Box<Expr>,
        tail: Box<Expr>,
    },
    /// The empty tree with its element type.
    Leaf(Ty),
    Node {
        left: Box<Expr>,
        value: Box<Expr>,
        right: Box<Expr>,
    },
    Prim {
        op: PrimOp,
        args: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// Call of a top-level function or of a function-typed variable.
    Call {
        func: String,
        args: Vec<Expr>,
    },
    /// A top-level function used as a value.
    FnRef(String),
    /// Evaluate `body` and charge `cost` resource units. A negative cost
    /// returns resources (e.g. freeing heap cells).
    Tick {
        #[serde(with = "rational::serde_str")]
        cost: Rational,
        body: Box<Expr>,
    },
    /// Anonymous function. Part of the grammar, rejected by the analysis.
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
}

impl ExprKind {
    /// Short name of the node kind, used in diagnostics and traces.
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Unit => "unit",
            ExprKind::Bool(_) => "bool literal",
            ExprKind::Int(_) => "int literal",
            ExprKind::Var(_) => "variable",
            ExprKind::Nil(_) => "nil",
            ExprKind::Cons { .. } => "cons",
            ExprKind::Leaf(_) => "leaf",
            ExprKind::Node { .. } => "node",
            ExprKind::Prim { .. } => "primitive operation",
            ExprKind::If { .. } => "if",
            ExprKind::Match { .. } => "match",
            ExprKind::Let { .. } => "let",
            ExprKind::Call { .. } => "call",
            ExprKind::FnRef(_) => "function reference",
            ExprKind::Tick { .. } => "tick",
            ExprKind::Lambda { .. } => "lambda",
        }
    }
}

/// One arm of a `match`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    #[serde(default)]
    pub span: Span,
}

/// Constructor patterns. Binders named `_` bind nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Nil,
    Cons { head: String, tail: String },
    Leaf,
    Node { left: String, value: String, right: String },
    Wildcard,
}

impl Pattern {
    /// Names bound by the pattern, in position order, skipping `_`.
    pub fn binders(&self) -> Vec<&str> {
        let all: Vec<&str> = match self {
            Pattern::Nil | Pattern::Leaf | Pattern::Wildcard => Vec::new(),
            Pattern::Cons { head, tail } => vec![head.as_str(), tail.as_str()],
            Pattern::Node { left, value, right } => {
                vec![left.as_str(), value.as_str(), right.as_str()]
            }
        };
        all.into_iter().filter(|b| *b != "_").collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Nil => write!(f, "nil"),
            Pattern::Cons { head, tail } => write!(f, "{} :: {}", head, tail),
            Pattern::Leaf => write!(f, "leaf"),
            Pattern::Node { left, value, right } => {
                write!(f, "node({}, {}, {})", left, value, right)
            }
            Pattern::Wildcard => write!(f, "_"),
        }
    }
}

// ── Primitive operations ─────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

impl PrimOp {
    /// Operand types and result type.
    pub fn signature(self) -> (Vec<Ty>, Ty) {
        use PrimOp::*;
        match self {
            Add | Sub | Mul | Div | Mod => (vec![Ty::Int, Ty::Int], Ty::Int),
            Eq | Ne | Lt | Le | Gt | Ge => (vec![Ty::Int, Ty::Int], Ty::Bool),
            And | Or => (vec![Ty::Bool, Ty::Bool], Ty::Bool),
            Not => (vec![Ty::Bool], Ty::Bool),
        }
    }

    pub fn symbol(self) -> &'static str {
        use PrimOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
            Not => "!",
        }
    }
}

impl fmt::Display for PrimOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_binders_skip_wildcards() {
        let pat = Pattern::Node {
            left: "l".into(),
            value: "_".into(),
            right: "r".into(),
        };
        assert_eq!(pat.binders(), vec!["l", "r"]);
        assert!(Pattern::Nil.binders().is_empty());
    }

    #[test]
    fn expr_json_without_ids() {
        let json = r#"{"kind":{"Tick":{"cost":"1/2","body":{"kind":{"Var":"x"}}}}}"#;
        let expr: Expr = serde_json::from_str(json).unwrap();
        match expr.kind {
            ExprKind::Tick { cost, body } => {
                assert_eq!(cost, amor_common::rational::ratio(1, 2));
                assert_eq!(body.kind, ExprKind::Var("x".into()));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn prim_signatures() {
        assert_eq!(PrimOp::Lt.signature(), (vec![Ty::Int, Ty::Int], Ty::Bool));
        assert_eq!(PrimOp::Not.signature().0.len(), 1);
        assert_eq!(PrimOp::Ge.to_string(), ">=");
    }
}
