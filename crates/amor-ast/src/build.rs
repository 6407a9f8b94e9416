//! Terse constructors for building programs in Rust.

use amor_common::rational::{self, Rational};

use crate::expr::{Expr, ExprKind, FunctionDef, MatchArm, Param, Pattern, PrimOp, Program};
use crate::ty::Ty;
use crate::visit;

pub fn unit() -> Expr {
    Expr::new(ExprKind::Unit)
}

pub fn bool_(b: bool) -> Expr {
    Expr::new(ExprKind::Bool(b))
}

pub fn int(n: i64) -> Expr {
    Expr::new(ExprKind::Int(n))
}

pub fn var(name: &str) -> Expr {
    Expr::new(ExprKind::Var(name.to_string()))
}

pub fn nil(elem: Ty) -> Expr {
    Expr::new(ExprKind::Nil(elem))
}

pub fn cons(head: Expr, tail: Expr) -> Expr {
    Expr::new(ExprKind::Cons {
        head: Box::new(head),
        tail: Box::new(tail),
    })
}

pub fn leaf(elem: Ty) -> Expr {
    Expr::new(ExprKind::Leaf(elem))
}

pub fn node(left: Expr, value: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Node {
        left: Box::new(left),
        value: Box::new(value),
        right: Box::new(right),
    })
}

pub fn prim(op: PrimOp, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Prim { op, args })
}

pub fn if_(cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
    Expr::new(ExprKind::If {
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: Box::new(else_branch),
    })
}

pub fn match_(scrutinee: Expr, arms: Vec<MatchArm>) -> Expr {
    Expr::new(ExprKind::Match {
        scrutinee: Box::new(scrutinee),
        arms,
    })
}

pub fn arm(pattern: Pattern, body: Expr) -> MatchArm {
    MatchArm {
        pattern,
        body,
        span: Default::default(),
    }
}

pub fn pat_nil() -> Pattern {
    Pattern::Nil
}

pub fn pat_cons(head: &str, tail: &str) -> Pattern {
    Pattern::Cons {
        head: head.to_string(),
        tail: tail.to_string(),
    }
}

pub fn pat_leaf() -> Pattern {
    Pattern::Leaf
}

pub fn pat_node(left: &str, value: &str, right: &str) -> Pattern {
    Pattern::Node {
        left: left.to_string(),
        value: value.to_string(),
        right: right.to_string(),
    }
}

pub fn let_(name: &str, value: Expr, body: Expr) -> Expr {
    Expr::new(ExprKind::Let {
        name: name.to_string(),
        value: Box::new(value),
        body: Box::new(body),
    })
}

pub fn call(func: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call {
        func: func.to_string(),
        args,
    })
}

pub fn fn_ref(name: &str) -> Expr {
    Expr::new(ExprKind::FnRef(name.to_string()))
}

/// `tick(q, e)` with an integer cost.
pub fn tick(cost: i64, body: Expr) -> Expr {
    tick_q(rational::int(cost), body)
}

pub fn tick_q(cost: Rational, body: Expr) -> Expr {
    Expr::new(ExprKind::Tick {
        cost,
        body: Box::new(body),
    })
}

pub fn lambda(params: Vec<(&str, Ty)>, body: Expr) -> Expr {
    Expr::new(ExprKind::Lambda {
        params: to_params(params),
        body: Box::new(body),
    })
}

pub fn func(name: &str, params: Vec<(&str, Ty)>, ret: Ty, body: Expr) -> FunctionDef {
    FunctionDef {
        name: name.to_string(),
        params: to_params(params),
        ret,
        body,
        span: Default::default(),
    }
}

/// Build a program and number its nodes.
pub fn program(functions: Vec<FunctionDef>) -> Program {
    let mut program = Program::new(functions);
    visit::number(&mut program);
    program
}

fn to_params(params: Vec<(&str, Ty)>) -> Vec<Param> {
    params
        .into_iter()
        .map(|(name, ty)| Param {
            name: name.to_string(),
            ty,
        })
        .collect()
}
