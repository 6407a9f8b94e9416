//! Traversals over the AST: node numbering, free variables, called functions.

use std::collections::BTreeSet;

use amor_common::NodeId;

use crate::expr::{Expr, ExprKind, FunctionDef, Program};

/// Assign pre-order node ids to every expression of the program, starting
/// at 1 and continuing across functions in definition order. Returns the
/// number of nodes numbered.
pub fn number(program: &mut Program) -> u32 {
    let mut next = 1u32;
    for function in &mut program.functions {
        number_expr(&mut function.body, &mut next);
    }
    next - 1
}

fn number_expr(expr: &mut Expr, next: &mut u32) {
    expr.id = NodeId(*next);
    *next += 1;
    for child in children_mut(expr) {
        number_expr(child, next);
    }
}

/// Immediate subexpressions in evaluation order. Match arms and branches
/// are included after the scrutinee/condition.
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Unit
        | ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Var(_)
        | ExprKind::Nil(_)
        | ExprKind::Leaf(_)
        | ExprKind::FnRef(_) => Vec::new(),
        ExprKind::Cons { head, tail } => vec![head, tail],
        ExprKind::Node { left, value, right } => vec![left, value, right],
        ExprKind::Prim { args, .. } | ExprKind::Call { args, .. } => args.iter().collect(),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => vec![cond, then_branch, else_branch],
        ExprKind::Match { scrutinee, arms } => {
            let mut out: Vec<&Expr> = vec![scrutinee];
            out.extend(arms.iter().map(|arm| &arm.body));
            out
        }
        ExprKind::Let { value, body, .. } => vec![value, body],
        ExprKind::Tick { body, .. } | ExprKind::Lambda { body, .. } => vec![body],
    }
}

fn children_mut(expr: &mut Expr) -> Vec<&mut Expr> {
    match &mut expr.kind {
        ExprKind::Unit
        | ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Var(_)
        | ExprKind::Nil(_)
        | ExprKind::Leaf(_)
        | ExprKind::FnRef(_) => Vec::new(),
        ExprKind::Cons { head, tail } => vec![head, tail],
        ExprKind::Node { left, value, right } => vec![left, value, right],
        ExprKind::Prim { args, .. } | ExprKind::Call { args, .. } => args.iter_mut().collect(),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => vec![cond, then_branch, else_branch],
        ExprKind::Match { scrutinee, arms } => {
            let mut out: Vec<&mut Expr> = vec![scrutinee];
            out.extend(arms.iter_mut().map(|arm| &mut arm.body));
            out
        }
        ExprKind::Let { value, body, .. } => vec![value, body],
        ExprKind::Tick { body, .. } | ExprKind::Lambda { body, .. } => vec![body],
    }
}

/// Variables occurring free in `expr`. The callee name of a `Call` counts
/// as an occurrence: it may be a function-typed variable. Callers that know
/// the set of top-level functions filter those out.
pub fn free_vars(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_free(expr, &mut Vec::new(), &mut out);
    out
}

fn note_free(name: &str, bound: &[String], out: &mut BTreeSet<String>) {
    if !bound.iter().any(|b| b == name) {
        out.insert(name.to_string());
    }
}

fn collect_free(expr: &Expr, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Var(name) => note_free(name, bound, out),
        ExprKind::Call { func, args } => {
            note_free(func, bound, out);
            for arg in args {
                collect_free(arg, bound, out);
            }
        }
        ExprKind::Let { name, value, body } => {
            collect_free(value, bound, out);
            bound.push(name.clone());
            collect_free(body, bound, out);
            bound.pop();
        }
        ExprKind::Match { scrutinee, arms } => {
            collect_free(scrutinee, bound, out);
            for arm in arms {
                let binders = arm.pattern.binders();
                for b in &binders {
                    bound.push(b.to_string());
                }
                collect_free(&arm.body, bound, out);
                bound.truncate(bound.len() - binders.len());
            }
        }
        ExprKind::Lambda { params, body } => {
            for p in params {
                bound.push(p.name.clone());
            }
            collect_free(body, bound, out);
            bound.truncate(bound.len() - params.len());
        }
        _ => {
            for child in children(expr) {
                collect_free(child, bound, out);
            }
        }
    }
}

/// Top-level functions referenced by `function`'s body (through calls or
/// function references), excluding names shadowed by parameters or local
/// binders. `is_function` decides which names are top-level functions.
pub fn called_functions(function: &FunctionDef, is_function: impl Fn(&str) -> bool) -> BTreeSet<String> {
    let mut bound: Vec<String> = function.params.iter().map(|p| p.name.clone()).collect();
    let mut out = BTreeSet::new();
    collect_calls(&function.body, &mut bound, &is_function, &mut out);
    out
}

fn collect_calls(
    expr: &Expr,
    bound: &mut Vec<String>,
    is_function: &dyn Fn(&str) -> bool,
    out: &mut BTreeSet<String>,
) {
    let shadowed = |name: &str, bound: &[String]| bound.iter().any(|b| b == name);
    match &expr.kind {
        ExprKind::Call { func, args } => {
            if !shadowed(func, bound) && is_function(func) {
                out.insert(func.clone());
            }
            for arg in args {
                collect_calls(arg, bound, is_function, out);
            }
        }
        ExprKind::FnRef(name) | ExprKind::Var(name) => {
            if !shadowed(name, bound) && is_function(name) {
                out.insert(name.clone());
            }
        }
        ExprKind::Let { name, value, body } => {
            collect_calls(value, bound, is_function, out);
            bound.push(name.clone());
            collect_calls(body, bound, is_function, out);
            bound.pop();
        }
        ExprKind::Match { scrutinee, arms } => {
            collect_calls(scrutinee, bound, is_function, out);
            for arm in arms {
                let binders = arm.pattern.binders();
                for b in &binders {
                    bound.push(b.to_string());
                }
                collect_calls(&arm.body, bound, is_function, out);
                bound.truncate(bound.len() - binders.len());
            }
        }
        ExprKind::Lambda { params, body } => {
            for p in params {
                bound.push(p.name.clone());
            }
            collect_calls(body, bound, is_function, out);
            bound.truncate(bound.len() - params.len());
        }
        _ => {
            for child in children(expr) {
                collect_calls(child, bound, is_function, out);
            }
        }
    }
}
