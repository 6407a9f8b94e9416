//! Abstract syntax of the amor term language.
//!
//! A small, first-order-plus-function-values functional language over
//! lists and binary trees. The analyzer consumes this AST as handed over by
//! an external front end (as JSON, via serde); nothing here parses source
//! text.
//!
//! - [`ty`]: ordinary (unannotated) types
//! - [`expr`]: expressions, patterns, function definitions, programs
//! - [`visit`]: node numbering, free variables, call extraction
//! - [`build`]: terse constructors for writing programs in Rust (tests,
//!   embedders)

pub mod build;
pub mod expr;
pub mod ty;
pub mod visit;

pub use expr::{Expr, ExprKind, FunctionDef, MatchArm, Param, Pattern, PrimOp, Program};
pub use ty::Ty;
pub use visit::number;
