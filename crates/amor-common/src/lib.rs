//! Shared types for the amor resource analyzer.
//!
//! - [`span`]: byte spans, AST node identifiers and line/column lookup
//! - [`call_graph`]: function call graph with strongly-connected groups
//!   and dependency levels for scheduling
//! - [`rational`]: exact rational numbers and their string serde form

pub mod call_graph;
pub mod rational;
pub mod span;

pub use rational::Rational;
pub use span::{LineIndex, NodeId, Span};
