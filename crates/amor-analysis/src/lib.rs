//! Automatic amortized resource analysis for the amor term language.
//!
//! Every value's type carries potential annotations; a typing derivation of
//! the program is turned into linear constraints over the unknown
//! coefficients, an LP picks the tightest solution, and the solved
//! signatures are read back as polynomial cost bounds.
//!
//! # Architecture
//!
//! - [`ty`]: annotated types, potential in the binomial basis, the shift
//! - [`pool`]: annotation variable allocation and the per-group registry
//! - [`signature`]: declared and solved signatures, the shared signature table
//! - [`env`]: typing contexts
//! - [`constraint`]: linear constraints with provenance, constraint systems
//! - [`infer`]: the constraint generator, one rule per expression kind
//! - [`presolve`]: union-find merge of pure equalities
//! - [`solve`]: the LP seam and lexicographic objective stages
//! - [`poly`]: polynomials over size parameters
//! - [`bound`]: bound extraction from a solved signature
//! - [`certificate`]: solver-independent proof of a bound
//! - [`analyzer`]: call-graph scheduling of whole programs
//! - [`error`], [`diagnostics`]: error taxonomy and its rendering
//! - [`config`]: analysis configuration

pub mod analyzer;
pub mod bound;
pub mod certificate;
pub mod config;
pub mod constraint;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod poly;
pub mod pool;
pub mod presolve;
pub mod signature;
pub mod solve;
pub mod ty;

pub use analyzer::{AnalysisReport, Analyzer, GroupReport, TargetResult};
pub use bound::FunctionBound;
pub use certificate::{Certificate, CertificateError};
pub use config::{AnalysisConfig, CallMode, ConfigError, CostMetric};
pub use error::{AnalysisError, ErrorClass};
pub use poly::Polynomial;
pub use solve::{LpSolver, SimplexSolver};

