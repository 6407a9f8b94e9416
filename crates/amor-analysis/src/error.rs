//! Analysis errors.
//!
//! Three classes with different propagation: structural errors abort the
//! analysis of one function group, numeric errors are reported once the
//! solver has spoken, and internal errors mean the generator/solver
//! contract itself is broken and abort the whole run.

use std::fmt;

use amor_ast::Ty;
use amor_common::{NodeId, Span};

use crate::constraint::Rule;
use crate::ty::AnnVar;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Structural,
    Numeric,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Structural => write!(f, "structural"),
            ErrorClass::Numeric => write!(f, "numeric"),
            ErrorClass::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisError {
    // ── Structural ───────────────────────────────────────────────────────
    /// A type with no annotated counterpart (named data, functions in data).
    UnsupportedType {
        function: String,
        ty: Ty,
        reason: String,
        span: Span,
    },
    /// A node kind the analysis does not handle.
    UnsupportedConstruct {
        function: String,
        construct: String,
        node: NodeId,
        span: Span,
    },
    /// Ordinary shape disagreement, including arity and impossible patterns.
    TypeMismatch {
        function: String,
        expected: String,
        found: String,
        node: NodeId,
        span: Span,
    },
    UnknownFunction {
        function: String,
        name: String,
        span: Span,
    },
    UnboundVariable {
        function: String,
        name: String,
        span: Span,
    },
    DuplicateDefinition {
        name: String,
        span: Span,
    },
    /// A callee's own analysis failed, so no signature is available.
    DependencyFailed {
        function: String,
        callee: String,
    },

    // ── Numeric ──────────────────────────────────────────────────────────
    /// The constraint system is infeasible at this degree.
    NoBoundFound {
        functions: Vec<String>,
        degree: u32,
    },
    /// The LP objective is unbounded below.
    DegenerateObjective {
        functions: Vec<String>,
    },
    SolverTimeout {
        functions: Vec<String>,
        timeout_ms: u64,
    },

    // ── Internal ─────────────────────────────────────────────────────────
    /// A signature variable has no value in the solution.
    ExtractionError {
        function: String,
        var: AnnVar,
    },
    /// A constraint mentions a variable the pool never handed out.
    ProvenanceViolation {
        function: String,
        var: AnnVar,
        node: NodeId,
        rule: Rule,
    },
    /// A solved signature was published twice.
    SignatureRedefined {
        name: String,
    },
}

impl AnalysisError {
    pub fn class(&self) -> ErrorClass {
        use AnalysisError::*;
        match self {
            UnsupportedType { .. }
            | UnsupportedConstruct { .. }
            | TypeMismatch { .. }
            | UnknownFunction { .. }
            | UnboundVariable { .. }
            | DuplicateDefinition { .. }
            | DependencyFailed { .. } => ErrorClass::Structural,
            NoBoundFound { .. } | DegenerateObjective { .. } | SolverTimeout { .. } => ErrorClass::Numeric,
            ExtractionError { .. } | ProvenanceViolation { .. } | SignatureRedefined { .. } => {
                ErrorClass::Internal
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.class() == ErrorClass::Internal
    }

    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        use AnalysisError::*;
        match self {
            UnsupportedType { .. } => "A0001",
            UnsupportedConstruct { .. } => "A0002",
            TypeMismatch { .. } => "A0003",
            UnknownFunction { .. } => "A0004",
            UnboundVariable { .. } => "A0005",
            DuplicateDefinition { .. } => "A0006",
            DependencyFailed { .. } => "A0007",
            NoBoundFound { .. } => "A0101",
            DegenerateObjective { .. } => "A0102",
            SolverTimeout { .. } => "A0103",
            ExtractionError { .. } => "A0201",
            ProvenanceViolation { .. } => "A0202",
            SignatureRedefined { .. } => "A0203",
        }
    }

    /// Source location, when the error points at one.
    pub fn span(&self) -> Option<Span> {
        use AnalysisError::*;
        match self {
            UnsupportedType { span, .. }
            | UnsupportedConstruct { span, .. }
            | TypeMismatch { span, .. }
            | UnknownFunction { span, .. }
            | UnboundVariable { span, .. }
            | DuplicateDefinition { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// The function the error is about (the first one for group errors).
    pub fn function(&self) -> Option<&str> {
        use AnalysisError::*;
        match self {
            UnsupportedType { function, .. }
            | UnsupportedConstruct { function, .. }
            | TypeMismatch { function, .. }
            | UnknownFunction { function, .. }
            | UnboundVariable { function, .. }
            | DependencyFailed { function, .. }
            | ExtractionError { function, .. }
            | ProvenanceViolation { function, .. } => Some(function),
            DuplicateDefinition { name, .. } | SignatureRedefined { name } => Some(name),
            NoBoundFound { functions, .. }
            | DegenerateObjective { functions }
            | SolverTimeout { functions, .. } => functions.first().map(String::as_str),
        }
    }
}

fn join(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AnalysisError::*;
        match self {
            UnsupportedType { ty, reason, .. } => write!(f, "unsupported type {}: {}", ty, reason),
            UnsupportedConstruct { construct, .. } => {
                write!(f, "unsupported construct: {}", construct)
            }
            TypeMismatch { expected, found, .. } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            UnknownFunction { name, .. } => write!(f, "unknown function `{}`", name),
            UnboundVariable { name, .. } => write!(f, "unbound variable `{}`", name),
            DuplicateDefinition { name, .. } => {
                write!(f, "function `{}` is defined more than once", name)
            }
            DependencyFailed { function, callee } => write!(
                f,
                "cannot analyze `{}`: its callee `{}` has no bound",
                function, callee
            ),
            NoBoundFound { functions, degree } => write!(
                f,
                "no resource bound of degree {} exists for {}",
                degree,
                join(functions)
            ),
            DegenerateObjective { functions } => {
                write!(f, "unbounded potential objective for {}", join(functions))
            }
            SolverTimeout {
                functions,
                timeout_ms,
            } => write!(
                f,
                "solver timed out after {}ms on {}",
                timeout_ms,
                join(functions)
            ),
            ExtractionError { function, var } => write!(
                f,
                "solution has no value for signature variable {} of `{}`",
                var, function
            ),
            ProvenanceViolation {
                function,
                var,
                node,
                rule,
            } => write!(
                f,
                "constraint from rule `{}` at {} in `{}` uses unregistered variable {}",
                rule, node, function, var
            ),
            SignatureRedefined { name } => {
                write!(f, "signature of `{}` was published twice", name)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_and_codes() {
        let structural = AnalysisError::UnknownFunction {
            function: "f".into(),
            name: "g".into(),
            span: Span::new(3, 4),
        };
        assert_eq!(structural.class(), ErrorClass::Structural);
        assert_eq!(structural.code(), "A0004");
        assert_eq!(structural.span(), Some(Span::new(3, 4)));
        assert_eq!(structural.to_string(), "unknown function `g`");

        let numeric = AnalysisError::NoBoundFound {
            functions: vec!["f".into(), "g".into()],
            degree: 2,
        };
        assert_eq!(numeric.class(), ErrorClass::Numeric);
        assert_eq!(numeric.function(), Some("f"));
        assert_eq!(
            numeric.to_string(),
            "no resource bound of degree 2 exists for `f`, `g`"
        );

        let internal = AnalysisError::SignatureRedefined { name: "f".into() };
        assert!(internal.is_internal());
        assert_eq!(internal.span(), None);
    }
}
