//! Ariadne-based rendering of analysis errors, plus a JSON form for tools.
//!
//! Errors that carry a span and come with source text are rendered as
//! labeled reports. Group-level errors (solver outcomes, failed
//! dependencies) have no span; they render as a header with notes.

use std::ops::Range;

use amor_common::LineIndex;
use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::AnalysisError;

/// How diagnostics are presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Plain text, for tests and non-terminal output.
    pub fn colorless() -> Self {
        DiagnosticOptions {
            color: false,
            json: false,
        }
    }
}

// ── Labels and hints ─────────────────────────────────────────────────────

fn label(error: &AnalysisError) -> String {
    use AnalysisError::*;
    match error {
        UnsupportedType { ty, .. } => format!("`{}` cannot carry potential", ty),
        UnsupportedConstruct { .. } => "not supported by the analysis".to_string(),
        TypeMismatch { expected, .. } => format!("expected {}", expected),
        UnknownFunction { name, .. } => format!("`{}` is not defined", name),
        UnboundVariable { name, .. } => format!("`{}` is not in scope", name),
        DuplicateDefinition { .. } => "defined again here".to_string(),
        _ => error.to_string(),
    }
}

fn help(error: &AnalysisError) -> Option<String> {
    use AnalysisError::*;
    match error {
        UnsupportedType { reason, .. } => Some(reason.clone()),
        UnsupportedConstruct { construct, .. } if construct.starts_with("anonymous") => Some(
            "lift the function to the top level and pass it with a function reference".to_string(),
        ),
        NoBoundFound { degree, .. } => Some(format!(
            "no polynomial bound of degree {} fits; try a higher degree",
            degree
        )),
        SolverTimeout { .. } => Some("raise `solver_timeout_ms` or lower the degree".to_string()),
        DependencyFailed { callee, .. } => {
            Some(format!("fix the analysis of `{}` first", callee))
        }
        DegenerateObjective { .. }
        | ExtractionError { .. }
        | ProvenanceViolation { .. }
        | SignatureRedefined { .. } => {
            Some("this is a bug in the analyzer, not in the program".to_string())
        }
        _ => None,
    }
}

fn severity(error: &AnalysisError) -> &'static str {
    if error.is_internal() {
        "bug"
    } else {
        "error"
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render `error` for humans. `source` is the program text the spans refer
/// to, when the front end supplied it.
pub fn render_diagnostic(
    error: &AnalysisError,
    source: Option<&str>,
    filename: &str,
    opts: &DiagnosticOptions,
) -> String {
    let code = error.code();
    let message = error.to_string();

    let (source, span) = match (source, error.span()) {
        (Some(source), Some(span)) if !source.is_empty() => (source, span),
        _ => return render_plain(error, filename),
    };

    let config = Config::default().with_color(opts.color);
    let source_len = source.len();
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len.saturating_sub(1));
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..(e + 1).min(source_len)
        } else {
            s..e
        }
    };
    let range = clamp(span.range());

    let mut builder = Report::build(ReportKind::Error, range.clone())
        .with_code(code)
        .with_message(&message)
        .with_config(config)
        .with_label(
            Label::new(range)
                .with_message(label(error))
                .with_color(Color::Red),
        );
    if let Some(function) = error.function() {
        builder.set_note(format!("while analyzing `{}` in {}", function, filename));
    }
    if let Some(help) = help(error) {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    if builder.finish().write(Source::from(source), &mut buf).is_err() {
        return render_plain(error, filename);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn render_plain(error: &AnalysisError, filename: &str) -> String {
    let mut out = format!("[{}] Error: {}\n", error.code(), error);
    match error.function() {
        Some(function) => out.push_str(&format!("  = note: while analyzing `{}` in {}\n", function, filename)),
        None => out.push_str(&format!("  = note: in {}\n", filename)),
    }
    if let Some(help) = help(error) {
        out.push_str(&format!("  = help: {}\n", help));
    }
    out
}

/// One diagnostic as a JSON object, in the shape emitted by `--json`.
/// With `source`, spans also carry 1-based line and column numbers.
pub fn diagnostic_json(error: &AnalysisError, source: Option<&str>, file: &str) -> serde_json::Value {
    let index = source.map(LineIndex::new);
    let spans: Vec<serde_json::Value> = error
        .span()
        .map(|span| {
            let mut value = serde_json::json!({
                "start": span.start,
                "end": span.end.max(span.start + 1),
                "label": label(error),
            });
            if let Some(index) = &index {
                let (line, column) = index.line_col(span.start);
                value["line"] = line.into();
                value["column"] = column.into();
            }
            value
        })
        .into_iter()
        .collect();
    serde_json::json!({
        "code": error.code(),
        "severity": severity(error),
        "class": error.class().to_string(),
        "message": error.to_string(),
        "function": error.function(),
        "file": file,
        "spans": spans,
        "fix": help(error),
    })
}
