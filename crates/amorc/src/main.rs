//! The amor resource analyzer CLI.
//!
//! Provides the `amorc` command with the following subcommands:
//!
//! - `amorc analyze <program.json>` - Derive cost bounds for a program
//! - `amorc check-certificate <cert.json>` - Re-verify a certificate without the LP solver
//!
//! Exit status is 0 when every target got a bound, 1 when a target, the
//! input or a certificate was rejected, and 2 on an internal analyzer error.

use std::path::{Path, PathBuf};
use std::process;

use amor_analysis::diagnostics::{diagnostic_json, render_diagnostic, DiagnosticOptions};
use amor_analysis::{
    AnalysisConfig, AnalysisError, AnalysisReport, Analyzer, CallMode, Certificate, CostMetric,
    FunctionBound,
};
use amor_ast::Program;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const EXIT_FAILED: i32 = 1;
const EXIT_INTERNAL: i32 = 2;

#[derive(Parser)]
#[command(name = "amorc", version, about = "Amortized resource analysis for amor programs")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive polynomial cost bounds for the functions of a program
    Analyze(AnalyzeArgs),
    /// Check a certificate and print the bounds it proves
    CheckCertificate {
        /// Certificate written by `analyze --certificate`
        certificate: PathBuf,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Program as a JSON syntax tree
    program: PathBuf,

    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum polynomial degree of the bounds
    #[arg(long)]
    degree: Option<u32>,

    /// Function to bound (repeatable); default is every function
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Counted resource: ticks, steps or heap
    #[arg(long)]
    metric: Option<CostMetric>,

    /// Typing of calls into solved groups: fixed or specialize
    #[arg(long = "call-mode")]
    call_mode: Option<CallMode>,

    /// Type recursive calls with the regular signature only
    #[arg(long = "no-cost-free")]
    no_cost_free: bool,

    /// Per-group LP time limit in milliseconds
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Write a certificate per solved group next to the program
    #[arg(long)]
    certificate: bool,

    /// Write the LP of every solved group into this directory
    #[arg(long = "emit-lp")]
    emit_lp: Option<PathBuf>,

    /// Source text the program's spans refer to, for diagnostics
    #[arg(long)]
    source: Option<PathBuf>,

    /// Output bounds and diagnostics as JSON (one object per line)
    #[arg(long)]
    json: bool,

    /// Disable colorized output
    #[arg(long = "no-color")]
    no_color: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Analyze(args) => {
            let diag_opts = DiagnosticOptions {
                color: !args.no_color && !args.json,
                json: args.json,
            };
            match analyze(&args, &diag_opts) {
                Ok(code) => code,
                Err(e) => {
                    report_failure(&e, &args.program, &diag_opts);
                    EXIT_FAILED
                }
            }
        }
        Commands::CheckCertificate { certificate } => match check_certificate(&certificate) {
            Ok(bounds) => {
                for bound in bounds {
                    println!("{}", bound);
                }
                0
            }
            Err(e) => {
                eprintln!("error: {}", e);
                EXIT_FAILED
            }
        },
    };
    process::exit(code);
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ── analyze ──────────────────────────────────────────────────────────────

/// Run the analysis and print its results. `Err` is for failures before any
/// target was analyzed (bad input, bad configuration, unwritable output).
fn analyze(args: &AnalyzeArgs, diag_opts: &DiagnosticOptions) -> Result<i32, String> {
    let config = load_config(args)?;

    let text = std::fs::read_to_string(&args.program)
        .map_err(|e| format!("failed to read '{}': {}", args.program.display(), e))?;
    let program: Program = serde_json::from_str(&text)
        .map_err(|e| format!("'{}' is not a valid program: {}", args.program.display(), e))?;

    let source = match &args.source {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?,
        ),
        None => None,
    };
    let filename = args.source.as_ref().unwrap_or(&args.program).display().to_string();

    let analyzer = Analyzer::new(program, config)
        .map_err(|e| e.to_string())?
        .keep_lp_text(args.emit_lp.is_some());
    let report = match analyzer.run() {
        Ok(report) => report,
        Err(err) => {
            report_diagnostic(&err, source.as_deref(), &filename, diag_opts);
            return Ok(if err.is_internal() { EXIT_INTERNAL } else { EXIT_FAILED });
        }
    };

    for result in &report.results {
        match &result.outcome {
            Ok(bound) => print_bound(bound, diag_opts.json),
            Err(err) => report_diagnostic(err, source.as_deref(), &filename, diag_opts),
        }
    }

    if let Some(dir) = &args.emit_lp {
        write_lp_files(&report, dir)?;
    }
    if analyzer.config().certificates {
        write_certificates(&report, &args.program)?;
    }

    Ok(if report.all_bounded() { 0 } else { EXIT_FAILED })
}

/// The configuration file, if any, with command-line flags applied on top.
fn load_config(args: &AnalyzeArgs) -> Result<AnalysisConfig, String> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path).map_err(|e| e.to_string())?,
        None => AnalysisConfig::default(),
    };
    if let Some(degree) = args.degree {
        config.degree = degree;
    }
    if !args.targets.is_empty() {
        config.targets = args.targets.clone();
    }
    if let Some(metric) = args.metric {
        config.metric = metric;
    }
    if let Some(call_mode) = args.call_mode {
        config.call_mode = call_mode;
    }
    if args.no_cost_free {
        config.cost_free = false;
    }
    if let Some(timeout) = args.timeout_ms {
        config.solver_timeout_ms = Some(timeout);
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.certificate {
        config.certificates = true;
    }
    Ok(config)
}

fn print_bound(bound: &FunctionBound, json: bool) {
    if json {
        let value = serde_json::json!({
            "function": bound.function,
            "bound": bound.bound.to_string(),
            "binomial": bound.binomial,
            "degree": bound.bound.degree(),
            "signature": bound.signature.to_string(),
            "assumptions": bound.assumptions,
        });
        println!("{}", value);
    } else {
        println!("{}", bound);
        println!("  = {}", bound.binomial);
        println!("  {}", bound.signature);
        for assumption in &bound.assumptions {
            println!("  assuming {}", assumption);
        }
    }
}

/// Report analysis errors to stderr.
///
/// When `diag_opts.json` is true, outputs one JSON object per line.
fn report_diagnostic(
    error: &AnalysisError,
    source: Option<&str>,
    filename: &str,
    diag_opts: &DiagnosticOptions,
) {
    if diag_opts.json {
        eprintln!("{}", diagnostic_json(error, source, filename));
    } else {
        eprint!("{}", render_diagnostic(error, source, filename, diag_opts));
    }
}

fn report_failure(message: &str, program: &Path, diag_opts: &DiagnosticOptions) {
    if diag_opts.json {
        let msg = serde_json::json!({
            "code": "A0000",
            "severity": "error",
            "message": message,
            "file": program.display().to_string(),
            "spans": [],
            "fix": null
        });
        eprintln!("{}", msg);
    } else {
        eprintln!("error: {}", message);
    }
}

/// File name for a group's artifacts: its members joined by `+`, with
/// characters that are awkward in paths replaced.
fn group_file_stem(members: &[String]) -> String {
    members
        .join("+")
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '+' | '-') { c } else { '_' })
        .collect()
}

fn write_lp_files(report: &AnalysisReport, dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create '{}': {}", dir.display(), e))?;
    for group in &report.groups {
        let Some(lp) = &group.lp else { continue };
        let path = dir.join(format!("{}.lp", group_file_stem(&group.members)));
        std::fs::write(&path, lp)
            .map_err(|e| format!("failed to write '{}': {}", path.display(), e))?;
        tracing::info!(path = %path.display(), "wrote LP");
    }
    Ok(())
}

/// Certificates land next to the program as `<stem>.<group>.cert.json`.
fn write_certificates(report: &AnalysisReport, program: &Path) -> Result<(), String> {
    let dir = program.parent().unwrap_or_else(|| Path::new("."));
    let stem = program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());
    for group in &report.groups {
        let Some(certificate) = &group.certificate else { continue };
        let json = certificate
            .to_json()
            .map_err(|e| format!("failed to encode certificate: {}", e))?;
        let path = dir.join(format!("{}.{}.cert.json", stem, group_file_stem(&group.members)));
        std::fs::write(&path, json)
            .map_err(|e| format!("failed to write '{}': {}", path.display(), e))?;
        tracing::info!(path = %path.display(), "wrote certificate");
    }
    Ok(())
}

// ── check-certificate ────────────────────────────────────────────────────

fn check_certificate(path: &Path) -> Result<Vec<FunctionBound>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    let certificate = Certificate::from_json(&text)
        .map_err(|e| format!("'{}': {}", path.display(), e))?;
    certificate
        .verify()
        .map_err(|e| format!("certificate '{}' rejected: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_stems_are_path_safe() {
        assert_eq!(group_file_stem(&["length".into()]), "length");
        assert_eq!(group_file_stem(&["even".into(), "odd".into()]), "even+odd");
        assert_eq!(group_file_stem(&["a/b".into()]), "a_b");
    }

    #[test]
    fn flags_override_the_config_file() {
        let cli = Cli::parse_from([
            "amorc", "analyze", "p.json", "--degree", "3", "--target", "f", "--target", "g",
            "--metric", "heap", "--call-mode", "specialize", "--certificate", "--no-cost-free",
        ]);
        let Commands::Analyze(args) = cli.command else { panic!("expected analyze") };
        let config = load_config(&args).unwrap();
        assert_eq!(config.degree, 3);
        assert_eq!(config.targets, vec!["f", "g"]);
        assert_eq!(config.metric, CostMetric::Heap);
        assert_eq!(config.call_mode, CallMode::Specialize);
        assert!(config.certificates);
        assert!(!config.cost_free);
        assert_eq!(config.threads, 0);
    }

    #[test]
    fn unknown_metrics_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["amorc", "analyze", "p.json", "--metric", "watts"]).is_err());
    }
}
