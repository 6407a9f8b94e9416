//! Whole-program driver.
//!
//! The call graph is condensed into groups of mutually recursive functions
//! and arranged in dependency levels. All groups of one level are analyzed
//! in parallel; their solved signatures are published once the level is
//! done, so every group only reads signatures of earlier levels.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use amor_ast::{visit::called_functions, Program};
use amor_common::call_graph::{CallGraph, CallGroup};
use amor_common::{Rational, Span};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bound::{extract_bound, FunctionBound};
use crate::certificate::Certificate;
use crate::config::{AnalysisConfig, ConfigError};
use crate::error::AnalysisError;
use crate::infer::{generate_group, GenerateOptions};
use crate::pool::AnnotationPool;
use crate::signature::SignatureTable;
use crate::solve::{solve_system, LpSolver, SimplexSolver};

/// Bound or failure for one analysis target.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetResult {
    pub function: String,
    pub outcome: Result<FunctionBound, AnalysisError>,
}

/// What was solved for one group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupReport {
    pub members: Vec<String>,
    pub constraints: usize,
    pub variables: usize,
    pub stage_optima: Vec<(u32, Rational)>,
    /// CPLEX LP text of the system, when requested.
    pub lp: Option<String>,
    pub certificate: Option<Certificate>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisReport {
    /// One entry per target, in target order.
    pub results: Vec<TargetResult>,
    /// Solved groups, callees first.
    pub groups: Vec<GroupReport>,
}

impl AnalysisReport {
    pub fn bound(&self, function: &str) -> Option<&FunctionBound> {
        self.result(function).and_then(|r| r.outcome.as_ref().ok())
    }

    pub fn error(&self, function: &str) -> Option<&AnalysisError> {
        self.result(function).and_then(|r| r.outcome.as_ref().err())
    }

    pub fn all_bounded(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }

    fn result(&self, function: &str) -> Option<&TargetResult> {
        self.results.iter().find(|r| r.function == function)
    }
}

pub struct Analyzer {
    program: Program,
    config: AnalysisConfig,
    solver: Arc<dyn LpSolver>,
    keep_lp: bool,
}

/// A successfully analyzed group before publication.
struct SolvedGroup {
    bounds: Vec<FunctionBound>,
    report: GroupReport,
}

impl Analyzer {
    /// Number the program's nodes and check the configuration.
    pub fn new(mut program: Program, config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        amor_ast::number(&mut program);
        Ok(Analyzer {
            program,
            config,
            solver: Arc::new(SimplexSolver),
            keep_lp: false,
        })
    }

    pub fn with_solver(mut self, solver: Arc<dyn LpSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Keep the LP text of every solved group in the report.
    pub fn keep_lp_text(mut self, keep: bool) -> Self {
        self.keep_lp = keep;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze every target. Structural and numeric failures are reported
    /// per target; an internal error aborts the run.
    pub fn run(&self) -> Result<AnalysisReport, AnalysisError> {
        self.check_duplicates()?;

        let targets: Vec<String> = if self.config.targets.is_empty() {
            self.program.function_names().map(str::to_string).collect()
        } else {
            self.config.targets.clone()
        };

        let is_function = |name: &str| self.program.function(name).is_some();
        let mut graph = CallGraph::new();
        let mut calls: FxHashMap<String, BTreeSet<String>> = FxHashMap::default();
        for def in &self.program.functions {
            graph.add_function(&def.name);
            let callees = called_functions(def, is_function);
            for callee in &callees {
                graph.add_call(&def.name, callee);
            }
            calls.insert(def.name.clone(), callees);
        }

        let known: Vec<&str> = targets
            .iter()
            .map(String::as_str)
            .filter(|t| is_function(*t))
            .collect();
        let reachable = graph.reachable_from(known.iter().copied());
        let levels: Vec<Vec<CallGroup>> = graph
            .levels()
            .into_iter()
            .map(|level| {
                level
                    .into_iter()
                    .filter(|g| g.members.iter().any(|m| reachable.contains(m)))
                    .collect::<Vec<_>>()
            })
            .filter(|level| !level.is_empty())
            .collect();
        let groups_of: FxHashMap<String, Vec<String>> = levels
            .iter()
            .flatten()
            .flat_map(|g| g.members.iter().map(move |m| (m.clone(), g.members.clone())))
            .collect();

        tracing::info!(
            targets = targets.len(),
            groups = levels.iter().map(Vec::len).sum::<usize>(),
            levels = levels.len(),
            degree = self.config.degree,
            metric = %self.config.metric,
            "starting analysis"
        );

        let thread_pool = match self.config.threads {
            0 => None,
            n => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!(threads = n, error = %err, "cannot build worker pool, using the global pool");
                    None
                }
            },
        };

        let annotations = AnnotationPool::new();
        let table = SignatureTable::new();
        let mut bounds: BTreeMap<String, FunctionBound> = BTreeMap::new();
        let mut failed: BTreeMap<String, AnalysisError> = BTreeMap::new();
        let mut reports = Vec::new();

        for (index, level) in levels.iter().enumerate() {
            tracing::debug!(level = index, groups = level.len(), "analyzing level");
            let analyze = |group: &CallGroup| {
                self.analyze_group(group, &calls, &failed, &groups_of, &table, &annotations)
            };
            let outcomes: Vec<Result<SolvedGroup, AnalysisError>> = match &thread_pool {
                Some(pool) => pool.install(|| level.par_iter().map(analyze).collect()),
                None => level.par_iter().map(analyze).collect(),
            };

            for (group, outcome) in level.iter().zip(outcomes) {
                match outcome {
                    Ok(solved) => {
                        for bound in solved.bounds {
                            table.publish(bound.signature.clone())?;
                            bounds.insert(bound.function.clone(), bound);
                        }
                        reports.push(solved.report);
                    }
                    Err(err) if err.is_internal() => {
                        tracing::error!(functions = ?group.members, error = %err, "internal error");
                        return Err(err);
                    }
                    Err(err) => {
                        tracing::info!(functions = ?group.members, error = %err, "group failed");
                        for member in &group.members {
                            failed.insert(member.clone(), err.clone());
                        }
                    }
                }
            }
        }

        let results = targets
            .into_iter()
            .map(|function| {
                let outcome = match (bounds.get(&function), failed.get(&function)) {
                    (Some(bound), _) => Ok(bound.clone()),
                    (None, Some(err)) => Err(err.clone()),
                    (None, None) => Err(AnalysisError::UnknownFunction {
                        function: function.clone(),
                        name: function.clone(),
                        span: Span::default(),
                    }),
                };
                TargetResult { function, outcome }
            })
            .collect();

        tracing::info!(
            bounded = bounds.len(),
            failed = failed.len(),
            variables = annotations.allocated(),
            "analysis finished"
        );
        Ok(AnalysisReport {
            results,
            groups: reports,
        })
    }

    fn check_duplicates(&self) -> Result<(), AnalysisError> {
        let mut seen = FxHashSet::default();
        for def in &self.program.functions {
            if !seen.insert(def.name.as_str()) {
                return Err(AnalysisError::DuplicateDefinition {
                    name: def.name.clone(),
                    span: def.span,
                });
            }
        }
        Ok(())
    }

    fn analyze_group(
        &self,
        group: &CallGroup,
        calls: &FxHashMap<String, BTreeSet<String>>,
        failed: &BTreeMap<String, AnalysisError>,
        groups_of: &FxHashMap<String, Vec<String>>,
        table: &SignatureTable,
        annotations: &AnnotationPool,
    ) -> Result<SolvedGroup, AnalysisError> {
        for member in &group.members {
            let callees = calls.get(member).into_iter().flatten();
            if let Some(callee) = callees.into_iter().find(|c| failed.contains_key(c.as_str())) {
                return Err(AnalysisError::DependencyFailed {
                    function: member.clone(),
                    callee: callee.clone(),
                });
            }
        }

        tracing::info!(functions = ?group.members, recursive = group.recursive, "analyzing group");
        let options = GenerateOptions::from(&self.config);
        let derivation = generate_group(
            &self.program,
            &group.members,
            groups_of,
            table,
            annotations,
            &options,
        )?;
        let system = &derivation.system;
        system.validate()?;

        let solution = solve_system(system, self.solver.as_ref(), self.config.solver_timeout())?;
        let bounds = derivation
            .signatures
            .iter()
            .map(|sig| extract_bound(sig, &solution.values))
            .collect::<Result<Vec<_>, _>>()?;

        let certificate = self.config.certificates.then(|| {
            Certificate::new(system, &derivation.signatures, &solution, self.config.metric)
        });
        let report = GroupReport {
            members: group.members.clone(),
            constraints: system.len(),
            variables: system.registry().len(),
            stage_optima: solution.stage_optima.clone(),
            lp: self.keep_lp.then(|| system.to_lp_format()),
            certificate,
        };
        Ok(SolvedGroup { bounds, report })
    }
}
