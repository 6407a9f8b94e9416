//! End-to-end analysis of small programs: generation, solving and bound
//! extraction through the public `Analyzer` API.

use amor_analysis::diagnostics::{render_diagnostic, DiagnosticOptions};
use amor_analysis::{AnalysisConfig, AnalysisError, AnalysisReport, Analyzer, CallMode, CostMetric};
use amor_ast::build::*;
use amor_ast::{FunctionDef, PrimOp, Program, Ty};

// ── Helpers ────────────────────────────────────────────────────────────

fn ints() -> Ty {
    Ty::list(Ty::Int)
}

fn run(program: Program, config: AnalysisConfig) -> AnalysisReport {
    Analyzer::new(program, config)
        .expect("valid configuration")
        .run()
        .expect("no internal error")
}

fn run_default(functions: Vec<FunctionDef>) -> AnalysisReport {
    run(program(functions), AnalysisConfig::default())
}

fn targets(names: &[&str]) -> AnalysisConfig {
    AnalysisConfig {
        targets: names.iter().map(|n| n.to_string()).collect(),
        ..AnalysisConfig::default()
    }
}

/// `name: bound` per target, or `name: error` for failures.
fn summary(report: &AnalysisReport) -> String {
    report
        .results
        .iter()
        .map(|r| match &r.outcome {
            Ok(bound) => format!("{}: {}", r.function, bound.bound),
            Err(err) => format!("{}: [{}] {}", r.function, err.code(), err),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn length() -> FunctionDef {
    func(
        "length",
        vec![("xs", ints())],
        Ty::Int,
        match_(
            var("xs"),
            vec![
                arm(pat_nil(), int(0)),
                arm(
                    pat_cons("h", "t"),
                    tick(1, prim(PrimOp::Add, vec![int(1), call("length", vec![var("t")])])),
                ),
            ],
        ),
    )
}

fn append() -> FunctionDef {
    func(
        "append",
        vec![("xs", ints()), ("ys", ints())],
        ints(),
        match_(
            var("xs"),
            vec![
                arm(pat_nil(), var("ys")),
                arm(
                    pat_cons("h", "t"),
                    tick(1, cons(var("h"), call("append", vec![var("t"), var("ys")]))),
                ),
            ],
        ),
    )
}

fn size() -> FunctionDef {
    func(
        "size",
        vec![("t", Ty::tree(Ty::Int))],
        Ty::Int,
        match_(
            var("t"),
            vec![
                arm(pat_leaf(), int(0)),
                arm(
                    pat_node("l", "x", "r"),
                    tick(
                        1,
                        prim(
                            PrimOp::Add,
                            vec![call("size", vec![var("l")]), call("size", vec![var("r")])],
                        ),
                    ),
                ),
            ],
        ),
    )
}

fn degree(n: u32) -> AnalysisConfig {
    AnalysisConfig {
        degree: n,
        ..AnalysisConfig::default()
    }
}

/// Σ length(suffix) over all proper suffixes: quadratic.
fn sum_lengths() -> FunctionDef {
    func(
        "sum_lengths",
        vec![("xs", ints())],
        Ty::Int,
        match_(
            var("xs"),
            vec![
                arm(pat_nil(), int(0)),
                arm(
                    pat_cons("h", "t"),
                    prim(
                        PrimOp::Add,
                        vec![
                            call("length", vec![var("t")]),
                            call("sum_lengths", vec![var("t")]),
                        ],
                    ),
                ),
            ],
        ),
    )
}

// ── Bounds ─────────────────────────────────────────────────────────────

#[test]
fn straight_line_code_has_a_constant_bound() {
    let inc = func(
        "inc",
        vec![("x", Ty::Int)],
        Ty::Int,
        tick(3, prim(PrimOp::Add, vec![var("x"), int(1)])),
    );
    let head_or_zero = func(
        "head_or_zero",
        vec![("xs", ints())],
        Ty::Int,
        match_(
            var("xs"),
            vec![
                arm(pat_nil(), int(0)),
                arm(pat_cons("h", "_"), tick(2, var("h"))),
            ],
        ),
    );
    let report = run_default(vec![inc, head_or_zero]);
    insta::assert_snapshot!(summary(&report), @r"
    inc: 3
    head_or_zero: 2
    ");
    assert!(report.results.iter().all(|r| r.outcome.as_ref().unwrap().bound.is_constant()));
}

#[test]
fn list_traversal_is_linear() {
    let report = run_default(vec![length()]);
    let bound = report.bound("length").unwrap();
    assert_eq!(bound.bound.to_string(), "|xs|");
    assert_eq!(bound.signature.to_string(), "length(xs: List<Int>^[1]) -[0]-> Int");
}

#[test]
fn tree_traversal_is_linear_in_the_node_count() {
    let report = run_default(vec![size()]);
    assert_eq!(report.bound("size").unwrap().bound.to_string(), "|t|");
}

#[test]
fn subtrees_are_measured_independently() {
    // Measures one subtree at every node, then recurses into both.
    let measure = |name: &str, side: &str| {
        func(
            name,
            vec![("t", Ty::tree(Ty::Int))],
            Ty::Int,
            match_(
                var("t"),
                vec![
                    arm(pat_leaf(), int(0)),
                    arm(
                        pat_node("l", "x", "r"),
                        prim(
                            PrimOp::Add,
                            vec![
                                call("size", vec![var(side)]),
                                prim(
                                    PrimOp::Add,
                                    vec![call(name, vec![var("l")]), call(name, vec![var("r")])],
                                ),
                            ],
                        ),
                    ),
                ],
            ),
        )
    };
    let functions = vec![size(), measure("left_sizes", "l"), measure("right_sizes", "r")];
    let report = run(program(functions), degree(2));
    for name in ["left_sizes", "right_sizes"] {
        let bound = report.bound(name).unwrap_or_else(|| panic!("{}: {:?}", name, report.error(name)));
        assert_eq!(bound.binomial, "C(|t|, 2)");
        assert_eq!(bound.signature.to_string(), format!("{}(t: Tree<Int>^[0, 1]) -[0]-> Int", name));
    }
    assert_eq!(report.bound("size").unwrap().bound.to_string(), "|t|");
}

#[test]
fn head_and_tail_elements_are_demanded_separately() {
    let count = func(
        "count",
        vec![("xss", Ty::list(ints()))],
        Ty::Int,
        match_(
            var("xss"),
            vec![
                arm(pat_nil(), int(0)),
                arm(pat_cons("_", "t"), tick(1, call("count", vec![var("t")]))),
            ],
        ),
    );
    let first_and_count = func(
        "first_and_count",
        vec![("xss", Ty::list(ints()))],
        Ty::Int,
        match_(
            var("xss"),
            vec![
                arm(pat_nil(), int(0)),
                arm(
                    pat_cons("h", "t"),
                    prim(
                        PrimOp::Add,
                        vec![call("length", vec![var("h")]), call("count", vec![var("t")])],
                    ),
                ),
            ],
        ),
    );
    let report = run_default(vec![length(), count, first_and_count]);
    assert_eq!(
        report.bound("count").unwrap().signature.to_string(),
        "count(xss: List<List<Int>^[0]>^[1]) -[0]-> Int"
    );
    let bound = report.bound("first_and_count").unwrap();
    assert_eq!(
        bound.signature.to_string(),
        "first_and_count(xss: List<List<Int>^[1]>^[1]) -[0]-> Int"
    );
    assert_eq!(bound.binomial, "|xss| + |xss|*|xss.elem|");
}

#[test]
fn append_is_independent_of_the_second_list() {
    let report = run_default(vec![append()]);
    let bound = report.bound("append").unwrap();
    assert_eq!(bound.bound.to_string(), "|xs|");
    assert!(!bound.bound.parameters().contains(&"|ys|".to_string()));
}

#[test]
fn quadratic_bounds_need_degree_two() {
    let report = run(program(vec![length(), sum_lengths()]), AnalysisConfig::default());
    assert!(matches!(
        report.error("sum_lengths"),
        Some(AnalysisError::NoBoundFound { degree: 1, .. })
    ));
    assert_eq!(report.bound("length").unwrap().bound.to_string(), "|xs|");

    let config = AnalysisConfig {
        degree: 2,
        ..AnalysisConfig::default()
    };
    let report = run(program(vec![length(), sum_lengths()]), config);
    let bound = report.bound("sum_lengths").unwrap();
    assert_eq!(bound.binomial, "C(|xs|, 2)");
    assert_eq!(bound.bound.to_string(), "1/2*|xs|^2 - 1/2*|xs|");
}

#[test]
fn negative_ticks_return_resources_in_order() {
    let refund_first = func("refund_first", vec![], Ty::Int, tick(-2, tick(3, int(0))));
    let refund_last = func("refund_last", vec![], Ty::Int, tick(3, tick(-2, int(0))));
    let report = run_default(vec![refund_first, refund_last]);
    insta::assert_snapshot!(summary(&report), @r"
    refund_first: 1
    refund_last: 3
    ");
}

#[test]
fn named_data_types_are_unsupported() {
    let f = func("f", vec![("p", Ty::Named("Point".into()))], Ty::Int, int(0));
    let report = run_default(vec![f, length()]);
    let err = report.error("f").unwrap();
    assert!(matches!(err, AnalysisError::UnsupportedType { .. }), "{:?}", err);
    assert_eq!(err.code(), "A0001");
    assert!(report.bound("length").is_some());
}

#[test]
fn recursive_results_carry_cost_free_potential() {
    // Naive reverse: appends the head after reversing the tail.
    let rev = func(
        "rev",
        vec![("xs", ints())],
        ints(),
        match_(
            var("xs"),
            vec![
                arm(pat_nil(), nil(Ty::Int)),
                arm(
                    pat_cons("h", "t"),
                    call(
                        "append",
                        vec![call("rev", vec![var("t")]), cons(var("h"), nil(Ty::Int))],
                    ),
                ),
            ],
        ),
    );
    let report = run(program(vec![append(), rev.clone()]), degree(2));
    let bound = report.bound("rev").unwrap_or_else(|| panic!("{:?}", report.error("rev")));
    assert_eq!(bound.binomial, "C(|xs|, 2)");

    let monomorphic = AnalysisConfig {
        cost_free: false,
        ..degree(2)
    };
    let report = run(program(vec![append(), rev]), monomorphic);
    assert!(matches!(
        report.error("rev"),
        Some(AnalysisError::NoBoundFound { .. })
    ));
    assert_eq!(report.bound("append").unwrap().bound.to_string(), "|xs|");
}

#[test]
fn callers_of_failed_functions_fail_too() {
    let main = func("main", vec![("xs", ints())], Ty::Int, call("sum_lengths", vec![var("xs")]));
    let report = run_default(vec![length(), sum_lengths(), main]);
    assert_eq!(
        report.error("main"),
        Some(&AnalysisError::DependencyFailed {
            function: "main".into(),
            callee: "sum_lengths".into(),
        })
    );
    assert!(report.bound("length").is_some());
}

#[test]
fn mutually_recursive_functions_are_solved_together() {
    let parity = |name: &str, other: &str, base: bool| {
        func(
            name,
            vec![("xs", ints())],
            Ty::Bool,
            match_(
                var("xs"),
                vec![
                    arm(pat_nil(), bool_(base)),
                    arm(pat_cons("_", "t"), tick(1, call(other, vec![var("t")]))),
                ],
            ),
        )
    };
    let report = run_default(vec![parity("even", "odd", true), parity("odd", "even", false)]);
    insta::assert_snapshot!(summary(&report), @r"
    even: |xs|
    odd: |xs|
    ");
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].members, vec!["even", "odd"]);

    let report = run_default(vec![parity("even", "odd", true)]);
    let err = report.error("even").unwrap();
    assert!(matches!(err, AnalysisError::UnknownFunction { name, .. } if name == "odd"));
    insta::assert_snapshot!(
        render_diagnostic(err, None, "parity.json", &DiagnosticOptions::colorless()),
        @r"
    [A0004] Error: unknown function `odd`
      = note: while analyzing `even` in parity.json
    "
    );
}

#[test]
fn cost_metrics_change_what_is_counted() {
    let copy = || {
        func(
            "copy",
            vec![("xs", ints())],
            ints(),
            match_(
                var("xs"),
                vec![
                    arm(pat_nil(), nil(Ty::Int)),
                    arm(pat_cons("h", "t"), cons(var("h"), call("copy", vec![var("t")]))),
                ],
            ),
        )
    };
    let with_metric = |metric| AnalysisConfig {
        metric,
        ..AnalysisConfig::default()
    };
    let ticks = run(program(vec![copy()]), with_metric(CostMetric::Ticks));
    assert_eq!(ticks.bound("copy").unwrap().bound.to_string(), "0");
    let heap = run(program(vec![copy()]), with_metric(CostMetric::Heap));
    assert_eq!(heap.bound("copy").unwrap().bound.to_string(), "|xs|");
    let steps = run(program(vec![copy()]), with_metric(CostMetric::Steps));
    assert_eq!(steps.bound("copy").unwrap().bound.degree(), 1);
}

// ── Call modes ─────────────────────────────────────────────────────────

#[test]
fn specialization_lets_callers_demand_result_potential() {
    let main = || {
        func(
            "main",
            vec![("xs", ints()), ("ys", ints())],
            Ty::Int,
            call("length", vec![call("append", vec![var("xs"), var("ys")])]),
        )
    };
    let fixed = run(program(vec![length(), append(), main()]), targets(&["main"]));
    assert!(matches!(
        fixed.error("main"),
        Some(AnalysisError::NoBoundFound { .. })
    ));

    let config = AnalysisConfig {
        call_mode: CallMode::Specialize,
        ..targets(&["main"])
    };
    let specialized = run(program(vec![length(), append(), main()]), config);
    assert_eq!(
        specialized.bound("main").unwrap().bound.to_string(),
        "2*|xs| + |ys|"
    );
}

#[test]
fn higher_order_callees_are_always_specialized() {
    let map = func(
        "map",
        vec![("f", Ty::fun(vec![Ty::Int], Ty::Int)), ("xs", ints())],
        ints(),
        match_(
            var("xs"),
            vec![
                arm(pat_nil(), nil(Ty::Int)),
                arm(
                    pat_cons("h", "t"),
                    cons(call("f", vec![var("h")]), call("map", vec![var("f"), var("t")])),
                ),
            ],
        ),
    );
    let inc = func(
        "inc",
        vec![("x", Ty::Int)],
        Ty::Int,
        tick(1, prim(PrimOp::Add, vec![var("x"), int(1)])),
    );
    let main = func(
        "main",
        vec![("xs", ints())],
        ints(),
        call("map", vec![fn_ref("inc"), var("xs")]),
    );
    let report = run(program(vec![map, inc, main]), targets(&["main", "map"]));
    let main = report.bound("main").unwrap();
    assert_eq!(main.bound.to_string(), "|xs|");
    assert!(main.assumptions.is_empty());

    // On its own, `map` is bounded only for arguments that cost nothing.
    let map = report.bound("map").unwrap();
    assert_eq!(map.bound.to_string(), "0");
    assert_eq!(map.assumptions, vec!["every call of `f` fits (Int) -[0]-> Int"]);
}

// ── Determinism and certificates ───────────────────────────────────────

#[test]
fn results_do_not_depend_on_scheduling() {
    let functions = || vec![length(), append(), sum_lengths()];
    let config = |threads| AnalysisConfig {
        degree: 2,
        threads,
        ..AnalysisConfig::default()
    };
    let one = run(program(functions()), config(1));
    let many = run(program(functions()), config(4));
    assert_eq!(summary(&one), summary(&many));
}

#[test]
fn certificates_verify_without_the_solver() {
    let config = AnalysisConfig {
        certificates: true,
        ..AnalysisConfig::default()
    };
    let report = run(program(vec![length(), append()]), config);
    for group in &report.groups {
        let certificate = group.certificate.as_ref().unwrap();
        let json = certificate.to_json().unwrap();
        let parsed = amor_analysis::Certificate::from_json(&json).unwrap();
        let bounds = parsed.verify().unwrap();
        for bound in bounds {
            assert_eq!(report.bound(&bound.function), Some(&bound));
        }
    }
}

#[test]
fn anonymous_functions_are_rejected_per_target() {
    let bad = func(
        "bad",
        vec![],
        Ty::fun(vec![Ty::Int], Ty::Int),
        lambda(vec![("x", Ty::Int)], var("x")),
    );
    let report = run_default(vec![bad, length()]);
    assert!(matches!(
        report.error("bad"),
        Some(AnalysisError::UnsupportedConstruct { .. })
    ));
    assert!(report.bound("length").is_some());
}
