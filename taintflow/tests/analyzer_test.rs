//! End-to-end driver tests: suppression, shared summaries, cancellation.

use taintflow::errors::Error;
use taintflow::ssa::{FunctionBuilder, ProgramBuilder, Signature};
use taintflow::taint::{CancelToken, SuppressionMap, TaintAnalyzer};
use taintflow::test_utils::Fixture;

/// Builds the S1 program: `func f(s *Secret) { Sink(s) }` with the sink call
/// on the given line.
fn direct_flow_fixture(sink_line: u32) -> Fixture {
    let mut fx = Fixture::new();
    let sig = Signature { params: vec![fx.secret_ptr_t], results: vec![], variadic: false };
    let f = fx.pb.declare_function(fx.app, "f", None, sig);
    let (ptr, void, sink, file) = (fx.secret_ptr_t, fx.void_t, fx.sink, fx.file);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let s = fb.param(ptr);
        fb.at(file, sink_line, 2).call_static(b0, sink, vec![s], void);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    fx
}

#[test]
fn suppression_comment_removes_exactly_that_finding() {
    let fx = direct_flow_fixture(2);
    let program = fx.pb.finish();

    let mut suppression = SuppressionMap::new();
    suppression.add_file(0, "func f(s *Secret) {\n\tSink(s) // levee.DoNotReport\n}\n");

    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    let findings = analyzer
        .analyze_program(&program, &suppression, &CancelToken::new())
        .unwrap();
    assert!(findings.is_empty());

    // The same program without the comment still reports.
    let fresh = TaintAnalyzer::new(Fixture::matchers());
    let findings = fresh
        .analyze_program(&program, &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    assert_eq!(findings.len(), 1);
}

#[test]
fn suppression_on_another_line_changes_nothing() {
    let fx = direct_flow_fixture(2);
    let program = fx.pb.finish();

    let mut suppression = SuppressionMap::new();
    suppression.add_file(0, "// levee.DoNotReport\nother()\nSink(s)\n");

    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    let findings = analyzer
        .analyze_program(&program, &suppression, &CancelToken::new())
        .unwrap();
    assert_eq!(findings.len(), 1);
}

#[test]
fn cancelled_token_aborts_with_no_findings() {
    let fx = direct_flow_fixture(2);
    let program = fx.pb.finish();
    let cancel = CancelToken::new();
    cancel.cancel();

    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    let result = analyzer.analyze_program(&program, &SuppressionMap::new(), &cancel);
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn reanalyzing_the_same_program_reuses_summaries() {
    let fx = direct_flow_fixture(2);
    let program = fx.pb.finish();

    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    let first = analyzer
        .analyze_program(&program, &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    let second = analyzer
        .analyze_program(&program, &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    assert_eq!(first, second);
    assert!(!analyzer.shared_summaries().is_empty());
}

#[test]
fn conflicting_republication_is_an_error() {
    // Two programs declare app.id with different taint behavior.
    let build = |taints: bool| {
        let mut fx = Fixture::new();
        let iface = fx.iface_t;
        let sig = Signature { params: vec![iface], results: vec![iface], variadic: false };
        let id = fx.pb.declare_function(fx.app, "id", None, sig);
        let (void, str_t) = (fx.void_t, fx.str_t);
        {
            let mut fb = FunctionBuilder::new(&mut fx.pb, id);
            let b0 = fb.block();
            let a = fb.param(iface);
            let ret = if taints {
                a
            } else {
                fb.constant("\"fixed\"", str_t)
            };
            fb.ret(b0, vec![ret], void);
            fb.finish();
        }
        fx.pb.finish()
    };

    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    analyzer
        .analyze_program(&build(true), &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    let result =
        analyzer.analyze_program(&build(false), &SuppressionMap::new(), &CancelToken::new());
    assert!(matches!(result, Err(Error::SummaryConflict(_))));
}

#[test]
fn findings_are_sorted_by_sink_position() {
    let mut fx = Fixture::new();
    let sig = Signature { params: vec![fx.secret_ptr_t], results: vec![], variadic: false };
    let f = fx.pb.declare_function(fx.app, "f", None, sig);
    let (ptr, void, sink, file) = (fx.secret_ptr_t, fx.void_t, fx.sink, fx.file);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let s = fb.param(ptr);
        fb.at(file, 9, 2).call_static(b0, sink, vec![s], void);
        fb.at(file, 3, 2).call_static(b0, sink, vec![s], void);
        fb.at(file, 6, 2).call_static(b0, sink, vec![s], void);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let findings = fx.analyze();
    let lines: Vec<u32> = findings.iter().map(|f| f.sink_line).collect();
    assert_eq!(lines, vec![3, 6, 9]);
}

#[test]
fn cross_package_wrapper_is_summarized_first() {
    // package util: func Wrap(a interface{}) { Sink(a) }
    // package app:  func f(s Secret) { util.Wrap(s) }
    let mut fx = Fixture::new();
    let iface = fx.iface_t;
    let util = fx.pb.package("util");
    let wrap_sig = Signature { params: vec![iface], results: vec![], variadic: false };
    let wrap = fx.pb.declare_function(util, "Wrap", None, wrap_sig);
    let f_sig = Signature { params: vec![fx.secret_t], results: vec![], variadic: false };
    let f = fx.pb.declare_function(fx.app, "f", None, f_sig);
    let (secret, void, sink, file) = (fx.secret_t, fx.void_t, fx.sink, fx.file);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, wrap);
        let b0 = fb.block();
        let a = fb.param(iface);
        fb.at(file, 12, 2).call_static(b0, sink, vec![a], void);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let s = fb.param(secret);
        let mi = fb.push(b0, taintflow::ssa::NodeKind::MakeInterface { x: s }, iface);
        fb.call_static(b0, wrap, vec![mi], void);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let findings = fx.analyze();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].sink_line, 12);
}

#[test]
fn adding_a_caller_never_removes_findings() {
    // The wrap/f pair reports one finding; adding another caller of wrap
    // with a clean argument must not change that.
    let build = |with_extra_caller: bool| {
        let mut fx = Fixture::new();
        let iface = fx.iface_t;
        let wrap_sig = Signature { params: vec![iface], results: vec![], variadic: false };
        let wrap = fx.pb.declare_function(fx.app, "wrap", None, wrap_sig);
        let f_sig = Signature { params: vec![fx.secret_t], results: vec![], variadic: false };
        let f = fx.pb.declare_function(fx.app, "f", None, f_sig);
        let (secret, str_t, void, sink, file) =
            (fx.secret_t, fx.str_t, fx.void_t, fx.sink, fx.file);
        {
            let mut fb = FunctionBuilder::new(&mut fx.pb, wrap);
            let b0 = fb.block();
            let a = fb.param(iface);
            fb.at(file, 12, 2).call_static(b0, sink, vec![a], void);
            fb.ret(b0, vec![], void);
            fb.finish();
        }
        {
            let mut fb = FunctionBuilder::new(&mut fx.pb, f);
            let b0 = fb.block();
            let s = fb.param(secret);
            let mi = fb.push(b0, taintflow::ssa::NodeKind::MakeInterface { x: s }, iface);
            fb.call_static(b0, wrap, vec![mi], void);
            fb.ret(b0, vec![], void);
            fb.finish();
        }
        if with_extra_caller {
            let g = fx.pb.declare_function(fx.app, "g", None, Signature::default());
            let mut fb = FunctionBuilder::new(&mut fx.pb, g);
            let b0 = fb.block();
            let c = fb.constant("\"benign\"", str_t);
            fb.call_static(b0, wrap, vec![c], void);
            fb.ret(b0, vec![], void);
            fb.finish();
        }
        fx.pb.finish()
    };

    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    let before = analyzer
        .analyze_program(&build(false), &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    let after = TaintAnalyzer::new(Fixture::matchers())
        .analyze_program(&build(true), &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(after.len(), 1);
}

#[test]
fn empty_program_is_fine() {
    let pb = ProgramBuilder::new();
    let program = pb.finish();
    let analyzer = TaintAnalyzer::new(Fixture::matchers());
    let findings = analyzer
        .analyze_program(&program, &SuppressionMap::new(), &CancelToken::new())
        .unwrap();
    assert!(findings.is_empty());
}
