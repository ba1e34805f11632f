//! Source identification tests.

use taintflow::ssa::{
    FuncId, FuncView, FunctionBuilder, NodeKind, Signature,
};
use taintflow::taint::sources;
use taintflow::test_utils::Fixture;

fn identify(program: &taintflow::ssa::Program, fid: FuncId) -> Vec<String> {
    let view = FuncView::new(program, fid);
    sources::identify(&view, &Fixture::matchers())
        .into_iter()
        .map(|s| s.description.to_string())
        .collect()
}

#[test]
fn pointer_and_value_params_are_sources() {
    let mut fx = Fixture::new();
    let sig = Signature {
        params: vec![fx.secret_ptr_t, fx.secret_t, fx.str_t, fx.iface_t],
        results: vec![],
        variadic: false,
    };
    let f = fx.pb.declare_function(fx.app, "f", None, sig);
    let (ptr, val, plain, iface, void) =
        (fx.secret_ptr_t, fx.secret_t, fx.str_t, fx.iface_t, fx.void_t);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        fb.param(ptr);
        fb.param(val);
        fb.param(plain);
        fb.param(iface);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    let descs = identify(&program, f);
    // Two source parameters; the string and interface params are not sources.
    assert_eq!(descs.iter().filter(|d| *d == "parameter").count(), 2);
}

#[test]
fn free_vars_are_checked_through_one_indirection() {
    let mut fx = Fixture::new();
    let f = fx.pb.declare_function(fx.app, "closure", None, Signature::default());
    let (ptr, void) = (fx.secret_ptr_t, fx.void_t);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        fb.free_var(ptr);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    let descs = identify(&program, f);
    assert_eq!(descs, vec!["captured variable".to_owned()]);
}

#[test]
fn allocations_extracts_and_receives_are_sources() {
    let mut fx = Fixture::new();
    let make_sig = Signature {
        params: vec![],
        results: vec![fx.secret_t, fx.err_t],
        variadic: false,
    };
    let make = fx.pb.external_function(fx.lib, "Make", None, make_sig);
    let f = fx.pb.declare_function(fx.app, "f", None, Signature::default());
    let secret = fx.secret_t;
    let secret_ptr = fx.secret_ptr_t;
    let err = fx.err_t;
    let void = fx.void_t;
    let chan = fx.pb.ty_chan(secret);
    let tuple = fx.pb.ty_tuple(vec![secret, err]);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        fb.push(b0, NodeKind::Alloc { heap: false }, secret_ptr);
        let ch = fb.push(b0, NodeKind::MakeChan, chan);
        fb.push(b0, NodeKind::Recv { chan: ch }, secret);
        let call = fb.call_static(b0, make, vec![], tuple);
        fb.push(b0, NodeKind::Extract { tuple: call, index: 0 }, secret);
        fb.push(b0, NodeKind::Extract { tuple: call, index: 1 }, err);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    let descs = identify(&program, f);
    assert!(descs.contains(&"allocation".to_owned()));
    assert!(descs.contains(&"channel receive".to_owned()));
    assert!(descs.contains(&"extracted result".to_owned()));
    // The error extract is not a source.
    assert_eq!(descs.iter().filter(|d| *d == "extracted result").count(), 1);
}

#[test]
fn recovery_block_is_skipped() {
    let mut fx = Fixture::new();
    let f = fx.pb.declare_function(fx.app, "f", None, Signature::default());
    let (secret_ptr, void) = (fx.secret_ptr_t, fx.void_t);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let recover = fb.block();
        fb.set_recover_block(recover);
        fb.ret(b0, vec![], void);
        fb.push(recover, NodeKind::Alloc { heap: false }, secret_ptr);
        fb.ret(recover, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    assert!(identify(&program, f).is_empty());
}

#[test]
fn propagator_calls_introduce_sources() {
    let mut fx = Fixture::new();
    let iface = fx.iface_t;
    let void = fx.void_t;
    let str_t = fx.str_t;
    let lib = fx.lib;
    let from = fx.pb.external_function(
        lib,
        "Propagate",
        None,
        Signature { params: vec![str_t], results: vec![iface], variadic: false },
    );
    let into = fx.pb.external_function(
        lib,
        "PropagateInto",
        None,
        Signature { params: vec![iface, iface], results: vec![], variadic: false },
    );
    let f = fx.pb.declare_function(fx.app, "f", None, Signature::default());
    let iface_ptr = fx.pb.ty_pointer(iface);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let c = fb.constant("\"hello\"", str_t);
        fb.call_static(b0, from, vec![c], iface);
        let w = fb.push(b0, NodeKind::Alloc { heap: false }, iface_ptr);
        fb.call_static(b0, into, vec![w, c], void);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    let descs = identify(&program, f);
    assert!(descs.contains(&"propagator result".to_owned()));
    assert!(descs.contains(&"propagator writer argument".to_owned()));
}

#[test]
fn struct_literal_with_source_typed_field_is_a_source() {
    // type Request struct { auth Secret } allocated locally.
    let mut fx = Fixture::new();
    let secret = fx.secret_t;
    let auth = taintflow::ssa::ProgramBuilder::field("auth", secret, "");
    let body = fx.pb.ty_struct(vec![auth]);
    let request = fx.pb.ty_named("web", "Request", body);
    let request_ptr = fx.pb.ty_pointer(request);
    let f = fx.pb.declare_function(fx.app, "f", None, Signature::default());
    let void = fx.void_t;
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        fb.push(b0, NodeKind::Alloc { heap: false }, request_ptr);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    assert_eq!(identify(&program, f), vec!["allocation".to_owned()]);
}

#[test]
fn tagged_fields_are_sources() {
    // type Account struct { password string `levee:"source"` } is outside the
    // configured source package, so only the tagged field qualifies.
    let mut fx = Fixture::new();
    let str_t = fx.str_t;
    let tagged = taintflow::ssa::ProgramBuilder::field("password", str_t, r#"levee:"source""#);
    let body = fx.pb.ty_struct(vec![tagged]);
    let account = fx.pb.ty_named("db", "Account", body);
    let account_ptr = fx.pb.ty_pointer(account);
    let str_ptr = fx.pb.ty_pointer(str_t);
    let sig = Signature { params: vec![account_ptr], results: vec![], variadic: false };
    let f = fx.pb.declare_function(fx.app, "f", None, sig);
    let void = fx.void_t;
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let acct = fb.param(account_ptr);
        fb.push(b0, NodeKind::FieldAddr { base: acct, field: 0 }, str_ptr);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    let descs = identify(&program, f);
    assert!(descs.contains(&"tagged field".to_owned()));
}

#[test]
fn globals_of_source_type_are_sources() {
    let mut fx = Fixture::new();
    let f = fx.pb.declare_function(fx.app, "f", None, Signature::default());
    let (secret_ptr, void) = (fx.secret_ptr_t, fx.void_t);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        fb.global("app", "defaultSecret", secret_ptr);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    let program = fx.pb.finish();
    assert_eq!(identify(&program, f), vec!["global".to_owned()]);
}
