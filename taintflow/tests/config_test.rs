//! Configuration loading and matcher tests.

use taintflow::config::{ConfigDoc, PropagatorKind};
use taintflow::errors::Error;
use taintflow::ssa::{BasicKind, ProgramBuilder, Signature};
use taintflow::test_utils::Fixture;

#[test]
fn parses_json_document() {
    let doc: ConfigDoc = serde_json::from_str(
        r#"{
            "Sources": [{"PackageRE": "^creds$", "TypeRE": "Secret"}],
            "Sinks": [{"PackageRE": "log", "MethodRE": "Print"}],
            "FieldTags": [{"Key": "levee", "Val": "source"}]
        }"#,
    )
    .unwrap();
    assert_eq!(doc.sources.len(), 1);
    assert_eq!(doc.sinks.len(), 1);
    assert_eq!(doc.field_tags.len(), 1);
    assert!(doc.compile().is_ok());
}

#[test]
fn parses_toml_document() {
    let doc: ConfigDoc = toml::from_str(
        r#"
        [[Sources]]
        PackageRE = "^creds$"
        TypeRE = "Secret"

        [[Sinks]]
        PackageRE = "log"
        MethodRE = "Print"
        "#,
    )
    .unwrap();
    assert_eq!(doc.sources.len(), 1);
    assert_eq!(doc.sinks.len(), 1);
}

#[test]
fn bad_regex_fails_at_load() {
    let doc: ConfigDoc =
        serde_json::from_str(r#"{"Sinks": [{"MethodRE": "("}]}"#).unwrap();
    assert!(matches!(doc.compile(), Err(Error::Regex { .. })));
}

#[test]
fn empty_pattern_matches_everything() {
    let doc: ConfigDoc = serde_json::from_str(r#"{"Sinks": [{}]}"#).unwrap();
    let matchers = doc.compile().unwrap();

    let mut pb = ProgramBuilder::new();
    let pkg = pb.package("anything");
    let fid = pb.external_function(pkg, "Whatever", None, Signature::default());
    let program = pb.finish();
    assert!(matchers.is_sink(program.func(fid)));
}

#[test]
fn source_type_matches_named_type_and_containers() {
    let matchers = Fixture::matchers();
    let mut fx = Fixture::new();
    let secret = fx.secret_t;
    let ptr = fx.secret_ptr_t;
    let slice = fx.pb.ty_slice(secret);
    let chan = fx.pb.ty_chan(ptr);
    let str_t = fx.str_t;
    let map = fx.pb.ty_map(str_t, slice);
    let iface = fx.iface_t;
    let program = fx.pb.finish();

    assert!(matchers.is_source_type(&program.types, secret));
    assert!(matchers.is_source_type(&program.types, ptr));
    assert!(matchers.is_source_type(&program.types, slice));
    assert!(matchers.is_source_type(&program.types, chan));
    assert!(matchers.is_source_type(&program.types, map));
    assert!(!matchers.is_source_type(&program.types, str_t));
    // Interfaces never qualify directly.
    assert!(!matchers.is_source_type(&program.types, iface));
}

#[test]
fn tagged_field_makes_type_a_source() {
    let matchers = Fixture::matchers();
    let mut pb = ProgramBuilder::new();
    let str_t = pb.ty_basic(BasicKind::Str);
    let tagged = ProgramBuilder::field("password", str_t, r#"levee:"source""#);
    let plain = ProgramBuilder::field("name", str_t, "");
    let body = pb.ty_struct(vec![plain, tagged]);
    // Deliberately outside the configured source package.
    let account = pb.ty_named("db", "Account", body);
    let program = pb.finish();

    assert!(matchers.is_source_type(&program.types, account));
    assert!(matchers.is_source_field(&program.types, account, 1));
    assert!(!matchers.is_source_field(&program.types, account, 0));
}

#[test]
fn field_pattern_requires_package_and_type_match() {
    let doc: ConfigDoc = serde_json::from_str(
        r#"{"Sources": [{"PackageRE": "^db$", "TypeRE": "^Account$", "FieldRE": "^password$"}]}"#,
    )
    .unwrap();
    let matchers = doc.compile().unwrap();

    let mut pb = ProgramBuilder::new();
    let str_t = pb.ty_basic(BasicKind::Str);
    let field = ProgramBuilder::field("password", str_t, "");
    let body = pb.ty_struct(vec![field.clone()]);
    let account = pb.ty_named("db", "Account", body);
    let other_body = pb.ty_struct(vec![field]);
    let other = pb.ty_named("web", "Account", other_body);
    let program = pb.finish();

    assert!(matchers.is_source_field(&program.types, account, 0));
    assert!(!matchers.is_source_field(&program.types, other, 0));
    // A field-scoped pattern does not make the whole type a source by name,
    // but the matching field does.
    assert!(matchers.is_source_type(&program.types, account));
    assert!(!matchers.is_source_type(&program.types, other));
}

#[test]
fn sink_sanitizer_overlap_is_a_config_error() {
    let doc: ConfigDoc = serde_json::from_str(
        r#"{
            "Sinks": [{"PackageRE": "^lib$", "MethodRE": "Frob"}],
            "Sanitizers": [{"PackageRE": "^lib$", "MethodRE": "Frob"}]
        }"#,
    )
    .unwrap();
    let matchers = doc.compile().unwrap();

    let mut pb = ProgramBuilder::new();
    let pkg = pb.package("lib");
    pb.external_function(pkg, "Frob", None, Signature::default());
    let program = pb.finish();

    assert!(matches!(
        matchers.check_disjoint(&program.functions),
        Err(Error::Config(_))
    ));
}

#[test]
fn propagator_kind_depends_on_signature() {
    let matchers = Fixture::matchers();
    let mut fx = Fixture::new();
    let iface = fx.iface_t;
    let lib = fx.lib;
    let into = fx.pb.external_function(
        lib,
        "PropagateInto",
        None,
        Signature { params: vec![iface, iface], results: vec![], variadic: false },
    );
    let from = fx.pb.external_function(
        lib,
        "Propagate",
        None,
        Signature { params: vec![iface], results: vec![iface], variadic: false },
    );
    let program = fx.pb.finish();

    assert_eq!(
        matchers.propagator_kind(program.func(into)),
        Some(PropagatorKind::TaintsFirstArg)
    );
    assert_eq!(
        matchers.propagator_kind(program.func(from)),
        Some(PropagatorKind::TaintsResult)
    );
    assert_eq!(matchers.propagator_kind(program.func(fx.sink)), None);
}

#[test]
fn method_patterns_match_receiver() {
    let doc: ConfigDoc = serde_json::from_str(
        r#"{"Sinks": [{"PackageRE": "^db$", "TypeRE": "^Conn$", "MethodRE": "^Exec$"}]}"#,
    )
    .unwrap();
    let matchers = doc.compile().unwrap();

    let mut pb = ProgramBuilder::new();
    let pkg = pb.package("db");
    let method = pb.external_function(pkg, "Exec", Some("Conn"), Signature::default());
    let plain = pb.external_function(pkg, "Exec", None, Signature::default());
    let program = pb.finish();

    assert!(matchers.is_sink(program.func(method)));
    // A plain function has an empty receiver, which "^Conn$" rejects.
    assert!(!matchers.is_sink(program.func(plain)));
}
