//! Driver binary tests.

use assert_cmd::Command;
use predicates::prelude::*;
use taintflow::ssa::{FunctionBuilder, Program, Signature};
use taintflow::test_utils::{Fixture, FIXTURE_CONFIG};

/// The S1 program serialized as a front-end dump.
fn program_json() -> String {
    let mut fx = Fixture::new();
    let sig = Signature { params: vec![fx.secret_ptr_t], results: vec![], variadic: false };
    let f = fx.pb.declare_function(fx.app, "f", None, sig);
    let (ptr, void, sink, file) = (fx.secret_ptr_t, fx.void_t, fx.sink, fx.file);
    {
        let mut fb = FunctionBuilder::new(&mut fx.pb, f);
        let b0 = fb.block();
        let s = fb.param(ptr);
        fb.at(file, 2, 2).call_static(b0, sink, vec![s], void);
        fb.ret(b0, vec![], void);
        fb.finish();
    }
    serde_json::to_string(&fx.pb.finish()).unwrap()
}

fn write(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn findings_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "config.json", FIXTURE_CONFIG);
    let prog = write(dir.path(), "program.json", &program_json());

    Command::cargo_bin("taintflow-bin")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg(&prog)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 taint finding"));
}

#[test]
fn json_output_lists_positions() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "config.json", FIXTURE_CONFIG);
    let prog = write(dir.path(), "program.json", &program_json());

    Command::cargo_bin("taintflow-bin")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg(&prog)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sink_line\": 2"));
}

#[test]
fn source_root_suppression_applies() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "config.json", FIXTURE_CONFIG);
    let prog = write(dir.path(), "program.json", &program_json());
    std::fs::create_dir_all(dir.path().join("src/app")).unwrap();
    write(
        &dir.path().join("src"),
        "app/main.go",
        "func f(s *creds.Secret) {\n\tlib.Sink(s) // levee.DoNotReport\n}\n",
    );

    Command::cargo_bin("taintflow-bin")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--source-root")
        .arg(dir.path().join("src"))
        .arg(&prog)
        .assert()
        .success()
        .stdout(predicate::str::contains("No taint findings"));
}

#[test]
fn bad_config_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "config.json", r#"{"Sinks": [{"MethodRE": "("}]}"#);
    let prog = write(dir.path(), "program.json", &program_json());

    Command::cargo_bin("taintflow-bin")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg(&prog)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid regex"));
}

#[test]
fn missing_program_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "config.json", FIXTURE_CONFIG);

    Command::cargo_bin("taintflow-bin")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg(dir.path().join("does-not-exist.json"))
        .assert()
        .failure();
}

#[test]
fn toml_config_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(
        dir.path(),
        "config.toml",
        r#"
[[Sources]]
PackageRE = "^app$"
TypeRE = "^Secret$"

[[Sinks]]
PackageRE = "^lib$"
MethodRE = "^Sink$"
"#,
    );
    let prog = write(dir.path(), "program.json", &program_json());

    Command::cargo_bin("taintflow-bin")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg(&prog)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 taint finding"));
}

#[test]
fn program_dump_round_trips() {
    let text = program_json();
    let program = Program::from_json(&text).unwrap();
    assert_eq!(program.packages.len(), 2);
    assert_eq!(program.functions.len(), 3);
    let reserialized = serde_json::to_string(&program).unwrap();
    let reparsed = Program::from_json(&reserialized).unwrap();
    assert_eq!(reparsed.functions.len(), 3);
}
