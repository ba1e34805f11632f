//! Test utilities.
//!
//! Building SSA programs by hand is verbose; the fixture here pre-declares
//! the types, packages and configured functions most engine tests need: a
//! source type `app.Secret`, an external sink `lib.Sink`, a sanitizer
//! `lib.Sanitize` and a propagator `lib.Propagate`.

use crate::config::{ConfigDoc, Matchers};
use crate::ssa::{BasicKind, FuncId, ProgramBuilder, Signature, TypeId};
use crate::taint::{CancelToken, Finding, SuppressionMap, TaintAnalyzer};

/// The configuration document matching the fixture's naming scheme.
pub const FIXTURE_CONFIG: &str = r#"{
  "Sources":     [{"PackageRE": "^app$", "TypeRE": "^Secret$"}],
  "Sinks":       [{"PackageRE": "^lib$", "MethodRE": "^Sink$"}],
  "Sanitizers":  [{"PackageRE": "^lib$", "MethodRE": "^Sanitize$"}],
  "Propagators": [{"PackageRE": "^lib$", "MethodRE": "^Propagate"}],
  "FieldTags":   [{"Key": "levee", "Val": "source"}]
}"#;

/// A program builder pre-populated with the common test vocabulary.
pub struct Fixture {
    /// The underlying builder.
    pub pb: ProgramBuilder,
    /// The single test file.
    pub file: u32,
    /// `string`.
    pub str_t: TypeId,
    /// `int`.
    pub int_t: TypeId,
    /// `bool`.
    pub bool_t: TypeId,
    /// The empty result tuple.
    pub void_t: TypeId,
    /// The empty interface.
    pub iface_t: TypeId,
    /// The universe `error` type.
    pub err_t: TypeId,
    /// The named source type `app.Secret`.
    pub secret_t: TypeId,
    /// `*app.Secret`.
    pub secret_ptr_t: TypeId,
    /// Index of package `app`.
    pub app: usize,
    /// Index of package `lib`.
    pub lib: usize,
    /// External `lib.Sink(interface{})`.
    pub sink: FuncId,
    /// External `lib.Sanitize(interface{}) interface{}`.
    pub sanitize: FuncId,
}

impl Fixture {
    /// Builds the fixture vocabulary.
    #[must_use]
    pub fn new() -> Fixture {
        let mut pb = ProgramBuilder::new();
        let file = pb.file("app/main.go");
        let str_t = pb.ty_basic(BasicKind::Str);
        let int_t = pb.ty_basic(BasicKind::Int);
        let bool_t = pb.ty_basic(BasicKind::Bool);
        let void_t = pb.ty_tuple(vec![]);
        let iface_t = pb.ty_interface(vec![]);
        let err_iface = pb.ty_interface(vec![]);
        let err_t = pb.ty_named("", "error", err_iface);
        let secret_struct = {
            let f = ProgramBuilder::field("data", str_t, "");
            pb.ty_struct(vec![f])
        };
        let secret_t = pb.ty_named("app", "Secret", secret_struct);
        let secret_ptr_t = pb.ty_pointer(secret_t);

        let app = pb.package("app");
        let lib = pb.package("lib");
        let sink = pb.external_function(
            lib,
            "Sink",
            None,
            Signature { params: vec![iface_t], results: vec![], variadic: false },
        );
        let sanitize = pb.external_function(
            lib,
            "Sanitize",
            None,
            Signature { params: vec![iface_t], results: vec![iface_t], variadic: false },
        );

        Fixture {
            pb,
            file,
            str_t,
            int_t,
            bool_t,
            void_t,
            iface_t,
            err_t,
            secret_t,
            secret_ptr_t,
            app,
            lib,
            sink,
            sanitize,
        }
    }

    /// The compiled matchers for [`FIXTURE_CONFIG`].
    ///
    /// # Panics
    ///
    /// Panics if the embedded fixture configuration fails to parse.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn matchers() -> Matchers {
        let doc: ConfigDoc = serde_json::from_str(FIXTURE_CONFIG).unwrap();
        doc.compile().unwrap()
    }

    /// Finishes the program and runs the analyzer with no suppressions.
    ///
    /// # Panics
    ///
    /// Panics if analysis fails.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn analyze(self) -> Vec<Finding> {
        let program = self.pb.finish();
        let analyzer = TaintAnalyzer::new(Self::matchers());
        analyzer
            .analyze_program(&program, &SuppressionMap::new(), &CancelToken::new())
            .unwrap()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture::new()
    }
}
