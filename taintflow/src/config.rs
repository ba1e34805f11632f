//! Analysis configuration: which types are sources, which calls are sinks,
//! sanitizers, propagators, and which functions are excluded from analysis.
//!
//! The document is JSON or TOML (sniffed by extension). All regex fields are
//! unanchored unless the pattern anchors itself; an empty pattern matches
//! everything. Patterns compile once at load time; a bad pattern is a fatal
//! configuration error.

use crate::errors::{Error, Result};
use crate::ssa::{Function, Type, TypeId, TypeTable};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A source pattern: package and type name, with an optional field pattern
/// restricting the source to matching fields of the type.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SourcePattern {
    /// Package path pattern.
    #[serde(default, rename = "PackageRE")]
    pub package: String,
    /// Type name pattern.
    #[serde(default, rename = "TypeRE")]
    pub type_name: String,
    /// Field name pattern; empty means the whole type is the source.
    #[serde(default, rename = "FieldRE")]
    pub field: String,
}

/// A call pattern: package, receiver type and function name.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CallPattern {
    /// Package path pattern.
    #[serde(default, rename = "PackageRE")]
    pub package: String,
    /// Receiver type pattern; matches the empty string for plain functions.
    #[serde(default, rename = "TypeRE")]
    pub receiver: String,
    /// Function or method name pattern.
    #[serde(default, rename = "MethodRE")]
    pub method: String,
}

/// A struct-tag pattern marking fields as sources.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FieldTagPattern {
    /// Tag key, e.g. `levee`.
    #[serde(default, rename = "Key")]
    pub key: String,
    /// Tag value to look for under the key.
    #[serde(default, rename = "Val")]
    pub val: String,
}

/// The configuration document as written by the user.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigDoc {
    /// Source type/field patterns.
    #[serde(default, rename = "Sources")]
    pub sources: Vec<SourcePattern>,
    /// Sink call patterns.
    #[serde(default, rename = "Sinks")]
    pub sinks: Vec<CallPattern>,
    /// Sanitizer call patterns.
    #[serde(default, rename = "Sanitizers")]
    pub sanitizers: Vec<CallPattern>,
    /// Propagator call patterns.
    #[serde(default, rename = "Propagators")]
    pub propagators: Vec<CallPattern>,
    /// Struct tags marking source fields.
    #[serde(default, rename = "FieldTags")]
    pub field_tags: Vec<FieldTagPattern>,
    /// Functions excluded from analysis and summarization.
    #[serde(default, rename = "Exclude")]
    pub exclude: Vec<CallPattern>,
}

impl ConfigDoc {
    /// Loads a configuration document from a file, by extension:
    /// `.toml` parses as TOML, anything else as JSON.
    pub fn from_path(path: &Path) -> Result<ConfigDoc> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if path.extension().is_some_and(|e| e == "toml") {
            toml::from_str(&text).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        } else {
            serde_json::from_str(&text).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }

    /// Compiles every pattern. Fails with the first bad regex.
    pub fn compile(&self) -> Result<Matchers> {
        Ok(Matchers {
            sources: self
                .sources
                .iter()
                .map(SourceMatcher::compile)
                .collect::<Result<Vec<_>>>()?,
            sinks: compile_calls(&self.sinks)?,
            sanitizers: compile_calls(&self.sanitizers)?,
            propagators: compile_calls(&self.propagators)?,
            excluded: compile_calls(&self.exclude)?,
            field_tags: self
                .field_tags
                .iter()
                .map(|t| (t.key.clone(), t.val.clone()))
                .collect(),
        })
    }
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Regex {
        pattern: pattern.to_owned(),
        source: Box::new(source),
    })
}

fn compile_calls(patterns: &[CallPattern]) -> Result<Vec<CallMatcher>> {
    patterns.iter().map(CallMatcher::compile).collect()
}

/// A compiled source pattern.
#[derive(Debug)]
pub struct SourceMatcher {
    package: Regex,
    type_name: Regex,
    field: Regex,
    has_field: bool,
}

impl SourceMatcher {
    fn compile(p: &SourcePattern) -> Result<SourceMatcher> {
        Ok(SourceMatcher {
            package: compile_regex(&p.package)?,
            type_name: compile_regex(&p.type_name)?,
            field: compile_regex(&p.field)?,
            has_field: !p.field.is_empty(),
        })
    }

    fn matches_type(&self, package: &str, name: &str) -> bool {
        !self.has_field && self.package.is_match(package) && self.type_name.is_match(name)
    }

    fn matches_field(&self, package: &str, name: &str, field: &str) -> bool {
        self.has_field
            && self.package.is_match(package)
            && self.type_name.is_match(name)
            && self.field.is_match(field)
    }
}

/// A compiled call pattern.
#[derive(Debug)]
pub struct CallMatcher {
    package: Regex,
    receiver: Regex,
    method: Regex,
}

impl CallMatcher {
    fn compile(p: &CallPattern) -> Result<CallMatcher> {
        Ok(CallMatcher {
            package: compile_regex(&p.package)?,
            receiver: compile_regex(&p.receiver)?,
            method: compile_regex(&p.method)?,
        })
    }

    fn matches(&self, package: &str, receiver: &str, method: &str) -> bool {
        self.package.is_match(package)
            && self.receiver.is_match(receiver)
            && self.method.is_match(method)
    }
}

/// How a configured propagator introduces its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatorKind {
    /// The call's result is the source.
    TaintsResult,
    /// The call formats data into its first argument (a writer); that
    /// argument is the source.
    TaintsFirstArg,
}

/// The compiled predicate set consumed by the engine.
#[derive(Debug)]
pub struct Matchers {
    sources: Vec<SourceMatcher>,
    sinks: Vec<CallMatcher>,
    sanitizers: Vec<CallMatcher>,
    propagators: Vec<CallMatcher>,
    excluded: Vec<CallMatcher>,
    field_tags: Vec<(String, String)>,
}

impl Matchers {
    /// True when the type is a source: a matching concrete named type, a
    /// named struct carrying a source field, or a container inheriting
    /// sourceness from its element/value type. Interfaces never qualify.
    #[must_use]
    pub fn is_source_type(&self, types: &TypeTable, ty: TypeId) -> bool {
        let mut seen = FxHashSet::default();
        self.source_type_inner(types, ty, &mut seen)
    }

    fn source_type_inner(
        &self,
        types: &TypeTable,
        ty: TypeId,
        seen: &mut FxHashSet<TypeId>,
    ) -> bool {
        if !seen.insert(ty) {
            return false;
        }
        match types.get(ty) {
            Type::Named { package, name, underlying } => {
                if types.is_interface(*underlying) {
                    return false;
                }
                if self.sources.iter().any(|m| m.matches_type(package, name)) {
                    return true;
                }
                if let Type::Struct { fields } = types.get(types.underlying(*underlying)) {
                    for (i, _) in fields.iter().enumerate() {
                        if self.is_source_field(types, ty, i) {
                            return true;
                        }
                    }
                }
                self.source_type_inner(types, *underlying, seen)
            }
            Type::Pointer(elem) | Type::Slice(elem) | Type::Chan(elem) => {
                self.source_type_inner(types, *elem, seen)
            }
            Type::Array { elem, .. } => self.source_type_inner(types, *elem, seen),
            Type::Map { value, .. } => self.source_type_inner(types, *value, seen),
            _ => false,
        }
    }

    /// True when field `field_idx` of the named type `named` is a source
    /// field, by struct tag or by a configured field pattern.
    #[must_use]
    pub fn is_source_field(&self, types: &TypeTable, named: TypeId, field_idx: usize) -> bool {
        let Some((package, name)) = types.named_parts(named) else {
            return false;
        };
        let under = types.underlying(named);
        let Type::Struct { fields } = types.get(under) else {
            return false;
        };
        let Some(field) = fields.get(field_idx) else {
            return false;
        };
        if self
            .field_tags
            .iter()
            .any(|(key, val)| tag_matches(&field.tag, key, val))
        {
            return true;
        }
        self.sources
            .iter()
            .any(|m| m.matches_field(package, name, &field.name))
    }

    /// True when any field of the named struct type is a source field.
    #[must_use]
    pub fn struct_has_source_field(&self, types: &TypeTable, named: TypeId) -> bool {
        let under = types.underlying(named);
        match types.get(under) {
            Type::Struct { fields } => (0..fields.len()).any(|i| self.is_source_field(types, named, i)),
            _ => false,
        }
    }

    /// True when the function matches a sink pattern.
    #[must_use]
    pub fn is_sink(&self, func: &Function) -> bool {
        Self::match_fn(&self.sinks, func)
    }

    /// True when the function matches a sanitizer pattern.
    #[must_use]
    pub fn is_sanitizer(&self, func: &Function) -> bool {
        Self::match_fn(&self.sanitizers, func)
    }

    /// True when the function is excluded from analysis.
    #[must_use]
    pub fn is_excluded(&self, func: &Function) -> bool {
        Self::match_fn(&self.excluded, func)
    }

    /// Classifies a configured propagator callee, or `None` when the function
    /// matches no propagator pattern. A matched callee with no results and at
    /// least one parameter writes formatted data into its first argument.
    #[must_use]
    pub fn propagator_kind(&self, func: &Function) -> Option<PropagatorKind> {
        if !Self::match_fn(&self.propagators, func) {
            return None;
        }
        if func.sig.results.is_empty() && !func.sig.params.is_empty() {
            Some(PropagatorKind::TaintsFirstArg)
        } else {
            Some(PropagatorKind::TaintsResult)
        }
    }

    fn match_fn(patterns: &[CallMatcher], func: &Function) -> bool {
        let receiver = func.receiver.as_deref().unwrap_or("");
        patterns
            .iter()
            .any(|m| m.matches(&func.package, receiver, &func.name))
    }

    /// Verifies the sink/sanitizer disjointness invariant over a program.
    /// Called by the driver before analysis begins.
    pub fn check_disjoint(&self, functions: &[Function]) -> Result<()> {
        for func in functions {
            if self.is_sink(func) && self.is_sanitizer(func) {
                return Err(Error::Config(format!(
                    "`{}` matches both sink and sanitizer patterns",
                    func.canonical_name()
                )));
            }
        }
        Ok(())
    }
}

/// Matches a declaration tag against a configured key/value pair.
///
/// The tag is scanned for `key:"..."`; the quoted value is split on commas
/// and whitespace and any resulting token may equal `val`.
fn tag_matches(tag: &str, key: &str, val: &str) -> bool {
    let mut rest = tag;
    let needle = format!("{key}:\"");
    while let Some(start) = rest.find(&needle) {
        let body = &rest[start + needle.len()..];
        let Some(end) = body.find('"') else {
            return false;
        };
        if body[..end]
            .split(|c: char| c == ',' || c.is_whitespace())
            .any(|tok| tok == val)
        {
            return true;
        }
        rest = &body[end + 1..];
    }
    false
}
