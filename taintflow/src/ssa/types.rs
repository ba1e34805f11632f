//! The interned type table shared by a whole SSA program.
//!
//! Types are immutable once interned and referenced by [`TypeId`]. The table
//! is part of the program dump, so everything here serializes.

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Index of a type in the program's [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Built-in scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicKind {
    /// Boolean.
    Bool,
    /// Signed integer (all widths collapse here).
    Int,
    /// Unsigned integer.
    Uint,
    /// Floating point.
    Float,
    /// String.
    Str,
    /// Byte (alias of an 8-bit unsigned, kept distinct for display).
    Byte,
}

impl BasicKind {
    fn display(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Uint => "uint",
            BasicKind::Float => "float64",
            BasicKind::Str => "string",
            BasicKind::Byte => "byte",
        }
    }
}

/// A single struct field: name, type and the raw declaration tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    /// Field name.
    pub name: CompactString,
    /// Field type.
    pub ty: TypeId,
    /// Raw tag text, e.g. `levee:"source"`. Empty when untagged.
    #[serde(default)]
    pub tag: CompactString,
}

/// A function signature: parameter and result types plus the variadic marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Parameter types, in order. The receiver is not part of the signature.
    pub params: Vec<TypeId>,
    /// Result types, in order.
    pub results: Vec<TypeId>,
    /// True when the final parameter is variadic (declared as a slice).
    #[serde(default)]
    pub variadic: bool,
}

/// One method of an interface declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceMethod {
    /// Method name.
    pub name: CompactString,
    /// Method signature (receiver excluded).
    pub sig: Signature,
}

/// The type constructors the analyzer distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Scalar.
    Basic(BasicKind),
    /// A declared named type.
    Named {
        /// Declaring package path. Empty for universe types such as `error`.
        package: CompactString,
        /// Declared name.
        name: CompactString,
        /// The underlying type.
        underlying: TypeId,
    },
    /// Pointer to the element type.
    Pointer(TypeId),
    /// Slice of the element type.
    Slice(TypeId),
    /// Fixed-size array.
    Array {
        /// Element type.
        elem: TypeId,
        /// Declared length.
        len: u64,
    },
    /// Map from key to value.
    Map {
        /// Key type.
        key: TypeId,
        /// Value type.
        value: TypeId,
    },
    /// Channel of the element type.
    Chan(TypeId),
    /// Anonymous struct.
    Struct {
        /// Fields in declaration order.
        fields: Vec<StructField>,
    },
    /// Interface; only the method set is retained.
    Interface {
        /// Declared methods.
        methods: Vec<InterfaceMethod>,
    },
    /// Result tuple of a multi-valued call. Empty for no results.
    Tuple(Vec<TypeId>),
    /// First-class function type.
    Func(Signature),
}

/// Interning table for [`Type`] values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeTable {
    types: Vec<Type>,
    #[serde(skip)]
    index: FxHashMap<Type, TypeId>,
}

impl TypeTable {
    /// Interns a type, returning the id of an equal existing entry when present.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if self.index.len() != self.types.len() {
            self.rebuild_index();
        }
        if let Some(&id) = self.index.get(&ty) {
            return id;
        }
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(ty.clone());
        self.index.insert(ty, id);
        id
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), TypeId(u32::try_from(i).unwrap_or(u32::MAX))))
            .collect();
    }

    /// Returns the type for an id.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// Number of interned types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when no types are interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Follows a pointer one level; other types are returned unchanged.
    #[must_use]
    pub fn deref(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Pointer(elem) => *elem,
            _ => id,
        }
    }

    /// Resolves named-type chains down to the structural type.
    #[must_use]
    pub fn underlying(&self, mut id: TypeId) -> TypeId {
        while let Type::Named { underlying, .. } = self.get(id) {
            id = *underlying;
        }
        id
    }

    /// True for interface types (through named wrappers).
    #[must_use]
    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.get(self.underlying(id)), Type::Interface { .. })
    }

    /// The `(package, name)` pair of a named type, if the id names one.
    #[must_use]
    pub fn named_parts(&self, id: TypeId) -> Option<(&str, &str)> {
        match self.get(id) {
            Type::Named { package, name, .. } => Some((package.as_str(), name.as_str())),
            _ => None,
        }
    }

    /// True for types that share storage by reference: pointers, slices,
    /// maps, channels and interfaces. Used by the conservative default for
    /// unknown external calls.
    #[must_use]
    pub fn is_reference_like(&self, id: TypeId) -> bool {
        matches!(
            self.get(self.underlying(id)),
            Type::Pointer(_) | Type::Slice(_) | Type::Map { .. } | Type::Chan(_) | Type::Interface { .. }
        )
    }

    /// Renders a type with unqualified names, as used by signature erasure.
    #[must_use]
    pub fn short_name(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Basic(kind) => kind.display().to_owned(),
            Type::Named { name, .. } => name.to_string(),
            Type::Pointer(elem) => format!("*{}", self.short_name(*elem)),
            Type::Slice(elem) => format!("[]{}", self.short_name(*elem)),
            Type::Array { elem, len } => format!("[{len}]{}", self.short_name(*elem)),
            Type::Map { key, value } => {
                format!("map[{}]{}", self.short_name(*key), self.short_name(*value))
            }
            Type::Chan(elem) => format!("chan {}", self.short_name(*elem)),
            Type::Struct { .. } => "struct".to_owned(),
            Type::Interface { .. } => "interface".to_owned(),
            Type::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|t| self.short_name(*t)).collect();
                format!("({})", parts.join(", "))
            }
            Type::Func(_) => "func".to_owned(),
        }
    }

    /// Erases a signature to `(T0, T1)(R0, R1)` with unqualified type names,
    /// so interface-implementing methods can be matched structurally.
    #[must_use]
    pub fn erase_signature(&self, sig: &Signature) -> String {
        let render = |ids: &[TypeId]| {
            let parts: Vec<String> = ids.iter().map(|t| self.short_name(*t)).collect();
            parts.join(", ")
        };
        format!("({})({})", render(&sig.params), render(&sig.results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedups_equal_types() {
        let mut tt = TypeTable::default();
        let a = tt.intern(Type::Basic(BasicKind::Int));
        let b = tt.intern(Type::Basic(BasicKind::Int));
        assert_eq!(a, b);
        assert_eq!(tt.len(), 1);
    }

    #[test]
    fn erasure_uses_unqualified_names() {
        let mut tt = TypeTable::default();
        let byte = tt.intern(Type::Basic(BasicKind::Byte));
        let bytes = tt.intern(Type::Slice(byte));
        let int = tt.intern(Type::Basic(BasicKind::Int));
        let iface = tt.intern(Type::Interface { methods: Vec::new() });
        let err = tt.intern(Type::Named {
            package: CompactString::const_new(""),
            name: CompactString::const_new("error"),
            underlying: iface,
        });
        let sig = Signature {
            params: vec![bytes],
            results: vec![int, err],
            variadic: false,
        };
        assert_eq!(tt.erase_signature(&sig), "([]byte)(int, error)");
    }
}
