//! Interface Declarations
//!
//! A `TypeSpec` describes the shape of a property tree before it exists.
//! Node kinds declare their input and output interfaces with it, and the
//! property tree is built from it once, at node creation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::value::PropertyKind;

/// Most properties a single tree may hold, root included.
pub const MAX_PROPERTIES: usize = 1 << 20;

/// Declared shape of a property subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpec {
    /// A single value.
    Leaf(PropertyKind),
    /// Named children. Order is significant and preserved.
    Struct(Vec<(String, TypeSpec)>),
    /// A fixed number of elements sharing one shape.
    Array(usize, Box<TypeSpec>),
}

impl TypeSpec {
    /// A leaf of the given kind.
    pub fn leaf(kind: PropertyKind) -> Self {
        Self::Leaf(kind)
    }

    /// A struct built from `(name, spec)` pairs.
    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeSpec)>,
        S: Into<String>,
    {
        Self::Struct(fields.into_iter().map(|(n, t)| (n.into(), t)).collect())
    }

    /// An array of `len` elements shaped like `element`.
    pub fn array(len: usize, element: TypeSpec) -> Self {
        Self::Array(len, Box::new(element))
    }

    /// An empty struct.
    pub fn empty() -> Self {
        Self::Struct(Vec::new())
    }

    /// The interface of a scene node binding.
    pub fn node_binding() -> Self {
        Self::structure([
            ("visibility", Self::leaf(PropertyKind::Bool)),
            ("translation", Self::leaf(PropertyKind::Vec3f)),
            ("rotation", Self::leaf(PropertyKind::Vec3f)),
            ("scaling", Self::leaf(PropertyKind::Vec3f)),
        ])
    }

    /// The kind of the root property this spec produces.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Leaf(kind) => *kind,
            Self::Struct(_) => PropertyKind::Struct,
            Self::Array(..) => PropertyKind::Array,
        }
    }

    /// Check that this spec can be turned into a property tree.
    ///
    /// Leaves must name a leaf kind, struct field names must be non-empty and
    /// unique, arrays must have at least one element, and the whole tree may
    /// hold at most `MAX_PROPERTIES` properties.
    pub fn validate(&self) -> Result<(), String> {
        self.validate_at("")?;
        match self.property_count() {
            Some(count) if count <= MAX_PROPERTIES => Ok(()),
            _ => Err(format!(
                "interface declares more than {MAX_PROPERTIES} properties"
            )),
        }
    }

    /// Number of properties this spec expands to, root included.
    /// `None` if the count overflows `usize`.
    pub fn property_count(&self) -> Option<usize> {
        match self {
            Self::Leaf(_) => Some(1),
            Self::Struct(fields) => fields
                .iter()
                .try_fold(1usize, |total, (_, field)| total.checked_add(field.property_count()?)),
            Self::Array(len, element) => len
                .checked_mul(element.property_count()?)?
                .checked_add(1),
        }
    }

    fn validate_at(&self, path: &str) -> Result<(), String> {
        match self {
            Self::Leaf(kind) if !kind.is_leaf() => Err(format!(
                "'{path}' declares container kind {kind} without children"
            )),
            Self::Leaf(_) => Ok(()),
            Self::Struct(fields) => {
                let mut seen = HashSet::new();
                for (name, field) in fields {
                    if name.is_empty() {
                        return Err(format!("'{path}' has a field with an empty name"));
                    }
                    if name.contains('.') {
                        return Err(format!("field name '{name}' must not contain '.'"));
                    }
                    if !seen.insert(name.as_str()) {
                        return Err(format!("'{path}' declares field '{name}' twice"));
                    }
                    field.validate_at(&join(path, name))?;
                }
                Ok(())
            }
            Self::Array(0, _) => Err(format!("array '{path}' must have at least one element")),
            Self::Array(_, element) => element.validate_at(&join(path, "[]")),
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
