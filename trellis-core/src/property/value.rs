//! Property Values
//!
//! This module defines the closed set of property kinds and the value type
//! held by leaf properties.
//!
//! There is no implicit conversion between kinds: an `Int32` leaf only ever
//! holds an `i32`, and an `Int64` value is rejected when assigned to it.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Int32,
    Int64,
    Float,
    String,
    Vec2f,
    Vec3f,
    Vec4f,
    Vec2i,
    Vec3i,
    Vec4i,
    /// Named children, in declaration order.
    Struct,
    /// Fixed number of children of one type.
    Array,
}

impl PropertyKind {
    /// Whether a property of this kind holds a value (and may be linked).
    pub fn is_leaf(self) -> bool {
        !matches!(self, Self::Struct | Self::Array)
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A leaf property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    String(String),
    Vec2f([f32; 2]),
    Vec3f([f32; 3]),
    Vec4f([f32; 4]),
    Vec2i([i32; 2]),
    Vec3i([i32; 3]),
    Vec4i([i32; 4]),
}

impl Value {
    /// The kind of leaf this value belongs in.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::Int32(_) => PropertyKind::Int32,
            Self::Int64(_) => PropertyKind::Int64,
            Self::Float(_) => PropertyKind::Float,
            Self::String(_) => PropertyKind::String,
            Self::Vec2f(_) => PropertyKind::Vec2f,
            Self::Vec3f(_) => PropertyKind::Vec3f,
            Self::Vec4f(_) => PropertyKind::Vec4f,
            Self::Vec2i(_) => PropertyKind::Vec2i,
            Self::Vec3i(_) => PropertyKind::Vec3i,
            Self::Vec4i(_) => PropertyKind::Vec4i,
        }
    }

    /// The initial value of a freshly created leaf of `kind`.
    ///
    /// Returns `None` for container kinds.
    pub fn default_for(kind: PropertyKind) -> Option<Self> {
        Some(match kind {
            PropertyKind::Bool => Self::Bool(false),
            PropertyKind::Int32 => Self::Int32(0),
            PropertyKind::Int64 => Self::Int64(0),
            PropertyKind::Float => Self::Float(0.0),
            PropertyKind::String => Self::String(String::new()),
            PropertyKind::Vec2f => Self::Vec2f([0.0; 2]),
            PropertyKind::Vec3f => Self::Vec3f([0.0; 3]),
            PropertyKind::Vec4f => Self::Vec4f([0.0; 4]),
            PropertyKind::Vec2i => Self::Vec2i([0; 2]),
            PropertyKind::Vec3i => Self::Vec3i([0; 3]),
            PropertyKind::Vec4i => Self::Vec4i([0; 4]),
            PropertyKind::Struct | PropertyKind::Array => return None,
        })
    }

    /// Bitwise equality. Unlike `==`, a NaN equals an identical NaN.
    ///
    /// Used to decide whether link propagation actually changed a value.
    pub fn same_as(&self, other: &Value) -> bool {
        fn bits<const N: usize>(a: &[f32; N], b: &[f32; N]) -> bool {
            a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Vec2f(a), Self::Vec2f(b)) => bits(a, b),
            (Self::Vec3f(a), Self::Vec3f(b)) => bits(a, b),
            (Self::Vec4f(a), Self::Vec4f(b)) => bits(a, b),
            _ => self == other,
        }
    }
}

/// Types that can be read out of a leaf with `get::<T>()`.
pub trait PropertyValue: Sized {
    /// The leaf kind this type maps to.
    const KIND: PropertyKind;

    /// Extract `Self` from a value of the matching kind.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_property_value {
    ($ty:ty, $variant:ident) => {
        impl PropertyValue for $ty {
            const KIND: PropertyKind = PropertyKind::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }

        impl From<$ty> for TreeValue {
            fn from(v: $ty) -> Self {
                TreeValue::Leaf(Value::$variant(v))
            }
        }
    };
}

impl_property_value!(bool, Bool);
impl_property_value!(i32, Int32);
impl_property_value!(i64, Int64);
impl_property_value!(f32, Float);
impl_property_value!(String, String);
impl_property_value!([f32; 2], Vec2f);
impl_property_value!([f32; 3], Vec3f);
impl_property_value!([f32; 4], Vec4f);
impl_property_value!([i32; 2], Vec2i);
impl_property_value!([i32; 3], Vec3i);
impl_property_value!([i32; 4], Vec4i);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A value for a whole subtree, used to assign a struct or array at once.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    /// Assign a single leaf.
    Leaf(Value),
    /// Assign named struct children, in the given order.
    Struct(IndexMap<String, TreeValue>),
    /// Assign array elements from index 0 upwards.
    Array(Vec<TreeValue>),
}

impl TreeValue {
    /// Build a struct assignment from `(name, value)` pairs.
    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, TreeValue)>,
        S: Into<String>,
    {
        Self::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for TreeValue {
    fn from(v: Value) -> Self {
        TreeValue::Leaf(v)
    }
}

impl From<&str> for TreeValue {
    fn from(v: &str) -> Self {
        TreeValue::Leaf(Value::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_kinds_are_not_leaves() {
        assert!(PropertyKind::Float.is_leaf());
        assert!(!PropertyKind::Struct.is_leaf());
        assert!(!PropertyKind::Array.is_leaf());
        assert!(Value::default_for(PropertyKind::Array).is_none());
    }

    #[test]
    fn typed_extraction_requires_exact_kind() {
        let v = Value::from(5i32);
        assert_eq!(i32::from_value(&v), Some(5));
        assert_eq!(i64::from_value(&v), None);
        assert_eq!(Value::from(5i64).kind(), PropertyKind::Int64);
    }

    #[test]
    fn defaults_match_kind() {
        for kind in [
            PropertyKind::Bool,
            PropertyKind::String,
            PropertyKind::Vec3i,
            PropertyKind::Vec4f,
        ] {
            assert_eq!(Value::default_for(kind).map(|v| v.kind()), Some(kind));
        }
    }

    #[test]
    fn nan_is_same_as_itself() {
        let a = Value::Float(f32::NAN);
        assert_ne!(a, a.clone());
        assert!(a.same_as(&a.clone()));
        assert!(!Value::Float(0.0).same_as(&Value::Float(-0.0)));
    }
}
