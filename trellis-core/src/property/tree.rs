//! Property Trees
//!
//! A `PropertyTree` is the typed value container behind one of a node's two
//! roots (inputs or outputs).
//!
//! # Layout
//!
//! The tree is stored flat: every property is an entry in a `Vec`, addressed
//! by its slot. Slot 0 is the root, and children are always allocated after
//! their parent, so iterating slots in order visits the tree depth-first in
//! declaration order. The shape is fixed when the tree is built; only leaf
//! values and flags change afterwards.
//!
//! # Set Flags
//!
//! Every leaf carries a "set since last tick" flag. It is raised by any
//! successful write (a direct set or a link propagation) and cleared by the
//! engine once the owning node has consumed its inputs.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::StructuralError;

use super::types::TypeSpec;
use super::value::{PropertyKind, Value};

/// Storage for one property of the tree.
#[derive(Debug, Clone)]
struct PropertyEntry {
    /// Field name, or the element index for array children.
    name: String,
    kind: PropertyKind,
    parent: Option<u32>,
    data: PropertyData,
}

#[derive(Debug, Clone)]
enum PropertyData {
    Leaf {
        value: Value,
        /// Explicitly written since the owning node last consumed its inputs.
        set: bool,
    },
    Struct(IndexMap<String, u32>),
    Array(SmallVec<[u32; 4]>),
}

/// A typed, fixed-shape tree of properties.
#[derive(Debug, Clone)]
pub struct PropertyTree {
    entries: Vec<PropertyEntry>,
}

impl PropertyTree {
    /// Slot of the root property.
    pub const ROOT: u32 = 0;

    /// Build a tree with default leaf values from a declaration.
    pub fn build(spec: &TypeSpec) -> Result<Self, StructuralError> {
        spec.validate().map_err(StructuralError::InvalidInterface)?;
        let mut tree = Self { entries: Vec::new() };
        tree.allocate(spec, String::new(), None);
        Ok(tree)
    }

    fn allocate(&mut self, spec: &TypeSpec, name: String, parent: Option<u32>) -> u32 {
        let slot = self.entries.len() as u32;
        let data = match spec {
            TypeSpec::Leaf(kind) => PropertyData::Leaf {
                // validate() guarantees leaf specs carry leaf kinds
                value: Value::default_for(*kind).unwrap_or(Value::Bool(false)),
                set: false,
            },
            TypeSpec::Struct(_) => PropertyData::Struct(IndexMap::new()),
            TypeSpec::Array(..) => PropertyData::Array(SmallVec::new()),
        };
        self.entries.push(PropertyEntry {
            name,
            kind: spec.kind(),
            parent,
            data,
        });

        match spec {
            TypeSpec::Leaf(_) => {}
            TypeSpec::Struct(fields) => {
                for (field_name, field) in fields {
                    let child = self.allocate(field, field_name.clone(), Some(slot));
                    if let PropertyData::Struct(children) = &mut self.entries[slot as usize].data {
                        children.insert(field_name.clone(), child);
                    }
                }
            }
            TypeSpec::Array(len, element) => {
                for index in 0..*len {
                    let child = self.allocate(element, index.to_string(), Some(slot));
                    if let PropertyData::Array(children) = &mut self.entries[slot as usize].data {
                        children.push(child);
                    }
                }
            }
        }
        slot
    }

    /// Number of properties in the tree, root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree consists of an empty root struct only.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Whether `slot` addresses a property of this tree.
    pub fn contains(&self, slot: u32) -> bool {
        (slot as usize) < self.entries.len()
    }

    fn entry(&self, slot: u32) -> Result<&PropertyEntry, StructuralError> {
        self.entries
            .get(slot as usize)
            .ok_or(StructuralError::UnknownProperty)
    }

    fn entry_mut(&mut self, slot: u32) -> Result<&mut PropertyEntry, StructuralError> {
        self.entries
            .get_mut(slot as usize)
            .ok_or(StructuralError::UnknownProperty)
    }

    /// Kind of the property at `slot`.
    pub fn kind(&self, slot: u32) -> Result<PropertyKind, StructuralError> {
        Ok(self.entry(slot)?.kind)
    }

    /// Name of the property at `slot`. The root is unnamed.
    pub fn name(&self, slot: u32) -> Result<&str, StructuralError> {
        Ok(&self.entry(slot)?.name)
    }

    /// Dotted path from the root to `slot`, e.g. `"items.2.on"`.
    pub fn path(&self, slot: u32) -> Result<String, StructuralError> {
        let mut segments = Vec::new();
        let mut current = Some(slot);
        while let Some(s) = current {
            let entry = self.entry(s)?;
            if entry.parent.is_some() {
                segments.push(entry.name.as_str());
            }
            current = entry.parent;
        }
        segments.reverse();
        Ok(segments.join("."))
    }

    /// Child of a struct by name, or of an array by its decimal index.
    pub fn child(&self, slot: u32, name: &str) -> Result<u32, StructuralError> {
        let entry = self.entry(slot)?;
        let child = match &entry.data {
            PropertyData::Struct(children) => children.get(name).copied(),
            PropertyData::Array(children) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| children.get(i).copied()),
            PropertyData::Leaf { .. } => return Err(StructuralError::NotAContainer(entry.kind)),
        };
        child.ok_or_else(|| StructuralError::NoSuchChild(name.to_string()))
    }

    /// Child by position, for structs (declaration order) and arrays.
    pub fn child_at(&self, slot: u32, index: usize) -> Result<u32, StructuralError> {
        self.children(slot)?
            .get(index)
            .copied()
            .ok_or_else(|| StructuralError::NoSuchChild(index.to_string()))
    }

    /// All children of a container, in order.
    pub fn children(&self, slot: u32) -> Result<SmallVec<[u32; 4]>, StructuralError> {
        let entry = self.entry(slot)?;
        match &entry.data {
            PropertyData::Struct(children) => Ok(children.values().copied().collect()),
            PropertyData::Array(children) => Ok(children.clone()),
            PropertyData::Leaf { .. } => Err(StructuralError::NotAContainer(entry.kind)),
        }
    }

    /// Number of children; zero for leaves.
    pub fn child_count(&self, slot: u32) -> Result<usize, StructuralError> {
        Ok(match &self.entry(slot)?.data {
            PropertyData::Struct(children) => children.len(),
            PropertyData::Array(children) => children.len(),
            PropertyData::Leaf { .. } => 0,
        })
    }

    /// Resolve a dotted path from the root. The empty path is the root itself.
    pub fn find(&self, path: &str) -> Result<u32, StructuralError> {
        if path.is_empty() {
            return Ok(Self::ROOT);
        }
        path.split('.')
            .try_fold(Self::ROOT, |slot, segment| self.child(slot, segment))
    }

    /// Current value of a leaf.
    pub fn value(&self, slot: u32) -> Result<&Value, StructuralError> {
        let entry = self.entry(slot)?;
        match &entry.data {
            PropertyData::Leaf { value, .. } => Ok(value),
            _ => Err(StructuralError::NotALeaf(entry.kind)),
        }
    }

    /// Write a leaf and raise its set flag.
    ///
    /// The value's kind must match the leaf's kind exactly.
    pub fn set_value(&mut self, slot: u32, new_value: Value) -> Result<(), StructuralError> {
        let entry = self.entry_mut(slot)?;
        let kind = entry.kind;
        match &mut entry.data {
            PropertyData::Leaf { value, set } => {
                if new_value.kind() != kind {
                    return Err(StructuralError::TypeMismatch {
                        expected: kind,
                        actual: new_value.kind(),
                    });
                }
                *value = new_value;
                *set = true;
                Ok(())
            }
            _ => Err(StructuralError::NotALeaf(kind)),
        }
    }

    /// Whether the leaf at `slot` was written since flags were last cleared.
    pub fn was_set(&self, slot: u32) -> bool {
        matches!(
            self.entries.get(slot as usize).map(|e| &e.data),
            Some(PropertyData::Leaf { set: true, .. })
        )
    }

    /// Whether any leaf of the tree has its set flag raised.
    pub fn any_set(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.data, PropertyData::Leaf { set: true, .. }))
    }

    /// Slots of all leaves whose set flag is raised, in slot order.
    pub fn set_leaves(&self) -> Vec<u32> {
        self.leaves().filter(|&slot| self.was_set(slot)).collect()
    }

    /// Lower every set flag.
    pub fn clear_set_flags(&mut self) {
        for entry in &mut self.entries {
            if let PropertyData::Leaf { set, .. } = &mut entry.data {
                *set = false;
            }
        }
    }

    /// Slots of all leaves in slot order.
    pub fn leaves(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind.is_leaf())
            .map(|(slot, _)| slot as u32)
    }

    /// All leaf values in slot order.
    pub fn leaf_values(&self) -> Vec<Value> {
        self.entries
            .iter()
            .filter_map(|e| match &e.data {
                PropertyData::Leaf { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Overwrite all leaf values from a list produced by `leaf_values`.
    ///
    /// Set flags are left untouched. Nothing is written unless every value
    /// matches its leaf's kind.
    pub fn restore_leaf_values(&mut self, values: Vec<Value>) -> Result<(), String> {
        let leaves: Vec<u32> = self.leaves().collect();
        if leaves.len() != values.len() {
            return Err(format!(
                "expected {} leaf values, found {}",
                leaves.len(),
                values.len()
            ));
        }
        for (&slot, v) in leaves.iter().zip(&values) {
            let kind = self.entries[slot as usize].kind;
            if v.kind() != kind {
                return Err(format!(
                    "leaf {slot} holds {kind} but saved value is {}",
                    v.kind()
                ));
            }
        }
        for (slot, v) in leaves.into_iter().zip(values) {
            if let PropertyData::Leaf { value, .. } = &mut self.entries[slot as usize].data {
                *value = v;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PropertyTree {
        PropertyTree::build(&TypeSpec::structure([
            ("speed", TypeSpec::leaf(PropertyKind::Float)),
            (
                "nested",
                TypeSpec::structure([
                    ("label", TypeSpec::leaf(PropertyKind::String)),
                    ("count", TypeSpec::leaf(PropertyKind::Int64)),
                ]),
            ),
            ("list", TypeSpec::array(3, TypeSpec::leaf(PropertyKind::Vec2i))),
        ]))
        .unwrap()
    }

    #[test]
    fn build_allocates_children_after_parents() {
        let tree = sample();
        // root, speed, nested, label, count, list, 3 elements
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.kind(PropertyTree::ROOT).unwrap(), PropertyKind::Struct);
        assert_eq!(tree.child_count(PropertyTree::ROOT).unwrap(), 3);
        assert_eq!(tree.leaves().count(), 6);
    }

    #[test]
    fn find_resolves_struct_and_array_paths() {
        let tree = sample();
        let count = tree.find("nested.count").unwrap();
        assert_eq!(tree.kind(count).unwrap(), PropertyKind::Int64);
        assert_eq!(tree.path(count).unwrap(), "nested.count");

        let second = tree.find("list.1").unwrap();
        assert_eq!(tree.name(second).unwrap(), "1");
        assert_eq!(tree.child_at(tree.find("list").unwrap(), 1).unwrap(), second);

        assert!(matches!(
            tree.find("list.3"),
            Err(StructuralError::NoSuchChild(_))
        ));
        assert!(matches!(
            tree.find("speed.x"),
            Err(StructuralError::NotAContainer(PropertyKind::Float))
        ));
    }

    #[test]
    fn struct_children_keep_declaration_order() {
        let tree = sample();
        let names: Vec<_> = tree
            .children(PropertyTree::ROOT)
            .unwrap()
            .into_iter()
            .map(|slot| tree.name(slot).unwrap().to_string())
            .collect();
        assert_eq!(names, ["speed", "nested", "list"]);
    }

    #[test]
    fn set_value_checks_kind_and_raises_flag() {
        let mut tree = sample();
        let speed = tree.find("speed").unwrap();

        let err = tree.set_value(speed, Value::Int32(1)).unwrap_err();
        assert!(matches!(err, StructuralError::TypeMismatch { .. }));
        assert!(!tree.was_set(speed));

        tree.set_value(speed, Value::Float(2.5)).unwrap();
        assert_eq!(tree.value(speed).unwrap(), &Value::Float(2.5));
        assert!(tree.was_set(speed));
        assert_eq!(tree.set_leaves(), vec![speed]);

        tree.clear_set_flags();
        assert!(!tree.any_set());
    }

    #[test]
    fn containers_hold_no_value() {
        let mut tree = sample();
        let nested = tree.find("nested").unwrap();
        assert!(tree.value(nested).is_err());
        assert!(tree.set_value(nested, Value::Bool(true)).is_err());
    }

    #[test]
    fn restore_rejects_mismatched_values_atomically() {
        let mut tree = sample();
        let mut values = tree.leaf_values();
        values[0] = Value::Float(9.0);
        values[1] = Value::Bool(true);
        assert!(tree.restore_leaf_values(values).is_err());
        assert_eq!(tree.value(tree.find("speed").unwrap()).unwrap(), &Value::Float(0.0));

        let mut values = tree.leaf_values();
        values[0] = Value::Float(9.0);
        tree.restore_leaf_values(values).unwrap();
        assert_eq!(tree.value(tree.find("speed").unwrap()).unwrap(), &Value::Float(9.0));
    }
}
