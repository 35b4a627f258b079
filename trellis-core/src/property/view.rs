//! Update Views
//!
//! A node's update sees its inputs read-only and its outputs write-only
//! (plus read-back). These views wrap the node's property trees and resolve
//! dotted paths, reporting failures as plain messages so an update function
//! can forward them with `?`.

use super::tree::PropertyTree;
use super::value::{PropertyValue, Value};

/// Read access to a node's input tree during its update.
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    tree: Option<&'a PropertyTree>,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(tree: Option<&'a PropertyTree>) -> Self {
        Self { tree }
    }

    fn tree(&self) -> Result<&'a PropertyTree, String> {
        self.tree.ok_or_else(|| "node has no inputs".to_string())
    }

    /// Raw value of the input leaf at `path`.
    pub fn value(&self, path: &str) -> Result<&'a Value, String> {
        let tree = self.tree()?;
        let slot = tree.find(path).map_err(|e| format!("input '{path}': {e}"))?;
        tree.value(slot).map_err(|e| format!("input '{path}': {e}"))
    }

    /// Typed value of the input leaf at `path`.
    pub fn get<T: PropertyValue>(&self, path: &str) -> Result<T, String> {
        let value = self.value(path)?;
        T::from_value(value).ok_or_else(|| {
            format!("input '{path}' is {}, not {}", value.kind(), T::KIND)
        })
    }

    /// Whether the input leaf at `path` was written since the last update.
    pub fn was_set(&self, path: &str) -> bool {
        self.tree
            .and_then(|tree| tree.find(path).ok().map(|slot| tree.was_set(slot)))
            .unwrap_or(false)
    }
}

/// Write access to a node's output tree during its update.
pub struct Outputs<'a> {
    tree: Option<&'a mut PropertyTree>,
}

impl<'a> Outputs<'a> {
    pub(crate) fn new(tree: Option<&'a mut PropertyTree>) -> Self {
        Self { tree }
    }

    /// Write the output leaf at `path`.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), String> {
        let tree = self
            .tree
            .as_deref_mut()
            .ok_or_else(|| "node has no outputs".to_string())?;
        let slot = tree.find(path).map_err(|e| format!("output '{path}': {e}"))?;
        tree.set_value(slot, value.into())
            .map_err(|e| format!("output '{path}': {e}"))
    }

    /// Typed read-back of the output leaf at `path`.
    pub fn get<T: PropertyValue>(&self, path: &str) -> Result<T, String> {
        let tree = self
            .tree
            .as_deref()
            .ok_or_else(|| "node has no outputs".to_string())?;
        let slot = tree.find(path).map_err(|e| format!("output '{path}': {e}"))?;
        let value = tree.value(slot).map_err(|e| format!("output '{path}': {e}"))?;
        T::from_value(value).ok_or_else(|| {
            format!("output '{path}' is {}, not {}", value.kind(), T::KIND)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKind, TypeSpec};

    #[test]
    fn views_resolve_paths_and_types() {
        let mut inputs = PropertyTree::build(&TypeSpec::structure([(
            "name",
            TypeSpec::leaf(PropertyKind::String),
        )]))
        .unwrap();
        let slot = inputs.find("name").unwrap();
        inputs.set_value(slot, Value::from("abc")).unwrap();

        let mut outputs = PropertyTree::build(&TypeSpec::structure([(
            "len",
            TypeSpec::leaf(PropertyKind::Int32),
        )]))
        .unwrap();

        let read = Inputs::new(Some(&inputs));
        let mut write = Outputs::new(Some(&mut outputs));

        let name: String = read.get("name").unwrap();
        assert!(read.was_set("name"));
        assert!(read.get::<i32>("name").is_err());
        assert!(read.value("missing").is_err());

        write.set("len", name.len() as i32).unwrap();
        assert!(write.set("len", 1.0f32).is_err());
        assert_eq!(write.get::<i32>("len").unwrap(), 3);
    }

    #[test]
    fn absent_trees_report_errors() {
        let read = Inputs::new(None);
        let mut write = Outputs::new(None);
        assert!(read.get::<bool>("x").is_err());
        assert!(!read.was_set("x"));
        assert!(write.set("x", true).is_err());
    }
}
