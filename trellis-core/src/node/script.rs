//! Script Nodes
//!
//! A script node runs a user-provided update function over a declared
//! interface. Definitions are registered on the engine under a unique name;
//! nodes refer to their definition by that name, which is also what gets
//! persisted.
//!
//! # Failure
//!
//! The update function returns `Err(message)` to signal failure. Whatever it
//! wrote to its outputs before failing stays written.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::StructuralError;
use crate::property::{Inputs, Outputs, PropertyTree, TypeSpec};

/// The update function of a script.
pub type ScriptFn = dyn Fn(&Inputs<'_>, &mut Outputs<'_>) -> Result<(), String> + Send + Sync;

/// A named script: interface plus update function.
#[derive(Clone)]
pub struct ScriptDefinition {
    name: String,
    inputs: TypeSpec,
    outputs: TypeSpec,
    run: Arc<ScriptFn>,
}

impl ScriptDefinition {
    /// Create a new script definition.
    ///
    /// Both interfaces must be structs; they become the node's input and
    /// output roots.
    pub fn new<F>(name: impl Into<String>, inputs: TypeSpec, outputs: TypeSpec, run: F) -> Self
    where
        F: Fn(&Inputs<'_>, &mut Outputs<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            inputs,
            outputs,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &TypeSpec {
        &self.inputs
    }

    pub fn outputs(&self) -> &TypeSpec {
        &self.outputs
    }

    fn validate(&self) -> Result<(), StructuralError> {
        if self.name.is_empty() {
            return Err(StructuralError::InvalidInterface(
                "script name must not be empty".to_string(),
            ));
        }
        for (label, spec) in [("inputs", &self.inputs), ("outputs", &self.outputs)] {
            if !matches!(spec, TypeSpec::Struct(_)) {
                return Err(StructuralError::InvalidInterface(format!(
                    "script '{}' {label} must be a struct",
                    self.name
                )));
            }
            spec.validate().map_err(StructuralError::InvalidInterface)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ScriptDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptDefinition")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Script definitions known to an engine.
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    definitions: IndexMap<String, ScriptDefinition>,
}

impl ScriptRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Names must be unique.
    pub fn register(&mut self, definition: ScriptDefinition) -> Result<(), StructuralError> {
        definition.validate()?;
        if self.definitions.contains_key(definition.name()) {
            return Err(StructuralError::DuplicateScript(definition.name));
        }
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Get a definition by name.
    pub fn get(&self, name: &str) -> Option<&ScriptDefinition> {
        self.definitions.get(name)
    }

    /// Names of all registered definitions, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

/// Node state of a script instance.
#[derive(Clone)]
pub struct ScriptNode {
    definition: ScriptDefinition,
}

impl ScriptNode {
    pub(crate) fn new(definition: ScriptDefinition) -> Self {
        Self { definition }
    }

    /// Name of the definition this node runs.
    pub fn definition_name(&self) -> &str {
        self.definition.name()
    }

    pub(crate) fn update(
        &self,
        inputs: Option<&PropertyTree>,
        outputs: Option<&mut PropertyTree>,
    ) -> Result<(), String> {
        let inputs = Inputs::new(inputs);
        let mut outputs = Outputs::new(outputs);
        (self.definition.run)(&inputs, &mut outputs)
    }
}

impl fmt::Debug for ScriptNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScriptNode")
            .field(&self.definition.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyKind, Value};

    fn doubler() -> ScriptDefinition {
        ScriptDefinition::new(
            "double",
            TypeSpec::structure([("x", TypeSpec::leaf(PropertyKind::Int32))]),
            TypeSpec::structure([("y", TypeSpec::leaf(PropertyKind::Int32))]),
            |inputs, outputs| {
                let x: i32 = inputs.get("x")?;
                outputs.set("y", x * 2)
            },
        )
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = ScriptRegistry::new();
        registry.register(doubler()).unwrap();
        assert_eq!(
            registry.register(doubler()).unwrap_err(),
            StructuralError::DuplicateScript("double".to_string())
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), ["double"]);
    }

    #[test]
    fn registry_rejects_non_struct_interfaces() {
        let mut registry = ScriptRegistry::new();
        let bad = ScriptDefinition::new(
            "bad",
            TypeSpec::leaf(PropertyKind::Float),
            TypeSpec::empty(),
            |_, _| Ok(()),
        );
        assert!(matches!(
            registry.register(bad),
            Err(StructuralError::InvalidInterface(_))
        ));
    }

    #[test]
    fn update_runs_definition() {
        let definition = doubler();
        let mut inputs = PropertyTree::build(definition.inputs()).unwrap();
        let mut outputs = PropertyTree::build(definition.outputs()).unwrap();
        inputs.set_value(inputs.find("x").unwrap(), Value::Int32(21)).unwrap();

        let node = ScriptNode::new(definition);
        node.update(Some(&inputs), Some(&mut outputs)).unwrap();
        assert_eq!(outputs.value(outputs.find("y").unwrap()).unwrap(), &Value::Int32(42));
    }
}
