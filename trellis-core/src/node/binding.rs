//! Binding Nodes
//!
//! A binding forwards values into a scene object. It has inputs only; on
//! each update it copies every input leaf that was written since its last
//! update to the object, keyed by the leaf's dotted path. Leaves that were
//! not touched are not forwarded, so state changed on the object by other
//! means is left alone.

use crate::error::StructuralError;
use crate::property::PropertyTree;
use crate::scene::{SceneObjectId, SceneState};

/// Node state of a binding.
#[derive(Debug, Clone)]
pub struct BindingNode {
    object: SceneObjectId,
}

impl BindingNode {
    pub(crate) fn new(object: SceneObjectId) -> Self {
        Self { object }
    }

    /// The scene object this binding writes to.
    pub fn object(&self) -> SceneObjectId {
        self.object
    }

    /// Seed the binding's inputs from the object's current state.
    ///
    /// Only leaves whose path exists on the object with a matching kind are
    /// written. Set flags stay lowered: nothing was touched by a caller.
    pub(crate) fn initialize_inputs(
        &self,
        inputs: &mut PropertyTree,
        scene: &SceneState,
    ) -> Result<(), StructuralError> {
        if !scene.contains(self.object) {
            return Err(StructuralError::UnknownSceneObject(self.object.raw()));
        }
        let leaves: Vec<u32> = inputs.leaves().collect();
        for slot in leaves {
            let path = inputs.path(slot)?;
            if let Some(value) = scene.get(self.object, &path) {
                if value.kind() == inputs.kind(slot)? {
                    inputs.set_value(slot, value.clone())?;
                }
            }
        }
        inputs.clear_set_flags();
        Ok(())
    }

    pub(crate) fn update(
        &self,
        inputs: Option<&PropertyTree>,
        scene: &mut SceneState,
    ) -> Result<(), String> {
        let Some(inputs) = inputs else {
            return Ok(());
        };
        for slot in inputs.set_leaves() {
            let path = inputs.path(slot).map_err(|e| e.to_string())?;
            let value = inputs.value(slot).map_err(|e| e.to_string())?.clone();
            scene
                .set(self.object, path, value)
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}
