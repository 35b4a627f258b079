//! Scene State
//!
//! A minimal external object model that binding nodes write into. Each
//! object is a named bag of values keyed by dotted property path.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::StructuralError;
use crate::property::Value;

/// Identifier of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneObjectId(u64);

impl SceneObjectId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SceneObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One object of the scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    name: String,
    properties: IndexMap<String, Value>,
}

impl SceneObject {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value stored at `path`, if any.
    pub fn property(&self, path: &str) -> Option<&Value> {
        self.properties.get(path)
    }

    /// All stored values, in first-write order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The set of scene objects owned by an engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneState {
    objects: IndexMap<SceneObjectId, SceneObject>,
    next_id: u64,
}

impl SceneState {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its ID.
    pub fn create_object(&mut self, name: impl Into<String>) -> SceneObjectId {
        let id = SceneObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            SceneObject {
                name: name.into(),
                properties: IndexMap::new(),
            },
        );
        id
    }

    /// Remove an object. Bindings to it fail on their next write.
    pub fn remove_object(&mut self, id: SceneObjectId) -> Option<SceneObject> {
        self.objects.shift_remove(&id)
    }

    /// Get an object by ID.
    pub fn object(&self, id: SceneObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Whether the object exists.
    pub fn contains(&self, id: SceneObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Store `value` at `path` on an object.
    pub fn set(
        &mut self,
        id: SceneObjectId,
        path: impl Into<String>,
        value: Value,
    ) -> Result<(), StructuralError> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(StructuralError::UnknownSceneObject(id.0))?;
        object.properties.insert(path.into(), value);
        Ok(())
    }

    /// Value stored at `path` on an object.
    pub fn get(&self, id: SceneObjectId, path: &str) -> Option<&Value> {
        self.objects.get(&id)?.property(path)
    }

    /// Get the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene has no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
