//! Property Trees
//!
//! Typed, possibly nested value containers owned by a node's input and
//! output roots.
//!
//! - `value`: property kinds, leaf values, and typed access
//! - `types`: `TypeSpec`, the declared shape of a tree
//! - `tree`: `PropertyTree`, the flat slot-addressed storage
//! - `view`: read/write views handed to node updates

mod tree;
mod types;
mod value;
mod view;

pub use tree::PropertyTree;
pub use types::{TypeSpec, MAX_PROPERTIES};
pub use value::{PropertyKind, PropertyValue, TreeValue, Value};
pub use view::{Inputs, Outputs};
