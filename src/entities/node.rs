//! GraphObject - base record for every node in the scene and slide graphs.
//!
//! Objects live in the [`SceneGraph`](super::graph::SceneGraph) arena and are
//! addressed by [`ObjectId`] handles. Parent/child links are handle lists
//! maintained by the graph; nothing here owns another object.
//!
//! Each object carries:
//! - `attrs` - live property values, mutated by the slide engine
//! - `defaults` - construction-time snapshot used as the rollback floor
//! - an opaque `attached` slot owned by the render layer

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::attrs::{AttrValue, Attrs};
use super::node_kind::{KindTag, ObjectKind, Renderable};

/// Stable generational handle into the scene graph arena.
///
/// A handle whose object was destroyed never resolves again, even if the
/// slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ObjectId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Single node of the presentation graph.
pub struct GraphObject {
    /// Document id, unique per presentation
    pub id: String,
    /// Display name (used by element paths)
    pub name: String,
    pub kind: ObjectKind,
    /// Live property values
    pub attrs: Attrs,
    defaults: Attrs,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
    attached: Option<Box<dyn Any>>,
}

impl fmt::Debug for GraphObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.tag())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("attached", &self.attached.is_some())
            .finish()
    }
}

impl GraphObject {
    /// New object with its kind's default properties.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<ObjectKind>) -> Self {
        let kind = kind.into();
        let attrs = kind.default_properties();
        Self {
            id: id.into(),
            name: name.into(),
            defaults: attrs.clone(),
            attrs,
            kind,
            parent: None,
            children: Vec::new(),
            attached: None,
        }
    }

    /// Builder-style property assignment (before the object is registered).
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.set_path(key, value.into());
        self
    }

    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Freeze current properties as the construction-time defaults.
    pub fn snapshot_defaults(&mut self) {
        self.defaults = self.attrs.clone();
    }

    pub fn defaults(&self) -> &Attrs {
        &self.defaults
    }

    /// Value a property falls back to when no slide defines it: the
    /// construction snapshot first, then the kind's built-in default.
    pub fn default_for(&self, path: &str) -> Option<AttrValue> {
        self.defaults
            .get_path(path)
            .or_else(|| self.kind.default_properties().get_path(path))
    }

    // === Render-layer side table ===

    pub fn attached(&self) -> Option<&dyn Any> {
        self.attached.as_deref()
    }

    pub fn attached_mut(&mut self) -> Option<&mut dyn Any> {
        self.attached.as_deref_mut()
    }

    pub fn set_attached(&mut self, data: Box<dyn Any>) {
        self.attached = Some(data);
    }

    pub fn take_attached(&mut self) -> Option<Box<dyn Any>> {
        self.attached.take()
    }
}
