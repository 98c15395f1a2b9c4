//! SceneGraph - generational arena holding every GraphObject.
//!
//! # Structure
//!
//! Two kinds of trees share the arena:
//! - the scene tree (Scene → Layer → Model → Material ...)
//! - one slide tree per deck (master slide → numbered slides)
//!
//! Scene and Component nodes point at their master slide through their
//! kind payload; the slide trees are separate roots.
//!
//! # Invariants
//!
//! - Parent/child links are always mutually consistent.
//! - No cycles: `append_child` refuses to link a node under its own subtree.
//! - `unlink` detaches a subtree and leaves it alive (caller re-links it);
//!   `remove` detaches and destroys it, invalidating every handle inside.

use anyhow::{bail, Result};

use super::attrs::AttrValue;
use super::node::{GraphObject, ObjectId};
use super::slide::SlideNode;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    object: Option<GraphObject>,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a detached object. Any links it carries are cleared.
    pub fn insert(&mut self, mut object: GraphObject) -> ObjectId {
        object.parent = None;
        object.children.clear();
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            ObjectId::new(index, 0)
        }
    }

    /// Insert and link under `parent` in one step.
    pub fn insert_child(&mut self, parent: ObjectId, object: GraphObject) -> Result<ObjectId> {
        if !self.contains(parent) {
            bail!("Parent {} not in graph", parent);
        }
        let id = self.insert(object);
        self.append_child(parent, id)?;
        Ok(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&GraphObject> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GraphObject> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.object.as_mut())
    }

    pub fn slide(&self, id: ObjectId) -> Option<&SlideNode> {
        self.get(id).and_then(|o| o.kind.as_slide())
    }

    pub fn slide_mut(&mut self, id: ObjectId) -> Option<&mut SlideNode> {
        self.get_mut(id).and_then(|o| o.kind.as_slide_mut())
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|o| o.parent)
    }

    /// Children in document order (empty for unknown ids).
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.get(id).map(|o| o.children.as_slice()).unwrap_or(&[])
    }

    /// True if `ancestor` is `id` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Link `child` as last child of `parent`, detaching it from any old parent.
    pub fn append_child(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        if !self.contains(parent) || !self.contains(child) {
            bail!("Cannot link {} under {}: unknown object", child, parent);
        }
        if self.is_ancestor(child, parent) {
            bail!("Cannot link {} under {}: would create a cycle", child, parent);
        }
        self.unlink(child);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Detach a subtree from its parent. The subtree stays alive.
    pub fn unlink(&mut self, id: ObjectId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(c) = self.get_mut(id) {
            c.parent = None;
        }
        true
    }

    /// Detach and destroy a subtree. Returns the destroyed ids, pre-order.
    pub fn remove(&mut self, id: ObjectId) -> Vec<ObjectId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.unlink(id);
        let doomed = self.descendants(id);
        for victim in &doomed {
            let slot = &mut self.slots[victim.index as usize];
            slot.object = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(victim.index);
            self.len -= 1;
        }
        doomed
    }

    /// `id` and everything below it, pre-order, document order.
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// All live objects, arena order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &GraphObject)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.object
                .as_ref()
                .map(|o| (ObjectId::new(i as u32, s.generation), o))
        })
    }

    // === Property access for the slide engine ===

    pub fn property(&self, id: ObjectId, path: &str) -> Option<AttrValue> {
        self.get(id).and_then(|o| o.attrs.get_path(path))
    }

    /// Write a property path. Returns true if the value changed.
    pub fn set_property(&mut self, id: ObjectId, path: &str, value: AttrValue) -> bool {
        self.get_mut(id)
            .map(|o| o.attrs.set_path(path, value))
            .unwrap_or(false)
    }
}
