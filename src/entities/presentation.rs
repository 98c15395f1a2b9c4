//! Presentation: the explicit context every runtime operation receives.
//!
//! Holds the object arena, the event bus and the string id index. There are
//! no process-wide registries; the scene manager gets `&mut Presentation`
//! for every call.
//!
//! Element paths address objects from the scene root:
//! - `"Scene.Layer.Component"` - dotted display names, root name optional
//! - `"#button"` - document id

use std::collections::HashMap;

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::core::event_bus::EventBus;

use super::attrs::AttrValue;
use super::graph::SceneGraph;
use super::node::{GraphObject, ObjectId};
use super::node_kind::{SceneNode, SlideContainer};

#[derive(Debug)]
pub struct Presentation {
    pub uuid: Uuid,
    pub name: String,
    pub graph: SceneGraph,
    pub bus: EventBus,
    root: ObjectId,
    ids: HashMap<String, ObjectId>,
}

impl Presentation {
    /// Empty presentation with a bare Scene root.
    pub fn new(name: impl Into<String>) -> Self {
        let root = GraphObject::new("scene", "Scene", SceneNode::default());
        let mut ids = HashMap::new();
        let mut graph = SceneGraph::new();
        let id = graph.insert(root);
        ids.insert("scene".to_string(), id);
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            graph,
            bus: EventBus::new(),
            root: id,
            ids,
        }
    }

    /// Presentation rooted at a prepared Scene object.
    pub fn with_root(name: impl Into<String>, root: GraphObject) -> Result<Self> {
        if root.kind.as_slide().is_some() {
            bail!("Presentation root '{}' cannot be a slide", root.id);
        }
        let mut graph = SceneGraph::new();
        let key = root.id.clone();
        let id = graph.insert(root);
        let mut ids = HashMap::new();
        ids.insert(key, id);
        Ok(Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            graph,
            bus: EventBus::new(),
            root: id,
            ids,
        })
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    // === Registration ===

    /// Insert an object, linked under `parent` or as a detached root.
    /// Duplicate document ids are an error.
    pub fn register(&mut self, parent: Option<ObjectId>, object: GraphObject) -> Result<ObjectId> {
        if self.ids.contains_key(&object.id) {
            bail!("Duplicate object id '{}'", object.id);
        }
        let key = object.id.clone();
        let id = match parent {
            Some(p) => self.graph.insert_child(p, object)?,
            None => self.graph.insert(object),
        };
        self.ids.insert(key, id);
        Ok(id)
    }

    /// Register `master` as the master slide of a Scene or Component.
    pub fn attach_master_slide(&mut self, owner: ObjectId, master: GraphObject) -> Result<ObjectId> {
        if !master.kind.is_slide() {
            bail!("Master '{}' is not a slide", master.id);
        }
        let Some(owner_obj) = self.graph.get(owner) else {
            bail!("Unknown slide owner {}", owner);
        };
        if owner_obj.kind.master_slide().is_some() {
            bail!("Object '{}' already has a master slide", owner_obj.id);
        }
        let master_id = self.register(None, master)?;
        let accepted = self
            .graph
            .get_mut(owner)
            .map(|o| o.kind.set_master_slide(master_id))
            .unwrap_or(false);
        if !accepted {
            self.destroy(master_id);
            bail!("Object {} cannot own a slide deck", owner);
        }
        Ok(master_id)
    }

    /// Remove a subtree and forget its ids. Returns the destroyed handles.
    pub fn destroy(&mut self, id: ObjectId) -> Vec<ObjectId> {
        let removed = self.graph.remove(id);
        if !removed.is_empty() {
            self.ids.retain(|_, v| !removed.contains(v));
        }
        removed
    }

    // === Lookup ===

    pub fn object_by_id(&self, id: &str) -> Option<ObjectId> {
        self.ids.get(id).copied().filter(|h| self.graph.contains(*h))
    }

    /// Resolve an element path (see module docs).
    pub fn resolve_path(&self, path: &str) -> Option<ObjectId> {
        if let Some(id) = path.strip_prefix('#') {
            return self.object_by_id(id);
        }
        let root_name = self.graph.get(self.root)?.name.as_str();
        let mut segments = path.split('.').filter(|s| !s.is_empty()).peekable();
        if segments.peek() == Some(&root_name) {
            segments.next();
        }
        let mut cursor = self.root;
        for segment in segments {
            cursor = self
                .graph
                .children(cursor)
                .iter()
                .copied()
                .find(|c| self.graph.get(*c).is_some_and(|o| o.name == segment))?;
        }
        Some(cursor)
    }

    /// Master slide owned by `owner` (Scene or Component).
    pub fn master_of(&self, owner: ObjectId) -> Option<ObjectId> {
        self.graph
            .get(owner)
            .and_then(|o| o.kind.master_slide())
            .filter(|m| self.graph.contains(*m))
    }

    /// Every deck owner in the scene tree, pre-order (outer decks first).
    pub fn deck_owners(&self) -> Vec<ObjectId> {
        self.graph
            .descendants(self.root)
            .into_iter()
            .filter(|id| self.master_of(*id).is_some())
            .collect()
    }

    // === Property passthrough ===

    pub fn get_property(&self, id: ObjectId, path: &str) -> Option<AttrValue> {
        self.graph.property(id, path)
    }

    /// Returns true if the stored value changed.
    pub fn set_property(&mut self, id: ObjectId, path: &str, value: AttrValue) -> bool {
        self.graph.set_property(id, path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::node_kind::{ComponentNode, LayerNode, ModelNode};
    use crate::entities::slide::SlideNode;

    fn sample() -> (Presentation, ObjectId, ObjectId, ObjectId) {
        let mut p = Presentation::new("demo");
        let root = p.root();
        let layer = p.register(Some(root), GraphObject::new("layer", "Layer", LayerNode)).unwrap();
        let comp = p
            .register(Some(layer), GraphObject::new("comp", "Button", ComponentNode::default()))
            .unwrap();
        let cube = p.register(Some(comp), GraphObject::new("cube", "Cube", ModelNode)).unwrap();
        (p, layer, comp, cube)
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (mut p, layer, _, _) = sample();
        let dup = GraphObject::new("cube", "Other", ModelNode);
        assert!(p.register(Some(layer), dup).is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let (p, layer, comp, cube) = sample();
        assert_eq!(p.resolve_path("Scene.Layer"), Some(layer));
        assert_eq!(p.resolve_path("Layer.Button"), Some(comp));
        assert_eq!(p.resolve_path("Scene.Layer.Button.Cube"), Some(cube));
        assert_eq!(p.resolve_path("#cube"), Some(cube));
        assert_eq!(p.resolve_path("Scene.Nope"), None);
        assert_eq!(p.resolve_path("#nope"), None);
    }

    #[test]
    fn test_master_slides_and_deck_owners() {
        let (mut p, _, comp, _) = sample();
        let scene_master = p
            .attach_master_slide(p.root(), GraphObject::new("m0", "Master", SlideNode::default()))
            .unwrap();
        let comp_master = p
            .attach_master_slide(comp, GraphObject::new("m1", "Master", SlideNode::default()))
            .unwrap();

        assert_eq!(p.master_of(p.root()), Some(scene_master));
        assert_eq!(p.master_of(comp), Some(comp_master));
        assert_eq!(p.deck_owners(), vec![p.root(), comp]);

        // Second master and non-slide masters are refused
        let again = GraphObject::new("m2", "Master", SlideNode::default());
        assert!(p.attach_master_slide(comp, again).is_err());
    }

    #[test]
    fn test_destroy_forgets_ids() {
        let (mut p, layer, _, cube) = sample();
        let removed = p.destroy(layer);
        assert_eq!(removed.len(), 3);
        assert!(p.object_by_id("cube").is_none());
        assert!(p.get_property(cube, "opacity").is_none());
    }
}
