//! ObjectKind - closed set of graph object kinds.
//!
//! Kind-specific behavior is split into three small capability traits,
//! dispatched over the enum with `enum_dispatch`:
//! - [`Renderable`] - does the render layer draw it, which properties it starts with
//! - [`Animatable`] - may tracks and property changes target it
//! - [`SlideContainer`] - does it own a nested master slide (Scene, Component)

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use super::attrs::{AttrValue, Attrs};
use super::keys::*;
use super::node::ObjectId;
use super::slide::SlideNode;

/// Plain type tag, used by documents and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    Scene,
    Layer,
    Camera,
    Light,
    Model,
    Group,
    Component,
    Text,
    Image,
    DefaultMaterial,
    CustomMaterial,
    ReferencedMaterial,
    Effect,
    Slide,
}

/// Drawn by the render layer; supplies construction defaults.
#[enum_dispatch]
pub trait Renderable {
    /// Whether visibility changes for this kind are reported to the renderer
    fn renders(&self) -> bool {
        true
    }

    /// Properties every object of this kind starts with
    fn default_properties(&self) -> Attrs {
        node_defaults()
    }
}

/// Target of property changes and animation tracks.
#[enum_dispatch]
pub trait Animatable {
    fn animatable(&self) -> bool {
        true
    }
}

/// Owner of a nested slide deck.
#[enum_dispatch]
pub trait SlideContainer {
    fn master_slide(&self) -> Option<ObjectId> {
        None
    }

    /// Attach the deck's master slide. Returns false for kinds without a deck.
    fn set_master_slide(&mut self, _master: ObjectId) -> bool {
        false
    }
}

fn node_defaults() -> Attrs {
    [
        (A_EYEBALL.to_string(), AttrValue::Bool(true)),
        (A_POSITION.to_string(), AttrValue::Vec3([0.0; 3])),
        (A_ROTATION.to_string(), AttrValue::Vec3([0.0; 3])),
        (A_SCALE.to_string(), AttrValue::Vec3([1.0; 3])),
        (A_PIVOT.to_string(), AttrValue::Vec3([0.0; 3])),
        (A_OPACITY.to_string(), AttrValue::Float(100.0)),
    ]
    .into_iter()
    .collect()
}

fn material_defaults() -> Attrs {
    [
        (A_DIFFUSE.to_string(), AttrValue::Vec3([1.0; 3])),
        (A_OPACITY.to_string(), AttrValue::Float(100.0)),
    ]
    .into_iter()
    .collect()
}

fn with(mut attrs: Attrs, key: &str, value: AttrValue) -> Attrs {
    attrs.set(key, value);
    attrs
}

/// Kinds with no payload and stock behavior.
macro_rules! plain_kinds {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            pub struct $name;

            impl Animatable for $name {}
            impl SlideContainer for $name {}
        )*
    };
}

plain_kinds!(
    LayerNode,
    CameraNode,
    LightNode,
    ModelNode,
    GroupNode,
    TextNode,
    ImageNode,
    DefaultMaterialNode,
    CustomMaterialNode,
    ReferencedMaterialNode,
    EffectNode,
);

impl Renderable for LayerNode {}
impl Renderable for GroupNode {}
impl Renderable for EffectNode {
    fn default_properties(&self) -> Attrs {
        with(Attrs::new(), A_EYEBALL, AttrValue::Bool(true))
    }
}

impl Renderable for CameraNode {
    fn default_properties(&self) -> Attrs {
        with(node_defaults(), A_FOV, AttrValue::Float(60.0))
    }
}

impl Renderable for LightNode {
    fn default_properties(&self) -> Attrs {
        with(node_defaults(), A_BRIGHTNESS, AttrValue::Float(100.0))
    }
}

impl Renderable for ModelNode {
    fn default_properties(&self) -> Attrs {
        with(node_defaults(), A_SOURCE_PATH, AttrValue::Str(String::new()))
    }
}

impl Renderable for TextNode {
    fn default_properties(&self) -> Attrs {
        with(node_defaults(), A_TEXT, AttrValue::Str(String::new()))
    }
}

impl Renderable for ImageNode {
    fn default_properties(&self) -> Attrs {
        with(node_defaults(), A_SOURCE_PATH, AttrValue::Str(String::new()))
    }
}

impl Renderable for DefaultMaterialNode {
    fn renders(&self) -> bool {
        false
    }

    fn default_properties(&self) -> Attrs {
        material_defaults()
    }
}

impl Renderable for CustomMaterialNode {
    fn renders(&self) -> bool {
        false
    }

    fn default_properties(&self) -> Attrs {
        material_defaults()
    }
}

impl Renderable for ReferencedMaterialNode {
    fn renders(&self) -> bool {
        false
    }

    fn default_properties(&self) -> Attrs {
        with(Attrs::new(), A_REFERENCED_MATERIAL, AttrValue::Str(String::new()))
    }
}

/// Presentation root. Owns the top-level slide deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneNode {
    pub master: Option<ObjectId>,
}

impl Renderable for SceneNode {
    fn renders(&self) -> bool {
        false
    }

    fn default_properties(&self) -> Attrs {
        with(Attrs::new(), A_EYEBALL, AttrValue::Bool(true))
    }
}

impl Animatable for SceneNode {}

impl SlideContainer for SceneNode {
    fn master_slide(&self) -> Option<ObjectId> {
        self.master
    }

    fn set_master_slide(&mut self, master: ObjectId) -> bool {
        self.master = Some(master);
        true
    }
}

/// Node with its own independently navigable slide deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentNode {
    pub master: Option<ObjectId>,
}

impl Renderable for ComponentNode {}
impl Animatable for ComponentNode {}

impl SlideContainer for ComponentNode {
    fn master_slide(&self) -> Option<ObjectId> {
        self.master
    }

    fn set_master_slide(&mut self, master: ObjectId) -> bool {
        self.master = Some(master);
        true
    }
}

/// Every object kind, with its payload.
#[enum_dispatch(Renderable, Animatable, SlideContainer)]
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Scene(SceneNode),
    Layer(LayerNode),
    Camera(CameraNode),
    Light(LightNode),
    Model(ModelNode),
    Group(GroupNode),
    Component(ComponentNode),
    Text(TextNode),
    Image(ImageNode),
    DefaultMaterial(DefaultMaterialNode),
    CustomMaterial(CustomMaterialNode),
    ReferencedMaterial(ReferencedMaterialNode),
    Effect(EffectNode),
    Slide(SlideNode),
}

impl ObjectKind {
    /// Build an empty payload for a document tag.
    pub fn from_tag(tag: KindTag) -> Self {
        match tag {
            KindTag::Scene => SceneNode::default().into(),
            KindTag::Layer => LayerNode.into(),
            KindTag::Camera => CameraNode.into(),
            KindTag::Light => LightNode.into(),
            KindTag::Model => ModelNode.into(),
            KindTag::Group => GroupNode.into(),
            KindTag::Component => ComponentNode::default().into(),
            KindTag::Text => TextNode.into(),
            KindTag::Image => ImageNode.into(),
            KindTag::DefaultMaterial => DefaultMaterialNode.into(),
            KindTag::CustomMaterial => CustomMaterialNode.into(),
            KindTag::ReferencedMaterial => ReferencedMaterialNode.into(),
            KindTag::Effect => EffectNode.into(),
            KindTag::Slide => SlideNode::default().into(),
        }
    }

    pub fn tag(&self) -> KindTag {
        match self {
            ObjectKind::Scene(_) => KindTag::Scene,
            ObjectKind::Layer(_) => KindTag::Layer,
            ObjectKind::Camera(_) => KindTag::Camera,
            ObjectKind::Light(_) => KindTag::Light,
            ObjectKind::Model(_) => KindTag::Model,
            ObjectKind::Group(_) => KindTag::Group,
            ObjectKind::Component(_) => KindTag::Component,
            ObjectKind::Text(_) => KindTag::Text,
            ObjectKind::Image(_) => KindTag::Image,
            ObjectKind::DefaultMaterial(_) => KindTag::DefaultMaterial,
            ObjectKind::CustomMaterial(_) => KindTag::CustomMaterial,
            ObjectKind::ReferencedMaterial(_) => KindTag::ReferencedMaterial,
            ObjectKind::Effect(_) => KindTag::Effect,
            ObjectKind::Slide(_) => KindTag::Slide,
        }
    }

    pub fn as_slide(&self) -> Option<&SlideNode> {
        match self {
            ObjectKind::Slide(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_slide_mut(&mut self) -> Option<&mut SlideNode> {
        match self {
            ObjectKind::Slide(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_slide(&self) -> bool {
        matches!(self, ObjectKind::Slide(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for tag in [KindTag::Model, KindTag::Component, KindTag::Slide, KindTag::Effect] {
            assert_eq!(ObjectKind::from_tag(tag).tag(), tag);
        }
    }

    #[test]
    fn test_capabilities() {
        let model: ObjectKind = ModelNode.into();
        assert!(model.renders());
        assert!(model.animatable());
        assert!(model.master_slide().is_none());

        let material: ObjectKind = DefaultMaterialNode.into();
        assert!(!material.renders());

        let mut comp: ObjectKind = ComponentNode::default().into();
        let master = ObjectId::new(3, 0);
        assert!(comp.set_master_slide(master));
        assert_eq!(comp.master_slide(), Some(master));

        let slide: ObjectKind = SlideNode::default().into();
        assert!(!slide.renders());
        assert!(!slide.animatable());
    }

    #[test]
    fn test_default_properties_per_kind() {
        let light: ObjectKind = LightNode.into();
        let attrs = light.default_properties();
        assert_eq!(attrs.get_float(A_BRIGHTNESS), Some(100.0));
        assert_eq!(attrs.get_bool(A_EYEBALL), Some(true));
    }
}
