//! Entities - scene data with no runtime behavior of its own.
//!
//! - [`graph`] / [`node`] / [`node_kind`]: the object arena and kinds
//! - [`attrs`] / [`keys`]: property storage and well-known names
//! - [`slide`] / [`changes`] / [`animation`] / [`deck`]: slide content
//! - [`presentation`] / [`document`]: the loaded presentation and its JSON form
//! - [`scene_events`]: notifications emitted by the runtime

pub mod animation;
pub mod attrs;
pub mod changes;
pub mod deck;
pub mod document;
pub mod graph;
pub mod keys;
pub mod node;
pub mod node_kind;
pub mod presentation;
pub mod scene_events;
pub mod slide;

pub use animation::{AnimationTrack, Interpolation, KeyFrame};
pub use attrs::{AttrValue, Attrs};
pub use changes::{ChangeList, PropertyChange};
pub use deck::SlideDeck;
pub use document::PresentationDoc;
pub use graph::SceneGraph;
pub use node::{GraphObject, ObjectId};
pub use node_kind::{KindTag, ObjectKind};
pub use presentation::Presentation;
pub use slide::{InitialPlayState, PlayMode, PlayThrough, SlideNode, SlideRef};
