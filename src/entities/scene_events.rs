//! Notifications emitted by the slide engine.
//!
//! # Ordering
//!
//! One slide transition flushes its events in this order:
//! 1. [`PropertyChangedEvent`]s from rollback (properties the old slide set
//!    and the new one does not)
//! 2. [`PropertyChangedEvent`]s from applying master + new slide changes
//! 3. [`ObjectVisibilityChangedEvent`]s
//! 4. [`PropertyChangedEvent`]s from animation sampling
//! 5. [`SlidePlayerStateChangedEvent`] / [`SlidePlayerPositionChangedEvent`]
//! 6. [`CurrentSlideChangedEvent`]
//!
//! Re-setting the slide that is already current emits no
//! `CurrentSlideChangedEvent` and, since nothing changes, no property or
//! visibility events either.
//!
//! Decks are identified by their master slide.

use crate::core::player::PlayerState;

use super::attrs::AttrValue;
use super::node::ObjectId;

// === Deck / slide ===

/// A deck moved to a different slide.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentSlideChangedEvent {
    pub deck: ObjectId,
    pub old_slide: Option<ObjectId>,
    pub new_slide: ObjectId,
}

/// Objects, changes or tracks of a slide were edited at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct SlideContentChangedEvent {
    pub slide: ObjectId,
}

// === Objects ===

/// Render layer must tag the object visible/invisible.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectVisibilityChangedEvent {
    pub object: ObjectId,
    pub visible: bool,
}

/// A live property value changed.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChangedEvent {
    pub object: ObjectId,
    pub property: String,
    pub value: AttrValue,
}

/// Object spawned into the scene at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeAddedEvent {
    pub object: ObjectId,
    pub parent: Option<ObjectId>,
}

/// Object destroyed at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRemovedEvent {
    pub object: ObjectId,
}

// === Players ===

#[derive(Clone, Debug, PartialEq)]
pub struct SlidePlayerStateChangedEvent {
    pub deck: ObjectId,
    pub state: PlayerState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlidePlayerPositionChangedEvent {
    pub deck: ObjectId,
    /// Milliseconds on the current slide timeline
    pub position: f64,
}
