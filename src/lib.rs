//! SceneDeck - slide and timeline runtime for declarative presentations
//!
//! Re-exports all modules for use by the binary target.

// Runtime engine (players, slides, visibility, events)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;

pub use core::event_bus::{downcast_event, BoxedEvent, EventBus};
pub use core::scene_manager::SceneManager;
pub use entities::{AttrValue, Attrs, ObjectId, Presentation, PresentationDoc};
