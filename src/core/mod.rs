//! Runtime engine - players, slide application, visibility, animation.
//!
//! Independent of any renderer: everything observable goes out through the
//! [`EventBus`].

pub mod animator;
pub mod commands;
pub mod event_bus;
pub mod player;
pub mod scene_manager;
pub mod visibility;

pub use animator::AnimationManager;
pub use commands::{Command, CommandQueue};
pub use event_bus::EventBus;
pub use player::{PlayerState, SlidePlayer};
pub use scene_manager::SceneManager;
