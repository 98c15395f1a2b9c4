//! Deferred navigation/playback requests.
//!
//! Event callbacks cannot call back into the scene manager while it is
//! flushing a transition. They push a [`Command`] onto a [`CommandQueue`]
//! handle instead; the manager drains the queue once the in-flight
//! transition's notifications have all been delivered.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::entities::attrs::AttrValue;
use crate::entities::node::ObjectId;
use crate::entities::slide::SlideRef;

/// One queued request. Decks are addressed by owner or master slide.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetSlide { deck: ObjectId, slide: SlideRef },
    NextSlide { deck: ObjectId, wrap: bool },
    PreviousSlide { deck: ObjectId, wrap: bool },
    RestartSlide { deck: ObjectId },
    GoToSlide { path: String, next: bool, wrap: bool },
    GoToTime { path: String, seconds: f64 },
    Play { deck: ObjectId },
    Pause { deck: ObjectId },
    Stop { deck: ObjectId },
    Seek { deck: ObjectId, position: f64 },
    SetProperty { object: ObjectId, property: String, value: AttrValue },
}

/// Shared FIFO of commands. Clones share the same channel.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        // Both ends live in `self`, so the channel is never disconnected
        let _ = self.tx.send(command);
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<Command> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}
