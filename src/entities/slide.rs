//! Slide payload: visibility membership, property changes, animation tracks
//! and play-mode metadata.
//!
//! A slide is a [`GraphObject`](super::node::GraphObject) of kind `Slide`.
//! The master slide of a deck is the parent of the deck's numbered slides;
//! its content is active whenever any of its children is.
//!
//! All object references here are membership, not ownership: removing an
//! object from the graph must purge it from every slide ([`SlideNode::purge`]).

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::animation::{AnimationTrack, KeyFrame};
use super::attrs::Attrs;
use super::changes::ChangeList;
use super::node::ObjectId;
use super::node_kind::{Animatable, Renderable, SlideContainer};

/// What happens when the slide timeline reaches its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayMode {
    #[default]
    StopAtEnd,
    Looping,
    /// Bounce between 0 and duration until stopped
    PingPong,
    /// One bounce, then stop at 0
    Ping,
    /// Stop, then switch to the play-through target
    PlayThroughTo,
}

/// Player state on slide entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InitialPlayState {
    #[default]
    Play,
    Stop,
}

/// Slide addressed by position in its deck or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlideRef {
    Index(usize),
    Name(String),
}

/// Target of `PlayMode::PlayThroughTo`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayThrough {
    #[default]
    Next,
    Previous,
    Slide(SlideRef),
}

#[derive(Debug, Clone, Default)]
pub struct SlideNode {
    objects: IndexSet<ObjectId>,
    changes: IndexMap<ObjectId, ChangeList>,
    animations: Vec<AnimationTrack>,
    pub play_mode: PlayMode,
    pub initial_play_state: InitialPlayState,
    play_through: PlayThrough,
    play_through_explicit: bool,
    /// Explicit timeline length in ms; overrides the track-derived duration
    pub duration: Option<f64>,
}

impl Renderable for SlideNode {
    fn renders(&self) -> bool {
        false
    }

    fn default_properties(&self) -> Attrs {
        Attrs::new()
    }
}

impl Animatable for SlideNode {
    fn animatable(&self) -> bool {
        false
    }
}

impl SlideContainer for SlideNode {}

impl SlideNode {
    pub fn new(play_mode: PlayMode, initial_play_state: InitialPlayState) -> Self {
        Self {
            play_mode,
            initial_play_state,
            ..Self::default()
        }
    }

    // === Play metadata ===

    pub fn play_through(&self) -> &PlayThrough {
        &self.play_through
    }

    /// False when the target is the implicit default (`Next`).
    pub fn play_through_is_explicit(&self) -> bool {
        self.play_through_explicit
    }

    pub fn set_play_through(&mut self, target: PlayThrough) {
        self.play_through = target;
        self.play_through_explicit = true;
    }

    /// Timeline length: explicit duration, else the last key of every track
    /// that counts toward duration.
    pub fn computed_duration(&self) -> f64 {
        if let Some(d) = self.duration {
            return d.max(0.0);
        }
        self.animations
            .iter()
            .filter(|t| t.counts_toward_duration())
            .map(AnimationTrack::duration)
            .fold(0.0, f64::max)
    }

    // === Objects ===

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().copied()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains(&id)
    }

    /// Returns false if already a member.
    pub fn add_object(&mut self, id: ObjectId) -> bool {
        self.objects.insert(id)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        self.objects.shift_remove(&id)
    }

    // === Property changes ===

    pub fn property_changes(&self) -> impl Iterator<Item = (ObjectId, &ChangeList)> {
        self.changes.iter().map(|(id, list)| (*id, list))
    }

    pub fn changes_for(&self, target: ObjectId) -> Option<&ChangeList> {
        self.changes.get(&target)
    }

    /// Merge changes for a target (later values win).
    pub fn add_property_changes(&mut self, target: ObjectId, list: ChangeList) {
        self.changes.entry(target).or_default().extend(list);
    }

    pub fn remove_property_changes(&mut self, target: ObjectId) -> Option<ChangeList> {
        self.changes.shift_remove(&target)
    }

    // === Animations ===

    pub fn animations(&self) -> &[AnimationTrack] {
        &self.animations
    }

    pub fn animation(&self, target: ObjectId, property: &str) -> Option<&AnimationTrack> {
        self.animations.iter().find(|t| t.is(target, property))
    }

    /// Add a track, replacing an existing one with the same identity in
    /// place. Returns true if a track was replaced.
    pub fn add_animation(&mut self, track: AnimationTrack) -> bool {
        if let Some(existing) = self
            .animations
            .iter_mut()
            .find(|t| t.is(track.target, &track.property))
        {
            *existing = track;
            true
        } else {
            self.animations.push(track);
            false
        }
    }

    pub fn remove_animation(&mut self, target: ObjectId, property: &str) -> Option<AnimationTrack> {
        let pos = self.animations.iter().position(|t| t.is(target, property))?;
        Some(self.animations.remove(pos))
    }

    /// Replace the keys of an existing track. Returns false if no such track.
    pub fn set_animation_keyframes(
        &mut self,
        target: ObjectId,
        property: &str,
        keyframes: Vec<KeyFrame>,
    ) -> bool {
        match self.animations.iter_mut().find(|t| t.is(target, property)) {
            Some(track) => {
                track.set_keyframes(keyframes);
                true
            }
            None => false,
        }
    }

    // === Aggregates ===

    /// Every `(object, property path)` this slide writes, changes first.
    pub fn touched_paths(&self) -> Vec<(ObjectId, String)> {
        let mut out: IndexSet<(ObjectId, String)> = IndexSet::new();
        for (id, list) in &self.changes {
            for change in list.iter() {
                out.insert((*id, change.name.clone()));
            }
        }
        for track in &self.animations {
            out.insert((track.target, track.property.clone()));
        }
        out.into_iter().collect()
    }

    /// Drop every reference to `id`. Returns true if anything was removed.
    pub fn purge(&mut self, id: ObjectId) -> bool {
        let mut removed = self.objects.shift_remove(&id);
        removed |= self.changes.shift_remove(&id).is_some();
        let before = self.animations.len();
        self.animations.retain(|t| t.target != id);
        removed || self.animations.len() != before
    }
}
