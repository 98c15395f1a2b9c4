//! SceneManager - slide application engine.
//!
//! **Architecture**: like the player, the manager does NOT own the
//! presentation. Every entry point receives `&mut Presentation`; the manager
//! keeps only per-deck runtime state (cursor, player, applied property set)
//! and the last computed visible set.
//!
//! # Slide pipeline
//!
//! Entering, re-entering or refreshing a slide runs, in order:
//! 1. rollback - properties written by the previously applied slides that the
//!    new master + slide pair no longer writes go back to the master value,
//!    else the construction default
//! 2. apply - master changes, then current-slide changes
//! 3. visibility pass over the whole scene
//! 4. animation sampling at the player position
//! 5. player state/position notifications
//! 6. `CurrentSlideChanged` (only when the slide actually changed or was
//!    explicitly restarted)
//!
//! Rollback is driven by the per-deck `applied` set, never by replaying
//! history, so any switch order converges to the same state.
//!
//! # Re-entrancy
//!
//! Events are buffered while a request runs and flushed at its end.
//! Subscribers that want to navigate push onto the [`CommandQueue`]; queued
//! commands run only after the current flush completes.

use std::collections::HashMap;

use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, trace, warn};

use crate::config::RuntimeConfig;
use crate::entities::animation::{AnimationTrack, KeyFrame};
use crate::entities::attrs::{split_channel, AttrValue};
use crate::entities::changes::ChangeList;
use crate::entities::deck::SlideDeck;
use crate::entities::graph::SceneGraph;
use crate::entities::node::{GraphObject, ObjectId};
use crate::entities::node_kind::Animatable;
use crate::entities::presentation::Presentation;
use crate::entities::scene_events::{
    CurrentSlideChangedEvent, NodeAddedEvent, NodeRemovedEvent, PropertyChangedEvent,
    SlideContentChangedEvent, SlidePlayerPositionChangedEvent, SlidePlayerStateChangedEvent,
};
use crate::entities::slide::{PlayThrough, SlideRef};

use super::animator::AnimationManager;
use super::commands::{Command, CommandQueue};
use super::event_bus::BoxedEvent;
use super::player::{Advance, PlayerState, SlidePlayer};
use super::visibility::{self, DeckView};

type PropertyKey = (ObjectId, String);

/// Runtime state of one deck (top-level presentation or one Component).
#[derive(Debug)]
pub struct DeckRuntime {
    owner: ObjectId,
    deck: SlideDeck,
    player: SlidePlayer,
    /// Every property path the active master + slide pair has written
    applied: IndexSet<PropertyKey>,
}

impl DeckRuntime {
    fn new(owner: ObjectId, master: ObjectId) -> Self {
        Self {
            owner,
            deck: SlideDeck::new(master),
            player: SlidePlayer::new(),
            applied: IndexSet::new(),
        }
    }

    /// Scene or Component owning the deck
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn deck(&self) -> &SlideDeck {
        &self.deck
    }

    pub fn player(&self) -> &SlidePlayer {
        &self.player
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlayerSnapshot {
    state: PlayerState,
    position: f64,
}

impl PlayerSnapshot {
    fn of(player: &SlidePlayer) -> Self {
        Self {
            state: player.state(),
            position: player.position(),
        }
    }
}

/// How the pipeline treats the player and the slide-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// A different slide became current
    Fresh,
    /// Same slide entered again on purpose (restart, play-through to self)
    Reentry,
    /// Same slide, state recomputed only
    Refresh,
}

pub struct SceneManager {
    config: RuntimeConfig,
    /// Keyed by master slide
    decks: IndexMap<ObjectId, DeckRuntime>,
    visible: IndexSet<ObjectId>,
    animator: AnimationManager,
    commands: CommandQueue,
    pending: Vec<BoxedEvent>,
    draining: bool,
}

impl std::fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManager")
            .field("decks", &self.decks)
            .field("visible", &self.visible.len())
            .field("pending", &self.pending.len())
            .field("queued_commands", &self.commands.len())
            .finish()
    }
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl SceneManager {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            decks: IndexMap::new(),
            visible: IndexSet::new(),
            animator: AnimationManager::new(),
            commands: CommandQueue::new(),
            pending: Vec::new(),
            draining: false,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Handle for subscribers that need to navigate from a callback.
    pub fn commands(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Build a runtime per deck and enter slide 0 everywhere, outer decks
    /// first.
    pub fn start(&mut self, p: &mut Presentation) {
        self.decks.clear();
        self.visible.clear();
        for owner in p.deck_owners() {
            if let Some(master) = p.master_of(owner) {
                self.decks.insert(master, DeckRuntime::new(owner, master));
            }
        }
        let masters: Vec<ObjectId> = self.decks.keys().copied().collect();
        for master in &masters {
            let count = self.decks[master].deck.slide_count(&p.graph);
            if count > 0 {
                self.switch_to(p, *master, 0, Entry::Refresh);
            } else {
                self.run_pipeline(p, *master, None, Entry::Refresh);
            }
        }
        info!("Scene manager started: {} decks", masters.len());
        self.finish(p);
    }

    // ========== Queries ==========

    /// Resolve a deck by master slide or by owning Scene/Component.
    pub fn deck_key(&self, p: &Presentation, id: ObjectId) -> Option<ObjectId> {
        if self.decks.contains_key(&id) {
            return Some(id);
        }
        p.master_of(id).filter(|m| self.decks.contains_key(m))
    }

    pub fn deck(&self, p: &Presentation, id: ObjectId) -> Option<&DeckRuntime> {
        self.deck_key(p, id).and_then(|m| self.decks.get(&m))
    }

    /// All decks, outer first.
    pub fn decks(&self) -> impl Iterator<Item = (ObjectId, &DeckRuntime)> {
        self.decks.iter().map(|(m, rt)| (*m, rt))
    }

    pub fn current_slide(&self, p: &Presentation, deck: ObjectId) -> Option<ObjectId> {
        self.deck(p, deck).and_then(|rt| rt.deck.current_slide(&p.graph))
    }

    pub fn current_index(&self, p: &Presentation, deck: ObjectId) -> Option<usize> {
        self.deck(p, deck).and_then(|rt| rt.deck.current_index())
    }

    pub fn player(&self, p: &Presentation, deck: ObjectId) -> Option<&SlidePlayer> {
        self.deck(p, deck).map(|rt| &rt.player)
    }

    pub fn is_visible(&self, id: ObjectId) -> bool {
        self.visible.contains(&id)
    }

    /// Visible rendering objects, scene pre-order.
    pub fn visible_objects(&self) -> &IndexSet<ObjectId> {
        &self.visible
    }

    // ========== Navigation ==========

    /// Make slide `index` current. Out-of-range indices are ignored.
    /// Setting the current index again re-applies state without notifying
    /// a slide change.
    pub fn set_current_slide(&mut self, p: &mut Presentation, deck: ObjectId, index: i32) -> bool {
        let Some(master) = self.lookup(p, deck) else {
            return false;
        };
        let accepted = self.switch_to(p, master, index, Entry::Refresh);
        self.finish(p);
        accepted
    }

    pub fn set_current_slide_by_name(&mut self, p: &mut Presentation, deck: ObjectId, name: &str) -> bool {
        self.set_slide_ref(p, deck, &SlideRef::Name(name.to_string()))
    }

    pub fn set_slide_ref(&mut self, p: &mut Presentation, deck: ObjectId, target: &SlideRef) -> bool {
        let Some(master) = self.lookup(p, deck) else {
            return false;
        };
        let Some(index) = self.decks[&master].deck.resolve(&p.graph, target) else {
            warn!("Slide {:?} not found in deck {}", target, master);
            return false;
        };
        let accepted = self.switch_to(p, master, index as i32, Entry::Refresh);
        self.finish(p);
        accepted
    }

    /// Step forward. At the last slide: wrap to 0 if `wrap`, else ignored.
    pub fn next_slide(&mut self, p: &mut Presentation, deck: ObjectId, wrap: bool) -> bool {
        self.step(p, deck, true, wrap)
    }

    /// Step back. At the first slide: wrap to the last if `wrap`, else ignored.
    pub fn previous_slide(&mut self, p: &mut Presentation, deck: ObjectId, wrap: bool) -> bool {
        self.step(p, deck, false, wrap)
    }

    fn step(&mut self, p: &mut Presentation, deck: ObjectId, forward: bool, wrap: bool) -> bool {
        let Some(master) = self.lookup(p, deck) else {
            return false;
        };
        let rt = &self.decks[&master];
        let count = rt.deck.slide_count(&p.graph);
        let target = if forward {
            rt.deck.next_index(&p.graph).or((wrap && count > 0).then_some(0))
        } else {
            rt.deck.prev_index().or((wrap && count > 0).then(|| count - 1))
        };
        let Some(target) = target else {
            debug!("Deck {} at boundary, not moving", master);
            return false;
        };
        let accepted = self.switch_to(p, master, target as i32, Entry::Refresh);
        self.finish(p);
        accepted
    }

    /// Re-enter the current slide: player reset per the slide's initial
    /// play state, full pipeline, slide-changed notification.
    pub fn restart_slide(&mut self, p: &mut Presentation, deck: ObjectId) -> bool {
        let Some(master) = self.lookup(p, deck) else {
            return false;
        };
        let Some(index) = self.decks[&master].deck.current_index() else {
            return false;
        };
        let accepted = self.switch_to(p, master, index as i32, Entry::Reentry);
        self.finish(p);
        accepted
    }

    /// Navigate the deck of the element at `path` (see
    /// [`Presentation::resolve_path`]).
    pub fn go_to_slide(&mut self, p: &mut Presentation, path: &str, next: bool, wrap: bool) -> bool {
        let Some(owner) = self.resolve_deck_path(p, path) else {
            return false;
        };
        self.step(p, owner, next, wrap)
    }

    /// Seek the deck of the element at `path` to `seconds`.
    pub fn go_to_time(&mut self, p: &mut Presentation, path: &str, seconds: f64) -> bool {
        let Some(owner) = self.resolve_deck_path(p, path) else {
            return false;
        };
        self.seek(p, owner, seconds * 1000.0)
    }

    /// Select a slide of a Component's own deck. Works while the component
    /// is hidden; the selection is kept for when it shows again.
    pub fn set_component_slide(&mut self, p: &mut Presentation, component: ObjectId, slide: ObjectId) -> bool {
        let Some(master) = self.deck_key(p, component) else {
            warn!("Object {} has no slide deck", component);
            return false;
        };
        if p.graph.parent(slide) != Some(master) {
            warn!("Slide {} does not belong to the deck of {}", slide, component);
            return false;
        }
        let Some(index) = self.decks[&master].deck.index_of(&p.graph, slide) else {
            return false;
        };
        let accepted = self.switch_to(p, master, index as i32, Entry::Refresh);
        self.finish(p);
        accepted
    }

    fn lookup(&self, p: &Presentation, deck: ObjectId) -> Option<ObjectId> {
        let key = self.deck_key(p, deck);
        if key.is_none() {
            warn!("Unknown slide deck {}", deck);
        }
        key
    }

    fn resolve_deck_path(&self, p: &Presentation, path: &str) -> Option<ObjectId> {
        let Some(id) = p.resolve_path(path) else {
            warn!("Element path '{}' not found", path);
            return None;
        };
        let key = self.deck_key(p, id);
        if key.is_none() {
            warn!("Element '{}' has no slide deck", path);
        }
        key
    }

    // ========== Playback ==========

    pub fn play(&mut self, p: &mut Presentation, deck: ObjectId) -> bool {
        self.transport(p, deck, |player| player.play(), false)
    }

    pub fn pause(&mut self, p: &mut Presentation, deck: ObjectId) -> bool {
        self.transport(p, deck, |player| player.pause(), false)
    }

    pub fn stop(&mut self, p: &mut Presentation, deck: ObjectId) -> bool {
        self.transport(p, deck, |player| player.stop(), false)
    }

    /// Seek to `position` ms. Always notifies the position, even when
    /// stopped or unchanged.
    pub fn seek(&mut self, p: &mut Presentation, deck: ObjectId, position: f64) -> bool {
        self.transport(
            p,
            deck,
            |player| {
                player.seek(position);
                true
            },
            true,
        )
    }

    pub fn set_playback_rate(&mut self, p: &Presentation, deck: ObjectId, rate: f64) -> bool {
        let Some(master) = self.lookup(p, deck) else {
            return false;
        };
        self.decks
            .get_mut(&master)
            .is_some_and(|rt| rt.player.set_playback_rate(rate))
    }

    fn transport(
        &mut self,
        p: &mut Presentation,
        deck: ObjectId,
        op: impl FnOnce(&mut SlidePlayer) -> bool,
        force_position: bool,
    ) -> bool {
        let Some(master) = self.lookup(p, deck) else {
            return false;
        };
        let Some(rt) = self.decks.get_mut(&master) else {
            return false;
        };
        let before = PlayerSnapshot::of(&rt.player);
        let accepted = op(&mut rt.player);
        if accepted {
            if rt.player.position() != before.position {
                self.refresh_visibility(p);
                self.animate(p, master);
            }
            self.push_player_events(master, before, force_position);
        }
        self.finish(p);
        accepted
    }

    /// Advance every playing deck by `dt` ms, handling end-of-timeline per
    /// play mode, then refresh time-dependent state.
    pub fn tick(&mut self, p: &mut Presentation, dt: f64) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let masters: Vec<ObjectId> = self.decks.keys().copied().collect();
        let mut baselines = Vec::with_capacity(masters.len());
        for master in masters {
            let Some(rt) = self.decks.get(&master) else {
                continue;
            };
            let mut before = PlayerSnapshot::of(&rt.player);
            if rt.player.is_playing() {
                before = self.advance_deck(p, master, dt, before);
            }
            baselines.push((master, before));
        }

        self.refresh_visibility(p);
        for (master, before) in &baselines {
            let moved = self
                .decks
                .get(master)
                .is_some_and(|rt| rt.player.position() != before.position);
            if moved {
                self.animate(p, *master);
            }
        }
        for (master, before) in baselines {
            self.push_player_events(master, before, false);
        }
        self.finish(p);
    }

    /// Returns the snapshot later notifications are diffed against.
    fn advance_deck(
        &mut self,
        p: &mut Presentation,
        master: ObjectId,
        dt: f64,
        mut before: PlayerSnapshot,
    ) -> PlayerSnapshot {
        let mut budget = dt;
        let mut hops = 0;
        loop {
            let Some(rt) = self.decks.get_mut(&master) else {
                return before;
            };
            let mode = rt
                .deck
                .current_slide(&p.graph)
                .and_then(|s| p.graph.slide(s))
                .map(|s| s.play_mode)
                .unwrap_or_default();
            match rt.player.advance(budget, mode) {
                Advance::Idle | Advance::Moved | Advance::Finished => return before,
                Advance::PlayThrough => {
                    budget = rt.player.overflow();
                    // The finished slide's last frame and stop go out first
                    self.refresh_visibility(p);
                    self.animate(p, master);
                    self.push_player_events(master, before, false);

                    hops += 1;
                    if hops > self.config.max_play_through_hops {
                        warn!(
                            "Deck {} exceeded {} play-through hops in one tick",
                            master, self.config.max_play_through_hops
                        );
                        return self.snapshot(master).unwrap_or(before);
                    }
                    match self.play_through_target(p, master) {
                        Some(target) => {
                            self.switch_to(p, master, target as i32, Entry::Reentry);
                        }
                        None => debug!("Deck {} play-through target missing, staying", master),
                    }
                    before = self.snapshot(master).unwrap_or(before);
                    let playing = self.decks.get(&master).is_some_and(|rt| rt.player.is_playing());
                    if !playing || budget <= 0.0 {
                        return before;
                    }
                }
            }
        }
    }

    fn play_through_target(&self, p: &Presentation, master: ObjectId) -> Option<usize> {
        let rt = self.decks.get(&master)?;
        let slide = p.graph.slide(rt.deck.current_slide(&p.graph)?)?;
        match slide.play_through() {
            PlayThrough::Next => rt.deck.next_index(&p.graph),
            PlayThrough::Previous => rt.deck.prev_index(),
            PlayThrough::Slide(target) => rt.deck.resolve(&p.graph, target),
        }
    }

    fn snapshot(&self, master: ObjectId) -> Option<PlayerSnapshot> {
        self.decks.get(&master).map(|rt| PlayerSnapshot::of(&rt.player))
    }

    // ========== Property and content edits ==========

    /// Write a live property and notify. Returns true if the value changed.
    pub fn set_object_property(
        &mut self,
        p: &mut Presentation,
        object: ObjectId,
        property: &str,
        value: AttrValue,
    ) -> bool {
        let changed = write_property(p, object, property, value, &mut self.pending);
        if changed && property_affects_visibility(property) {
            self.refresh_visibility(p);
        }
        self.finish(p);
        changed
    }

    /// Insert a new object under `parent`, optionally showing it on `slide`.
    pub fn spawn_object(
        &mut self,
        p: &mut Presentation,
        parent: ObjectId,
        mut object: GraphObject,
        slide: Option<ObjectId>,
    ) -> Result<ObjectId> {
        object.snapshot_defaults();
        let id = p.register(Some(parent), object)?;
        debug!("Spawned {} under {}", id, parent);
        self.pending.push(Box::new(NodeAddedEvent {
            object: id,
            parent: Some(parent),
        }));
        match slide.and_then(|s| p.graph.slide_mut(s)) {
            Some(s) => {
                s.add_object(id);
            }
            None if slide.is_some() => warn!("Spawned {} but slide {:?} not found", id, slide),
            None => {}
        }
        match slide {
            Some(s) if p.graph.slide(s).is_some() => self.content_changed(p, s),
            _ => {
                self.refresh_visibility(p);
                self.finish(p);
            }
        }
        Ok(id)
    }

    /// Destroy an object subtree (and any deck it owns), purging every
    /// slide reference to it.
    pub fn destroy_object(&mut self, p: &mut Presentation, id: ObjectId) -> bool {
        if !p.graph.contains(id) {
            warn!("Cannot destroy {}: not in scene", id);
            return false;
        }
        if id == p.root() {
            warn!("Cannot destroy the scene root");
            return false;
        }
        let owned_masters: Vec<ObjectId> = p
            .graph
            .descendants(id)
            .into_iter()
            .filter_map(|d| p.master_of(d))
            .collect();
        let mut removed = p.destroy(id);
        for master in owned_masters {
            removed.extend(p.destroy(master));
        }
        debug!("Destroyed {} objects under {}", removed.len(), id);

        let slides: Vec<ObjectId> = p
            .graph
            .iter()
            .filter(|(_, o)| o.kind.is_slide())
            .map(|(sid, _)| sid)
            .collect();
        for sid in slides {
            let Some(slide) = p.graph.slide_mut(sid) else {
                continue;
            };
            let mut touched = false;
            for r in &removed {
                touched |= slide.purge(*r);
            }
            if touched {
                self.pending.push(Box::new(SlideContentChangedEvent { slide: sid }));
            }
        }

        self.decks.retain(|master, _| p.graph.contains(*master));
        for rt in self.decks.values_mut() {
            rt.applied.retain(|(o, _)| !removed.contains(o));
            rt.deck.revalidate(&p.graph);
        }
        for r in &removed {
            self.visible.shift_remove(r);
            self.animator.forget(*r);
            self.pending.push(Box::new(NodeRemovedEvent { object: *r }));
        }

        let masters: Vec<ObjectId> = self.decks.keys().copied().collect();
        for master in masters {
            let current = self.decks[&master].deck.current_slide(&p.graph);
            self.run_pipeline(p, master, current, Entry::Refresh);
        }
        self.finish(p);
        true
    }

    pub fn add_object(&mut self, p: &mut Presentation, slide: ObjectId, object: ObjectId) -> bool {
        if !p.graph.contains(object) {
            warn!("Cannot add {} to slide {}: no such object", object, slide);
            return false;
        }
        let added = match p.graph.slide_mut(slide) {
            Some(s) => s.add_object(object),
            None => {
                warn!("Slide {} not found", slide);
                return false;
            }
        };
        if added {
            self.content_changed(p, slide);
        }
        added
    }

    pub fn remove_object(&mut self, p: &mut Presentation, slide: ObjectId, object: ObjectId) -> bool {
        let removed = p.graph.slide_mut(slide).is_some_and(|s| s.remove_object(object));
        if removed {
            self.content_changed(p, slide);
        }
        removed
    }

    /// Merge changes for `target` into `slide`. Takes effect immediately
    /// when the slide is active.
    pub fn add_property_changes(
        &mut self,
        p: &mut Presentation,
        slide: ObjectId,
        target: ObjectId,
        changes: ChangeList,
    ) -> bool {
        if !self.check_target(&p.graph, target, "property changes") {
            return false;
        }
        let Some(s) = p.graph.slide_mut(slide) else {
            warn!("Slide {} not found", slide);
            return false;
        };
        s.add_property_changes(target, changes);
        self.content_changed(p, slide);
        true
    }

    pub fn remove_property_changes(&mut self, p: &mut Presentation, slide: ObjectId, target: ObjectId) -> bool {
        let removed = p
            .graph
            .slide_mut(slide)
            .and_then(|s| s.remove_property_changes(target))
            .is_some();
        if removed {
            self.content_changed(p, slide);
        }
        removed
    }

    /// Add a track (replacing one with the same target and property).
    pub fn add_animation(&mut self, p: &mut Presentation, slide: ObjectId, track: AnimationTrack) -> bool {
        if !self.check_target(&p.graph, track.target, "animation") {
            return false;
        }
        let Some(s) = p.graph.slide_mut(slide) else {
            warn!("Slide {} not found", slide);
            return false;
        };
        if s.add_animation(track) {
            debug!("Replaced animation track on slide {}", slide);
        }
        self.content_changed(p, slide);
        true
    }

    pub fn remove_animation(
        &mut self,
        p: &mut Presentation,
        slide: ObjectId,
        target: ObjectId,
        property: &str,
    ) -> bool {
        let removed = p
            .graph
            .slide_mut(slide)
            .and_then(|s| s.remove_animation(target, property))
            .is_some();
        if removed {
            self.content_changed(p, slide);
        }
        removed
    }

    /// Replace the keys of a dynamic track, keeping its identity.
    pub fn set_animation_keyframes(
        &mut self,
        p: &mut Presentation,
        slide: ObjectId,
        target: ObjectId,
        property: &str,
        keyframes: Vec<KeyFrame>,
    ) -> bool {
        let Some(s) = p.graph.slide_mut(slide) else {
            warn!("Slide {} not found", slide);
            return false;
        };
        if !s.animation(target, property).is_some_and(|t| t.dynamic) {
            warn!("No dynamic track {}:{} on slide {}", target, property, slide);
            return false;
        }
        s.set_animation_keyframes(target, property, keyframes);
        self.content_changed(p, slide);
        true
    }

    fn check_target(&self, graph: &SceneGraph, target: ObjectId, what: &str) -> bool {
        match graph.get(target) {
            Some(obj) if obj.kind.animatable() => true,
            Some(_) => {
                warn!("Object {} cannot take {}", target, what);
                false
            }
            None => {
                warn!("Target {} for {} not found", target, what);
                false
            }
        }
    }

    /// Notify and re-run the owning deck's pipeline for an edited slide.
    fn content_changed(&mut self, p: &mut Presentation, slide: ObjectId) {
        self.pending.push(Box::new(SlideContentChangedEvent { slide }));
        let master = if self.decks.contains_key(&slide) {
            Some(slide)
        } else {
            p.graph.parent(slide).filter(|m| self.decks.contains_key(m))
        };
        match master {
            Some(master) => {
                let current = self.decks[&master].deck.current_slide(&p.graph);
                self.run_pipeline(p, master, current, Entry::Refresh);
            }
            None => self.refresh_visibility(p),
        }
        self.finish(p);
    }

    // ========== Pipeline ==========

    /// Move the cursor and run the pipeline. `on_same` decides how a
    /// request for the current index is treated.
    fn switch_to(&mut self, p: &mut Presentation, master: ObjectId, index: i32, on_same: Entry) -> bool {
        let Some(rt) = self.decks.get_mut(&master) else {
            return false;
        };
        let old = rt.deck.current_slide(&p.graph);
        let Some(transition) = rt.deck.set_current_index(&p.graph, index) else {
            warn!(
                "Slide index {} out of range for deck {} ({} slides)",
                index,
                master,
                rt.deck.slide_count(&p.graph)
            );
            return false;
        };
        let entry = if transition.previous.is_none() {
            Entry::Fresh
        } else if transition.is_reentry() {
            on_same
        } else {
            Entry::Fresh
        };
        self.run_pipeline(p, master, old, entry);
        true
    }

    fn run_pipeline(&mut self, p: &mut Presentation, master: ObjectId, old: Option<ObjectId>, entry: Entry) {
        let Some(rt) = self.decks.get(&master) else {
            return;
        };
        let new_slide = rt.deck.current_slide(&p.graph);
        let before = PlayerSnapshot::of(&rt.player);
        let active: Vec<ObjectId> = std::iter::once(master).chain(new_slide).collect();

        let mut touched: IndexSet<PropertyKey> = IndexSet::new();
        for slide in active.iter().filter_map(|s| p.graph.slide(*s)) {
            touched.extend(slide.touched_paths());
        }
        let rollback: Vec<PropertyKey> = rt
            .applied
            .iter()
            .filter(|(obj, path)| !is_covered(&touched, *obj, path))
            .cloned()
            .collect();

        // 1. rollback
        for (obj, path) in rollback {
            match rollback_value(p, master, obj, &path) {
                Some(value) => {
                    write_property(p, obj, &path, value, &mut self.pending);
                }
                None => {
                    if p.graph.get_mut(obj).is_some_and(|o| o.attrs.remove_path(&path)) {
                        trace!("Removed {}:{} on rollback", obj, path);
                    }
                }
            }
        }

        // 2. apply
        for ((obj, path), value) in collect_changes(&p.graph, &active) {
            let Some(target) = p.graph.get(obj) else {
                warn!("Property change target {} missing, skipping {}", obj, path);
                continue;
            };
            if !target.kind.animatable() {
                warn!("Object {} does not take property changes, skipping {}", obj, path);
                continue;
            }
            write_property(p, obj, &path, value, &mut self.pending);
        }

        let duration = new_slide
            .and_then(|s| p.graph.slide(s))
            .map(|s| s.computed_duration())
            .unwrap_or(0.0);
        let initial = new_slide
            .and_then(|s| p.graph.slide(s))
            .map(|s| s.initial_play_state)
            .unwrap_or(self.config.default_initial_play_state);
        if let Some(rt) = self.decks.get_mut(&master) {
            rt.applied = touched;
            match entry {
                Entry::Fresh | Entry::Reentry => rt.player.enter_slide(duration, initial),
                Entry::Refresh => rt.player.set_duration(duration),
            }
        }

        // 3-5
        self.refresh_visibility(p);
        self.animate(p, master);
        self.push_player_events(master, before, entry != Entry::Refresh);

        // 6
        if entry != Entry::Refresh
            && let Some(new_slide) = new_slide
        {
            debug!("Deck {}: slide {:?} -> {}", master, old, new_slide);
            self.pending.push(Box::new(CurrentSlideChangedEvent {
                deck: master,
                old_slide: old,
                new_slide,
            }));
        }
    }

    fn refresh_visibility(&mut self, p: &Presentation) {
        let views: HashMap<ObjectId, DeckView> = self
            .decks
            .iter()
            .map(|(master, rt)| {
                let view = DeckView {
                    master: *master,
                    current: rt.deck.current_slide(&p.graph),
                    position: rt.player.position(),
                };
                (rt.owner, view)
            })
            .collect();
        let visible = visibility::compute_visible(p, &views);
        for event in visibility::diff(&self.visible, &visible) {
            trace!("Visibility {} -> {}", event.object, event.visible);
            self.pending.push(Box::new(event));
        }
        self.visible = visible;
    }

    fn animate(&mut self, p: &mut Presentation, master: ObjectId) {
        let Some(rt) = self.decks.get(&master) else {
            return;
        };
        let slides: Vec<ObjectId> = std::iter::once(master)
            .chain(rt.deck.current_slide(&p.graph))
            .collect();
        let position = rt.player.position();
        for event in self.animator.apply(&mut p.graph, &slides, position) {
            self.pending.push(Box::new(event));
        }
    }

    fn push_player_events(&mut self, master: ObjectId, before: PlayerSnapshot, force_position: bool) {
        let Some(now) = self.snapshot(master) else {
            return;
        };
        if now.state != before.state {
            debug!("Deck {} player {:?} -> {:?}", master, before.state, now.state);
            self.pending.push(Box::new(SlidePlayerStateChangedEvent {
                deck: master,
                state: now.state,
            }));
        }
        if force_position || now.position != before.position {
            self.pending.push(Box::new(SlidePlayerPositionChangedEvent {
                deck: master,
                position: now.position,
            }));
        }
    }

    // ========== Flush / command drain ==========

    /// Deliver buffered events, then run queued commands (once, at the
    /// outermost request).
    fn finish(&mut self, p: &mut Presentation) {
        let events = std::mem::take(&mut self.pending);
        if !events.is_empty() {
            trace!("Flushing {} events", events.len());
            p.bus.emit_all(events);
        }
        if self.draining {
            return;
        }
        self.draining = true;
        let mut passes = 0;
        loop {
            let batch = self.commands.drain();
            if batch.is_empty() {
                break;
            }
            passes += 1;
            if passes > self.config.max_command_passes {
                warn!(
                    "Command queue still busy after {} passes, dropping {} commands",
                    self.config.max_command_passes,
                    batch.len()
                );
                self.commands.clear();
                break;
            }
            for command in batch {
                self.execute(p, command);
            }
        }
        self.draining = false;
    }

    /// Run one queued command.
    pub fn execute(&mut self, p: &mut Presentation, command: Command) -> bool {
        trace!("Executing {:?}", command);
        match command {
            Command::SetSlide { deck, slide } => self.set_slide_ref(p, deck, &slide),
            Command::NextSlide { deck, wrap } => self.next_slide(p, deck, wrap),
            Command::PreviousSlide { deck, wrap } => self.previous_slide(p, deck, wrap),
            Command::RestartSlide { deck } => self.restart_slide(p, deck),
            Command::GoToSlide { path, next, wrap } => self.go_to_slide(p, &path, next, wrap),
            Command::GoToTime { path, seconds } => self.go_to_time(p, &path, seconds),
            Command::Play { deck } => self.play(p, deck),
            Command::Pause { deck } => self.pause(p, deck),
            Command::Stop { deck } => self.stop(p, deck),
            Command::Seek { deck, position } => self.seek(p, deck, position),
            Command::SetProperty {
                object,
                property,
                value,
            } => self.set_object_property(p, object, &property, value),
        }
    }
}

/// Write and record a notification if the value changed.
fn write_property(
    p: &mut Presentation,
    obj: ObjectId,
    path: &str,
    value: AttrValue,
    pending: &mut Vec<BoxedEvent>,
) -> bool {
    if !p.set_property(obj, path, value) {
        return false;
    }
    if let Some(value) = p.get_property(obj, path) {
        trace!("{}:{} = {:?}", obj, path, value);
        pending.push(Box::new(PropertyChangedEvent {
            object: obj,
            property: path.to_string(),
            value,
        }));
    }
    true
}

fn property_affects_visibility(path: &str) -> bool {
    use crate::entities::keys::{A_END_TIME, A_EYEBALL, A_START_TIME};
    matches!(path, A_EYEBALL | A_START_TIME | A_END_TIME)
}

/// True if `path` (or the whole vector it is a channel of) is written by
/// the active slides.
fn is_covered(touched: &IndexSet<PropertyKey>, obj: ObjectId, path: &str) -> bool {
    if touched.contains(&(obj, path.to_string())) {
        return true;
    }
    split_channel(path).is_some_and(|(base, _)| touched.contains(&(obj, base.to_string())))
}

/// Value a property returns to when no active slide writes it.
fn rollback_value(p: &Presentation, master: ObjectId, obj: ObjectId, path: &str) -> Option<AttrValue> {
    p.graph
        .slide(master)
        .and_then(|m| m.changes_for(obj))
        .and_then(|list| list.value_for(path))
        .or_else(|| p.graph.get(obj).and_then(|o| o.default_for(path)))
}

/// Master changes, then slide changes; a later write to the same path wins.
fn collect_changes(graph: &SceneGraph, slides: &[ObjectId]) -> IndexMap<PropertyKey, AttrValue> {
    let mut values = IndexMap::new();
    for slide in slides.iter().filter_map(|s| graph.slide(*s)) {
        for (target, list) in slide.property_changes() {
            for change in list.iter() {
                values.insert((target, change.name.clone()), change.value.clone());
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::entities::animation::Interpolation;
    use crate::entities::changes::PropertyChange;
    use crate::entities::keys::*;
    use crate::entities::node_kind::{ComponentNode, LayerNode, ModelNode, ObjectKind};
    use crate::entities::scene_events::ObjectVisibilityChangedEvent;
    use crate::entities::slide::{InitialPlayState, PlayMode, SlideNode};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Fixture {
        p: Presentation,
        sm: SceneManager,
        root: ObjectId,
        master: ObjectId,
        slides: Vec<ObjectId>,
        layer: ObjectId,
        cube: ObjectId,
        sphere: ObjectId,
        log: Log,
    }

    fn node(id: &str, kind: impl Into<ObjectKind>, attrs: &[(&str, AttrValue)]) -> GraphObject {
        let mut obj = GraphObject::new(id, id, kind);
        for (k, v) in attrs {
            obj.attrs.set_path(k, v.clone());
        }
        obj.snapshot_defaults();
        obj
    }

    /// Scene → Layer → {Cube, Sphere}; master shows Layer, slide 0 shows
    /// Cube, slide 1 shows Sphere.
    fn fixture(slides: Vec<SlideNode>) -> Fixture {
        let mut p = Presentation::new("test");
        let root = p.root();
        let master = p.attach_master_slide(root, node("master", SlideNode::default(), &[])).unwrap();
        let slides: Vec<ObjectId> = slides
            .into_iter()
            .enumerate()
            .map(|(i, s)| p.register(Some(master), node(&format!("slide{}", i), s, &[])).unwrap())
            .collect();
        let layer = p.register(Some(root), node("Layer", LayerNode, &[])).unwrap();
        let cube = p.register(Some(layer), node("Cube", ModelNode, &[])).unwrap();
        let sphere = p.register(Some(layer), node("Sphere", ModelNode, &[])).unwrap();

        p.graph.slide_mut(master).unwrap().add_object(layer);
        p.graph.slide_mut(slides[0]).unwrap().add_object(cube);
        if let Some(s1) = slides.get(1) {
            p.graph.slide_mut(*s1).unwrap().add_object(sphere);
        }
        let log = record(&p);
        Fixture {
            p,
            sm: SceneManager::default(),
            root,
            master,
            slides,
            layer,
            cube,
            sphere,
            log,
        }
    }

    fn stopped() -> SlideNode {
        SlideNode::new(PlayMode::StopAtEnd, InitialPlayState::Stop)
    }

    fn timed(duration: f64, mode: PlayMode, initial: InitialPlayState) -> SlideNode {
        let mut s = SlideNode::new(mode, initial);
        s.duration = Some(duration);
        s
    }

    fn record(p: &Presentation) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        p.bus.subscribe::<CurrentSlideChangedEvent, _>(move |e| {
            l.lock().unwrap().push(format!("slide:{}", e.new_slide));
        });
        let l = Arc::clone(&log);
        p.bus.subscribe::<ObjectVisibilityChangedEvent, _>(move |e| {
            l.lock().unwrap().push(format!("vis:{}:{}", e.object, e.visible));
        });
        let l = Arc::clone(&log);
        p.bus.subscribe::<PropertyChangedEvent, _>(move |e| {
            l.lock().unwrap().push(format!("prop:{}:{}", e.object, e.property));
        });
        let l = Arc::clone(&log);
        p.bus.subscribe::<SlidePlayerStateChangedEvent, _>(move |e| {
            l.lock().unwrap().push(format!("state:{:?}", e.state));
        });
        let l = Arc::clone(&log);
        p.bus.subscribe::<SlidePlayerPositionChangedEvent, _>(move |e| {
            l.lock().unwrap().push(format!("pos:{}", e.position));
        });
        log
    }

    impl Fixture {
        fn start(&mut self) {
            self.sm.start(&mut self.p);
            self.log.lock().unwrap().clear();
        }

        fn count(&self, prefix: &str) -> usize {
            self.log.lock().unwrap().iter().filter(|l| l.starts_with(prefix)).count()
        }

        fn prop(&self, obj: ObjectId, path: &str) -> Option<AttrValue> {
            self.p.get_property(obj, path)
        }

        fn changes(&mut self, slide: ObjectId, target: ObjectId, list: Vec<PropertyChange>) {
            self.p
                .graph
                .slide_mut(slide)
                .unwrap()
                .add_property_changes(target, list.into_iter().collect());
        }
    }

    #[test]
    fn test_start_enters_first_slide() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.sm.start(&mut f.p);
        assert_eq!(f.sm.current_slide(&f.p, f.root), Some(f.slides[0]));
        assert!(f.sm.is_visible(f.layer));
        assert!(f.sm.is_visible(f.cube));
        assert!(!f.sm.is_visible(f.sphere));
        assert_eq!(f.count("slide:"), 1);
    }

    #[test]
    fn test_same_slide_is_idempotent() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.changes(f.slides[0], f.cube, vec![PropertyChange::new(A_OPACITY, 25.0)]);
        f.start();
        let visible = f.sm.visible_objects().clone();

        assert!(f.sm.set_current_slide(&mut f.p, f.root, 0));
        assert!(f.sm.set_current_slide(&mut f.p, f.root, 0));

        assert_eq!(f.sm.visible_objects(), &visible);
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(25.0)));
        assert_eq!(f.count("slide:"), 0);
        assert_eq!(f.count("vis:"), 0);
        assert_eq!(f.count("prop:"), 0);
    }

    #[test]
    fn test_rollback_round_trip() {
        let mut f = fixture(vec![stopped(), stopped(), stopped()]);
        f.changes(f.master, f.cube, vec![PropertyChange::new(A_OPACITY, 50.0)]);
        f.changes(
            f.slides[1],
            f.cube,
            vec![PropertyChange::new(A_OPACITY, 10.0), PropertyChange::new("rotation.y", 45.0)],
        );
        f.changes(
            f.slides[2],
            f.cube,
            vec![PropertyChange::new(A_OPACITY, 20.0), PropertyChange::new("scale.x", 3.0)],
        );
        f.start();
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(50.0)));

        f.sm.set_current_slide(&mut f.p, f.root, 1);
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(10.0)));
        assert_eq!(f.prop(f.cube, "rotation.y"), Some(AttrValue::Float(45.0)));

        // A -> B -> A
        f.sm.set_current_slide(&mut f.p, f.root, 0);
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(50.0)));
        assert_eq!(f.prop(f.cube, A_ROTATION), Some(AttrValue::Vec3([0.0; 3])));

        // A -> B -> C -> A, several overriders in a row
        f.sm.set_current_slide(&mut f.p, f.root, 1);
        f.sm.set_current_slide(&mut f.p, f.root, 2);
        assert_eq!(f.prop(f.cube, A_ROTATION), Some(AttrValue::Vec3([0.0; 3])));
        assert_eq!(f.prop(f.cube, A_SCALE), Some(AttrValue::Vec3([3.0, 1.0, 1.0])));
        f.sm.set_current_slide(&mut f.p, f.root, 0);
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(50.0)));
        assert_eq!(f.prop(f.cube, A_SCALE), Some(AttrValue::Vec3([1.0; 3])));
    }

    #[test]
    fn test_invalid_index_is_noop() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.start();
        f.sm.set_current_slide(&mut f.p, f.root, 1);
        f.log.lock().unwrap().clear();

        assert!(!f.sm.set_current_slide(&mut f.p, f.root, -1));
        assert!(!f.sm.set_current_slide(&mut f.p, f.root, 2));
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(1));
        assert!(f.log.lock().unwrap().is_empty());

        // Unknown deck and unknown name
        assert!(!f.sm.set_current_slide(&mut f.p, f.cube, 0));
        assert!(!f.sm.set_current_slide_by_name(&mut f.p, f.root, "nope"));
        assert!(f.sm.set_current_slide_by_name(&mut f.p, f.root, "slide0"));
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
    }

    #[test]
    fn test_stop_at_end() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::StopAtEnd, InitialPlayState::Stop)]);
        f.start();
        assert!(f.sm.play(&mut f.p, f.root));
        for _ in 0..80 {
            f.sm.tick(&mut f.p, 16.0);
        }
        let player = f.sm.player(&f.p, f.root).unwrap();
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.position(), 1000.0);
        assert_eq!(f.count("state:Stopped"), 1);
        assert_eq!(f.count("state:Playing"), 1);
        assert_eq!(f.count("slide:"), 0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
    }

    #[test]
    fn test_play_through_chain() {
        let first = timed(1000.0, PlayMode::PlayThroughTo, InitialPlayState::Stop);
        let mut second = timed(1000.0, PlayMode::PlayThroughTo, InitialPlayState::Play);
        second.set_play_through(PlayThrough::Previous);
        let mut f = fixture(vec![first, second]);
        f.start();

        f.sm.play(&mut f.p, f.root);
        f.sm.tick(&mut f.p, 1000.0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(1));
        assert!(f.sm.player(&f.p, f.root).unwrap().is_playing());

        f.sm.tick(&mut f.p, 1000.0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
        assert_eq!(f.sm.player(&f.p, f.root).unwrap().state(), PlayerState::Stopped);
        assert_eq!(f.count("slide:"), 2);
        // Playing -> Stopped -> Playing -> Stopped
        assert_eq!(f.count("state:Playing"), 2);
        assert_eq!(f.count("state:Stopped"), 2);
    }

    #[test]
    fn test_play_through_chain_in_one_tick() {
        let first = timed(1000.0, PlayMode::PlayThroughTo, InitialPlayState::Stop);
        let mut second = timed(1000.0, PlayMode::PlayThroughTo, InitialPlayState::Play);
        second.set_play_through(PlayThrough::Previous);
        let mut f = fixture(vec![first, second]);
        f.start();

        f.sm.play(&mut f.p, f.root);
        f.sm.tick(&mut f.p, 2500.0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
        assert_eq!(f.count("slide:"), 2);
    }

    #[test]
    fn test_play_through_at_last_slide_stays() {
        let mut f = fixture(vec![timed(500.0, PlayMode::PlayThroughTo, InitialPlayState::Play)]);
        f.start();
        f.sm.tick(&mut f.p, 600.0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
        assert_eq!(f.sm.player(&f.p, f.root).unwrap().state(), PlayerState::Stopped);
        assert_eq!(f.count("slide:"), 0);
    }

    #[test]
    fn test_play_through_cycle_is_bounded() {
        let mut a = timed(0.0, PlayMode::PlayThroughTo, InitialPlayState::Play);
        a.set_play_through(PlayThrough::Next);
        let mut b = timed(0.0, PlayMode::PlayThroughTo, InitialPlayState::Play);
        b.set_play_through(PlayThrough::Previous);
        let mut f = fixture(vec![a, b]);
        f.start();
        f.sm.tick(&mut f.p, 16.0);
        let hops = f.count("slide:");
        assert!(hops >= 1 && hops <= DEFAULT_HOPS);
    }

    const DEFAULT_HOPS: usize = crate::config::DEFAULT_MAX_PLAY_THROUGH_HOPS;

    #[test]
    fn test_ping_vs_ping_pong() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::Ping, InitialPlayState::Play)]);
        f.start();
        for _ in 0..200 {
            f.sm.tick(&mut f.p, 16.0);
        }
        let player = f.sm.player(&f.p, f.root).unwrap();
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.bounce_count(), 1);

        let mut g = fixture(vec![timed(1000.0, PlayMode::PingPong, InitialPlayState::Play)]);
        g.start();
        for _ in 0..200 {
            g.sm.tick(&mut g.p, 16.0);
        }
        let player = g.sm.player(&g.p, g.root).unwrap();
        assert!(player.is_playing());
        assert!(player.bounce_count() >= 2);
        assert!(g.sm.stop(&mut g.p, g.root));
        assert_eq!(g.sm.player(&g.p, g.root).unwrap().position(), 0.0);
    }

    #[test]
    fn test_time_ranged_visibility() {
        let mut f = fixture(vec![timed(3000.0, PlayMode::StopAtEnd, InitialPlayState::Stop)]);
        f.p.set_property(f.cube, A_START_TIME, AttrValue::Float(1000.0));
        f.p.set_property(f.cube, A_END_TIME, AttrValue::Float(2000.0));
        f.start();
        assert!(!f.sm.is_visible(f.cube));

        let (root, cube) = (f.root, f.cube);
        let mut at = |t: f64| {
            assert!(f.sm.seek(&mut f.p, root, t));
            f.sm.is_visible(cube)
        };
        assert!(!at(999.0));
        assert!(at(1000.0));
        assert!(at(1999.0));
        assert!(!at(2000.0));
        assert_eq!(f.count("pos:"), 4);
        assert_eq!(f.count("vis:"), 2);
    }

    #[test]
    fn test_time_window_follows_ticks() {
        let mut f = fixture(vec![timed(3000.0, PlayMode::StopAtEnd, InitialPlayState::Play)]);
        f.p.set_property(f.cube, A_START_TIME, AttrValue::Float(1000.0));
        f.p.set_property(f.cube, A_END_TIME, AttrValue::Float(2000.0));
        f.start();
        assert!(!f.sm.is_visible(f.cube));

        let mut seen = Vec::new();
        for _ in 0..5 {
            f.sm.tick(&mut f.p, 500.0);
            seen.push(f.sm.is_visible(f.cube));
        }
        assert_eq!(seen, vec![false, true, true, false, false]);
        assert_eq!(f.count("vis:"), 2);
    }

    #[test]
    fn test_play_to_named_slide() {
        let mut first = timed(1000.0, PlayMode::PlayThroughTo, InitialPlayState::Stop);
        first.set_play_through(PlayThrough::Slide(SlideRef::Name("slide2".into())));
        let target = timed(2000.0, PlayMode::StopAtEnd, InitialPlayState::Play);
        let mut f = fixture(vec![first, stopped(), target]);
        f.start();

        f.sm.play(&mut f.p, f.root);
        f.sm.tick(&mut f.p, 1000.0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(2));
        let player = f.sm.player(&f.p, f.root).unwrap();
        assert!(player.is_playing());
        assert_eq!(player.position(), 0.0);
        assert_eq!(player.duration(), 2000.0);

        // Jumped straight there, slide 1 was never entered
        let skipped = format!("slide:{}", f.slides[1]);
        assert!(!f.log.lock().unwrap().contains(&skipped));
        assert_eq!(f.count("slide:"), 1);
    }

    #[test]
    fn test_looping_never_stops() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::Looping, InitialPlayState::Play)]);
        f.start();
        for _ in 0..200 {
            f.sm.tick(&mut f.p, 16.0);
        }
        let player = f.sm.player(&f.p, f.root).unwrap();
        assert!(player.is_playing());
        assert!((player.position() - 200.0).abs() < 1e-6);
        assert_eq!(f.count("state:"), 0);
        assert_eq!(f.count("slide:"), 0);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
    }

    #[test]
    fn test_seek_notifies_when_unchanged() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::StopAtEnd, InitialPlayState::Stop)]);
        f.start();
        f.sm.seek(&mut f.p, f.root, 0.0);
        f.sm.seek(&mut f.p, f.root, -50.0);
        assert_eq!(f.count("pos:0"), 2);
    }

    #[test]
    fn test_component_slide_independence() {
        let mut f = fixture(vec![stopped(), stopped()]);
        let comp = f
            .p
            .register(Some(f.layer), node("Button", ComponentNode::default(), &[]))
            .unwrap();
        let inner_a = f.p.register(Some(comp), node("InnerA", ModelNode, &[])).unwrap();
        let inner_b = f.p.register(Some(comp), node("InnerB", ModelNode, &[])).unwrap();
        let comp_master = f
            .p
            .attach_master_slide(comp, node("comp_master", SlideNode::default(), &[]))
            .unwrap();
        let c0 = f.p.register(Some(comp_master), node("c0", stopped(), &[])).unwrap();
        let c1 = f.p.register(Some(comp_master), node("c1", stopped(), &[])).unwrap();
        f.p.graph.slide_mut(c0).unwrap().add_object(inner_a);
        f.p.graph.slide_mut(c1).unwrap().add_object(inner_b);
        f.p.graph.slide_mut(f.slides[0]).unwrap().add_object(comp);
        f.start();

        assert!(f.sm.is_visible(comp));
        assert!(f.sm.is_visible(inner_a));
        assert!(!f.sm.is_visible(inner_b));

        // Outer slide 1 hides the component and everything inside it
        f.sm.set_current_slide(&mut f.p, f.root, 1);
        assert!(!f.sm.is_visible(comp));
        assert!(!f.sm.is_visible(inner_a));
        let outside = f.sm.visible_objects().clone();
        f.log.lock().unwrap().clear();

        // Switch the hidden component
        assert!(f.sm.set_component_slide(&mut f.p, comp, c1));
        assert_eq!(f.sm.visible_objects(), &outside);
        assert_eq!(f.count("vis:"), 0);
        assert_eq!(f.count("slide:"), 1);
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(1));

        // Showing it again reflects the latest inner selection
        f.sm.set_current_slide(&mut f.p, f.root, 0);
        assert!(f.sm.is_visible(comp));
        assert!(f.sm.is_visible(inner_b));
        assert!(!f.sm.is_visible(inner_a));

        // Slides of another deck are rejected
        assert!(!f.sm.set_component_slide(&mut f.p, comp, f.slides[1]));
        assert_eq!(f.sm.current_slide(&f.p, comp), Some(c1));
    }

    #[test]
    fn test_partial_channel_animation() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::StopAtEnd, InitialPlayState::Stop)]);
        f.p.set_property(f.cube, A_ROTATION, AttrValue::Vec3([10.0, 0.0, 30.0]));
        let track = AnimationTrack::new(
            f.cube,
            "rotation.y",
            Interpolation::Linear,
            vec![KeyFrame::new(0.0, 0.0), KeyFrame::new(1000.0, 90.0)],
        );
        f.p.graph.slide_mut(f.slides[0]).unwrap().add_animation(track);
        f.start();

        f.sm.seek(&mut f.p, f.root, 500.0);
        assert_eq!(f.prop(f.cube, A_ROTATION), Some(AttrValue::Vec3([10.0, 45.0, 30.0])));
    }

    #[test]
    fn test_transition_event_order() {
        let mut f = fixture(vec![stopped(), timed(1000.0, PlayMode::StopAtEnd, InitialPlayState::Play)]);
        f.changes(f.slides[0], f.cube, vec![PropertyChange::new(A_OPACITY, 10.0)]);
        f.changes(f.slides[1], f.sphere, vec![PropertyChange::new(A_SCALE, [2.0, 2.0, 2.0])]);
        let track = AnimationTrack::new(
            f.sphere,
            "rotation.y",
            Interpolation::Linear,
            vec![KeyFrame::new(0.0, 30.0), KeyFrame::new(1000.0, 60.0)],
        );
        f.p.graph.slide_mut(f.slides[1]).unwrap().add_animation(track);
        f.start();

        f.sm.set_current_slide(&mut f.p, f.root, 1);
        let log = f.log.lock().unwrap().clone();
        let expected = vec![
            format!("prop:{}:opacity", f.cube),
            format!("prop:{}:scale", f.sphere),
            format!("vis:{}:false", f.cube),
            format!("vis:{}:true", f.sphere),
            format!("prop:{}:rotation.y", f.sphere),
            "state:Playing".to_string(),
            "pos:0".to_string(),
            format!("slide:{}", f.slides[1]),
        ];
        assert_eq!(log, expected);
    }

    #[test]
    fn test_reentrant_commands_run_after_flush() {
        let mut f = fixture(vec![stopped(), stopped(), stopped()]);
        f.start();
        let queue = f.sm.commands();
        let deck = f.master;
        let second = f.slides[1];
        f.p.bus.subscribe::<CurrentSlideChangedEvent, _>(move |e| {
            if e.new_slide == second {
                queue.push(Command::SetSlide {
                    deck,
                    slide: SlideRef::Index(2),
                });
            }
        });

        assert!(f.sm.set_current_slide(&mut f.p, f.root, 1));
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(2));

        let log = f.log.lock().unwrap().clone();
        let slide_events: Vec<&String> = log.iter().filter(|l| l.starts_with("slide:")).collect();
        assert_eq!(
            slide_events,
            vec![&format!("slide:{}", f.slides[1]), &format!("slide:{}", f.slides[2])]
        );
        // Everything of the first transition is delivered before the second starts
        let first_done = log.iter().position(|l| *l == format!("slide:{}", f.slides[1])).unwrap();
        let second_start = log.iter().position(|l| *l == format!("vis:{}:false", f.sphere)).unwrap();
        assert!(first_done < second_start);
    }

    #[test]
    fn test_spawn_and_destroy() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.start();
        let added = Arc::new(AtomicI32::new(0));
        let removed = Arc::new(AtomicI32::new(0));
        let a = Arc::clone(&added);
        let r = Arc::clone(&removed);
        f.p.bus.subscribe::<NodeAddedEvent, _>(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        f.p.bus.subscribe::<NodeRemovedEvent, _>(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        let spawned = f
            .sm
            .spawn_object(&mut f.p, f.layer, node("Spawned", ModelNode, &[]), Some(f.slides[0]))
            .unwrap();
        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert!(f.sm.is_visible(spawned));
        assert!(f.p.graph.slide(f.slides[0]).unwrap().contains_object(spawned));

        // Duplicate document id
        assert!(f
            .sm
            .spawn_object(&mut f.p, f.layer, node("Spawned", ModelNode, &[]), None)
            .is_err());

        assert!(f.sm.destroy_object(&mut f.p, spawned));
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert!(!f.sm.is_visible(spawned));
        assert!(!f.p.graph.slide(f.slides[0]).unwrap().contains_object(spawned));
        assert!(!f.sm.destroy_object(&mut f.p, spawned));
        assert!(!f.sm.destroy_object(&mut f.p, f.root));
    }

    #[test]
    fn test_destroy_purges_changes_and_tracks() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.changes(f.slides[0], f.sphere, vec![PropertyChange::new(A_OPACITY, 5.0)]);
        f.start();
        assert!(f.sm.destroy_object(&mut f.p, f.sphere));
        assert!(f.p.graph.slide(f.slides[0]).unwrap().changes_for(f.sphere).is_none());
        assert!(!f.p.graph.slide(f.slides[1]).unwrap().contains_object(f.sphere));
        // Navigation keeps working without the object
        assert!(f.sm.set_current_slide(&mut f.p, f.root, 1));
    }

    #[test]
    fn test_go_to_slide_and_time() {
        let mut f = fixture(vec![
            timed(2000.0, PlayMode::StopAtEnd, InitialPlayState::Stop),
            stopped(),
            stopped(),
        ]);
        f.start();
        assert!(f.sm.go_to_slide(&mut f.p, "Scene", true, false));
        assert!(f.sm.go_to_slide(&mut f.p, "#scene", true, false));
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(2));
        assert!(!f.sm.go_to_slide(&mut f.p, "Scene", true, false));
        assert!(f.sm.go_to_slide(&mut f.p, "Scene", true, true));
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(0));
        assert!(f.sm.go_to_slide(&mut f.p, "Scene", false, true));
        assert_eq!(f.sm.current_index(&f.p, f.root), Some(2));

        f.sm.set_current_slide(&mut f.p, f.root, 0);
        assert!(f.sm.go_to_time(&mut f.p, "Scene", 1.5));
        assert_eq!(f.sm.player(&f.p, f.root).unwrap().position(), 1500.0);

        // Elements without a deck, unknown paths
        assert!(!f.sm.go_to_time(&mut f.p, "Scene.Layer", 1.0));
        assert!(!f.sm.go_to_slide(&mut f.p, "Scene.Missing", true, false));
    }

    #[test]
    fn test_restart_slide_reenters() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::StopAtEnd, InitialPlayState::Play)]);
        f.start();
        f.sm.tick(&mut f.p, 400.0);
        assert!(f.sm.restart_slide(&mut f.p, f.root));
        assert_eq!(f.sm.player(&f.p, f.root).unwrap().position(), 0.0);
        assert_eq!(f.count("slide:"), 1);
    }

    #[test]
    fn test_runtime_content_edits() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.start();

        // Changes to the current slide apply immediately
        let list: ChangeList = [PropertyChange::new(A_OPACITY, 33.0)].into_iter().collect();
        assert!(f.sm.add_property_changes(&mut f.p, f.slides[0], f.cube, list));
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(33.0)));

        // Removing them rolls back to the default
        assert!(f.sm.remove_property_changes(&mut f.p, f.slides[0], f.cube));
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(100.0)));

        // Membership edits show/hide right away
        assert!(f.sm.add_object(&mut f.p, f.slides[0], f.sphere));
        assert!(f.sm.is_visible(f.sphere));
        assert!(!f.sm.add_object(&mut f.p, f.slides[0], f.sphere));
        assert!(f.sm.remove_object(&mut f.p, f.slides[0], f.sphere));
        assert!(!f.sm.is_visible(f.sphere));

        // Slides cannot be targets
        let list: ChangeList = [PropertyChange::new(A_OPACITY, 1.0)].into_iter().collect();
        assert!(!f.sm.add_property_changes(&mut f.p, f.slides[0], f.slides[1], list));
    }

    #[test]
    fn test_dynamic_track_keyframes() {
        let mut f = fixture(vec![timed(1000.0, PlayMode::StopAtEnd, InitialPlayState::Stop)]);
        f.start();
        let fixed = AnimationTrack::new(f.cube, A_OPACITY, Interpolation::Linear, vec![KeyFrame::new(0.0, 10.0)]);
        assert!(f.sm.add_animation(&mut f.p, f.slides[0], fixed));
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(10.0)));
        assert!(!f.sm.set_animation_keyframes(&mut f.p, f.slides[0], f.cube, A_OPACITY, vec![]));

        let dynamic = AnimationTrack::new(f.cube, A_OPACITY, Interpolation::Linear, vec![]).into_dynamic(false);
        assert!(f.sm.add_animation(&mut f.p, f.slides[0], dynamic));
        assert_eq!(f.p.graph.slide(f.slides[0]).unwrap().animations().len(), 1);
        assert!(f.sm.set_animation_keyframes(
            &mut f.p,
            f.slides[0],
            f.cube,
            A_OPACITY,
            vec![KeyFrame::new(0.0, 70.0)]
        ));
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(70.0)));

        assert!(f.sm.remove_animation(&mut f.p, f.slides[0], f.cube, A_OPACITY));
        assert_eq!(f.prop(f.cube, A_OPACITY), Some(AttrValue::Float(100.0)));
    }

    #[test]
    fn test_untouched_channels_keep_value() {
        let mut f = fixture(vec![stopped(), stopped()]);
        f.changes(f.slides[1], f.cube, vec![PropertyChange::new("rotation.y", 20.0)]);
        f.p.set_property(f.cube, "rotation.x", AttrValue::Float(5.0));
        f.start();
        f.sm.set_current_slide(&mut f.p, f.root, 1);
        assert_eq!(f.prop(f.cube, A_ROTATION), Some(AttrValue::Vec3([5.0, 20.0, 0.0])));
    }
}
