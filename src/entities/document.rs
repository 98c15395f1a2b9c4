//! Presentation documents: serde description of a resolved scene.
//!
//! The on-disk form is JSON. Objects and slides reference each other by
//! document id; the builder resolves ids to handles in two passes:
//! 1. create the object tree (construction defaults are snapshotted here)
//! 2. create each deck's slides and resolve their membership, property
//!    changes and animation tracks
//!
//! Unresolvable references are skipped with a warning. Structural problems
//! (duplicate ids, a root that is not a Scene, a deck on a kind that cannot
//! own one) fail the build.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;

use super::animation::{AnimationTrack, Interpolation, KeyFrame};
use super::attrs::AttrValue;
use super::changes::{ChangeList, PropertyChange};
use super::node::{GraphObject, ObjectId};
use super::node_kind::{KindTag, ObjectKind};
use super::presentation::Presentation;
use super::slide::{InitialPlayState, PlayMode, PlayThrough, SlideNode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationDoc {
    #[serde(default)]
    pub name: String,
    pub scene: ObjectDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDoc {
    pub id: String,
    /// Display name; defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    pub kind: KindTag,
    #[serde(default)]
    pub properties: IndexMap<String, AttrValue>,
    #[serde(default)]
    pub children: Vec<ObjectDoc>,
    /// Deck of a Scene or Component
    #[serde(default)]
    pub master_slide: Option<SlideDoc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideDoc {
    pub id: String,
    pub name: Option<String>,
    /// Object ids this slide shows
    pub objects: Vec<String>,
    /// Target id → changes applied on entry
    pub changes: IndexMap<String, Vec<PropertyChange>>,
    pub animations: Vec<TrackDoc>,
    pub play_mode: PlayMode,
    pub initial_play_state: Option<InitialPlayState>,
    pub play_through: Option<PlayThrough>,
    /// Explicit timeline length, ms
    pub duration: Option<f64>,
    /// Numbered slides (only read on a master slide)
    pub slides: Vec<SlideDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDoc {
    pub target: String,
    pub property: String,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub keyframes: Vec<KeyFrame>,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub extends_duration: bool,
}

impl PresentationDoc {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid presentation document")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize presentation")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read presentation {}", path.display()))?;
        let doc = Self::from_json(&text)
            .with_context(|| format!("Failed to parse presentation {}", path.display()))?;
        info!("Loaded presentation '{}' from {}", doc.name, path.display());
        Ok(doc)
    }

    /// Resolve the document into a live presentation.
    pub fn build(&self, config: &RuntimeConfig) -> Result<Presentation> {
        if self.scene.kind != KindTag::Scene {
            bail!("Root object '{}' must be a Scene, got {:?}", self.scene.id, self.scene.kind);
        }
        let mut presentation = Presentation::with_root(self.name.clone(), make_object(&self.scene))?;
        let root = presentation.root();

        let mut decks: Vec<(ObjectId, &SlideDoc)> = Vec::new();
        if let Some(master) = &self.scene.master_slide {
            decks.push((root, master));
        }
        for child in &self.scene.children {
            build_tree(&mut presentation, root, child, &mut decks)?;
        }

        for (owner, master) in decks {
            build_deck(&mut presentation, owner, master, config)?;
        }
        info!(
            "Built presentation '{}': {} objects",
            presentation.name,
            presentation.graph.len()
        );
        Ok(presentation)
    }
}

fn make_object(doc: &ObjectDoc) -> GraphObject {
    let name = doc.name.clone().unwrap_or_else(|| doc.id.clone());
    let mut object = GraphObject::new(doc.id.clone(), name, ObjectKind::from_tag(doc.kind));
    for (key, value) in &doc.properties {
        object.attrs.set_path(key, value.clone());
    }
    object.snapshot_defaults();
    object
}

fn build_tree<'d>(
    presentation: &mut Presentation,
    parent: ObjectId,
    doc: &'d ObjectDoc,
    decks: &mut Vec<(ObjectId, &'d SlideDoc)>,
) -> Result<()> {
    if doc.kind == KindTag::Slide {
        bail!("Slide '{}' found in the scene tree; slides belong under master_slide", doc.id);
    }
    let id = presentation.register(Some(parent), make_object(doc))?;
    if let Some(master) = &doc.master_slide {
        decks.push((id, master));
    }
    for child in &doc.children {
        build_tree(presentation, id, child, decks)?;
    }
    Ok(())
}

fn build_deck(
    presentation: &mut Presentation,
    owner: ObjectId,
    master: &SlideDoc,
    config: &RuntimeConfig,
) -> Result<()> {
    let master_id = presentation
        .attach_master_slide(owner, slide_object(master, config))
        .with_context(|| format!("Failed to attach master slide '{}'", master.id))?;
    fill_slide(presentation, master_id, master);

    for slide in &master.slides {
        if !slide.slides.is_empty() {
            warn!("Slide '{}' has nested slides; only master slides own decks, ignoring", slide.id);
        }
        let slide_id = presentation.register(Some(master_id), slide_object(slide, config))?;
        fill_slide(presentation, slide_id, slide);
    }
    debug!("Deck '{}': {} slides", master.id, master.slides.len());
    Ok(())
}

fn slide_object(doc: &SlideDoc, config: &RuntimeConfig) -> GraphObject {
    let initial = doc
        .initial_play_state
        .unwrap_or(config.default_initial_play_state);
    let mut node = SlideNode::new(doc.play_mode, initial);
    if let Some(target) = &doc.play_through {
        node.set_play_through(target.clone());
    }
    node.duration = doc.duration;
    let name = doc.name.clone().unwrap_or_else(|| doc.id.clone());
    GraphObject::new(doc.id.clone(), name, node)
}

/// Resolve slide content references. Missing targets are skipped.
fn fill_slide(presentation: &mut Presentation, slide_id: ObjectId, doc: &SlideDoc) {
    let lookup: &Presentation = presentation;
    let resolve = |what: &str, id: &str| -> Option<ObjectId> {
        let found = lookup.object_by_id(id);
        if found.is_none() {
            warn!("Slide '{}': {} target '{}' not found, skipping", doc.id, what, id);
        }
        found
    };

    let objects: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter_map(|id| resolve("object", id))
        .collect();
    let changes: Vec<(ObjectId, ChangeList)> = doc
        .changes
        .iter()
        .filter_map(|(id, list)| {
            let target = resolve("change", id)?;
            Some((target, list.iter().cloned().collect()))
        })
        .collect();
    let tracks: Vec<AnimationTrack> = doc
        .animations
        .iter()
        .filter_map(|t| {
            let target = resolve("animation", &t.target)?;
            let track = AnimationTrack::new(target, t.property.clone(), t.interpolation, t.keyframes.clone());
            Some(if t.dynamic {
                track.into_dynamic(t.extends_duration)
            } else {
                track
            })
        })
        .collect();

    let Some(slide) = presentation.graph.slide_mut(slide_id) else {
        return;
    };
    for id in objects {
        slide.add_object(id);
    }
    for (target, list) in changes {
        slide.add_property_changes(target, list);
    }
    for track in tracks {
        slide.add_animation(track);
    }
}
