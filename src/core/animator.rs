//! AnimationManager - samples slide tracks and pushes values into objects.
//!
//! All tracks of one deck are sampled at the same player position within a
//! call. Master tracks are sampled first; a current-slide track on the same
//! `(target, property)` replaces the master one.
//!
//! Only animated channels are written: a `rotation.y` track leaves
//! `rotation.x` and `rotation.z` at whatever the change lists or defaults put
//! there.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{trace, warn};

use crate::entities::attrs::AttrValue;
use crate::entities::graph::SceneGraph;
use crate::entities::node::ObjectId;
use crate::entities::node_kind::Animatable;
use crate::entities::scene_events::PropertyChangedEvent;

#[derive(Debug, Default)]
pub struct AnimationManager {
    /// Tracks already warned about, so a bad target is reported once
    reported: HashSet<(ObjectId, String)>,
}

impl AnimationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every track of `slides` (in order) at `position` ms.
    pub fn sample(
        &mut self,
        graph: &SceneGraph,
        slides: &[ObjectId],
        position: f64,
    ) -> IndexMap<(ObjectId, String), f32> {
        let mut values = IndexMap::new();
        for slide_id in slides {
            let Some(slide) = graph.slide(*slide_id) else {
                continue;
            };
            for track in slide.animations() {
                let animatable = match graph.get(track.target) {
                    Some(obj) => obj.kind.animatable(),
                    None => {
                        self.report(track.target, &track.property, "target missing");
                        continue;
                    }
                };
                if !animatable {
                    self.report(track.target, &track.property, "target not animatable");
                    continue;
                }
                // Empty tracks contribute nothing
                if let Some(v) = track.value_at(position) {
                    values.insert((track.target, track.property.clone()), v);
                }
            }
        }
        values
    }

    /// Sample and write. Returns a notification per value that changed.
    pub fn apply(
        &mut self,
        graph: &mut SceneGraph,
        slides: &[ObjectId],
        position: f64,
    ) -> Vec<PropertyChangedEvent> {
        let values = self.sample(graph, slides, position);
        let mut events = Vec::new();
        for ((target, property), value) in values {
            let written = retyped(graph.property(target, &property), value);
            if graph.set_property(target, &property, written.clone()) {
                trace!("Animated {}:{} = {} at {}ms", target, property, value, position);
                let value = graph.property(target, &property).unwrap_or(written);
                events.push(PropertyChangedEvent {
                    object: target,
                    property,
                    value,
                });
            }
        }
        events
    }

    /// Forget warnings for a destroyed object.
    pub fn forget(&mut self, id: ObjectId) {
        self.reported.retain(|(target, _)| *target != id);
    }

    fn report(&mut self, target: ObjectId, property: &str, reason: &str) {
        if self.reported.insert((target, property.to_string())) {
            warn!("Skipping animation {}:{}: {}", target, property, reason);
        }
    }
}

/// Keep the variant the property already has: Int rounds, Bool is `> 0.5`.
fn retyped(current: Option<AttrValue>, value: f32) -> AttrValue {
    match current {
        Some(AttrValue::Int(_)) => AttrValue::Int(value.round() as i32),
        Some(AttrValue::Bool(_)) => AttrValue::Bool(value > 0.5),
        _ => AttrValue::Float(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::animation::{AnimationTrack, Interpolation, KeyFrame};
    use crate::entities::node::GraphObject;
    use crate::entities::node_kind::ModelNode;
    use crate::entities::slide::SlideNode;

    fn setup() -> (SceneGraph, ObjectId, ObjectId, ObjectId) {
        let mut graph = SceneGraph::new();
        let cube = graph.insert(GraphObject::new("cube", "Cube", ModelNode).with_attr("rotation", [10.0, 0.0, 30.0]));
        let master = graph.insert(GraphObject::new("m", "Master", SlideNode::default()));
        let slide = graph
            .insert_child(master, GraphObject::new("s", "Slide", SlideNode::default()))
            .unwrap();
        (graph, cube, master, slide)
    }

    fn ramp(target: ObjectId, prop: &str, v0: f32, v1: f32) -> AnimationTrack {
        AnimationTrack::new(
            target,
            prop,
            Interpolation::Linear,
            vec![KeyFrame::new(0.0, v0), KeyFrame::new(1000.0, v1)],
        )
    }

    #[test]
    fn test_partial_channel_keeps_others() {
        let (mut graph, cube, master, slide) = setup();
        graph.slide_mut(slide).unwrap().add_animation(ramp(cube, "rotation.y", 0.0, 90.0));

        let mut anim = AnimationManager::new();
        let events = anim.apply(&mut graph, &[master, slide], 500.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].property, "rotation.y");
        assert_eq!(
            graph.property(cube, "rotation"),
            Some(AttrValue::Vec3([10.0, 45.0, 30.0]))
        );
    }

    #[test]
    fn test_slide_track_overrides_master() {
        let (mut graph, cube, master, slide) = setup();
        graph.slide_mut(master).unwrap().add_animation(ramp(cube, "opacity", 0.0, 10.0));
        graph.slide_mut(slide).unwrap().add_animation(ramp(cube, "opacity", 0.0, 100.0));

        let mut anim = AnimationManager::new();
        anim.apply(&mut graph, &[master, slide], 1000.0);
        assert_eq!(graph.property(cube, "opacity"), Some(AttrValue::Float(100.0)));

        // Same position again: nothing changes, nothing reported
        assert!(anim.apply(&mut graph, &[master, slide], 1000.0).is_empty());
    }

    #[test]
    fn test_missing_target_skipped() {
        let (mut graph, cube, master, slide) = setup();
        graph.slide_mut(slide).unwrap().add_animation(ramp(cube, "opacity", 0.0, 100.0));
        graph.remove(cube);

        let mut anim = AnimationManager::new();
        assert!(anim.sample(&graph, &[master, slide], 500.0).is_empty());
        assert_eq!(anim.reported.len(), 1);
    }

    #[test]
    fn test_int_and_bool_keep_their_type() {
        let (mut graph, _, master, slide) = setup();
        let ball = graph.insert(
            GraphObject::new("ball", "Ball", ModelNode)
                .with_attr("eyeball", true)
                .with_attr("segments", 4),
        );
        {
            let s = graph.slide_mut(slide).unwrap();
            s.add_animation(ramp(ball, "eyeball", 1.0, 0.0));
            s.add_animation(ramp(ball, "segments", 0.0, 10.0));
        }

        let mut anim = AnimationManager::new();
        anim.apply(&mut graph, &[master, slide], 340.0);
        assert_eq!(graph.property(ball, "eyeball"), Some(AttrValue::Bool(true)));
        assert_eq!(graph.property(ball, "segments"), Some(AttrValue::Int(3)));

        let events = anim.apply(&mut graph, &[master, slide], 900.0);
        assert_eq!(graph.property(ball, "eyeball"), Some(AttrValue::Bool(false)));
        assert_eq!(graph.property(ball, "segments"), Some(AttrValue::Int(9)));
        assert!(events.iter().any(|e| e.property == "eyeball" && e.value == AttrValue::Bool(false)));
    }
}
