//! Visibility pass: which rendering objects are visible right now.
//!
//! An object is visible when all of these hold:
//! - its parent is visible (the scene root counts as visible)
//! - it is eligible in the deck that owns it: a member of the master slide
//!   or the current slide, or not a member of any slide of that deck
//! - its `eyeball` property is not false
//! - the owning deck's player position lies in `[starttime, endtime)`, for
//!   whichever bounds the object declares
//!
//! A Component starts a new deck context for its subtree, so the component's
//! own visibility gates everything inside it while its internal slide
//! selection decides membership.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use crate::entities::attrs::AttrValue;
use crate::entities::keys::{A_END_TIME, A_EYEBALL, A_START_TIME};
use crate::entities::node::{GraphObject, ObjectId};
use crate::entities::node_kind::Renderable;
use crate::entities::presentation::Presentation;
use crate::entities::scene_events::ObjectVisibilityChangedEvent;

/// What the pass needs to know about one deck.
#[derive(Debug, Clone, Copy)]
pub struct DeckView {
    pub master: ObjectId,
    pub current: Option<ObjectId>,
    /// Player position, ms
    pub position: f64,
}

struct DeckContext {
    view: DeckView,
    /// Objects named by any slide of the deck
    members: HashSet<ObjectId>,
}

impl DeckContext {
    fn new(presentation: &Presentation, view: DeckView) -> Self {
        let graph = &presentation.graph;
        let mut members = HashSet::new();
        let slides = std::iter::once(view.master).chain(graph.children(view.master).iter().copied());
        for slide in slides {
            if let Some(s) = graph.slide(slide) {
                members.extend(s.objects());
            }
        }
        Self { view, members }
    }

    fn eligible(&self, presentation: &Presentation, id: ObjectId) -> bool {
        if !self.members.contains(&id) {
            return true;
        }
        let in_slide = |slide: Option<ObjectId>| {
            slide
                .and_then(|s| presentation.graph.slide(s))
                .is_some_and(|s| s.contains_object(id))
        };
        in_slide(Some(self.view.master)) || in_slide(self.view.current)
    }
}

fn time_bound(obj: &GraphObject, key: &str) -> Option<f64> {
    obj.attrs.get(key).and_then(AttrValue::as_f32).map(f64::from)
}

/// True if `position` lies inside the object's declared time window.
pub fn in_time_window(obj: &GraphObject, position: f64) -> bool {
    let after_start = time_bound(obj, A_START_TIME).is_none_or(|start| position >= start);
    let before_end = time_bound(obj, A_END_TIME).is_none_or(|end| position < end);
    after_start && before_end
}

/// Visible rendering objects, scene pre-order.
///
/// `views` is keyed by deck owner (Scene or Component).
pub fn compute_visible(
    presentation: &Presentation,
    views: &HashMap<ObjectId, DeckView>,
) -> IndexSet<ObjectId> {
    let mut visible = IndexSet::new();
    let root = presentation.root();
    let ctx = views.get(&root).map(|v| DeckContext::new(presentation, *v));
    let root_visible = presentation
        .graph
        .get(root)
        .is_some_and(|o| o.attrs.get_bool_or(A_EYEBALL, true));
    for child in presentation.graph.children(root) {
        visit(presentation, views, *child, root_visible, ctx.as_ref(), &mut visible);
    }
    visible
}

fn visit(
    presentation: &Presentation,
    views: &HashMap<ObjectId, DeckView>,
    id: ObjectId,
    parent_visible: bool,
    ctx: Option<&DeckContext>,
    out: &mut IndexSet<ObjectId>,
) {
    let Some(obj) = presentation.graph.get(id) else {
        return;
    };
    let mut visible = parent_visible && obj.attrs.get_bool_or(A_EYEBALL, true);
    if visible && let Some(ctx) = ctx {
        visible = ctx.eligible(presentation, id) && in_time_window(obj, ctx.view.position);
    }
    if visible && obj.kind.renders() {
        out.insert(id);
    }

    let inner = views.get(&id).map(|v| DeckContext::new(presentation, *v));
    let child_ctx = inner.as_ref().or(ctx);
    for child in presentation.graph.children(id) {
        visit(presentation, views, *child, visible, child_ctx, out);
    }
}

/// Notifications turning `old` into `new`: hides first, then shows, each in
/// set order.
pub fn diff(old: &IndexSet<ObjectId>, new: &IndexSet<ObjectId>) -> Vec<ObjectVisibilityChangedEvent> {
    let hidden = old.iter().filter(|id| !new.contains(*id)).map(|id| ObjectVisibilityChangedEvent {
        object: *id,
        visible: false,
    });
    let shown = new.iter().filter(|id| !old.contains(*id)).map(|id| ObjectVisibilityChangedEvent {
        object: *id,
        visible: true,
    });
    hidden.chain(shown).collect()
}
