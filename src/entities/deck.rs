//! SlideDeck - cursor over the numbered slides of one master slide.
//!
//! The deck does not own slides; it reads the master's children from the
//! graph each time, so runtime slide additions are picked up. At either end
//! of the deck `next_slide`/`previous_slide` report nothing and leave the
//! cursor alone; interpreting the boundary is the player's job.

use super::graph::SceneGraph;
use super::node::ObjectId;
use super::slide::SlideRef;

/// Result of a successful cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckTransition {
    pub previous: Option<usize>,
    pub current: usize,
}

impl DeckTransition {
    /// Same slide set again.
    pub fn is_reentry(&self) -> bool {
        self.previous == Some(self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDeck {
    master: ObjectId,
    current: Option<usize>,
    previous: Option<usize>,
}

impl SlideDeck {
    pub fn new(master: ObjectId) -> Self {
        Self {
            master,
            current: None,
            previous: None,
        }
    }

    pub fn master(&self) -> ObjectId {
        self.master
    }

    pub fn slides<'g>(&self, graph: &'g SceneGraph) -> &'g [ObjectId] {
        graph.children(self.master)
    }

    pub fn slide_count(&self, graph: &SceneGraph) -> usize {
        self.slides(graph).len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.previous
    }

    pub fn current_slide(&self, graph: &SceneGraph) -> Option<ObjectId> {
        self.current.and_then(|i| self.slide_at(graph, i))
    }

    pub fn slide_at(&self, graph: &SceneGraph, index: usize) -> Option<ObjectId> {
        self.slides(graph).get(index).copied()
    }

    pub fn index_of(&self, graph: &SceneGraph, slide: ObjectId) -> Option<usize> {
        self.slides(graph).iter().position(|s| *s == slide)
    }

    pub fn index_by_name(&self, graph: &SceneGraph, name: &str) -> Option<usize> {
        self.slides(graph)
            .iter()
            .position(|s| graph.get(*s).is_some_and(|o| o.name == name))
    }

    pub fn resolve(&self, graph: &SceneGraph, target: &SlideRef) -> Option<usize> {
        match target {
            SlideRef::Index(i) if *i < self.slide_count(graph) => Some(*i),
            SlideRef::Index(_) => None,
            SlideRef::Name(name) => self.index_by_name(graph, name),
        }
    }

    /// Move the cursor. Out-of-range indices are ignored (None, no change).
    pub fn set_current_index(&mut self, graph: &SceneGraph, index: i32) -> Option<DeckTransition> {
        let count = self.slide_count(graph);
        if index < 0 || index as usize >= count {
            return None;
        }
        let index = index as usize;
        self.previous = self.current;
        self.current = Some(index);
        Some(DeckTransition {
            previous: self.previous,
            current: index,
        })
    }

    /// Index after the current one, if any.
    pub fn next_index(&self, graph: &SceneGraph) -> Option<usize> {
        let next = self.current? + 1;
        (next < self.slide_count(graph)).then_some(next)
    }

    /// Index before the current one, if any.
    pub fn prev_index(&self) -> Option<usize> {
        self.current?.checked_sub(1)
    }

    /// Advance to the next sibling. None (and no move) at the last slide.
    pub fn next_slide(&mut self, graph: &SceneGraph) -> Option<DeckTransition> {
        let next = self.next_index(graph)?;
        self.set_current_index(graph, next as i32)
    }

    /// Step back to the previous sibling. None (and no move) at the first slide.
    pub fn previous_slide(&mut self, graph: &SceneGraph) -> Option<DeckTransition> {
        let prev = self.prev_index()?;
        self.set_current_index(graph, prev as i32)
    }

    /// Drop a cursor that no longer points at a slide (slides removed at runtime).
    pub fn revalidate(&mut self, graph: &SceneGraph) {
        let count = self.slide_count(graph);
        if self.current.is_some_and(|c| c >= count) {
            self.current = count.checked_sub(1);
        }
        if self.previous.is_some_and(|p| p >= count) {
            self.previous = None;
        }
    }
}
