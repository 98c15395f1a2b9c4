//! Property changes applied when a slide becomes active.
//!
//! A `ChangeList` is the ordered set of `(property, value)` pairs one slide
//! sets on one target object. Later entries for the same property win.

use serde::{Deserialize, Serialize};

use super::attrs::{split_channel, AttrValue};

/// One named property and the value a slide assigns to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub name: String,
    pub value: AttrValue,
}

impl PropertyChange {
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True when this change writes `path`, either exactly or by setting the
    /// whole vector that `path` is a channel of.
    pub fn covers(&self, path: &str) -> bool {
        if self.name == path {
            return true;
        }
        matches!(split_channel(path), Some((base, _)) if base == self.name)
    }
}

/// Ordered list of changes for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeList {
    changes: Vec<PropertyChange>,
}

impl ChangeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change. An existing entry for the same property is replaced
    /// in place so the list keeps first-seen order.
    pub fn push(&mut self, change: PropertyChange) {
        if let Some(existing) = self.changes.iter_mut().find(|c| c.name == change.name) {
            existing.value = change.value;
        } else {
            self.changes.push(change);
        }
    }

    /// Merge another list into this one (later values win).
    pub fn extend(&mut self, other: ChangeList) {
        for change in other.changes {
            self.push(change);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyChange> {
        self.changes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.changes
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }

    /// Value this list gives `path`, reading a channel out of a whole-vector
    /// change when needed.
    pub fn value_for(&self, path: &str) -> Option<AttrValue> {
        if let Some(v) = self.get(path) {
            return Some(v.clone());
        }
        let (base, idx) = split_channel(path)?;
        self.get(base)
            .and_then(|v| v.channel(idx))
            .map(AttrValue::Float)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyChange> {
        let pos = self.changes.iter().position(|c| c.name == name)?;
        Some(self.changes.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl FromIterator<PropertyChange> for ChangeList {
    fn from_iter<I: IntoIterator<Item = PropertyChange>>(iter: I) -> Self {
        let mut list = ChangeList::new();
        for change in iter {
            list.push(change);
        }
        list
    }
}
