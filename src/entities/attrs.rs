//! Property storage shared by every graph object.
//!
//! Objects keep their live properties in an `Attrs` map (name → typed value).
//! Slides address properties by dotted path: `"opacity"` names a whole
//! property, `"rotation.y"` names one channel of a vector property.
//!
//! Channel notes:
//! - Channels are `x/y/z/w` (or `r/g/b/a`) on `Vec3`/`Vec4` values.
//! - A key that literally contains a dot is matched first, so scalar
//!   properties named `"a.b"` still work.
//! - Writing a channel of a missing vector creates it zero-filled.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl AttrValue {
    /// Scalar view used by animation channels.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f32),
            AttrValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            AttrValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Read one channel of a vector value.
    pub fn channel(&self, idx: usize) -> Option<f32> {
        match self {
            AttrValue::Vec3(v) => v.get(idx).copied(),
            AttrValue::Vec4(v) => v.get(idx).copied(),
            _ => None,
        }
    }

    /// Short type name for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "Bool",
            AttrValue::Str(_) => "Str",
            AttrValue::Int(_) => "Int",
            AttrValue::Float(_) => "Float",
            AttrValue::Vec3(_) => "Vec3",
            AttrValue::Vec4(_) => "Vec4",
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::Float(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v as f32)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<[f32; 3]> for AttrValue {
    fn from(v: [f32; 3]) -> Self {
        AttrValue::Vec3(v)
    }
}

impl From<[f64; 3]> for AttrValue {
    fn from(v: [f64; 3]) -> Self {
        AttrValue::Vec3(v.map(|c| c as f32))
    }
}

/// Map a channel suffix to a vector component index.
pub fn channel_index(suffix: &str) -> Option<usize> {
    match suffix {
        "x" | "r" => Some(0),
        "y" | "g" => Some(1),
        "z" | "b" => Some(2),
        "w" | "a" => Some(3),
        _ => None,
    }
}

/// Split `"rotation.y"` into `("rotation", 1)`. Returns None for plain names.
pub fn split_channel(path: &str) -> Option<(&str, usize)> {
    let (base, suffix) = path.rsplit_once('.')?;
    channel_index(suffix).map(|idx| (base, idx))
}

/// Property container: name → typed value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attrs {
    #[serde(default)]
    map: IndexMap<String, AttrValue>,
}

impl Attrs {
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: AttrValue) {
        self.map.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.map.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.map.get(key) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        self.map.get(key).and_then(AttrValue::as_f32)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(AttrValue::as_bool)
    }

    /// Get float value with custom default
    pub fn get_float_or(&self, key: &str, default: f32) -> f32 {
        self.get_float(key).unwrap_or(default)
    }

    /// Get bool value with custom default
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Remove attribute by key
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.map.shift_remove(key)
    }

    /// Iterate over all attributes (key, value)
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // === Dotted path access ===

    /// Resolve a property path, reading a single channel for `"base.c"`.
    pub fn get_path(&self, path: &str) -> Option<AttrValue> {
        if let Some(v) = self.map.get(path) {
            return Some(v.clone());
        }
        let (base, idx) = split_channel(path)?;
        self.map
            .get(base)
            .and_then(|v| v.channel(idx))
            .map(AttrValue::Float)
    }

    /// Write a property path. Returns true if the stored value changed.
    ///
    /// Channel writes need a scalar value; anything else is refused.
    pub fn set_path(&mut self, path: &str, value: AttrValue) -> bool {
        if self.map.contains_key(path) || split_channel(path).is_none() {
            return self.replace(path, value);
        }
        let Some((base, idx)) = split_channel(path) else {
            return false;
        };
        let Some(scalar) = value.as_f32() else {
            log::warn!(
                "Channel {} needs a scalar, got {}",
                path,
                value.type_name()
            );
            return false;
        };
        let entry = self.map.entry(base.to_string()).or_insert_with(|| {
            if idx < 3 {
                AttrValue::Vec3([0.0; 3])
            } else {
                AttrValue::Vec4([0.0; 4])
            }
        });
        match entry {
            AttrValue::Vec3(v) if idx < 3 => swap_channel(&mut v[idx], scalar),
            AttrValue::Vec4(v) => swap_channel(&mut v[idx], scalar),
            other => {
                log::warn!(
                    "Property {} is {}, cannot write channel {}",
                    base,
                    other.type_name(),
                    idx
                );
                false
            }
        }
    }

    /// Remove a property path. Channel paths are not removable on their own.
    pub fn remove_path(&mut self, path: &str) -> bool {
        self.map.shift_remove(path).is_some()
    }

    fn replace(&mut self, key: &str, value: AttrValue) -> bool {
        match self.map.get_mut(key) {
            Some(old) if *old == value => false,
            Some(old) => {
                *old = value;
                true
            }
            None => {
                self.map.insert(key.to_string(), value);
                true
            }
        }
    }
}

fn swap_channel(slot: &mut f32, value: f32) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl FromIterator<(String, AttrValue)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}
