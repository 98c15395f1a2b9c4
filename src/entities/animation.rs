//! Keyframe animation tracks.
//!
//! A track animates one scalar property path (`"opacity"`, `"rotation.y"`) on
//! one target object. Track identity is `(target, property)`: replacing the
//! keyframes of a dynamic track keeps the same track.
//!
//! # Easing
//!
//! `EaseInOut` segments blend with a 1D cubic Bezier
//! `B(u) = 3(1-u)²u·p1 + 3(1-u)u²·p2 + u³` where
//! `p1 = (1 - easeOut₀)/3` and `p2 = 1 - (1 - easeIn₁)/3`, the ease values
//! being the percentages of the segment's left and right keyframes scaled to
//! `0..=1`. 0% on both ends gives `B(u) = u` (linear), 100% on both ends gives
//! smoothstep `3u² - 2u³`.
//!
//! `Bezier` segments use per-keyframe `(time, value)` tangent handles and
//! solve the curve for time by bisection. Missing handles default to the
//! thirds of the segment, which is linear.

use serde::{Deserialize, Serialize};

use super::node::ObjectId;

/// Bisection steps for Bezier time solving; 2^-40 of a segment is far below
/// a millisecond for any realistic slide.
const BEZIER_STEPS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    EaseInOut,
    Bezier,
}

/// Single key: time in ms on the slide timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    pub time: f64,
    pub value: f32,
    /// Ease into this key, percent (0 = linear, 100 = maximal)
    #[serde(default)]
    pub ease_in: f32,
    /// Ease out of this key, percent
    #[serde(default)]
    pub ease_out: f32,
    /// Incoming Bezier handle (time, value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tangent_in: Option<(f64, f32)>,
    /// Outgoing Bezier handle (time, value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tangent_out: Option<(f64, f32)>,
}

impl KeyFrame {
    pub fn new(time: f64, value: f32) -> Self {
        Self {
            time,
            value,
            ease_in: 0.0,
            ease_out: 0.0,
            tangent_in: None,
            tangent_out: None,
        }
    }

    pub fn eased(time: f64, value: f32, ease_in: f32, ease_out: f32) -> Self {
        Self {
            ease_in,
            ease_out,
            ..Self::new(time, value)
        }
    }
}

/// Keyframe curve bound to `(target, property)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub target: ObjectId,
    pub property: String,
    pub interpolation: Interpolation,
    keyframes: Vec<KeyFrame>,
    /// Keyframes may be replaced at runtime
    pub dynamic: bool,
    /// Dynamic tracks only count toward slide duration when this is set
    pub extends_duration: bool,
}

impl AnimationTrack {
    pub fn new(
        target: ObjectId,
        property: impl Into<String>,
        interpolation: Interpolation,
        keyframes: Vec<KeyFrame>,
    ) -> Self {
        let mut track = Self {
            target,
            property: property.into(),
            interpolation,
            keyframes: Vec::new(),
            dynamic: false,
            extends_duration: false,
        };
        track.set_keyframes(keyframes);
        track
    }

    /// Builder: mark as a dynamic track.
    pub fn into_dynamic(mut self, extends_duration: bool) -> Self {
        self.dynamic = true;
        self.extends_duration = extends_duration;
        self
    }

    pub fn keyframes(&self) -> &[KeyFrame] {
        &self.keyframes
    }

    /// Replace all keyframes. Keys with non-finite times are dropped and the
    /// rest sorted ascending.
    pub fn set_keyframes(&mut self, mut keyframes: Vec<KeyFrame>) {
        let before = keyframes.len();
        keyframes.retain(|k| k.time.is_finite() && k.value.is_finite());
        if keyframes.len() != before {
            log::warn!(
                "Track {}:{} dropped {} degenerate keyframes",
                self.target,
                self.property,
                before - keyframes.len()
            );
        }
        if !keyframes.windows(2).all(|w| w[0].time <= w[1].time) {
            log::debug!("Track {}:{} keyframes out of order, sorting", self.target, self.property);
            keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        self.keyframes = keyframes;
    }

    /// Identity check used for lookup and replacement.
    pub fn is(&self, target: ObjectId, property: &str) -> bool {
        self.target == target && self.property == property
    }

    /// Time of the last key (0 for an empty track).
    pub fn duration(&self) -> f64 {
        self.keyframes.last().map(|k| k.time.max(0.0)).unwrap_or(0.0)
    }

    /// Whether this track's duration counts toward its slide's duration.
    pub fn counts_toward_duration(&self) -> bool {
        !self.dynamic || self.extends_duration
    }

    /// Evaluate at `t` ms. None for a track without keyframes.
    pub fn value_at(&self, t: f64) -> Option<f32> {
        let first = self.keyframes.first()?;
        let last = self.keyframes.last()?;
        if t <= first.time {
            return Some(first.value);
        }
        if t >= last.time {
            return Some(last.value);
        }
        // First key strictly after t; t > first.time guarantees idx >= 1
        let idx = self.keyframes.partition_point(|k| k.time <= t);
        let k0 = &self.keyframes[idx - 1];
        let k1 = &self.keyframes[idx];
        Some(self.segment(k0, k1, t))
    }

    fn segment(&self, k0: &KeyFrame, k1: &KeyFrame, t: f64) -> f32 {
        let span = k1.time - k0.time;
        if span <= 0.0 {
            return k1.value;
        }
        let u = ((t - k0.time) / span).clamp(0.0, 1.0);
        match self.interpolation {
            Interpolation::Linear => lerp(k0.value, k1.value, u),
            Interpolation::EaseInOut => {
                let eased = ease_in_out(u, k0.ease_out, k1.ease_in);
                lerp(k0.value, k1.value, eased)
            }
            Interpolation::Bezier => bezier_segment(k0, k1, t),
        }
    }
}

fn lerp(a: f32, b: f32, u: f64) -> f32 {
    (a as f64 + (b as f64 - a as f64) * u) as f32
}

/// 1D cubic Bezier with fixed end points 0 and 1.
fn bezier_1d(u: f64, p1: f64, p2: f64) -> f64 {
    let inv = 1.0 - u;
    3.0 * inv * inv * u * p1 + 3.0 * inv * u * u * p2 + u * u * u
}

/// Progress through a segment given the left key's ease-out and the right
/// key's ease-in percentages.
pub fn ease_in_out(u: f64, ease_out_pct: f32, ease_in_pct: f32) -> f64 {
    let a = (ease_out_pct as f64 / 100.0).clamp(0.0, 1.0);
    let b = (ease_in_pct as f64 / 100.0).clamp(0.0, 1.0);
    let p1 = (1.0 - a) / 3.0;
    let p2 = 1.0 - (1.0 - b) / 3.0;
    bezier_1d(u, p1, p2)
}

fn bezier_segment(k0: &KeyFrame, k1: &KeyFrame, t: f64) -> f32 {
    let span = k1.time - k0.time;
    let dv = (k1.value - k0.value) as f64;
    let (c1t, c1v) = k0
        .tangent_out
        .map(|(ct, cv)| (ct, cv as f64))
        .unwrap_or((k0.time + span / 3.0, k0.value as f64 + dv / 3.0));
    let (c2t, c2v) = k1
        .tangent_in
        .map(|(ct, cv)| (ct, cv as f64))
        .unwrap_or((k1.time - span / 3.0, k1.value as f64 - dv / 3.0));
    // Handles outside the segment would make time non-monotonic
    let c1t = c1t.clamp(k0.time, k1.time);
    let c2t = c2t.clamp(k0.time, k1.time);

    let cubic = |p0: f64, p1: f64, p2: f64, p3: f64, s: f64| {
        let inv = 1.0 - s;
        inv * inv * inv * p0 + 3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s * p3
    };

    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..BEZIER_STEPS {
        let mid = 0.5 * (lo + hi);
        if cubic(k0.time, c1t, c2t, k1.time, mid) < t {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let s = 0.5 * (lo + hi);
    cubic(k0.value as f64, c1v, c2v, k1.value as f64, s) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ObjectId {
        ObjectId::new(1, 0)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_linear_clamps_and_interpolates() {
        let track = AnimationTrack::new(
            target(),
            "opacity",
            Interpolation::Linear,
            vec![KeyFrame::new(1000.0, 0.0), KeyFrame::new(2000.0, 100.0)],
        );
        assert_eq!(track.value_at(0.0), Some(0.0));
        assert_eq!(track.value_at(1500.0), Some(50.0));
        assert_eq!(track.value_at(5000.0), Some(100.0));
        assert_eq!(track.duration(), 2000.0);
    }

    #[test]
    fn test_empty_track_contributes_nothing() {
        let track = AnimationTrack::new(target(), "opacity", Interpolation::Linear, vec![]);
        assert_eq!(track.value_at(10.0), None);
        assert_eq!(track.duration(), 0.0);
    }

    #[test]
    fn test_unsorted_keys_are_sorted() {
        let track = AnimationTrack::new(
            target(),
            "x",
            Interpolation::Linear,
            vec![KeyFrame::new(1000.0, 10.0), KeyFrame::new(0.0, 0.0), KeyFrame::new(f64::NAN, 3.0)],
        );
        assert_eq!(track.keyframes().len(), 2);
        assert_eq!(track.keyframes()[0].time, 0.0);
        assert_eq!(track.value_at(500.0), Some(5.0));
    }

    #[test]
    fn test_ease_zero_is_linear() {
        for i in 0..=10 {
            let u = i as f64 / 10.0;
            assert!((ease_in_out(u, 0.0, 0.0) - u).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ease_full_is_smoothstep() {
        let u = 0.25;
        let smooth = 3.0 * u * u - 2.0 * u * u * u;
        assert!((ease_in_out(u, 100.0, 100.0) - smooth).abs() < 1e-9);
        // Ease slows the start
        assert!(ease_in_out(0.1, 100.0, 100.0) < 0.1);
    }

    #[test]
    fn test_ease_in_out_track() {
        let track = AnimationTrack::new(
            target(),
            "opacity",
            Interpolation::EaseInOut,
            vec![KeyFrame::eased(0.0, 0.0, 0.0, 100.0), KeyFrame::eased(1000.0, 100.0, 100.0, 0.0)],
        );
        assert!(approx(track.value_at(500.0).unwrap_or_default(), 50.0));
        assert!(track.value_at(100.0).unwrap_or_default() < 10.0);
    }

    #[test]
    fn test_bezier_default_handles_are_linear() {
        let track = AnimationTrack::new(
            target(),
            "position.x",
            Interpolation::Bezier,
            vec![KeyFrame::new(0.0, 0.0), KeyFrame::new(1000.0, 100.0)],
        );
        assert!(approx(track.value_at(250.0).unwrap_or_default(), 25.0));
        assert!(approx(track.value_at(750.0).unwrap_or_default(), 75.0));
    }

    #[test]
    fn test_dynamic_duration_flag() {
        let keys = vec![KeyFrame::new(0.0, 0.0), KeyFrame::new(4000.0, 1.0)];
        let plain = AnimationTrack::new(target(), "x", Interpolation::Linear, keys.clone());
        let dynamic = plain.clone().into_dynamic(false);
        let extending = plain.clone().into_dynamic(true);
        assert!(plain.counts_toward_duration());
        assert!(!dynamic.counts_toward_duration());
        assert!(extending.counts_toward_duration());
    }
}
