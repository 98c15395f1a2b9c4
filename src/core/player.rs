//! SlidePlayer - timeline driver for one slide deck.
//!
//! **Architecture**: the player does NOT own the deck or the presentation.
//! It holds timing state only; the scene manager owns one player per deck,
//! feeds it the current slide's duration and play mode, and turns state and
//! position differences into notifications.
//!
//! # Timing Model
//!
//! Position is in milliseconds on the current slide's timeline. `advance(dt)`
//! consumes the whole `dt` (scaled by the playback rate), wrapping or bouncing
//! as many times as needed, so skipped ticks do not lose time.
//!
//! # Termination
//!
//! | mode            | at end of timeline                            |
//! |-----------------|-----------------------------------------------|
//! | `StopAtEnd`     | stop, position stays at the end               |
//! | `Looping`       | jump to start, keep playing                   |
//! | `PingPong`      | reverse direction, keep playing, count bounce |
//! | `Ping`          | one bounce, then stop back at the start       |
//! | `PlayThroughTo` | stop, caller switches slide                   |
//!
//! With a negative rate the start of the timeline (0) is the end.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::entities::slide::{InitialPlayState, PlayMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    /// Halted with position kept; `play()` resumes
    Paused,
}

/// What one `advance` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Not playing, nothing happened
    Idle,
    /// Position moved, still playing
    Moved,
    /// Timeline ended and the player stopped
    Finished,
    /// Timeline ended on a `PlayThroughTo` slide; player stopped, the deck
    /// must move to the play-through target
    PlayThrough,
}

/// Playback state for one deck (does NOT own the deck).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlidePlayer {
    state: PlayerState,
    position: f64,
    duration: f64,
    rate: f64,
    /// +1 forward, -1 on the return leg of a bounce
    direction: f64,
    bounce_count: u32,
    /// Wall time left over when the last `advance` ended the timeline
    #[serde(skip)]
    overflow: f64,
}

impl Default for SlidePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidePlayer {
    pub fn new() -> Self {
        Self {
            state: PlayerState::Stopped,
            position: 0.0,
            duration: 0.0,
            rate: 1.0,
            direction: 1.0,
            bounce_count: 0,
            overflow: 0.0,
        }
    }

    // === Accessors ===

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    /// Milliseconds on the current slide timeline
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of direction reversals since the last start
    pub fn bounce_count(&self) -> u32 {
        self.bounce_count
    }

    /// Unused part of the last `advance` dt (ms of wall time) when the
    /// timeline ended inside it
    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    fn start_position(&self) -> f64 {
        if self.rate < 0.0 {
            self.duration
        } else {
            0.0
        }
    }

    fn at_end(&self) -> bool {
        if self.rate < 0.0 {
            self.position <= 0.0
        } else {
            self.position >= self.duration
        }
    }

    // === Slide entry ===

    /// Prepare for a freshly entered slide: rewind and honor its initial
    /// play state.
    pub fn enter_slide(&mut self, duration: f64, initial: InitialPlayState) {
        self.duration = sanitize_duration(duration);
        self.direction = 1.0;
        self.bounce_count = 0;
        self.position = self.start_position();
        self.state = match initial {
            InitialPlayState::Play => PlayerState::Playing,
            InitialPlayState::Stop => PlayerState::Stopped,
        };
        debug!(
            "Player entered slide: duration {}ms, state {:?}",
            self.duration, self.state
        );
    }

    /// Update the duration (slide content edited); position is clamped.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = sanitize_duration(duration);
        self.position = self.position.clamp(0.0, self.duration);
    }

    // === Transport ===

    /// Stopped/Paused → Playing. No-op if already playing. A player parked
    /// at the end of its timeline restarts from the beginning.
    pub fn play(&mut self) -> bool {
        if self.state == PlayerState::Playing {
            return false;
        }
        if self.state == PlayerState::Stopped {
            self.direction = 1.0;
            self.bounce_count = 0;
            if self.at_end() && self.duration > 0.0 {
                self.position = self.start_position();
            }
        }
        self.state = PlayerState::Playing;
        trace!("Playback started at {}ms", self.position);
        true
    }

    /// Playing → Paused, keeping the position.
    pub fn pause(&mut self) -> bool {
        if self.state != PlayerState::Playing {
            return false;
        }
        self.state = PlayerState::Paused;
        trace!("Playback paused at {}ms", self.position);
        true
    }

    /// Always stops and rewinds to 0. Returns true if anything changed.
    pub fn stop(&mut self) -> bool {
        let changed = self.state != PlayerState::Stopped || self.position != 0.0;
        self.state = PlayerState::Stopped;
        self.position = 0.0;
        self.direction = 1.0;
        self.bounce_count = 0;
        if changed {
            trace!("Playback stopped");
        }
        changed
    }

    /// Jump to `t` ms, clamped to `[0, duration]`. Returns the new position.
    pub fn seek(&mut self, t: f64) -> f64 {
        self.position = if t.is_finite() {
            t.clamp(0.0, self.duration)
        } else {
            warn!("Ignoring non-finite seek target {}", t);
            self.position
        };
        self.position
    }

    /// Set the playback rate; negative plays backward. Returns false for a
    /// non-finite or zero rate.
    pub fn set_playback_rate(&mut self, rate: f64) -> bool {
        if !rate.is_finite() || rate == 0.0 {
            warn!("Ignoring invalid playback rate {}", rate);
            return false;
        }
        self.rate = rate;
        true
    }

    // === Tick ===

    /// Advance the timeline by `dt` ms of wall time.
    pub fn advance(&mut self, dt: f64, mode: PlayMode) -> Advance {
        self.overflow = 0.0;
        if self.state != PlayerState::Playing || dt <= 0.0 || !dt.is_finite() {
            return Advance::Idle;
        }
        if self.duration <= 0.0 {
            return self.zero_length_end(dt, mode);
        }

        let mut remaining = dt * self.rate.abs();
        loop {
            let sign = self.direction * self.rate.signum();
            let target = self.position + sign * remaining;
            if (sign > 0.0 && target < self.duration) || (sign < 0.0 && target > 0.0) {
                self.position = target;
                return Advance::Moved;
            }

            let boundary = if sign > 0.0 { self.duration } else { 0.0 };
            remaining -= (boundary - self.position).abs();
            self.position = boundary;

            match mode {
                PlayMode::StopAtEnd => {
                    self.state = PlayerState::Stopped;
                    self.overflow = remaining / self.rate.abs();
                    debug!("Timeline end reached at {}ms, stopping", self.position);
                    return Advance::Finished;
                }
                PlayMode::PlayThroughTo => {
                    self.state = PlayerState::Stopped;
                    self.overflow = remaining / self.rate.abs();
                    debug!("Timeline end reached, playing through");
                    return Advance::PlayThrough;
                }
                PlayMode::Looping => {
                    self.position = if sign > 0.0 { 0.0 } else { self.duration };
                    remaining %= self.duration;
                    trace!("Timeline loop, {}ms carried over", remaining);
                }
                PlayMode::PingPong => {
                    self.direction = -self.direction;
                    self.bounce_count = self.bounce_count.saturating_add(1);
                    // Skip whole round trips in one go
                    let round_trip = 2.0 * self.duration;
                    if remaining >= round_trip {
                        let trips = (remaining / round_trip).floor();
                        // Float-to-int casts saturate at u32::MAX
                        self.bounce_count = self.bounce_count.saturating_add((2.0 * trips) as u32);
                        remaining %= round_trip;
                    }
                    trace!("Timeline bounce #{}", self.bounce_count);
                }
                PlayMode::Ping => {
                    if self.bounce_count == 0 {
                        self.direction = -self.direction;
                        self.bounce_count = 1;
                        trace!("Ping bounce");
                    } else {
                        self.state = PlayerState::Stopped;
                        self.direction = 1.0;
                        self.overflow = remaining / self.rate.abs();
                        debug!("Ping finished at {}ms", self.position);
                        return Advance::Finished;
                    }
                }
            }
        }
    }

    fn zero_length_end(&mut self, dt: f64, mode: PlayMode) -> Advance {
        match mode {
            // Nothing to loop over; keep playing in place
            PlayMode::Looping | PlayMode::PingPong => Advance::Idle,
            PlayMode::PlayThroughTo => {
                self.state = PlayerState::Stopped;
                self.overflow = dt;
                Advance::PlayThrough
            }
            PlayMode::StopAtEnd | PlayMode::Ping => {
                self.state = PlayerState::Stopped;
                self.overflow = dt;
                Advance::Finished
            }
        }
    }
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() {
        duration.max(0.0)
    } else {
        warn!("Invalid slide duration {}, using 0", duration);
        0.0
    }
}
