// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-channel keyframe tracks.
//!
//! A [`Track`] owns the time-ordered keyframes of one animated channel
//! (translation, rotation or field of view), samples them with the
//! interpolation requested by each keyframe, and keeps its own playback
//! cursor.

use crate::anchor::{Anchor, AnchorTarget, ResolveContext};
use crate::keyframe::{InterpolationMode, Transition, TrackValue, UnknownName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Segments shorter than this are treated as a jump to the right keyframe
const SEGMENT_EPSILON: f32 = 0.0001;

/// What happens when playback reaches the end of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaybackMode {
    /// Stop at the end
    #[default]
    End,
    /// Wrap back to the loop time offset
    Loop,
    /// Hold the last frame until stopped externally
    Wait,
}

impl PlaybackMode {
    /// Name used in timeline documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Loop => "loop",
            Self::Wait => "wait",
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackMode {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "end" => Ok(Self::End),
            "loop" => Ok(Self::Loop),
            "wait" => Ok(Self::Wait),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// Raw playback mode value outside `0..=2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid playback mode {0}")]
pub struct InvalidPlaybackMode(pub i32);

impl TryFrom<i32> for PlaybackMode {
    type Error = InvalidPlaybackMode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::End),
            1 => Ok(Self::Loop),
            2 => Ok(Self::Wait),
            other => Err(InvalidPlaybackMode(other)),
        }
    }
}

/// A keyframe: transition, anchor and the anchor's resolved value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint<V> {
    /// When and how the value is approached
    pub transition: Transition,
    /// What the value means
    pub anchor: Anchor<V>,
    /// Anchor resolved to a concrete value
    value: V,
}

impl<V: AnchorTarget> KeyPoint<V> {
    /// Create a keyframe, resolving its anchor immediately
    pub fn new(transition: Transition, anchor: Anchor<V>, ctx: &ResolveContext<'_>) -> Self {
        let value = anchor.resolve(ctx);
        Self {
            transition,
            anchor,
            value,
        }
    }

    /// Create a keyframe with an absolute world value
    pub fn world(transition: Transition, value: V) -> Self {
        Self {
            transition,
            anchor: Anchor::World(value),
            value,
        }
    }

    /// Keyframe time in seconds
    pub fn time(&self) -> f32 {
        self.transition.time()
    }

    /// Resolved value
    pub fn value(&self) -> V {
        self.value
    }

    /// Re-resolve the anchor against the current collaborators
    pub fn refresh(&mut self, ctx: &ResolveContext<'_>) {
        if !matches!(self.anchor, Anchor::World(_)) {
            self.value = self.anchor.resolve(ctx);
        }
    }
}

/// Keyframes for one channel plus a playback cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track<V> {
    /// Keyframes ordered by time (ties keep insertion order)
    points: Vec<KeyPoint<V>>,
    /// Current playback time
    playback_time: f32,
    /// Cursor advances on update
    playing: bool,
    /// Cursor is held while playing
    paused: bool,
    /// End-of-track behavior
    mode: PlaybackMode,
    /// Re-entry time for [`PlaybackMode::Loop`]
    loop_time_offset: f32,
}

impl<V> Default for Track<V> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            playback_time: 0.0,
            playing: false,
            paused: false,
            mode: PlaybackMode::End,
            loop_time_offset: 0.0,
        }
    }
}

impl<V: AnchorTarget> Track<V> {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a keyframe in time order and return the new keyframe count
    pub fn add_point(&mut self, point: KeyPoint<V>) -> usize {
        let index = self.points.partition_point(|p| p.time() <= point.time());
        self.points.insert(index, point);
        self.points.len()
    }

    /// Remove the keyframe at `index`
    pub fn remove_point(&mut self, index: usize) -> Option<KeyPoint<V>> {
        if index >= self.points.len() {
            tracing::warn!(
                "Keyframe index {} out of range (track has {} keyframes)",
                index,
                self.points.len()
            );
            return None;
        }
        let removed = self.points.remove(index);
        self.playback_time = self.playback_time.min(self.duration());
        Some(removed)
    }

    /// Keyframe at `index`
    pub fn point(&self, index: usize) -> Option<&KeyPoint<V>> {
        let point = self.points.get(index);
        if point.is_none() {
            tracing::warn!(
                "Keyframe index {} out of range (track has {} keyframes)",
                index,
                self.points.len()
            );
        }
        point
    }

    /// All keyframes in time order
    pub fn points(&self) -> &[KeyPoint<V>] {
        &self.points
    }

    /// Remove every keyframe and rewind the cursor
    pub fn clear_points(&mut self) {
        self.points.clear();
        self.playback_time = 0.0;
    }

    /// Keyframe count
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the track has no keyframes
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time of the last keyframe, zero when empty
    pub fn duration(&self) -> f32 {
        self.points.last().map(KeyPoint::time).unwrap_or(0.0)
    }

    /// Re-resolve every relative anchor
    pub fn refresh_anchors(&mut self, ctx: &ResolveContext<'_>) {
        for point in &mut self.points {
            point.refresh(ctx);
        }
    }

    /// Sample the channel at `time`.
    ///
    /// Times before the first or after the last keyframe clamp to that
    /// keyframe's value, and NaN reads as the first keyframe. An empty track
    /// yields [`TrackValue::sentinel`].
    pub fn sample(&self, time: f32) -> V {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            tracing::debug!("Sampling empty track, returning sentinel");
            return V::sentinel();
        };

        if self.points.len() == 1 || time.is_nan() || time <= first.time() {
            return first.value();
        }
        if time >= last.time() {
            return last.value();
        }

        let right = self.points.partition_point(|p| p.time() <= time);
        let Some(left) = right.checked_sub(1) else {
            return first.value();
        };
        let (Some(lo), Some(hi)) = (self.points.get(left), self.points.get(right)) else {
            return last.value();
        };

        let span = hi.time() - lo.time();
        if span < SEGMENT_EPSILON {
            return hi.value();
        }
        let u = ((time - lo.time()) / span).clamp(0.0, 1.0);

        match hi.transition.mode() {
            InterpolationMode::None => lo.value(),
            InterpolationMode::Linear => lo.value().lerp(&hi.value(), u),
            InterpolationMode::CubicHermite => {
                let before = &self.points[left.saturating_sub(1)];
                let after = &self.points[(right + 1).min(self.points.len() - 1)];
                V::catmull_rom(&before.value(), &lo.value(), &hi.value(), &after.value(), u)
            }
        }
    }

    /// Begin advancing the cursor from its current position
    pub fn start_playback(&mut self) {
        self.playing = true;
        self.paused = false;
    }

    /// Stop and rewind to zero
    pub fn reset_playback(&mut self) {
        self.playback_time = 0.0;
        self.playing = false;
        self.paused = false;
    }

    /// Hold the cursor
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Release the cursor
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Advance by `delta` seconds against this track's own duration
    pub fn update_playback(&mut self, delta: f32) {
        let end = self.duration();
        self.advance(delta, end);
    }

    /// Advance by `delta` seconds, treating `end` as the end of playback
    pub(crate) fn advance(&mut self, delta: f32, end: f32) {
        if !self.playing || self.paused {
            return;
        }

        self.playback_time += delta.max(0.0);
        if self.playback_time < end {
            return;
        }

        match self.mode {
            PlaybackMode::End => {
                self.playback_time = end;
                self.playing = false;
            }
            PlaybackMode::Loop => {
                let start = self.loop_time_offset.min(end);
                let span = end - start;
                if span > SEGMENT_EPSILON {
                    self.playback_time = start + (self.playback_time - end) % span;
                } else {
                    self.playback_time = start;
                }
            }
            PlaybackMode::Wait => {
                self.playback_time = end;
            }
        }
    }

    /// Move the cursor, clamped to `[0, duration]`
    pub fn set_playback_time(&mut self, time: f32) {
        let end = self.duration();
        self.seek(time, end);
    }

    pub(crate) fn seek(&mut self, time: f32, end: f32) {
        let time = if time.is_nan() { 0.0 } else { time };
        self.playback_time = time.clamp(0.0, end.max(0.0));
    }

    /// Current cursor
    pub fn playback_time(&self) -> f32 {
        self.playback_time
    }

    /// Whether the cursor is live (paused tracks still count as playing)
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether the cursor is held
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Set end-of-track behavior
    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    /// End-of-track behavior
    pub fn playback_mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Set the loop re-entry time (negative values clamp to zero)
    pub fn set_loop_time_offset(&mut self, offset: f32) {
        self.loop_time_offset = offset.max(0.0);
    }

    /// Loop re-entry time
    pub fn loop_time_offset(&self) -> f32 {
        self.loop_time_offset
    }
}
