// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline composed of the three camera channels.

use crate::anchor::ResolveContext;
use crate::keyframe::{Easing, Point3, Rotation};
use crate::track::{KeyPoint, PlaybackMode, Track};
use serde::{Deserialize, Serialize};

/// One sample of every channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSample {
    /// Camera position
    pub translation: Point3,
    /// Camera orientation
    pub rotation: Rotation,
    /// Field of view in degrees
    pub fov: f32,
    /// Translation channel has keyframes
    pub has_translation: bool,
    /// Rotation channel has keyframes
    pub has_rotation: bool,
    /// Field of view channel has keyframes
    pub has_fov: bool,
}

/// Translation, rotation and field of view tracks played as one unit.
///
/// The tracks keep independent keyframes and durations, but share playback
/// mode, loop offset and cursor. The timeline's duration is the longest of
/// the three.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    translation: Track<Point3>,
    rotation: Track<Rotation>,
    fov: Track<f32>,
}

impl Timeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Translation track
    pub fn translation(&self) -> &Track<Point3> {
        &self.translation
    }

    /// Rotation track
    pub fn rotation(&self) -> &Track<Rotation> {
        &self.rotation
    }

    /// Field of view track
    pub fn fov(&self) -> &Track<f32> {
        &self.fov
    }

    /// Insert a translation keyframe, returning the channel's new count
    pub fn add_translation_point(&mut self, point: KeyPoint<Point3>) -> usize {
        self.translation.add_point(point)
    }

    /// Insert a rotation keyframe, returning the channel's new count
    pub fn add_rotation_point(&mut self, point: KeyPoint<Rotation>) -> usize {
        self.rotation.add_point(point)
    }

    /// Insert a field of view keyframe, returning the channel's new count
    pub fn add_fov_point(&mut self, point: KeyPoint<f32>) -> usize {
        self.fov.add_point(point)
    }

    /// Remove a translation keyframe
    pub fn remove_translation_point(&mut self, index: usize) -> Option<KeyPoint<Point3>> {
        self.translation.remove_point(index)
    }

    /// Remove a rotation keyframe
    pub fn remove_rotation_point(&mut self, index: usize) -> Option<KeyPoint<Rotation>> {
        self.rotation.remove_point(index)
    }

    /// Remove a field of view keyframe
    pub fn remove_fov_point(&mut self, index: usize) -> Option<KeyPoint<f32>> {
        self.fov.remove_point(index)
    }

    /// Remove every keyframe on every channel
    pub fn clear_points(&mut self) {
        self.translation.clear_points();
        self.rotation.clear_points();
        self.fov.clear_points();
    }

    /// Clear keyframes and restore default playback settings
    pub fn reset(&mut self) {
        self.clear_points();
        self.reset_playback();
        self.set_playback_mode(PlaybackMode::End);
        self.set_loop_time_offset(0.0);
    }

    /// Whether translation or rotation has anything to play
    pub fn has_motion(&self) -> bool {
        !self.translation.is_empty() || !self.rotation.is_empty()
    }

    /// Total keyframes over all channels
    pub fn point_count(&self) -> usize {
        self.translation.len() + self.rotation.len() + self.fov.len()
    }

    /// Longest channel duration
    pub fn duration(&self) -> f32 {
        self.translation
            .duration()
            .max(self.rotation.duration())
            .max(self.fov.duration())
    }

    /// Re-resolve every relative anchor on every channel
    pub fn refresh_anchors(&mut self, ctx: &ResolveContext<'_>) {
        self.translation.refresh_anchors(ctx);
        self.rotation.refresh_anchors(ctx);
        self.fov.refresh_anchors(ctx);
    }

    /// Sample every channel at `time`
    pub fn sample(&self, time: f32) -> CameraSample {
        CameraSample {
            translation: self.translation.sample(time),
            rotation: self.rotation.sample(time),
            fov: self.fov.sample(time),
            has_translation: !self.translation.is_empty(),
            has_rotation: !self.rotation.is_empty(),
            has_fov: !self.fov.is_empty(),
        }
    }

    /// Remap `time` through the global easing curve
    pub fn eased_time(&self, time: f32, ease_in: bool, ease_out: bool) -> f32 {
        let duration = self.duration();
        if duration <= 0.0 || (!ease_in && !ease_out) {
            return time;
        }
        Easing::apply(time / duration, ease_in, ease_out) * duration
    }

    /// Start all channels from their current cursor
    pub fn start_playback(&mut self) {
        self.translation.start_playback();
        self.rotation.start_playback();
        self.fov.start_playback();
    }

    /// Stop all channels and rewind to zero
    pub fn reset_playback(&mut self) {
        self.translation.reset_playback();
        self.rotation.reset_playback();
        self.fov.reset_playback();
    }

    /// Hold all cursors
    pub fn pause(&mut self) {
        self.translation.pause();
        self.rotation.pause();
        self.fov.pause();
    }

    /// Release all cursors
    pub fn resume(&mut self) {
        self.translation.resume();
        self.rotation.resume();
        self.fov.resume();
    }

    /// Advance every channel against the timeline duration
    pub fn update_playback(&mut self, delta: f32) {
        let end = self.duration();
        self.translation.advance(delta, end);
        self.rotation.advance(delta, end);
        self.fov.advance(delta, end);
    }

    /// Move every cursor, clamped to `[0, duration]`
    pub fn set_playback_time(&mut self, time: f32) {
        let end = self.duration();
        self.translation.seek(time, end);
        self.rotation.seek(time, end);
        self.fov.seek(time, end);
    }

    /// Shared cursor
    pub fn playback_time(&self) -> f32 {
        self.translation.playback_time()
    }

    /// Any channel is playing
    pub fn is_playing(&self) -> bool {
        self.translation.is_playing() || self.rotation.is_playing() || self.fov.is_playing()
    }

    /// Any channel is paused
    pub fn is_paused(&self) -> bool {
        self.translation.is_paused() || self.rotation.is_paused() || self.fov.is_paused()
    }

    /// Set end-of-timeline behavior on every channel
    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.translation.set_playback_mode(mode);
        self.rotation.set_playback_mode(mode);
        self.fov.set_playback_mode(mode);
    }

    /// End-of-timeline behavior
    pub fn playback_mode(&self) -> PlaybackMode {
        self.translation.playback_mode()
    }

    /// Set the loop re-entry time on every channel
    pub fn set_loop_time_offset(&mut self, offset: f32) {
        self.translation.set_loop_time_offset(offset);
        self.rotation.set_loop_time_offset(offset);
        self.fov.set_loop_time_offset(offset);
    }

    /// Loop re-entry time
    pub fn loop_time_offset(&self) -> f32 {
        self.translation.loop_time_offset()
    }
}
