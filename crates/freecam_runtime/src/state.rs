// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identities, per-timeline state and operation options.

use freecam_sequencer::{Rotation, Timeline};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a calling plugin. `0` is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginHandle(pub u32);

impl PluginHandle {
    /// Sentinel value rejected by every operation
    pub const NONE: Self = Self(0);

    /// Whether this is not the sentinel
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timeline identifier, assigned from 1 upward and never reused. `0` means
/// "no timeline".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineId(pub u64);

impl TimelineId {
    /// Sentinel value: no timeline
    pub const NONE: Self = Self(0);

    /// Whether this is not the sentinel
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Animated channel of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Camera position
    Translation,
    /// Camera orientation
    Rotation,
    /// Field of view
    Fov,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Translation => "translation",
            Self::Rotation => "rotation",
            Self::Fov => "fov",
        })
    }
}

/// How fast a timeline plays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackSpeed {
    /// Time multiplier
    Speed(f32),
    /// Total wall-clock seconds to play the whole timeline in
    Duration(f32),
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::Speed(1.0)
    }
}

impl PlaybackSpeed {
    /// Effective multiplier for a timeline of `timeline_duration` seconds.
    ///
    /// Non-positive or non-finite inputs fall back to 1x with a warning, as
    /// does a duration request for a timeline of zero length.
    pub fn multiplier(&self, timeline_duration: f32) -> f32 {
        match *self {
            Self::Speed(speed) if speed > 0.0 && speed.is_finite() => speed,
            Self::Speed(speed) => {
                tracing::warn!("Invalid speed {}, defaulting to 1.0", speed);
                1.0
            }
            Self::Duration(_) if timeline_duration.is_nan() || timeline_duration <= 0.0 => {
                tracing::warn!("Timeline has no length to stretch, playing at 1.0");
                1.0
            }
            Self::Duration(duration) if duration > 0.0 && duration.is_finite() => {
                timeline_duration / duration
            }
            Self::Duration(duration) => {
                tracing::warn!("Invalid duration {}, defaulting to timeline duration", duration);
                1.0
            }
        }
    }
}

/// Parameters of [`start_playback`](crate::TimelineManager::start_playback)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackOptions {
    /// Speed or total duration
    pub speed: PlaybackSpeed,
    /// Ease into the start
    pub ease_in: bool,
    /// Ease out of the end
    pub ease_out: bool,
    /// Override the timeline's ground-following flag
    pub follow_ground: Option<bool>,
    /// Override the timeline's minimum ground clearance
    pub min_height_above_ground: Option<f32>,
    /// Override the timeline's menu visibility
    pub show_menus: Option<bool>,
    /// Resume point, clamped to the timeline
    pub start_time: f32,
}

impl PlaybackOptions {
    /// Play at a time multiplier
    pub fn at_speed(speed: f32) -> Self {
        Self {
            speed: PlaybackSpeed::Speed(speed),
            ..Self::default()
        }
    }

    /// Play the whole timeline in `seconds`
    pub fn over_duration(seconds: f32) -> Self {
        Self {
            speed: PlaybackSpeed::Duration(seconds),
            ..Self::default()
        }
    }

    /// Set global easing
    pub fn with_easing(mut self, ease_in: bool, ease_out: bool) -> Self {
        self.ease_in = ease_in;
        self.ease_out = ease_out;
        self
    }

    /// Start from `time` instead of zero
    pub fn starting_at(mut self, time: f32) -> Self {
        self.start_time = time;
        self
    }

    /// Keep the camera at least `min_height` above the ground
    pub fn following_ground(mut self, min_height: f32) -> Self {
        self.follow_ground = Some(true);
        self.min_height_above_ground = Some(min_height);
        self
    }

    /// Show or hide host menus while playing
    pub fn showing_menus(mut self, show: bool) -> Self {
        self.show_menus = Some(show);
        self
    }
}

/// Parameters of [`start_recording`](crate::TimelineManager::start_recording)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingOptions {
    /// Seconds between samples; `0` samples every tick
    pub interval: f32,
    /// Keep existing points and record after them
    pub append: bool,
    /// Gap inserted before an appended segment
    pub time_offset: f32,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            interval: 1.0,
            append: false,
            time_offset: 0.0,
        }
    }
}

/// Registry entry: a timeline with its owner, policy and runtime counters
#[derive(Debug, Clone)]
pub struct TimelineState {
    id: TimelineId,
    owner: PluginHandle,
    pub(crate) timeline: Timeline,

    // Persisted policy
    pub(crate) global_ease_in: bool,
    pub(crate) global_ease_out: bool,
    pub(crate) show_menus_during_playback: bool,
    pub(crate) allow_user_rotation: bool,
    pub(crate) follow_ground: bool,
    pub(crate) min_height_above_ground: f32,

    // Recording, reset on start/stop
    pub(crate) is_recording: bool,
    pub(crate) recording_time: f32,
    pub(crate) last_recorded_point_time: f32,
    pub(crate) recording_interval: f32,

    // Playback, reset on start/stop
    pub(crate) is_playback_running: bool,
    pub(crate) playback_speed: f32,
    pub(crate) playback_duration: f32,
    pub(crate) completed_and_waiting: bool,
    pub(crate) rotation_offset: Rotation,
}

impl TimelineState {
    /// Create an empty timeline owned by `owner`
    pub fn new(id: TimelineId, owner: PluginHandle) -> Self {
        Self {
            id,
            owner,
            timeline: Timeline::new(),
            global_ease_in: false,
            global_ease_out: false,
            show_menus_during_playback: false,
            allow_user_rotation: false,
            follow_ground: false,
            min_height_above_ground: 0.0,
            is_recording: false,
            recording_time: 0.0,
            last_recorded_point_time: 0.0,
            recording_interval: 1.0,
            is_playback_running: false,
            playback_speed: 1.0,
            playback_duration: 0.0,
            completed_and_waiting: false,
            rotation_offset: Rotation::ZERO,
        }
    }

    /// Timeline id
    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// Owning plugin
    pub fn owner(&self) -> PluginHandle {
        self.owner
    }

    /// Keyframe data
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Accumulated user rotation applied on top of the sampled rotation
    pub fn rotation_offset(&self) -> Rotation {
        self.rotation_offset
    }

    /// Effective playback multiplier of the current run
    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    /// Wall-clock length of the current run
    pub fn playback_duration(&self) -> f32 {
        self.playback_duration
    }

    /// Restore policy flags to their defaults
    pub(crate) fn reset_policy(&mut self) {
        self.global_ease_in = false;
        self.global_ease_out = false;
        self.show_menus_during_playback = false;
        self.allow_user_rotation = false;
        self.follow_ground = false;
        self.min_height_above_ground = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(!PluginHandle::NONE.is_valid());
        assert!(PluginHandle(7).is_valid());
        assert!(!TimelineId::NONE.is_valid());
        assert_eq!(TimelineId(3).to_string(), "3");
    }

    #[test]
    fn test_speed_multiplier() {
        assert_eq!(PlaybackSpeed::Speed(2.0).multiplier(10.0), 2.0);
        assert_eq!(PlaybackSpeed::Speed(-1.0).multiplier(10.0), 1.0);
        assert_eq!(PlaybackSpeed::Duration(5.0).multiplier(10.0), 2.0);
        assert_eq!(PlaybackSpeed::Duration(0.0).multiplier(10.0), 1.0);
        assert_eq!(PlaybackSpeed::Duration(5.0).multiplier(0.0), 1.0);
        assert_eq!(PlaybackSpeed::Speed(f32::INFINITY).multiplier(10.0), 1.0);
        assert_eq!(PlaybackSpeed::Speed(f32::NAN).multiplier(10.0), 1.0);
    }

    #[test]
    fn test_options_builders() {
        let options = PlaybackOptions::over_duration(4.0)
            .with_easing(true, false)
            .following_ground(50.0)
            .showing_menus(true)
            .starting_at(1.0);
        assert_eq!(options.speed, PlaybackSpeed::Duration(4.0));
        assert!(options.ease_in && !options.ease_out);
        assert_eq!(options.follow_ground, Some(true));
        assert_eq!(options.min_height_above_ground, Some(50.0));
        assert_eq!(options.show_menus, Some(true));
        assert_eq!(options.start_time, 1.0);
        assert_eq!(RecordingOptions::default().interval, 1.0);
    }
}
