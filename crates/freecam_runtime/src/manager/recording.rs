// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recording: sample the user-driven free-look camera into keyframes.

use super::{check_time, lookup, lookup_mut, Inner, TimelineManager};
use crate::error::{TimelineError, TimelineResult};
use crate::host::HostServices;
use crate::state::{PluginHandle, RecordingOptions, TimelineId, TimelineState};
use freecam_sequencer::{CameraSnapshot, InterpolationMode, KeyPoint, Transition};

/// Append one world keyframe per channel at `time`
fn capture(state: &mut TimelineState, camera: &CameraSnapshot, time: f32, ease_in: bool, ease_out: bool) {
    let transition = Transition::new(time, InterpolationMode::CubicHermite, ease_in, ease_out);
    state
        .timeline
        .add_translation_point(KeyPoint::world(transition, camera.position));
    state
        .timeline
        .add_rotation_point(KeyPoint::world(transition, camera.rotation));
    state.timeline.add_fov_point(KeyPoint::world(transition, camera.fov));
}

fn free_look_snapshot(host: &HostServices) -> Option<CameraSnapshot> {
    host.camera
        .camera_state()
        .and_then(|state| state.free_look().map(|camera| camera.snapshot()))
}

impl Inner {
    fn start_recording_inner(
        &mut self,
        host: &HostServices,
        caller: PluginHandle,
        id: TimelineId,
        options: &RecordingOptions,
    ) -> TimelineResult<()> {
        if self.active.is_valid() {
            return Err(TimelineError::AlreadyActive(self.active));
        }
        let state = lookup_mut(&mut self.timelines, id, caller)?;
        check_time("recording interval", options.interval)?;
        check_time("time offset", options.time_offset)?;
        let camera_state = host
            .camera
            .camera_state()
            .ok_or(TimelineError::CameraUnavailable)?;
        if camera_state.is_free_look() {
            return Err(TimelineError::AlreadyInFreeLook);
        }
        let camera = host
            .camera
            .camera_snapshot()
            .ok_or(TimelineError::CameraUnavailable)?;

        let interval = if options.interval < 0.0 {
            tracing::warn!("Negative recording interval {}, sampling every tick", options.interval);
            0.0
        } else {
            options.interval
        };

        let start = if options.append {
            state.timeline.duration() + options.time_offset
        } else {
            state.timeline.clear_points();
            0.0
        };

        host.camera.enter_free_look();

        state.is_recording = true;
        state.recording_interval = interval;
        state.recording_time = start;
        state.last_recorded_point_time = start;
        capture(state, &camera, start, !options.append, false);

        self.active = id;
        tracing::info!(
            "Started recording on timeline {} at {:.2}s (interval {:.2}s{})",
            id,
            start,
            interval,
            if options.append { ", append" } else { "" }
        );
        Ok(())
    }

    pub(super) fn stop_recording_inner(
        &mut self,
        host: &HostServices,
        id: TimelineId,
    ) -> TimelineResult<()> {
        let state = self
            .timelines
            .get_mut(&id)
            .ok_or(TimelineError::NotFound(id))?;
        if !state.is_recording {
            return Err(TimelineError::NotRecording(id));
        }
        if self.active != id {
            return Err(TimelineError::NotActive(id));
        }

        let camera = free_look_snapshot(host).or_else(|| {
            tracing::warn!("Camera left free-look before recording stopped, using live camera");
            host.camera.camera_snapshot()
        });
        let time = state.recording_time;
        match camera {
            Some(camera) => capture(state, &camera, time, false, true),
            None => tracing::warn!("Camera unavailable, no final keyframe for timeline {}", id),
        }

        if host.in_free_look() {
            host.camera.exit_free_look();
        }

        state.is_recording = false;
        self.active = TimelineId::NONE;
        tracing::info!(
            "Stopped recording on timeline {} ({} points, {:.2}s)",
            id,
            state.timeline.point_count(),
            state.timeline.duration()
        );
        Ok(())
    }

    /// Sample the camera if the recording interval has elapsed
    pub(super) fn record_tick(&mut self, host: &HostServices) {
        let id = self.active;
        let Some(state) = self.timelines.get_mut(&id) else {
            return;
        };
        if !state.is_recording {
            return;
        }

        let Some(camera) = free_look_snapshot(host) else {
            tracing::warn!("Camera left free-look during recording of timeline {}", id);
            state.is_recording = false;
            self.active = TimelineId::NONE;
            return;
        };

        state.recording_time += host.clock.tick_delta_seconds();
        if state.recording_time - state.last_recorded_point_time >= state.recording_interval {
            let time = state.recording_time;
            capture(state, &camera, time, false, false);
            state.last_recorded_point_time = time;
        }
    }
}

impl TimelineManager {
    /// Take the camera into free-look and start sampling it into a timeline
    pub fn start_recording(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        options: RecordingOptions,
    ) -> TimelineResult<()> {
        self.with_inner(|inner, host| inner.start_recording_inner(host, caller, id, &options))
            .map_err(|err| err.report("start_recording"))
    }

    /// Record a final keyframe and hand the camera back
    pub fn stop_recording(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<()> {
        self.with_inner(|inner, host| {
            lookup(&inner.timelines, id, caller)?;
            inner.stop_recording_inner(host, id)
        })
        .map_err(|err| err.report("stop_recording"))
    }

    /// Whether the timeline is recording
    pub fn is_recording(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<bool> {
        self.read("is_recording", caller, id, |state| Ok(state.is_recording))
    }
}
