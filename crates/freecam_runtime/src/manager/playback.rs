// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback: start, stop, switch, pause and the per-tick camera drive.

use super::{check_time, lookup, lookup_mut, Inner, TimelineManager};
use crate::error::{TimelineError, TimelineResult};
use crate::events::TimelineEventKind;
use crate::host::{CameraState, HostServices};
use crate::state::{PlaybackOptions, PluginHandle, TimelineId};
use freecam_sequencer::{PlaybackMode, Rotation};

impl Inner {
    fn start_playback_inner(
        &mut self,
        host: &HostServices,
        caller: PluginHandle,
        id: TimelineId,
        options: &PlaybackOptions,
    ) -> TimelineResult<()> {
        if self.active.is_valid() {
            return Err(TimelineError::AlreadyActive(self.active));
        }
        let state = lookup_mut(&mut self.timelines, id, caller)?;
        check_time("start time", options.start_time)?;
        if !state.timeline.has_motion() {
            return Err(TimelineError::NoPoints(id));
        }
        let camera_state = host
            .camera
            .camera_state()
            .ok_or(TimelineError::CameraUnavailable)?;
        if camera_state.is_free_look() {
            return Err(TimelineError::AlreadyInFreeLook);
        }

        let duration = state.timeline.duration();
        let speed = options.speed.multiplier(duration);
        state.playback_speed = speed;
        state.playback_duration = duration / speed;
        state.global_ease_in = options.ease_in;
        state.global_ease_out = options.ease_out;
        if let Some(follow) = options.follow_ground {
            state.follow_ground = follow;
        }
        if let Some(min_height) = options.min_height_above_ground {
            state.min_height_above_ground = min_height;
        }
        if let Some(show) = options.show_menus {
            state.show_menus_during_playback = show;
        }
        state.rotation_offset = Rotation::ZERO;
        state.completed_and_waiting = false;

        state.timeline.refresh_anchors(&host.resolve_context());
        state.timeline.reset_playback();
        state.timeline.start_playback();
        state.timeline.set_playback_time(options.start_time);
        state.is_playback_running = true;
        let show_menus = state.show_menus_during_playback;

        self.last_free_rotation = match camera_state {
            CameraState::ThirdPerson { free_rotation } => Some(free_rotation),
            _ => None,
        };
        self.menus_were_shown = host.ui.are_menus_shown();
        host.ui.show_menus(show_menus);
        host.camera.enter_free_look();

        self.active = id;
        self.user_turning = false;
        self.events.push(TimelineEventKind::PlaybackStarted, id);
        tracing::info!(
            "Started playback on timeline {} (speed {:.3}, {:.2}s)",
            id,
            speed,
            duration / speed
        );
        Ok(())
    }

    pub(super) fn stop_playback_inner(
        &mut self,
        host: &HostServices,
        id: TimelineId,
    ) -> TimelineResult<()> {
        let state = self
            .timelines
            .get_mut(&id)
            .ok_or(TimelineError::NotFound(id))?;
        if !state.is_playback_running {
            return Err(TimelineError::NotPlaying(id));
        }
        if self.active != id {
            return Err(TimelineError::NotActive(id));
        }

        state.is_playback_running = false;
        state.completed_and_waiting = false;
        state.timeline.reset_playback();
        self.active = TimelineId::NONE;

        if host.in_free_look() {
            host.camera.exit_free_look();
            host.ui.show_menus(self.menus_were_shown);
            if let Some(free_rotation) = self.last_free_rotation.take() {
                if matches!(
                    host.camera.camera_state(),
                    Some(CameraState::ThirdPerson { .. })
                ) {
                    host.camera.restore_third_person_rotation(free_rotation);
                }
            }
        }

        self.events.push(TimelineEventKind::PlaybackStopped, id);
        tracing::info!("Stopped playback on timeline {}", id);
        Ok(())
    }

    fn switch_playback_inner(
        &mut self,
        host: &HostServices,
        caller: PluginHandle,
        from: TimelineId,
        to: TimelineId,
    ) -> TimelineResult<()> {
        lookup(&self.timelines, to, caller)?;

        let from = if from.is_valid() {
            let state = lookup(&self.timelines, from, caller)?;
            if !state.is_playback_running || self.active != from {
                return Err(TimelineError::NotPlaying(from));
            }
            from
        } else {
            let owns_active = self
                .timelines
                .get(&self.active)
                .is_some_and(|state| state.owner() == caller && state.is_playback_running);
            if !owns_active {
                return Err(TimelineError::NoActiveTimeline(caller));
            }
            self.active
        };

        if !self.timelines[&to].timeline.has_motion() {
            return Err(TimelineError::NoPoints(to));
        }
        if !host.in_free_look() {
            return Err(TimelineError::NotInFreeLook);
        }

        let source = &mut self.timelines[&from];
        source.is_playback_running = false;
        source.completed_and_waiting = false;
        source.timeline.reset_playback();
        let speed = source.playback_speed;
        let duration = source.playback_duration;
        let show_menus = source.show_menus_during_playback;
        let ease = (source.global_ease_in, source.global_ease_out);
        let ground = (source.follow_ground, source.min_height_above_ground);
        let rotation_offset = source.rotation_offset;
        self.events.push(TimelineEventKind::PlaybackStopped, from);

        let target = &mut self.timelines[&to];
        target.timeline.refresh_anchors(&host.resolve_context());
        target.timeline.reset_playback();
        target.timeline.start_playback();
        target.playback_speed = speed;
        target.playback_duration = duration;
        target.show_menus_during_playback = show_menus;
        (target.global_ease_in, target.global_ease_out) = ease;
        (target.follow_ground, target.min_height_above_ground) = ground;
        target.rotation_offset = if target.allow_user_rotation {
            rotation_offset
        } else {
            Rotation::ZERO
        };
        target.is_playback_running = true;
        target.completed_and_waiting = false;

        self.active = to;
        self.events.push(TimelineEventKind::PlaybackStarted, to);
        tracing::info!("Switched playback from timeline {} to {}", from, to);
        Ok(())
    }

    /// Drive the free-look camera from the active timeline
    pub(super) fn play_tick(&mut self, host: &HostServices) {
        let id = self.active;
        let Some(state) = self.timelines.get_mut(&id) else {
            return;
        };
        if !state.is_playback_running {
            return;
        }

        if !state.timeline.has_motion() {
            if let Err(err) = self.stop_playback_inner(host, id) {
                err.report("play_tick");
            }
            return;
        }

        let camera = match host.camera.camera_state() {
            Some(CameraState::FreeLook(camera)) => camera,
            _ => {
                tracing::warn!("Camera left free-look during playback of timeline {}", id);
                state.is_playback_running = false;
                state.completed_and_waiting = false;
                state.timeline.reset_playback();
                self.active = TimelineId::NONE;
                self.events.push(TimelineEventKind::PlaybackStopped, id);
                return;
            }
        };

        if host.ui.is_game_paused() {
            host.ui.show_menus(self.menus_were_shown);
            return;
        }
        host.ui.show_menus(state.show_menus_during_playback);

        let delta = host.clock.tick_delta_seconds();
        state.timeline.update_playback(delta * state.playback_speed);
        let time = state.timeline.eased_time(
            state.timeline.playback_time(),
            state.global_ease_in,
            state.global_ease_out,
        );
        let sample = state.timeline.sample(time);

        let mut output = camera;
        if sample.has_translation {
            output.translation = sample.translation;
            if state.follow_ground {
                if let Some(ground) = host.ground.ground_height(output.translation) {
                    let floor = ground + state.min_height_above_ground;
                    output.translation.z = output.translation.z.max(floor);
                }
            }
        }
        if sample.has_rotation {
            if self.user_turning && state.allow_user_rotation {
                state.rotation_offset = camera.rotation.delta(sample.rotation);
                self.user_turning = false;
            } else {
                output.rotation = sample.rotation.add(state.rotation_offset);
            }
        }
        if sample.has_fov {
            output.fov = sample.fov;
        }
        host.camera.write_free_look(output);

        if state.timeline.playback_mode() == PlaybackMode::Wait {
            if !state.completed_and_waiting
                && state.timeline.playback_time() >= state.timeline.duration()
            {
                state.completed_and_waiting = true;
                self.events.push(TimelineEventKind::PlaybackCompleted, id);
                tracing::info!("Timeline {} completed, holding last frame", id);
            }
        } else if !state.timeline.is_playing() {
            if let Err(err) = self.stop_playback_inner(host, id) {
                err.report("play_tick");
            }
        }
    }
}

impl TimelineManager {
    /// Take the camera and start playing a timeline
    pub fn start_playback(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        options: PlaybackOptions,
    ) -> TimelineResult<()> {
        self.with_inner(|inner, host| inner.start_playback_inner(host, caller, id, &options))
            .map_err(|err| err.report("start_playback"))
    }

    /// Stop playback and hand the camera back
    pub fn stop_playback(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<()> {
        self.with_inner(|inner, host| {
            lookup(&inner.timelines, id, caller)?;
            inner.stop_playback_inner(host, id)
        })
        .map_err(|err| err.report("stop_playback"))
    }

    /// Hand playback over to another timeline without leaving free-look.
    ///
    /// With `from` set to [`TimelineId::NONE`] the caller's playing timeline
    /// is used.
    pub fn switch_playback(
        &self,
        caller: PluginHandle,
        from: TimelineId,
        to: TimelineId,
    ) -> TimelineResult<()> {
        self.with_inner(|inner, host| inner.switch_playback_inner(host, caller, from, to))
            .map_err(|err| err.report("switch_playback"))
    }

    /// Hold the playback cursor
    pub fn pause_playback(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<()> {
        self.write("pause_playback", caller, id, |state| {
            if !state.is_playback_running {
                return Err(TimelineError::NotPlaying(id));
            }
            state.timeline.pause();
            tracing::info!("Paused playback on timeline {}", id);
            Ok(())
        })
    }

    /// Release a held playback cursor
    pub fn resume_playback(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<()> {
        self.write("resume_playback", caller, id, |state| {
            if !state.is_playback_running {
                return Err(TimelineError::NotPlaying(id));
            }
            state.timeline.resume();
            tracing::info!("Resumed playback on timeline {}", id);
            Ok(())
        })
    }

    /// Whether the timeline is playing
    pub fn is_playback_running(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<bool> {
        self.read("is_playback_running", caller, id, |state| {
            Ok(state.is_playback_running)
        })
    }

    /// Whether the timeline is playing but held
    pub fn is_playback_paused(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<bool> {
        self.read("is_playback_paused", caller, id, |state| {
            Ok(state.is_playback_running && state.timeline.is_paused())
        })
    }

    /// Playback cursor position in timeline seconds
    pub fn playback_time(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<f32> {
        self.read("playback_time", caller, id, |state| {
            Ok(state.timeline.playback_time())
        })
    }
}
