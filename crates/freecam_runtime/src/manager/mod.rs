// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline registry and per-tick driver.
//!
//! [`TimelineManager`] owns every registered timeline behind one mutex. At
//! most one timeline is *active* (recording or playing) at a time, across all
//! callers, since there is only one camera to drive.
//!
//! Events raised while the lock is held are queued and delivered once it is
//! released, so receivers may call back into the manager. Delivery order
//! matches generation order across all callers.

mod io;
mod playback;
mod recording;
#[cfg(test)]
mod tests;

use crate::error::{TimelineError, TimelineResult};
use crate::events::{Dispatcher, EventQueue, ReceiverHandle};
use crate::host::HostServices;
use crate::settings::FrameworkSettings;
use crate::state::{Channel, PluginHandle, TimelineId, TimelineState};
use freecam_sequencer::{
    Anchor, AnchorTarget, AttachPoint, CameraSample, KeyPoint, ObjectRef, PlaybackMode, Point3,
    Rotation, Track, Transition,
};
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

/// Registry state guarded by the manager's lock
#[derive(Debug)]
pub(crate) struct Inner {
    plugins: IndexSet<PluginHandle>,
    timelines: IndexMap<TimelineId, TimelineState>,
    next_id: u64,
    active: TimelineId,
    /// Host menu visibility before playback started
    menus_were_shown: bool,
    user_turning: bool,
    /// Third-person orbit before playback started
    last_free_rotation: Option<[f32; 2]>,
    receivers: Vec<ReceiverHandle>,
    save_in_progress: bool,
    events: EventQueue,
}

impl Inner {
    fn new() -> Self {
        Self {
            plugins: IndexSet::new(),
            timelines: IndexMap::new(),
            next_id: 1,
            active: TimelineId::NONE,
            menus_were_shown: true,
            user_turning: false,
            last_free_rotation: None,
            receivers: Vec::new(),
            save_in_progress: false,
            events: EventQueue::default(),
        }
    }

    /// Stop playback of `id` first if it is running
    fn stop_if_playing(&mut self, host: &HostServices, id: TimelineId) {
        let playing = self
            .timelines
            .get(&id)
            .is_some_and(|state| state.is_playback_running);
        if playing {
            tracing::info!("Timeline {} modified during playback, stopping playback", id);
            if let Err(err) = self.stop_playback_inner(host, id) {
                err.report("stop_playback");
            }
        }
    }

    /// Stop whatever the active timeline is doing
    fn stop_active(&mut self, host: &HostServices) {
        let id = self.active;
        let Some(state) = self.timelines.get(&id) else {
            return;
        };
        let result = if state.is_playback_running {
            tracing::info!("Stopping playback on timeline {}", id);
            self.stop_playback_inner(host, id)
        } else if state.is_recording {
            tracing::info!("Stopping recording on timeline {}", id);
            self.stop_recording_inner(host, id)
        } else {
            Ok(())
        };
        if let Err(err) = result {
            err.report("stop_active");
        }
    }

    /// Stop and drop every timeline owned by `owner`
    fn cleanup_plugin(&mut self, host: &HostServices, owner: PluginHandle) {
        if self
            .timelines
            .get(&self.active)
            .is_some_and(|state| state.owner() == owner)
        {
            self.stop_active(host);
        }

        let before = self.timelines.len();
        self.timelines.retain(|_, state| state.owner() != owner);
        let removed = before - self.timelines.len();
        if removed > 0 {
            tracing::info!("Cleaned up {} timelines of plugin handle {}", removed, owner);
        }
    }

    fn finish_save(&mut self, host: &HostServices) {
        self.save_in_progress = false;
        if self.active.is_valid() && !host.in_free_look() {
            host.camera.enter_free_look();
            tracing::info!("Save finished, resumed free-look for timeline {}", self.active);
        }
    }
}

fn lookup(
    timelines: &IndexMap<TimelineId, TimelineState>,
    id: TimelineId,
    caller: PluginHandle,
) -> TimelineResult<&TimelineState> {
    if !caller.is_valid() {
        return Err(TimelineError::InvalidHandle(caller));
    }
    if !id.is_valid() {
        return Err(TimelineError::InvalidTimelineId(id));
    }
    let state = timelines.get(&id).ok_or(TimelineError::NotFound(id))?;
    if state.owner() != caller {
        return Err(TimelineError::NotOwned {
            id,
            caller,
            owner: state.owner(),
        });
    }
    Ok(state)
}

fn lookup_mut(
    timelines: &mut IndexMap<TimelineId, TimelineState>,
    id: TimelineId,
    caller: PluginHandle,
) -> TimelineResult<&mut TimelineState> {
    lookup(timelines, id, caller)?;
    timelines.get_mut(&id).ok_or(TimelineError::NotFound(id))
}

fn point_value<V: AnchorTarget>(
    track: &Track<V>,
    id: TimelineId,
    channel: Channel,
    index: usize,
) -> TimelineResult<V> {
    let len = track.len();
    if index >= len {
        return Err(TimelineError::IndexOutOfRange {
            id,
            channel,
            index,
            len,
        });
    }
    track
        .point(index)
        .map(KeyPoint::value)
        .ok_or(TimelineError::IndexOutOfRange {
            id,
            channel,
            index,
            len,
        })
}

fn check_index(len: usize, id: TimelineId, channel: Channel, index: usize) -> TimelineResult<()> {
    if index >= len {
        Err(TimelineError::IndexOutOfRange {
            id,
            channel,
            index,
            len,
        })
    } else {
        Ok(())
    }
}

/// Reject NaN and infinite times before they reach a track
fn check_time(name: &str, value: f32) -> TimelineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TimelineError::InvalidArgument(format!(
            "{} must be finite, got {}",
            name, value
        )))
    }
}

/// Validate a keyframe that samples the live camera
fn camera_point(host: &HostServices, transition: Transition) -> TimelineResult<()> {
    check_time("keyframe time", transition.time())?;
    if host.resolve_context().camera.is_none() {
        return Err(TimelineError::CameraUnavailable);
    }
    Ok(())
}

fn object_anchor<V>(
    host: &HostServices,
    object: ObjectRef,
    attach: AttachPoint,
    offset: V,
    offset_is_relative: bool,
) -> TimelineResult<Anchor<V>> {
    let object = host
        .objects
        .find_by_form_id(object.form_id)
        .map(|found| ObjectRef {
            editor_id: found.editor_id.or(object.editor_id.clone()),
            plugin: found.plugin.or(object.plugin.clone()),
            ..found
        })
        .ok_or_else(|| TimelineError::ObjectNotFound(object))?;
    Ok(Anchor::Object {
        object,
        attach,
        offset,
        offset_is_relative,
    })
}

/// Registry of camera timelines and the state machine that drives them
pub struct TimelineManager {
    settings: FrameworkSettings,
    host: HostServices,
    inner: Mutex<Inner>,
    dispatcher: Dispatcher,
}

impl TimelineManager {
    /// Create a manager bound to a host
    pub fn new(settings: FrameworkSettings, host: HostServices) -> Self {
        tracing::info!("Timeline manager ready (data dir {})", settings.data_dir.display());
        Self {
            settings,
            host,
            inner: Mutex::new(Inner::new()),
            dispatcher: Dispatcher::default(),
        }
    }

    /// Settings in effect
    pub fn settings(&self) -> &FrameworkSettings {
        &self.settings
    }

    /// Host collaborators
    pub fn host(&self) -> &HostServices {
        &self.host
    }

    /// Run `f` under the lock, then deliver the events it raised
    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner, &HostServices) -> T) -> T {
        let result = {
            let mut inner = self.inner.lock();
            let result = f(&mut inner, &self.host);
            let events = inner.events.take();
            if !events.is_empty() {
                self.dispatcher.enqueue(events, inner.receivers.clone());
            }
            result
        };
        self.dispatcher.drain(&self.host);
        result
    }

    fn read<T>(
        &self,
        operation: &str,
        caller: PluginHandle,
        id: TimelineId,
        f: impl FnOnce(&TimelineState) -> TimelineResult<T>,
    ) -> TimelineResult<T> {
        self.with_inner(|inner, _| lookup(&inner.timelines, id, caller).and_then(f))
            .map_err(|err| err.report(operation))
    }

    fn write<T>(
        &self,
        operation: &str,
        caller: PluginHandle,
        id: TimelineId,
        f: impl FnOnce(&mut TimelineState) -> TimelineResult<T>,
    ) -> TimelineResult<T> {
        self.with_inner(|inner, _| lookup_mut(&mut inner.timelines, id, caller).and_then(f))
            .map_err(|err| err.report(operation))
    }

    /// Keyframe edit.
    ///
    /// `prepare` validates against the current state; only once it succeeds
    /// is playback of the timeline stopped and `apply` run.
    fn edit<P, T>(
        &self,
        operation: &str,
        caller: PluginHandle,
        id: TimelineId,
        prepare: impl FnOnce(&TimelineState, &HostServices) -> TimelineResult<P>,
        apply: impl FnOnce(&mut TimelineState, &HostServices, P) -> T,
    ) -> TimelineResult<T> {
        self.with_inner(|inner, host| {
            let prepared = prepare(lookup(&inner.timelines, id, caller)?, host)?;
            inner.stop_if_playing(host, id);
            let state = lookup_mut(&mut inner.timelines, id, caller)?;
            Ok(apply(state, host, prepared))
        })
        .map_err(|err: TimelineError| err.report(operation))
    }

    // ===== Callers =====

    /// Register a caller.
    ///
    /// Registering an already registered handle is treated as a reload: every
    /// timeline it owned is stopped and dropped.
    pub fn register_plugin(&self, caller: PluginHandle) -> TimelineResult<()> {
        self.with_inner(|inner, host| {
            if !caller.is_valid() {
                return Err(TimelineError::InvalidHandle(caller));
            }
            if inner.plugins.contains(&caller) {
                tracing::info!("Plugin handle {} re-registered, cleaning up its timelines", caller);
                inner.cleanup_plugin(host, caller);
            } else {
                inner.plugins.insert(caller);
                tracing::info!("Plugin handle {} registered", caller);
            }
            Ok(())
        })
        .map_err(|err| err.report("register_plugin"))
    }

    /// Forget a caller and everything it owns
    pub fn unregister_plugin(&self, caller: PluginHandle) -> TimelineResult<()> {
        self.with_inner(|inner, host| {
            if !inner.plugins.contains(&caller) {
                return Err(TimelineError::UnregisteredPlugin(caller));
            }
            inner.cleanup_plugin(host, caller);
            inner.plugins.shift_remove(&caller);
            tracing::info!("Plugin handle {} unregistered", caller);
            Ok(())
        })
        .map_err(|err| err.report("unregister_plugin"))
    }

    // ===== Timelines =====

    /// Create an empty timeline owned by `caller`
    pub fn register_timeline(&self, caller: PluginHandle) -> TimelineResult<TimelineId> {
        self.with_inner(|inner, _| {
            if !caller.is_valid() {
                return Err(TimelineError::InvalidHandle(caller));
            }
            if !inner.plugins.contains(&caller) {
                return Err(TimelineError::UnregisteredPlugin(caller));
            }
            let id = TimelineId(inner.next_id);
            inner.next_id += 1;
            inner.timelines.insert(id, TimelineState::new(id, caller));
            tracing::info!("Timeline {} registered by plugin handle {}", id, caller);
            Ok(id)
        })
        .map_err(|err| err.report("register_timeline"))
    }

    /// Drop a timeline, stopping its recording or playback first
    pub fn unregister_timeline(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<()> {
        self.with_inner(|inner, host| {
            lookup(&inner.timelines, id, caller)?;
            if inner.active == id {
                inner.stop_active(host);
            }
            inner.timelines.shift_remove(&id);
            tracing::info!("Timeline {} unregistered (owner {})", id, caller);
            Ok(())
        })
        .map_err(|err: TimelineError| err.report("unregister_timeline"))
    }

    // ===== Keyframes =====

    /// Add a world-space translation keyframe; returns the channel's new count
    pub fn add_translation_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
        position: Point3,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_translation_point",
            caller,
            id,
            |_, _| check_time("keyframe time", transition.time()),
            |state, _, ()| {
                state
                    .timeline
                    .add_translation_point(KeyPoint::world(transition, position))
            },
        )
    }

    /// Add a translation keyframe at the live camera position
    pub fn add_translation_point_at_camera(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_translation_point_at_camera",
            caller,
            id,
            |_, host| camera_point(host, transition),
            |state, host, ()| {
                let anchor = Anchor::Camera {
                    offset: Point3::ZERO,
                };
                state
                    .timeline
                    .add_translation_point(KeyPoint::new(transition, anchor, &host.resolve_context()))
            },
        )
    }

    /// Add a translation keyframe relative to an external object
    pub fn add_translation_point_at_object(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
        object: ObjectRef,
        attach: AttachPoint,
        offset: Point3,
        offset_is_relative: bool,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_translation_point_at_object",
            caller,
            id,
            |_, host| {
                check_time("keyframe time", transition.time())?;
                object_anchor(host, object, attach, offset, offset_is_relative)
            },
            |state, host, anchor| {
                state
                    .timeline
                    .add_translation_point(KeyPoint::new(transition, anchor, &host.resolve_context()))
            },
        )
    }

    /// Add a world-space rotation keyframe; returns the channel's new count
    pub fn add_rotation_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
        rotation: Rotation,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_rotation_point",
            caller,
            id,
            |_, _| check_time("keyframe time", transition.time()),
            |state, _, ()| {
                state
                    .timeline
                    .add_rotation_point(KeyPoint::world(transition, rotation))
            },
        )
    }

    /// Add a rotation keyframe at the live camera orientation
    pub fn add_rotation_point_at_camera(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_rotation_point_at_camera",
            caller,
            id,
            |_, host| camera_point(host, transition),
            |state, host, ()| {
                let anchor = Anchor::Camera {
                    offset: Rotation::ZERO,
                };
                state
                    .timeline
                    .add_rotation_point(KeyPoint::new(transition, anchor, &host.resolve_context()))
            },
        )
    }

    /// Add a rotation keyframe relative to an external object.
    ///
    /// Without `offset_is_relative` the keyframe looks at the object's attach
    /// point from wherever the camera is.
    pub fn add_rotation_point_at_object(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
        object: ObjectRef,
        attach: AttachPoint,
        offset: Rotation,
        offset_is_relative: bool,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_rotation_point_at_object",
            caller,
            id,
            |_, host| {
                check_time("keyframe time", transition.time())?;
                object_anchor(host, object, attach, offset, offset_is_relative)
            },
            |state, host, anchor| {
                state
                    .timeline
                    .add_rotation_point(KeyPoint::new(transition, anchor, &host.resolve_context()))
            },
        )
    }

    /// Add a field of view keyframe; returns the channel's new count
    pub fn add_fov_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
        fov: f32,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_fov_point",
            caller,
            id,
            |_, _| check_time("keyframe time", transition.time()),
            |state, _, ()| state.timeline.add_fov_point(KeyPoint::world(transition, fov)),
        )
    }

    /// Add a field of view keyframe at the live camera's field of view
    pub fn add_fov_point_at_camera(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        transition: Transition,
    ) -> TimelineResult<usize> {
        self.edit(
            "add_fov_point_at_camera",
            caller,
            id,
            |_, host| camera_point(host, transition),
            |state, host, ()| {
                let anchor = Anchor::Camera { offset: 0.0 };
                state
                    .timeline
                    .add_fov_point(KeyPoint::new(transition, anchor, &host.resolve_context()))
            },
        )
    }

    /// Remove a translation keyframe
    pub fn remove_translation_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        index: usize,
    ) -> TimelineResult<()> {
        self.edit(
            "remove_translation_point",
            caller,
            id,
            |state, _| check_index(state.timeline.translation().len(), id, Channel::Translation, index),
            |state, _, ()| {
                state.timeline.remove_translation_point(index);
            },
        )
    }

    /// Remove a rotation keyframe
    pub fn remove_rotation_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        index: usize,
    ) -> TimelineResult<()> {
        self.edit(
            "remove_rotation_point",
            caller,
            id,
            |state, _| check_index(state.timeline.rotation().len(), id, Channel::Rotation, index),
            |state, _, ()| {
                state.timeline.remove_rotation_point(index);
            },
        )
    }

    /// Remove a field of view keyframe
    pub fn remove_fov_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        index: usize,
    ) -> TimelineResult<()> {
        self.edit(
            "remove_fov_point",
            caller,
            id,
            |state, _| check_index(state.timeline.fov().len(), id, Channel::Fov, index),
            |state, _, ()| {
                state.timeline.remove_fov_point(index);
            },
        )
    }

    /// Remove every keyframe and restore default mode and policy.
    ///
    /// Rejected while the timeline is recording.
    pub fn clear_timeline(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<()> {
        self.edit(
            "clear_timeline",
            caller,
            id,
            |state, _| {
                if state.is_recording {
                    Err(TimelineError::RecordingInProgress(id))
                } else {
                    Ok(())
                }
            },
            |state, _, ()| {
                state.timeline.reset();
                state.reset_policy();
                tracing::info!("Cleared timeline {}", id);
            },
        )
    }

    /// Translation keyframe count
    pub fn translation_point_count(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<usize> {
        self.read("translation_point_count", caller, id, |state| {
            Ok(state.timeline.translation().len())
        })
    }

    /// Rotation keyframe count
    pub fn rotation_point_count(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<usize> {
        self.read("rotation_point_count", caller, id, |state| {
            Ok(state.timeline.rotation().len())
        })
    }

    /// Field of view keyframe count
    pub fn fov_point_count(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<usize> {
        self.read("fov_point_count", caller, id, |state| Ok(state.timeline.fov().len()))
    }

    /// Resolved value of a translation keyframe
    pub fn translation_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        index: usize,
    ) -> TimelineResult<Point3> {
        self.read("translation_point", caller, id, |state| {
            point_value(state.timeline.translation(), id, Channel::Translation, index)
        })
    }

    /// Resolved value of a rotation keyframe
    pub fn rotation_point(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        index: usize,
    ) -> TimelineResult<Rotation> {
        self.read("rotation_point", caller, id, |state| {
            point_value(state.timeline.rotation(), id, Channel::Rotation, index)
        })
    }

    /// Resolved value of a field of view keyframe
    pub fn fov_point(&self, caller: PluginHandle, id: TimelineId, index: usize) -> TimelineResult<f32> {
        self.read("fov_point", caller, id, |state| {
            point_value(state.timeline.fov(), id, Channel::Fov, index)
        })
    }

    /// Length of the longest channel in seconds
    pub fn timeline_duration(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<f32> {
        self.read("timeline_duration", caller, id, |state| Ok(state.timeline.duration()))
    }

    /// Sample every channel at `time`
    pub fn sample_timeline(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        time: f32,
    ) -> TimelineResult<CameraSample> {
        self.read("sample_timeline", caller, id, |state| Ok(state.timeline.sample(time)))
    }

    // ===== Policy =====

    /// Set end-of-timeline behavior and the loop re-entry time
    pub fn set_playback_mode(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        mode: PlaybackMode,
        loop_time_offset: f32,
    ) -> TimelineResult<()> {
        self.write("set_playback_mode", caller, id, |state| {
            state.timeline.set_playback_mode(mode);
            state.timeline.set_loop_time_offset(loop_time_offset);
            Ok(())
        })
    }

    /// [`set_playback_mode`](Self::set_playback_mode) with a raw mode number
    pub fn set_playback_mode_raw(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        mode: i32,
        loop_time_offset: f32,
    ) -> TimelineResult<()> {
        let mode = PlaybackMode::try_from(mode)
            .map_err(|err| TimelineError::from(err).report("set_playback_mode"))?;
        self.set_playback_mode(caller, id, mode, loop_time_offset)
    }

    /// End-of-timeline behavior
    pub fn playback_mode(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<PlaybackMode> {
        self.read("playback_mode", caller, id, |state| Ok(state.timeline.playback_mode()))
    }

    /// Loop re-entry time
    pub fn loop_time_offset(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<f32> {
        self.read("loop_time_offset", caller, id, |state| {
            Ok(state.timeline.loop_time_offset())
        })
    }

    /// Ease into the start and/or out of the end
    pub fn set_global_easing(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        ease_in: bool,
        ease_out: bool,
    ) -> TimelineResult<()> {
        self.write("set_global_easing", caller, id, |state| {
            state.global_ease_in = ease_in;
            state.global_ease_out = ease_out;
            Ok(())
        })
    }

    /// Global easing flags `(ease_in, ease_out)`
    pub fn global_easing(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<(bool, bool)> {
        self.read("global_easing", caller, id, |state| {
            Ok((state.global_ease_in, state.global_ease_out))
        })
    }

    /// Let the user look around during playback
    pub fn allow_user_rotation(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        allow: bool,
    ) -> TimelineResult<()> {
        self.write("allow_user_rotation", caller, id, |state| {
            state.allow_user_rotation = allow;
            Ok(())
        })
    }

    /// Whether the user may look around during playback
    pub fn is_user_rotation_allowed(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<bool> {
        self.read("is_user_rotation_allowed", caller, id, |state| {
            Ok(state.allow_user_rotation)
        })
    }

    /// Keep the camera at least `min_height` above the ground
    pub fn set_follow_ground(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        follow: bool,
        min_height: f32,
    ) -> TimelineResult<()> {
        self.write("set_follow_ground", caller, id, |state| {
            state.follow_ground = follow;
            state.min_height_above_ground = min_height;
            Ok(())
        })
    }

    /// Whether ground following is on
    pub fn is_ground_following_enabled(
        &self,
        caller: PluginHandle,
        id: TimelineId,
    ) -> TimelineResult<bool> {
        self.read("is_ground_following_enabled", caller, id, |state| {
            Ok(state.follow_ground)
        })
    }

    /// Minimum ground clearance
    pub fn min_height_above_ground(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<f32> {
        self.read("min_height_above_ground", caller, id, |state| {
            Ok(state.min_height_above_ground)
        })
    }

    /// Show or hide host menus during playback
    pub fn set_menu_visibility(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        show: bool,
    ) -> TimelineResult<()> {
        self.write("set_menu_visibility", caller, id, |state| {
            state.show_menus_during_playback = show;
            Ok(())
        })
    }

    /// Whether host menus are shown during playback
    pub fn are_menus_visible(&self, caller: PluginHandle, id: TimelineId) -> TimelineResult<bool> {
        self.read("are_menus_visible", caller, id, |state| {
            Ok(state.show_menus_during_playback)
        })
    }

    // ===== Events =====

    /// Deliver timeline callbacks to `receiver`; duplicates are ignored
    pub fn register_event_receiver(&self, receiver: ReceiverHandle) {
        self.with_inner(|inner, _| {
            if !inner.receivers.contains(&receiver) {
                inner.receivers.push(receiver);
                tracing::info!("Receiver {} registered for timeline events", receiver);
            }
        });
    }

    /// Stop delivering callbacks to `receiver`
    pub fn unregister_event_receiver(&self, receiver: ReceiverHandle) {
        self.with_inner(|inner, _| {
            if let Some(index) = inner.receivers.iter().position(|r| *r == receiver) {
                inner.receivers.remove(index);
                tracing::info!("Receiver {} unregistered from timeline events", receiver);
            }
        });
    }

    // ===== Engine integration (no ownership check) =====

    /// Timeline currently recording or playing, [`TimelineId::NONE`] if none
    pub fn active_timeline_id(&self) -> TimelineId {
        self.with_inner(|inner, _| inner.active)
    }

    /// Whether `id` is playing
    pub fn is_active_playback(&self, id: TimelineId) -> bool {
        self.with_inner(|inner, _| {
            inner
                .timelines
                .get(&id)
                .is_some_and(|state| state.is_playback_running)
        })
    }

    /// Whether `id` lets the user look around
    pub fn is_user_rotation_allowed_internal(&self, id: TimelineId) -> bool {
        self.with_inner(|inner, _| {
            inner
                .timelines
                .get(&id)
                .is_some_and(|state| state.allow_user_rotation)
        })
    }

    /// Host signal that the user is turning the camera
    pub fn set_user_turning(&self, turning: bool) {
        self.with_inner(|inner, _| inner.user_turning = turning);
    }

    // ===== Lifecycle =====

    /// Advance the active timeline by one host tick.
    ///
    /// Save handling runs first; while the host is saving nothing advances.
    pub fn update(&self) {
        self.with_inner(|inner, host| {
            if inner.save_in_progress {
                if host.ui.is_save_in_progress() {
                    return;
                }
                inner.finish_save(host);
            }
            if !inner.active.is_valid() {
                return;
            }
            inner.play_tick(host);
            inner.record_tick(host);
        });
    }

    /// Release the camera before the host writes a save
    pub fn on_pre_save_game(&self) {
        self.with_inner(|inner, host| {
            if !inner.active.is_valid() {
                return;
            }
            if host.in_free_look() {
                host.camera.exit_free_look();
            }
            inner.save_in_progress = true;
            tracing::info!("Save started, released camera for timeline {}", inner.active);
        });
    }

    /// Retake the camera after a save
    pub fn on_post_save_game(&self) {
        self.with_inner(|inner, host| {
            if inner.save_in_progress {
                inner.finish_save(host);
            }
        });
    }

    /// Stop the active timeline and forget every timeline, caller and receiver
    pub fn shutdown(&self) {
        self.with_inner(|inner, host| {
            inner.stop_active(host);
            let count = inner.timelines.len();
            inner.timelines.clear();
            inner.plugins.clear();
            inner.receivers.clear();
            inner.save_in_progress = false;
            tracing::info!("Timeline manager shut down ({} timelines dropped)", count);
        });
    }
}

impl std::fmt::Debug for TimelineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
