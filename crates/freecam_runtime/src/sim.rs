// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process host for headless runs and tests.
//!
//! [`SimulatedHost`] implements every collaborator trait over a single
//! mutex-guarded state: a camera with a third-person/free-look mode switch,
//! a flat ground, a few named objects, a fixed frame delta, and recorders for
//! dispatched events.

use crate::events::{ReceiverHandle, TimelineEvent};
use crate::host::{
    CameraController, CameraState, FrameClock, FreeLookCamera, GroundProvider, HostServices,
    HostUi, MessageBus, ScriptNotifier,
};
use crate::state::TimelineId;
use freecam_sequencer::{
    AttachPoint, CameraSnapshot, ObjectRef, ObjectRegistry, Point3, Rotation, DEFAULT_FOV,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Script callback captured by the simulated host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Receiving script object
    pub receiver: ReceiverHandle,
    /// Callback name
    pub event_name: String,
    /// Timeline the callback is about
    pub timeline: TimelineId,
}

#[derive(Debug, Clone)]
struct SimObject {
    reference: ObjectRef,
    position: Point3,
    rotation: Rotation,
}

#[derive(Debug)]
struct SimState {
    available: bool,
    mode: CameraState,
    previous: CameraState,
    live: FreeLookCamera,
    menus_shown: bool,
    game_paused: bool,
    saving: bool,
    delta: f32,
    ground: Option<f32>,
    objects: Vec<SimObject>,
    events: Vec<TimelineEvent>,
    notifications: Vec<Notification>,
    restored_rotation: Option<[f32; 2]>,
}

/// Simulated host
#[derive(Debug)]
pub struct SimulatedHost {
    state: Mutex<SimState>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    /// Third-person camera at the origin, menus shown, 60 ticks per second
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                available: true,
                mode: CameraState::ThirdPerson {
                    free_rotation: [0.0, 0.0],
                },
                previous: CameraState::FirstPerson,
                live: FreeLookCamera {
                    translation: Point3::ZERO,
                    rotation: Rotation::ZERO,
                    fov: DEFAULT_FOV,
                },
                menus_shown: true,
                game_paused: false,
                saving: false,
                delta: 1.0 / 60.0,
                ground: None,
                objects: Vec::new(),
                events: Vec::new(),
                notifications: Vec::new(),
                restored_rotation: None,
            }),
        }
    }

    /// Bundle this host as every collaborator
    pub fn services(self: &Arc<Self>) -> HostServices {
        HostServices {
            camera: self.clone(),
            ground: self.clone(),
            objects: self.clone(),
            ui: self.clone(),
            clock: self.clone(),
            bus: self.clone(),
            scripts: self.clone(),
        }
    }

    // ===== Controls =====

    /// Seconds reported per tick
    pub fn set_delta(&self, delta: f32) {
        self.state.lock().delta = delta;
    }

    /// Force the camera mode
    pub fn set_camera_state(&self, mode: CameraState) {
        self.state.lock().mode = mode;
    }

    /// Make the camera reachable or not
    pub fn set_camera_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Move the player-attached camera
    pub fn set_live_camera(&self, camera: FreeLookCamera) {
        self.state.lock().live = camera;
    }

    /// Simulate the user flying the free-look camera; ignored outside free-look
    pub fn move_free_look(&self, camera: FreeLookCamera) {
        let mut state = self.state.lock();
        if let CameraState::FreeLook(current) = &mut state.mode {
            *current = camera;
        }
    }

    /// Open or close a pausing menu
    pub fn set_game_paused(&self, paused: bool) {
        self.state.lock().game_paused = paused;
    }

    /// Start or finish writing a save
    pub fn set_saving(&self, saving: bool) {
        self.state.lock().saving = saving;
    }

    /// Flat ground height, `None` for no ground
    pub fn set_ground_height(&self, height: Option<f32>) {
        self.state.lock().ground = height;
    }

    /// Place a named object
    pub fn add_object(
        &self,
        form_id: u32,
        editor_id: Option<&str>,
        plugin: Option<&str>,
        position: Point3,
        rotation: Rotation,
    ) -> ObjectRef {
        let reference = ObjectRef {
            form_id,
            editor_id: editor_id.map(str::to_string),
            plugin: plugin.map(str::to_string),
        };
        self.state.lock().objects.push(SimObject {
            reference: reference.clone(),
            position,
            rotation,
        });
        reference
    }

    /// Move a placed object
    pub fn move_object(&self, form_id: u32, position: Point3) {
        let mut state = self.state.lock();
        if let Some(object) = state
            .objects
            .iter_mut()
            .find(|object| object.reference.form_id == form_id)
        {
            object.position = position;
        }
    }

    // ===== Observations =====

    /// Current camera mode
    pub fn mode(&self) -> CameraState {
        self.state.lock().mode
    }

    /// Free-look transform, if in free-look mode
    pub fn free_look_camera(&self) -> Option<FreeLookCamera> {
        self.state.lock().mode.free_look().copied()
    }

    /// Whether HUD menus are shown
    pub fn menus_shown(&self) -> bool {
        self.state.lock().menus_shown
    }

    /// Events dispatched on the bus so far
    pub fn events(&self) -> Vec<TimelineEvent> {
        self.state.lock().events.clone()
    }

    /// Script callbacks delivered so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    /// Last third-person orbit restored by the manager
    pub fn restored_rotation(&self) -> Option<[f32; 2]> {
        self.state.lock().restored_rotation
    }
}

impl CameraController for SimulatedHost {
    fn camera_state(&self) -> Option<CameraState> {
        let state = self.state.lock();
        state.available.then_some(state.mode)
    }

    fn camera_snapshot(&self) -> Option<CameraSnapshot> {
        let state = self.state.lock();
        if !state.available {
            return None;
        }
        Some(state.mode.free_look().unwrap_or(&state.live).snapshot())
    }

    fn enter_free_look(&self) {
        let mut state = self.state.lock();
        if state.mode.is_free_look() {
            return;
        }
        state.previous = state.mode;
        state.mode = CameraState::FreeLook(state.live);
    }

    fn exit_free_look(&self) {
        let mut state = self.state.lock();
        if state.mode.is_free_look() {
            state.mode = state.previous;
        }
    }

    fn write_free_look(&self, camera: FreeLookCamera) {
        let mut state = self.state.lock();
        if let CameraState::FreeLook(current) = &mut state.mode {
            *current = camera;
        }
    }

    fn restore_third_person_rotation(&self, free_rotation: [f32; 2]) {
        let mut state = self.state.lock();
        state.restored_rotation = Some(free_rotation);
        if let CameraState::ThirdPerson { free_rotation: current } = &mut state.mode {
            *current = free_rotation;
        }
    }
}

impl GroundProvider for SimulatedHost {
    fn ground_height(&self, _position: Point3) -> Option<f32> {
        self.state.lock().ground
    }
}

impl ObjectRegistry for SimulatedHost {
    fn find_by_editor_id(&self, editor_id: &str) -> Option<ObjectRef> {
        self.state
            .lock()
            .objects
            .iter()
            .find(|object| object.reference.editor_id.as_deref() == Some(editor_id))
            .map(|object| object.reference.clone())
    }

    fn find_by_form_id(&self, form_id: u32) -> Option<ObjectRef> {
        self.state
            .lock()
            .objects
            .iter()
            .find(|object| object.reference.form_id == form_id)
            .map(|object| object.reference.clone())
    }

    fn attach_position(&self, object: &ObjectRef, attach: AttachPoint) -> Option<Point3> {
        let state = self.state.lock();
        let found = state
            .objects
            .iter()
            .find(|candidate| candidate.reference.form_id == object.form_id)?;
        let lift = match attach {
            AttachPoint::None => 0.0,
            AttachPoint::Torso => 80.0,
            AttachPoint::Head => 120.0,
        };
        Some(found.position.add(Point3::new(0.0, 0.0, lift)))
    }

    fn rotation(&self, object: &ObjectRef) -> Option<Rotation> {
        self.state
            .lock()
            .objects
            .iter()
            .find(|candidate| candidate.reference.form_id == object.form_id)
            .map(|found| found.rotation)
    }
}

impl HostUi for SimulatedHost {
    fn is_game_paused(&self) -> bool {
        self.state.lock().game_paused
    }

    fn are_menus_shown(&self) -> bool {
        self.state.lock().menus_shown
    }

    fn show_menus(&self, show: bool) {
        self.state.lock().menus_shown = show;
    }

    fn is_save_in_progress(&self) -> bool {
        self.state.lock().saving
    }
}

impl FrameClock for SimulatedHost {
    fn tick_delta_seconds(&self) -> f32 {
        self.state.lock().delta
    }
}

impl MessageBus for SimulatedHost {
    fn dispatch(&self, event: &TimelineEvent) {
        self.state.lock().events.push(*event);
    }
}

impl ScriptNotifier for SimulatedHost {
    fn notify(&self, receiver: ReceiverHandle, event_name: &str, timeline: TimelineId) {
        self.state.lock().notifications.push(Notification {
            receiver,
            event_name: event_name.to_string(),
            timeline,
        });
    }
}
