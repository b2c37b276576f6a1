// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host collaborator contracts.
//!
//! The manager never talks to an engine directly. Everything it needs from
//! the host (camera, ground, UI, clock, object lookup, event delivery) comes
//! through the traits in this module, bundled into [`HostServices`].

use crate::events::{ReceiverHandle, TimelineEvent};
use crate::state::TimelineId;
use freecam_sequencer::{CameraSnapshot, ObjectRegistry, Point3, ResolveContext, Rotation};
use std::sync::Arc;

/// Transform of the detached free-look camera
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeLookCamera {
    /// Camera position
    pub translation: Point3,
    /// Camera orientation
    pub rotation: Rotation,
    /// Field of view in degrees
    pub fov: f32,
}

impl FreeLookCamera {
    /// As an anchor resolution snapshot
    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            position: self.translation,
            rotation: self.rotation,
            fov: self.fov,
        }
    }
}

/// Mode the host camera is currently in
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraState {
    /// First-person view
    FirstPerson,
    /// Third-person view (including mounted variants)
    ThirdPerson {
        /// Orbit rotation around the character
        free_rotation: [f32; 2],
    },
    /// Detached free-look camera
    FreeLook(FreeLookCamera),
    /// Any other mode
    Other,
}

impl CameraState {
    /// Free-look transform, if in free-look mode
    pub fn free_look(&self) -> Option<&FreeLookCamera> {
        match self {
            Self::FreeLook(camera) => Some(camera),
            _ => None,
        }
    }

    /// Whether the camera is in free-look mode
    pub fn is_free_look(&self) -> bool {
        self.free_look().is_some()
    }
}

/// Host camera
pub trait CameraController: Send + Sync {
    /// Current mode, `None` if the camera is unavailable
    fn camera_state(&self) -> Option<CameraState>;

    /// Live camera transform in any mode, `None` if unavailable
    fn camera_snapshot(&self) -> Option<CameraSnapshot>;

    /// Detach the camera into free-look mode
    fn enter_free_look(&self);

    /// Return from free-look mode to the previous mode
    fn exit_free_look(&self);

    /// Overwrite the free-look transform
    fn write_free_look(&self, camera: FreeLookCamera);

    /// Restore the third-person orbit rotation
    fn restore_third_person_rotation(&self, free_rotation: [f32; 2]);
}

/// Terrain height lookup
pub trait GroundProvider: Send + Sync {
    /// Ground height under `position`, `None` if unknown
    fn ground_height(&self, position: Point3) -> Option<f32>;
}

/// Host UI state
pub trait HostUi: Send + Sync {
    /// Whether a menu has paused the game
    fn is_game_paused(&self) -> bool;

    /// Whether HUD menus are shown
    fn are_menus_shown(&self) -> bool;

    /// Show or hide HUD menus
    fn show_menus(&self, show: bool);

    /// Whether the host is writing a save.
    ///
    /// Polled once per tick to find the end of a save. Hosts without a
    /// dedicated signal may approximate it with their pause state.
    fn is_save_in_progress(&self) -> bool;
}

/// Wall-clock frame timing, unaffected by host pause or slow motion
pub trait FrameClock: Send + Sync {
    /// Seconds since the previous tick
    fn tick_delta_seconds(&self) -> f32;
}

/// Inter-plugin message bus
pub trait MessageBus: Send + Sync {
    /// Broadcast an event
    fn dispatch(&self, event: &TimelineEvent);
}

/// Scripting callback delivery
pub trait ScriptNotifier: Send + Sync {
    /// Deliver `event_name` for `timeline` to one receiver
    fn notify(&self, receiver: ReceiverHandle, event_name: &str, timeline: TimelineId);
}

/// Every collaborator the manager needs
#[derive(Clone)]
pub struct HostServices {
    /// Camera
    pub camera: Arc<dyn CameraController>,
    /// Ground heights
    pub ground: Arc<dyn GroundProvider>,
    /// External objects
    pub objects: Arc<dyn ObjectRegistry>,
    /// UI state
    pub ui: Arc<dyn HostUi>,
    /// Frame timing
    pub clock: Arc<dyn FrameClock>,
    /// Message bus
    pub bus: Arc<dyn MessageBus>,
    /// Script callbacks
    pub scripts: Arc<dyn ScriptNotifier>,
}

impl HostServices {
    /// Anchor resolution context against the live camera
    pub fn resolve_context(&self) -> ResolveContext<'_> {
        ResolveContext::new(self.camera.camera_snapshot(), self.objects.as_ref())
    }

    /// Whether the camera is currently in free-look mode
    pub fn in_free_look(&self) -> bool {
        self.camera
            .camera_state()
            .is_some_and(|state| state.is_free_look())
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
