// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline runtime for a host free-look camera.
//!
//! This crate turns sequencer timelines into camera motion:
//! - A registry of timelines owned by calling plugins
//! - Recording the user-driven camera into keyframes
//! - Playing timelines back onto the camera, one at a time
//! - Start, stop and completion notifications
//! - Release and retake of the camera around host saves
//!
//! ## Architecture
//!
//! The runtime is built on:
//! - [`TimelineManager`], a mutex-guarded registry ticked once per frame
//! - [`HostServices`], trait objects for everything engine-specific
//! - [`SimulatedHost`] for running without an engine

pub mod error;
pub mod events;
pub mod host;
pub mod manager;
pub mod settings;
pub mod sim;
pub mod state;

pub use error::{TimelineError, TimelineResult};
pub use events::{ReceiverHandle, TimelineEvent, TimelineEventKind};
pub use host::{
    CameraController, CameraState, FrameClock, FreeLookCamera, GroundProvider, HostServices,
    HostUi, MessageBus, ScriptNotifier,
};
pub use manager::TimelineManager;
pub use settings::{FrameworkSettings, SettingsError, SETTINGS_FILE_NAME, SETTINGS_FORMAT_VERSION};
pub use sim::{Notification, SimulatedHost};
pub use state::{
    Channel, PlaybackOptions, PlaybackSpeed, PluginHandle, RecordingOptions, TimelineId,
    TimelineState,
};
