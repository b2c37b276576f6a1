// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe sequencing for scripted free-camera paths.
//!
//! This crate provides the camera animation model:
//! - Interpolated per-channel tracks (translation, rotation, field of view)
//! - Keyframe anchors relative to the world, the camera or external objects
//! - A timeline that plays the three channels as one unit
//! - Timeline documents in RON or JSON
//!
//! ## Architecture
//!
//! The sequencer is built on:
//! - [`TrackValue`] for channel-generic interpolation (Catmull-Rom, with
//!   angular channels interpolated on the unit circle)
//! - [`Anchor`] resolution through a host-provided [`ObjectRegistry`]
//! - Per-track playback cursors with end, loop and wait modes

pub mod anchor;
pub mod codec;
pub mod keyframe;
pub mod timeline;
pub mod track;

pub use anchor::{
    Anchor, AnchorKind, AnchorTarget, AttachPoint, CameraSnapshot, ObjectRef, ObjectRegistry,
    ResolveContext,
};
pub use codec::{
    read_document, write_document, ChannelCodec, CodecError, DocumentFormat, FovCodec,
    ImportSummary, PointRecord, ReferenceRecord, RotationCodec, TimelineDocument,
    TranslationCodec, FORMAT_VERSION,
};
pub use keyframe::{
    normalize_angle, Easing, Interpolation, InterpolationMode, Point3, Rotation, TrackValue,
    Transition, UnknownName, DEFAULT_FOV,
};
pub use timeline::{CameraSample, Timeline};
pub use track::{InvalidPlaybackMode, KeyPoint, PlaybackMode, Track};
