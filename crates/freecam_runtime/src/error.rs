// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for timeline operations.

use crate::state::{Channel, PluginHandle, TimelineId};
use freecam_sequencer::{CodecError, InvalidPlaybackMode, ObjectRef};
use std::path::PathBuf;

/// Result alias for manager operations
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Why a manager operation did not happen
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// Sentinel or otherwise unusable plugin handle
    #[error("invalid plugin handle {0}")]
    InvalidHandle(PluginHandle),
    /// Handle has not been registered
    #[error("plugin handle {0} is not registered")]
    UnregisteredPlugin(PluginHandle),
    /// Sentinel timeline id
    #[error("invalid timeline id {0}")]
    InvalidTimelineId(TimelineId),
    /// No timeline with this id
    #[error("timeline {0} not found")]
    NotFound(TimelineId),
    /// Caller does not own the timeline
    #[error("plugin handle {caller} does not own timeline {id} (owned by handle {owner})")]
    NotOwned {
        /// Timeline id
        id: TimelineId,
        /// Calling handle
        caller: PluginHandle,
        /// Registered owner
        owner: PluginHandle,
    },
    /// Some timeline is already recording or playing
    #[error("timeline {0} is already active")]
    AlreadyActive(TimelineId),
    /// Timeline is not the active one
    #[error("timeline {0} is not the active timeline")]
    NotActive(TimelineId),
    /// Timeline is not playing
    #[error("timeline {0} is not playing")]
    NotPlaying(TimelineId),
    /// Timeline is not recording
    #[error("timeline {0} is not recording")]
    NotRecording(TimelineId),
    /// Timeline is recording
    #[error("timeline {0} is recording")]
    RecordingInProgress(TimelineId),
    /// Caller has no playing timeline to switch from
    #[error("no active timeline found for plugin handle {0}")]
    NoActiveTimeline(PluginHandle),
    /// Timeline has neither translation nor rotation points
    #[error("timeline {0} has no points")]
    NoPoints(TimelineId),
    /// Camera is already in free-look mode
    #[error("camera is already in free-look mode")]
    AlreadyInFreeLook,
    /// Camera is not in free-look mode
    #[error("camera is not in free-look mode")]
    NotInFreeLook,
    /// Camera singleton not reachable
    #[error("camera is not available")]
    CameraUnavailable,
    /// Keyframe index past the end of a channel
    #[error("index {index} out of range (timeline {id} has {len} {channel} points)")]
    IndexOutOfRange {
        /// Timeline id
        id: TimelineId,
        /// Channel indexed
        channel: Channel,
        /// Requested index
        index: usize,
        /// Channel length
        len: usize,
    },
    /// Object anchor target is not known to the host
    #[error("object {0} not found")]
    ObjectNotFound(ObjectRef),
    /// Raw playback mode outside the known range
    #[error(transparent)]
    InvalidPlaybackMode(#[from] InvalidPlaybackMode),
    /// Argument outside its accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Import source does not exist
    #[error("file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),
    /// Timeline document could not be read or written
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TimelineError {
    /// Whether the failure is a state precondition rather than bad input
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AlreadyActive(_)
                | Self::NotActive(_)
                | Self::NotPlaying(_)
                | Self::NotRecording(_)
                | Self::RecordingInProgress(_)
                | Self::NoActiveTimeline(_)
                | Self::NoPoints(_)
                | Self::AlreadyInFreeLook
                | Self::NotInFreeLook
        )
    }

    /// Log the failure of `operation` and pass the error through
    pub(crate) fn report(self, operation: &str) -> Self {
        if self.is_precondition() {
            tracing::warn!("{}: {}", operation, self);
        } else {
            tracing::error!("{}: {}", operation, self);
        }
        self
    }
}
