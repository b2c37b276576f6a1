// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline import and export.

use super::{check_time, lookup, lookup_mut, TimelineManager};
use crate::error::{TimelineError, TimelineResult};
use crate::state::{PluginHandle, TimelineId};
use freecam_sequencer::{read_document, write_document, ImportSummary, TimelineDocument};
use std::path::{Path, PathBuf};

impl TimelineManager {
    /// Append the keyframes of a timeline file, shifted by `time_offset`.
    ///
    /// Relative paths are resolved against the data directory. Playback mode
    /// and policy named by the document replace the timeline's own.
    pub fn add_timeline_from_file(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        path: &Path,
        time_offset: f32,
    ) -> TimelineResult<ImportSummary> {
        let path = self.settings.resolve_path(path);
        let fallback = self.settings.default_format;
        self.with_inner(|inner, host| {
            if lookup(&inner.timelines, id, caller)?.is_recording {
                return Err(TimelineError::RecordingInProgress(id));
            }
            check_time("time offset", time_offset)?;
            if !path.exists() {
                return Err(TimelineError::FileNotFound(path.clone()));
            }
            let document = read_document(&path, fallback)?;

            inner.stop_if_playing(host, id);
            let state = lookup_mut(&mut inner.timelines, id, caller)?;
            if let Some(mode) = document.playback_mode() {
                state.timeline.set_playback_mode(mode);
            }
            if let Some(offset) = document.loop_time_offset {
                state.timeline.set_loop_time_offset(offset);
            }
            if let Some(ease_in) = document.global_ease_in {
                state.global_ease_in = ease_in;
            }
            if let Some(ease_out) = document.global_ease_out {
                state.global_ease_out = ease_out;
            }
            if let Some(show) = document.show_menus_during_playback {
                state.show_menus_during_playback = show;
            }
            if let Some(allow) = document.allow_user_rotation {
                state.allow_user_rotation = allow;
            }
            if let Some(follow) = document.follow_ground {
                state.follow_ground = follow;
            }
            if let Some(min_height) = document.min_height_above_ground {
                state.min_height_above_ground = min_height;
            }

            let summary =
                document.import_points(&mut state.timeline, time_offset, &host.resolve_context());
            tracing::info!(
                "Imported {} translation, {} rotation and {} fov points from {} into timeline {}",
                summary.translation,
                summary.rotation,
                summary.fov,
                path.display(),
                id
            );
            Ok(summary)
        })
        .map_err(|err| err.report("add_timeline_from_file"))
    }

    /// Write a timeline with its playback mode and policy; returns the path written
    pub fn export_timeline(
        &self,
        caller: PluginHandle,
        id: TimelineId,
        path: &Path,
    ) -> TimelineResult<PathBuf> {
        let path = self.settings.resolve_path(path);
        let fallback = self.settings.default_format;
        self.with_inner(|inner, _| {
            let state = lookup(&inner.timelines, id, caller)?;
            let document = TimelineDocument {
                global_ease_in: Some(state.global_ease_in),
                global_ease_out: Some(state.global_ease_out),
                show_menus_during_playback: Some(state.show_menus_during_playback),
                allow_user_rotation: Some(state.allow_user_rotation),
                follow_ground: Some(state.follow_ground),
                min_height_above_ground: Some(state.min_height_above_ground),
                ..TimelineDocument::from_timeline(&state.timeline)
            };
            write_document(&path, &document, fallback)?;
            tracing::info!(
                "Exported timeline {} ({} points) to {}",
                id,
                state.timeline.point_count(),
                path.display()
            );
            Ok(path)
        })
        .map_err(|err: TimelineError| err.report("export_timeline"))
    }
}
