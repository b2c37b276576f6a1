// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline documents.
//!
//! A [`TimelineDocument`] is the on-disk model of a timeline: playback policy
//! plus one section of [`PointRecord`]s per channel. The same model is stored
//! as RON or JSON; [`DocumentFormat`] picks the encoding from the file
//! extension.
//!
//! Channel values go through a [`ChannelCodec`], which turns a value into a
//! flat list of numbers and back. Rotations are written in degrees.

use crate::anchor::{Anchor, AnchorKind, AnchorTarget, AttachPoint, ObjectRef, ResolveContext};
use crate::keyframe::{InterpolationMode, Point3, Rotation, Transition};
use crate::timeline::Timeline;
use crate::track::{KeyPoint, PlaybackMode, Track};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Current document format version
pub const FORMAT_VERSION: u32 = 1;

/// Errors reading or writing timeline documents
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// File could not be read or written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// RON text could not be parsed
    #[error("invalid RON document: {0}")]
    RonParse(#[from] ron::error::SpannedError),
    /// RON text could not be produced
    #[error("failed to write RON document: {0}")]
    RonWrite(#[from] ron::Error),
    /// JSON text could not be parsed or produced
    #[error("JSON document error: {0}")]
    Json(#[from] serde_json::Error),
    /// Extension names no known format
    #[error("unsupported document format '{0}'")]
    UnsupportedFormat(String),
}

/// Text encoding of a timeline document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Rusty Object Notation
    #[default]
    Ron,
    /// JSON
    Json,
}

impl DocumentFormat {
    /// Format named by the path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        extension.to_ascii_lowercase().parse().ok()
    }

    /// Format named by the path's extension, or `fallback`
    pub fn for_path(path: &Path, fallback: Self) -> Self {
        Self::from_path(path).unwrap_or(fallback)
    }

    /// Canonical file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ron => "ron",
            Self::Json => "json",
        }
    }

    /// Parse a document from text
    pub fn parse(&self, text: &str) -> Result<TimelineDocument, CodecError> {
        let document = match self {
            Self::Ron => ron::Options::default()
                .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
                .from_str(text)?,
            Self::Json => serde_json::from_str(text)?,
        };
        Ok(document)
    }

    /// Render a document as text
    pub fn render(&self, document: &TimelineDocument) -> Result<String, CodecError> {
        let text = match self {
            Self::Ron => {
                let config = ron::ser::PrettyConfig::new()
                    .struct_names(false)
                    .extensions(ron::extensions::Extensions::IMPLICIT_SOME);
                ron::ser::to_string_pretty(document, config)?
            }
            Self::Json => serde_json::to_string_pretty(document)?,
        };
        Ok(text)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DocumentFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ron" => Ok(Self::Ron),
            "json" => Ok(Self::Json),
            other => Err(CodecError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Read a document, choosing the format from the extension
pub fn read_document(path: &Path, fallback: DocumentFormat) -> Result<TimelineDocument, CodecError> {
    let text = std::fs::read_to_string(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document = DocumentFormat::for_path(path, fallback).parse(&text)?;

    match document.format_version {
        None => tracing::info!("No formatVersion in {}, assuming version {}", path.display(), FORMAT_VERSION),
        Some(FORMAT_VERSION) => {}
        Some(other) => tracing::warn!(
            "Unknown formatVersion {} in {}, attempting to parse as version {}",
            other,
            path.display(),
            FORMAT_VERSION
        ),
    }

    Ok(document)
}

/// Write a document, choosing the format from the extension
pub fn write_document(
    path: &Path,
    document: &TimelineDocument,
    fallback: DocumentFormat,
) -> Result<(), CodecError> {
    let text = DocumentFormat::for_path(path, fallback).render(document)?;
    let io_error = |source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, text).map_err(io_error)
}

/// Object reference as written in a document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Stable symbolic identifier
    #[serde(rename = "editorID", default, skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<String>,
    /// Defining data file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    /// Numeric identifier as `0x`-prefixed hex
    #[serde(rename = "formID", default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
}

/// One keyframe as written in a document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    /// Keyframe time; records without one are skipped
    #[serde(default)]
    pub time: Option<f32>,
    /// `world`, `camera` or `reference`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Absolute value of a world keyframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<f32>>,
    /// Offset of a camera or reference keyframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Vec<f32>>,
    /// `none`, `linear` or `cubicHermite`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation_mode: Option<String>,
    /// Ease-in flag
    #[serde(default)]
    pub ease_in: bool,
    /// Ease-out flag
    #[serde(default)]
    pub ease_out: bool,
    /// Target of a reference keyframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceRecord>,
    /// `none`, `head` or `torso`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_point: Option<String>,
    /// Offset is expressed in the object's orientation
    #[serde(default)]
    pub is_offset_relative: bool,
}

/// Complete on-disk timeline.
///
/// Policy fields are optional: an imported document only overrides the
/// settings it names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDocument {
    /// Format version; missing means version 1
    #[serde(default)]
    pub format_version: Option<u32>,
    /// `end`, `loop` or `wait`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_mode: Option<String>,
    /// Loop re-entry time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_time_offset: Option<f32>,
    /// Ease into the timeline start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_ease_in: Option<bool>,
    /// Ease out of the timeline end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_ease_out: Option<bool>,
    /// Keep host menus visible while playing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_menus_during_playback: Option<bool>,
    /// Let the user look around during playback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_user_rotation: Option<bool>,
    /// Keep the camera above the ground
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_ground: Option<bool>,
    /// Minimum clearance when following the ground
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height_above_ground: Option<f32>,
    /// Rotation values are in degrees rather than radians
    #[serde(default)]
    pub use_degrees: bool,
    /// Translation section
    #[serde(default)]
    pub translation_points: Vec<PointRecord>,
    /// Rotation section
    #[serde(default)]
    pub rotation_points: Vec<PointRecord>,
    /// Field of view section
    #[serde(default)]
    pub fov_points: Vec<PointRecord>,
}

/// Keyframes added by an import, per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    /// Translation keyframes added
    pub translation: usize,
    /// Rotation keyframes added
    pub rotation: usize,
    /// Field of view keyframes added
    pub fov: usize,
}

impl TimelineDocument {
    /// Capture a timeline's keyframes, playback mode and loop offset.
    ///
    /// Policy flags owned by the caller are left unset.
    pub fn from_timeline(timeline: &Timeline) -> Self {
        let rotation_codec = RotationCodec { degrees: true };
        Self {
            format_version: Some(FORMAT_VERSION),
            playback_mode: Some(timeline.playback_mode().as_str().to_string()),
            loop_time_offset: Some(timeline.loop_time_offset()),
            use_degrees: true,
            translation_points: export_track(&TranslationCodec, timeline.translation()),
            rotation_points: export_track(&rotation_codec, timeline.rotation()),
            fov_points: export_track(&FovCodec, timeline.fov()),
            ..Self::default()
        }
    }

    /// Playback mode named by the document, if any
    pub fn playback_mode(&self) -> Option<PlaybackMode> {
        let name = self.playback_mode.as_deref()?;
        Some(name.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown playbackMode '{}', using 'end'", name);
            PlaybackMode::End
        }))
    }

    /// Add the document's keyframes to `timeline`, shifted by `time_offset`
    pub fn import_points(
        &self,
        timeline: &mut Timeline,
        time_offset: f32,
        ctx: &ResolveContext<'_>,
    ) -> ImportSummary {
        let rotation_codec = RotationCodec {
            degrees: self.use_degrees,
        };
        let mut summary = ImportSummary::default();

        for point in import_section(&TranslationCodec, &self.translation_points, time_offset, ctx) {
            timeline.add_translation_point(point);
            summary.translation += 1;
        }
        for point in import_section(&rotation_codec, &self.rotation_points, time_offset, ctx) {
            timeline.add_rotation_point(point);
            summary.rotation += 1;
        }
        for point in import_section(&FovCodec, &self.fov_points, time_offset, ctx) {
            timeline.add_fov_point(point);
            summary.fov += 1;
        }

        summary
    }
}

/// Flat numeric encoding of one channel's values
pub trait ChannelCodec {
    /// Channel value type
    type Value: AnchorTarget + Default;

    /// Section name, used in log messages
    const SECTION: &'static str;

    /// Value as numbers
    fn encode(&self, value: &Self::Value) -> Vec<f32>;

    /// Numbers as a value; `None` on wrong arity
    fn decode(&self, components: &[f32]) -> Option<Self::Value>;
}

/// `[x, y, z]`
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationCodec;

impl ChannelCodec for TranslationCodec {
    type Value = Point3;
    const SECTION: &'static str = "translationPoints";

    fn encode(&self, value: &Point3) -> Vec<f32> {
        vec![value.x, value.y, value.z]
    }

    fn decode(&self, components: &[f32]) -> Option<Point3> {
        match components {
            [x, y, z] => Some(Point3::new(*x, *y, *z)),
            _ => None,
        }
    }
}

/// `[pitch, yaw]` or `[pitch, yaw, roll]`, in degrees or radians
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationCodec {
    /// Numbers are degrees
    pub degrees: bool,
}

impl ChannelCodec for RotationCodec {
    type Value = Rotation;
    const SECTION: &'static str = "rotationPoints";

    fn encode(&self, value: &Rotation) -> Vec<f32> {
        let scale = if self.degrees { 180.0 / std::f32::consts::PI } else { 1.0 };
        vec![value.pitch * scale, value.yaw * scale, value.roll * scale]
    }

    fn decode(&self, components: &[f32]) -> Option<Rotation> {
        let scale = if self.degrees { std::f32::consts::PI / 180.0 } else { 1.0 };
        match components {
            [pitch, yaw] => Some(Rotation::pitch_yaw(pitch * scale, yaw * scale)),
            [pitch, yaw, roll] => Some(Rotation::new(pitch * scale, yaw * scale, roll * scale)),
            _ => None,
        }
    }
}

/// `[fov]`
#[derive(Debug, Clone, Copy, Default)]
pub struct FovCodec;

impl ChannelCodec for FovCodec {
    type Value = f32;
    const SECTION: &'static str = "fovPoints";

    fn encode(&self, value: &f32) -> Vec<f32> {
        vec![*value]
    }

    fn decode(&self, components: &[f32]) -> Option<f32> {
        match components {
            [fov] => Some(*fov),
            _ => None,
        }
    }
}

/// Parse a `0x`-prefixed (or bare) hex numeric identifier
pub fn parse_form_id(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

fn export_track<C: ChannelCodec>(codec: &C, track: &Track<C::Value>) -> Vec<PointRecord> {
    track.points().iter().map(|point| export_point(codec, point)).collect()
}

fn export_point<C: ChannelCodec>(codec: &C, point: &KeyPoint<C::Value>) -> PointRecord {
    let mut record = PointRecord {
        time: Some(point.time()),
        kind: Some(point.anchor.kind().as_str().to_string()),
        interpolation_mode: Some(point.transition.mode().as_str().to_string()),
        ease_in: point.transition.ease_in(),
        ease_out: point.transition.ease_out(),
        ..PointRecord::default()
    };

    match &point.anchor {
        Anchor::World(value) => record.value = Some(codec.encode(value)),
        Anchor::Camera { offset } => record.offset = Some(codec.encode(offset)),
        Anchor::Object {
            object,
            attach,
            offset,
            offset_is_relative,
        } => {
            if object.editor_id.is_none() {
                tracing::warn!(
                    "Reference 0x{:X} has no editor ID, exported form ID depends on load order",
                    object.form_id
                );
            }
            if object.plugin.is_none() {
                tracing::warn!("Reference 0x{:X} has no associated plugin file", object.form_id);
            }
            record.offset = Some(codec.encode(offset));
            record.reference = Some(ReferenceRecord {
                editor_id: object.editor_id.clone(),
                plugin: object.plugin.clone(),
                form_id: Some(format!("0x{:X}", object.form_id)),
            });
            record.attach_point = Some(attach.as_str().to_string());
            record.is_offset_relative = *offset_is_relative;
        }
    }

    record
}

fn import_section<C: ChannelCodec>(
    codec: &C,
    records: &[PointRecord],
    time_offset: f32,
    ctx: &ResolveContext<'_>,
) -> Vec<KeyPoint<C::Value>> {
    records
        .iter()
        .filter_map(|record| import_point(codec, record, time_offset, ctx))
        .collect()
}

fn import_point<C: ChannelCodec>(
    codec: &C,
    record: &PointRecord,
    time_offset: f32,
    ctx: &ResolveContext<'_>,
) -> Option<KeyPoint<C::Value>> {
    let Some(time) = record.time else {
        tracing::warn!("Skipping {} record without 'time' field", C::SECTION);
        return None;
    };
    let time = time + time_offset;

    let mode = match record.interpolation_mode.as_deref() {
        None => InterpolationMode::CubicHermite,
        Some(name) => name.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown interpolationMode '{}' at time {}, using cubicHermite", name, time);
            InterpolationMode::CubicHermite
        }),
    };
    let transition = Transition::new(time, mode, record.ease_in, record.ease_out);

    let kind = match record.kind.as_deref() {
        None => AnchorKind::World,
        Some(name) => name.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown point type '{}' at time {}, using world", name, time);
            AnchorKind::World
        }),
    };

    let offset = match record.offset.as_deref() {
        None => C::Value::default(),
        Some(components) => codec.decode(components).unwrap_or_else(|| {
            tracing::warn!(
                "Invalid 'offset' array in {} at time {}, using zero offset",
                C::SECTION,
                time
            );
            C::Value::default()
        }),
    };

    match kind {
        AnchorKind::World => {
            let value = record.value.as_deref().and_then(|components| codec.decode(components));
            match value {
                Some(value) => Some(KeyPoint::world(transition, value)),
                None => {
                    tracing::warn!(
                        "World point in {} at time {} missing or invalid 'value' array",
                        C::SECTION,
                        time
                    );
                    None
                }
            }
        }
        AnchorKind::Camera => Some(KeyPoint::new(transition, Anchor::Camera { offset }, ctx)),
        AnchorKind::Object => {
            let Some(reference) = &record.reference else {
                tracing::warn!(
                    "Reference point in {} at time {} missing 'reference' section",
                    C::SECTION,
                    time
                );
                return None;
            };

            let attach = match record.attach_point.as_deref() {
                None => AttachPoint::None,
                Some(name) => name.parse().unwrap_or_else(|_| {
                    tracing::warn!("Unknown attachPoint '{}' at time {}, using none", name, time);
                    AttachPoint::None
                }),
            };

            match resolve_reference(reference, ctx) {
                Some(object) => {
                    let anchor = Anchor::Object {
                        object,
                        attach,
                        offset,
                        offset_is_relative: record.is_offset_relative,
                    };
                    Some(KeyPoint::new(transition, anchor, ctx))
                }
                None => {
                    tracing::warn!(
                        "Failed to resolve reference at time {}, using offset as absolute value",
                        time
                    );
                    Some(KeyPoint::world(transition, offset))
                }
            }
        }
    }
}

/// Editor id first, then numeric id
fn resolve_reference(reference: &ReferenceRecord, ctx: &ResolveContext<'_>) -> Option<ObjectRef> {
    let objects = ctx.objects?;

    if let Some(editor_id) = &reference.editor_id {
        match objects.find_by_editor_id(editor_id) {
            Some(found) => {
                if let (Some(expected), Some(actual)) = (&reference.plugin, &found.plugin) {
                    if expected != actual {
                        tracing::warn!(
                            "Reference '{}' found but from different plugin (expected: {}, got: {})",
                            editor_id,
                            expected,
                            actual
                        );
                    }
                }
                return Some(found);
            }
            None => tracing::warn!("Failed to resolve reference editor ID: {}", editor_id),
        }
    }

    let text = reference.form_id.as_deref()?;
    let form_id = match parse_form_id(text) {
        Some(0) => return None,
        Some(form_id) => form_id,
        None => {
            tracing::warn!("Malformed reference form ID: {}", text);
            return None;
        }
    };
    let found = objects.find_by_form_id(form_id);
    if found.is_none() {
        tracing::warn!("Failed to resolve reference form ID: {}", text);
    }
    found
}
