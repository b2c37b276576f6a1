// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe anchors: what a keyframe's value is measured against.
//!
//! A keyframe can hold an absolute world value, a value relative to the live
//! camera, or a value relative to an external object. Objects are referenced
//! through an [`ObjectRef`] lookup key and resolved on demand through an
//! [`ObjectRegistry`]; a keyframe never keeps an object alive.

use crate::keyframe::{Point3, Rotation, TrackValue, UnknownName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named attachment point on an external object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttachPoint {
    /// Object origin
    #[default]
    None,
    /// Head node
    Head,
    /// Torso node
    Torso,
}

impl AttachPoint {
    /// Name used in timeline documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Head => "head",
            Self::Torso => "torso",
        }
    }
}

impl FromStr for AttachPoint {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "head" => Ok(Self::Head),
            "torso" => Ok(Self::Torso),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// Lookup key for an external object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Raw numeric identifier (not stable across load orders)
    pub form_id: u32,
    /// Stable symbolic identifier, when the object has one
    pub editor_id: Option<String>,
    /// Name of the data file that defines the object
    pub plugin: Option<String>,
}

impl ObjectRef {
    /// Reference an object by numeric id only
    pub fn new(form_id: u32) -> Self {
        Self {
            form_id,
            editor_id: None,
            plugin: None,
        }
    }

    /// Attach a stable symbolic identifier
    pub fn with_editor_id(mut self, editor_id: impl Into<String>) -> Self {
        self.editor_id = Some(editor_id.into());
        self
    }

    /// Attach the defining data file name
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.editor_id {
            Some(editor_id) => write!(f, "{editor_id} (0x{:X})", self.form_id),
            None => write!(f, "0x{:X}", self.form_id),
        }
    }
}

/// Host-side registry of external objects
pub trait ObjectRegistry: Send + Sync {
    /// Resolve a stable symbolic identifier
    fn find_by_editor_id(&self, editor_id: &str) -> Option<ObjectRef>;

    /// Resolve a raw numeric identifier
    fn find_by_form_id(&self, form_id: u32) -> Option<ObjectRef>;

    /// World position of an attachment point, if the object is still loaded
    fn attach_position(&self, object: &ObjectRef, attach: AttachPoint) -> Option<Point3>;

    /// World orientation of the object, if it is still loaded
    fn rotation(&self, object: &ObjectRef) -> Option<Rotation>;
}

/// Camera transform captured at resolution time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraSnapshot {
    /// Camera position
    pub position: Point3,
    /// Camera orientation
    pub rotation: Rotation,
    /// Field of view in degrees
    pub fov: f32,
}

/// Collaborators available while resolving anchors
#[derive(Clone, Copy, Default)]
pub struct ResolveContext<'a> {
    /// Live camera, when reachable
    pub camera: Option<CameraSnapshot>,
    /// Object registry, when available
    pub objects: Option<&'a dyn ObjectRegistry>,
}

impl<'a> ResolveContext<'a> {
    /// Context with nothing to resolve against; only world anchors succeed
    pub fn detached() -> Self {
        Self::default()
    }

    /// Context with a camera and an object registry
    pub fn new(camera: Option<CameraSnapshot>, objects: &'a dyn ObjectRegistry) -> Self {
        Self {
            camera,
            objects: Some(objects),
        }
    }
}

/// Anchor kind, as written in timeline documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnchorKind {
    /// Absolute world value
    #[default]
    World,
    /// Relative to the live camera
    Camera,
    /// Relative to an external object
    Object,
}

impl AnchorKind {
    /// Name used in timeline documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Camera => "camera",
            Self::Object => "reference",
        }
    }
}

impl FromStr for AnchorKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "world" => Ok(Self::World),
            "camera" => Ok(Self::Camera),
            "reference" => Ok(Self::Object),
            other => Err(UnknownName(other.to_string())),
        }
    }
}

/// What a keyframe's value means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Anchor<V> {
    /// Absolute world value
    World(V),
    /// Live camera value plus an offset
    Camera {
        /// Offset added to the camera value
        offset: V,
    },
    /// External object value plus an offset
    Object {
        /// Lookup key of the object
        object: ObjectRef,
        /// Attachment point on the object
        attach: AttachPoint,
        /// Offset from the object
        offset: V,
        /// Offset is expressed in the object's own orientation
        offset_is_relative: bool,
    },
}

impl<V: AnchorTarget> Anchor<V> {
    /// Kind tag
    pub fn kind(&self) -> AnchorKind {
        match self {
            Self::World(_) => AnchorKind::World,
            Self::Camera { .. } => AnchorKind::Camera,
            Self::Object { .. } => AnchorKind::Object,
        }
    }

    /// World value, or the offset for relative anchors
    pub fn offset(&self) -> V {
        match self {
            Self::World(value) => *value,
            Self::Camera { offset } | Self::Object { offset, .. } => *offset,
        }
    }

    /// Resolve to a concrete value.
    ///
    /// Failed resolution never errors: the offset is used as an absolute
    /// world value and a warning is logged.
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> V {
        match self {
            Self::World(value) => *value,
            Self::Camera { offset } => match ctx.camera {
                Some(camera) => V::from_camera(&camera).offset_by(*offset),
                None => {
                    tracing::warn!("Camera unavailable, using camera-relative offset as world value");
                    *offset
                }
            },
            Self::Object {
                object,
                attach,
                offset,
                offset_is_relative,
            } => V::from_object(ctx, object, *attach, *offset, *offset_is_relative)
                .unwrap_or_else(|| {
                    tracing::warn!(
                        "Failed to resolve object {}, using offset as world value",
                        object
                    );
                    *offset
                }),
        }
    }
}

/// Channel values that anchors can resolve
pub trait AnchorTarget: TrackValue {
    /// The camera's value for this channel
    fn from_camera(camera: &CameraSnapshot) -> Self;

    /// Apply an offset
    fn offset_by(self, offset: Self) -> Self;

    /// Value relative to an external object, `None` if unresolvable
    fn from_object(
        _ctx: &ResolveContext<'_>,
        _object: &ObjectRef,
        _attach: AttachPoint,
        _offset: Self,
        _offset_is_relative: bool,
    ) -> Option<Self> {
        None
    }
}

impl AnchorTarget for Point3 {
    fn from_camera(camera: &CameraSnapshot) -> Self {
        camera.position
    }

    fn offset_by(self, offset: Self) -> Self {
        self.add(offset)
    }

    fn from_object(
        ctx: &ResolveContext<'_>,
        object: &ObjectRef,
        attach: AttachPoint,
        offset: Self,
        offset_is_relative: bool,
    ) -> Option<Self> {
        let objects = ctx.objects?;
        let base = objects.attach_position(object, attach)?;
        let offset = if offset_is_relative {
            match objects.rotation(object) {
                Some(rotation) => offset.rotated_by_yaw(rotation.yaw),
                None => offset,
            }
        } else {
            offset
        };
        Some(base.add(offset))
    }
}

impl AnchorTarget for Rotation {
    fn from_camera(camera: &CameraSnapshot) -> Self {
        camera.rotation
    }

    fn offset_by(self, offset: Self) -> Self {
        self.add(offset)
    }

    fn from_object(
        ctx: &ResolveContext<'_>,
        object: &ObjectRef,
        attach: AttachPoint,
        offset: Self,
        offset_is_relative: bool,
    ) -> Option<Self> {
        let objects = ctx.objects?;
        if offset_is_relative {
            return Some(objects.rotation(object)?.add(offset));
        }
        // Look at the object from wherever the camera is
        let target = objects.attach_position(object, attach)?;
        let eye = ctx.camera?.position;
        Some(Rotation::looking_at(eye, target).add(offset))
    }
}

impl AnchorTarget for f32 {
    fn from_camera(camera: &CameraSnapshot) -> Self {
        camera.fov
    }

    fn offset_by(self, offset: Self) -> Self {
        self + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Objects(HashMap<u32, (Point3, Rotation)>);

    impl ObjectRegistry for Objects {
        fn find_by_editor_id(&self, _editor_id: &str) -> Option<ObjectRef> {
            None
        }

        fn find_by_form_id(&self, form_id: u32) -> Option<ObjectRef> {
            self.0.contains_key(&form_id).then(|| ObjectRef::new(form_id))
        }

        fn attach_position(&self, object: &ObjectRef, attach: AttachPoint) -> Option<Point3> {
            let (position, _) = self.0.get(&object.form_id)?;
            let lift = match attach {
                AttachPoint::None => 0.0,
                AttachPoint::Torso => 80.0,
                AttachPoint::Head => 120.0,
            };
            Some(position.add(Point3::new(0.0, 0.0, lift)))
        }

        fn rotation(&self, object: &ObjectRef) -> Option<Rotation> {
            self.0.get(&object.form_id).map(|(_, r)| *r)
        }
    }

    fn objects() -> Objects {
        let mut map = HashMap::new();
        map.insert(
            0x14,
            (
                Point3::new(100.0, 0.0, 0.0),
                Rotation::pitch_yaw(0.0, std::f32::consts::FRAC_PI_2),
            ),
        );
        Objects(map)
    }

    #[test]
    fn test_camera_anchor_adds_offset() {
        let camera = CameraSnapshot {
            position: Point3::new(1.0, 2.0, 3.0),
            rotation: Rotation::ZERO,
            fov: 70.0,
        };
        let ctx = ResolveContext {
            camera: Some(camera),
            objects: None,
        };
        let anchor = Anchor::Camera {
            offset: Point3::new(0.0, 0.0, 10.0),
        };
        assert_eq!(anchor.resolve(&ctx), Point3::new(1.0, 2.0, 13.0));
        assert_eq!(Anchor::Camera { offset: 5.0f32 }.resolve(&ctx), 75.0);
    }

    #[test]
    fn test_object_anchor_attach_point() {
        let registry = objects();
        let ctx = ResolveContext::new(None, &registry);
        let anchor = Anchor::Object {
            object: ObjectRef::new(0x14),
            attach: AttachPoint::Head,
            offset: Point3::new(0.0, 0.0, 5.0),
            offset_is_relative: false,
        };
        assert_eq!(anchor.resolve(&ctx), Point3::new(100.0, 0.0, 125.0));
    }

    #[test]
    fn test_relative_offset_follows_object_heading() {
        let registry = objects();
        let ctx = ResolveContext::new(None, &registry);
        let anchor = Anchor::Object {
            object: ObjectRef::new(0x14),
            attach: AttachPoint::None,
            offset: Point3::new(0.0, 10.0, 0.0),
            offset_is_relative: true,
        };
        let value = anchor.resolve(&ctx);
        // Object faces +X, so "10 units ahead" lands on +X
        assert!((value.x - 110.0).abs() < 1e-3);
        assert!(value.y.abs() < 1e-3);
    }

    #[test]
    fn test_missing_object_falls_back_to_offset() {
        let registry = objects();
        let ctx = ResolveContext::new(None, &registry);
        let anchor = Anchor::Object {
            object: ObjectRef::new(0xDEAD),
            attach: AttachPoint::None,
            offset: Point3::new(7.0, 8.0, 9.0),
            offset_is_relative: false,
        };
        assert_eq!(anchor.resolve(&ctx), Point3::new(7.0, 8.0, 9.0));
        assert_eq!(anchor.resolve(&ResolveContext::detached()), Point3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_fov_ignores_object_anchor() {
        let registry = objects();
        let ctx = ResolveContext::new(None, &registry);
        let anchor = Anchor::Object {
            object: ObjectRef::new(0x14),
            attach: AttachPoint::Head,
            offset: 65.0f32,
            offset_is_relative: true,
        };
        assert_eq!(anchor.resolve(&ctx), 65.0);
    }

    #[test]
    fn test_rotation_looks_at_object() {
        let registry = objects();
        let camera = CameraSnapshot {
            position: Point3::ZERO,
            ..CameraSnapshot::default()
        };
        let ctx = ResolveContext::new(Some(camera), &registry);
        let anchor = Anchor::Object {
            object: ObjectRef::new(0x14),
            attach: AttachPoint::None,
            offset: Rotation::ZERO,
            offset_is_relative: false,
        };
        let value = anchor.resolve(&ctx);
        assert!((value.yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_anchor_kind_names() {
        assert_eq!("reference".parse::<AnchorKind>(), Ok(AnchorKind::Object));
        assert_eq!(AnchorKind::Camera.as_str(), "camera");
        assert!("actor".parse::<AnchorKind>().is_err());
    }
}
