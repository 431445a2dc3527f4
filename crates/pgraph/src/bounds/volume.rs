//! Bounding volume primitives
//!
//! Conservative envelopes consumed by the node core through three calls:
//! [`BoundingVolume::around`], [`BoundingVolume::xform`], and the
//! empty/infinite/undefined queries. Tightness is not a goal; containment is.

use serde::{Serialize, Deserialize};
use std::fmt;

use crate::foundation::math::{Mat4, Mat4Ext, Point3, Vec3};

/// Slack allowed in containment tests to absorb float rounding
const CONTAINMENT_EPSILON: f32 = 1e-4;

/// Volume kind a node computes for its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BoundingVolumeType {
    /// The pipeline's configured kind; spheres when that is `Default` too
    #[default]
    Default,
    /// Bounding sphere
    Sphere,
    /// Axis-aligned bounding box
    Box,
}

/// Errors from bounding volume construction
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundsError {
    /// One of the inputs can't be enclosed by a finite volume of the requested kind
    #[error("cannot enclose a {0} volume")]
    IncompatibleVolume(&'static str),
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        let e = CONTAINMENT_EPSILON;
        point.x >= self.min.x - e && point.x <= self.max.x + e &&
        point.y >= self.min.y - e && point.y <= self.max.y + e &&
        point.z >= self.min.z - e && point.z <= self.max.z + e
    }

    /// Smallest box enclosing both boxes
    pub fn union(&self, other: &AABB) -> AABB {
        AABB::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Smallest box enclosing a set of points, `None` for an empty set
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<AABB> {
        points.into_iter().fold(None, |acc: Option<AABB>, p| {
            Some(match acc {
                Some(b) => AABB::new(b.min.inf(&p), b.max.sup(&p)),
                None => AABB::new(p, p),
            })
        })
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Center of the sphere
    pub center: Vec3,
    /// Radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if the sphere contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point - self.center).magnitude() <= self.radius + CONTAINMENT_EPSILON * self.radius.max(1.0)
    }

    /// Box enclosing the sphere
    pub fn to_aabb(&self) -> AABB {
        AABB::from_center_extents(self.center, Vec3::repeat(self.radius))
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal: normal.normalize(), distance }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// A conservative geometric envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BoundingVolume {
    /// Encloses nothing
    #[default]
    Empty,
    /// Encloses everything
    Infinite,
    /// Could not be computed; callers must not cull against it
    Undefined,
    /// Sphere volume
    Sphere(BoundingSphere),
    /// Axis-aligned box volume
    Box(AABB),
    /// Half-space behind a plane
    Plane(Plane),
}

impl BoundingVolume {
    /// Sphere volume
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self::Sphere(BoundingSphere::new(center, radius))
    }

    /// Box volume
    pub fn aabb(min: Vec3, max: Vec3) -> Self {
        Self::Box(AABB::new(min, max))
    }

    /// Whether the volume encloses nothing
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether the volume encloses everything
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    /// Whether the volume failed to compute
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Name of the volume kind, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Infinite => "infinite",
            Self::Undefined => "undefined",
            Self::Sphere(_) => "sphere",
            Self::Box(_) => "box",
            Self::Plane(_) => "plane",
        }
    }

    fn finite_aabb(&self) -> Option<AABB> {
        match self {
            Self::Sphere(sphere) => Some(sphere.to_aabb()),
            Self::Box(aabb) => Some(*aabb),
            _ => None,
        }
    }

    /// Build a volume of kind `bound_type` enclosing every volume in `volumes`
    ///
    /// Empty inputs are skipped and an infinite input makes the result infinite.
    /// Planes and undefined volumes can't be enclosed and produce an error.
    pub fn around<'a, I>(bound_type: BoundingVolumeType, volumes: I) -> Result<BoundingVolume, BoundsError>
    where
        I: IntoIterator<Item = &'a BoundingVolume>,
    {
        let mut finite = Vec::new();
        let mut infinite = false;
        for volume in volumes {
            match volume {
                Self::Empty => {}
                Self::Infinite => infinite = true,
                Self::Undefined | Self::Plane(_) => {
                    return Err(BoundsError::IncompatibleVolume(volume.kind_name()));
                }
                Self::Sphere(_) | Self::Box(_) => finite.push(volume),
            }
        }

        if infinite {
            return Ok(Self::Infinite);
        }

        let Some(union) = finite.iter().filter_map(|v| v.finite_aabb()).reduce(|a, b| a.union(&b)) else {
            return Ok(Self::Empty);
        };

        match bound_type {
            BoundingVolumeType::Box => Ok(Self::Box(union)),
            BoundingVolumeType::Sphere | BoundingVolumeType::Default => {
                let center = union.center();
                let radius = finite
                    .iter()
                    .map(|volume| match volume {
                        Self::Sphere(s) => (s.center - center).magnitude() + s.radius,
                        Self::Box(b) => b
                            .corners()
                            .iter()
                            .map(|corner| (corner - center).magnitude())
                            .fold(0.0_f32, f32::max),
                        _ => 0.0,
                    })
                    .fold(0.0_f32, f32::max);
                Ok(Self::sphere(center, radius))
            }
        }
    }

    /// Transform the volume by `mat`, keeping it conservative
    pub fn xform(&self, mat: &Mat4) -> BoundingVolume {
        match self {
            Self::Empty | Self::Infinite | Self::Undefined => self.clone(),
            Self::Sphere(sphere) => {
                let center = mat.transform_point(&Point3::from(sphere.center)).coords;
                Self::sphere(center, sphere.radius * mat.max_stretch())
            }
            Self::Box(aabb) => {
                let corners = aabb
                    .corners()
                    .into_iter()
                    .map(|corner| mat.transform_point(&Point3::from(corner)).coords);
                AABB::from_points(corners).map_or(Self::Empty, Self::Box)
            }
            Self::Plane(plane) => {
                let Some(inverse) = mat.try_inverse() else {
                    return Self::Undefined;
                };
                let on_plane = plane.normal * -plane.distance;
                let point = mat.transform_point(&Point3::from(on_plane)).coords;
                let normal = inverse.transpose().transform_vector(&plane.normal).normalize();
                Self::Plane(Plane::new(normal, -normal.dot(&point)))
            }
        }
    }

    /// Whether the point lies inside the volume
    pub fn contains_point(&self, point: Vec3) -> bool {
        match self {
            Self::Empty | Self::Undefined => false,
            Self::Infinite => true,
            Self::Sphere(sphere) => sphere.contains_point(point),
            Self::Box(aabb) => aabb.contains_point(point),
            Self::Plane(plane) => plane.distance_to_point(point) <= CONTAINMENT_EPSILON,
        }
    }

    /// Whether `other` lies entirely inside this volume
    pub fn contains_volume(&self, other: &BoundingVolume) -> bool {
        match (self, other) {
            (_, Self::Empty) => true,
            (Self::Infinite, _) => true,
            (_, Self::Infinite | Self::Undefined | Self::Plane(_)) => false,
            (Self::Sphere(outer), Self::Sphere(inner)) => {
                (inner.center - outer.center).magnitude() + inner.radius
                    <= outer.radius + CONTAINMENT_EPSILON * outer.radius.max(1.0)
            }
            (_, Self::Sphere(inner)) => {
                let b = inner.to_aabb();
                match self {
                    Self::Box(outer) => outer.contains_point(b.min) && outer.contains_point(b.max),
                    _ => b.corners().iter().all(|c| self.contains_point(*c)),
                }
            }
            (_, Self::Box(inner)) => inner.corners().iter().all(|c| self.contains_point(*c)),
        }
    }
}

impl fmt::Display for BoundingVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sphere(s) => write!(
                f,
                "bsphere, c ({}, {}, {}), r {}",
                s.center.x, s.center.y, s.center.z, s.radius
            ),
            Self::Box(b) => write!(
                f,
                "bbox, ({}, {}, {}) to ({}, {}, {})",
                b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
            ),
            Self::Plane(p) => write!(
                f,
                "plane, n ({}, {}, {}), d {}",
                p.normal.x, p.normal.y, p.normal.z, p.distance
            ),
            other => f.write_str(other.kind_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_around_spheres_contains_inputs() {
        let a = BoundingVolume::sphere(Vec3::new(-3.0, 0.0, 0.0), 1.0);
        let b = BoundingVolume::sphere(Vec3::new(4.0, 1.0, 0.0), 2.0);
        let result = BoundingVolume::around(BoundingVolumeType::Sphere, [&a, &b]).unwrap();
        assert!(result.contains_volume(&a));
        assert!(result.contains_volume(&b));
    }

    #[test]
    fn test_around_box_mixes_kinds() {
        let a = BoundingVolume::sphere(Vec3::zeros(), 1.0);
        let b = BoundingVolume::aabb(Vec3::new(2.0, 2.0, 2.0), Vec3::new(3.0, 4.0, 5.0));
        let result = BoundingVolume::around(BoundingVolumeType::Box, [&a, &b]).unwrap();
        match result {
            BoundingVolume::Box(aabb) => {
                assert_relative_eq!(aabb.min, Vec3::new(-1.0, -1.0, -1.0));
                assert_relative_eq!(aabb.max, Vec3::new(3.0, 4.0, 5.0));
            }
            other => panic!("expected box, got {other}"),
        }
    }

    #[test]
    fn test_around_degenerate_inputs() {
        let empty = BoundingVolume::Empty;
        assert!(BoundingVolume::around(BoundingVolumeType::Sphere, [&empty, &empty]).unwrap().is_empty());
        assert!(BoundingVolume::around(BoundingVolumeType::Sphere, std::iter::empty()).unwrap().is_empty());

        let infinite = BoundingVolume::Infinite;
        let sphere = BoundingVolume::sphere(Vec3::zeros(), 1.0);
        assert!(BoundingVolume::around(BoundingVolumeType::Box, [&sphere, &infinite]).unwrap().is_infinite());

        let plane = BoundingVolume::Plane(Plane::new(Vec3::y(), 0.0));
        assert_eq!(
            BoundingVolume::around(BoundingVolumeType::Sphere, [&sphere, &plane]),
            Err(BoundsError::IncompatibleVolume("plane"))
        );
    }

    #[test]
    fn test_xform_sphere_and_box() {
        let mat = Mat4::translation(Vec3::new(10.0, 0.0, 0.0)) * Mat4::scaling(Vec3::new(2.0, 2.0, 2.0));

        match BoundingVolume::sphere(Vec3::new(1.0, 0.0, 0.0), 1.0).xform(&mat) {
            BoundingVolume::Sphere(s) => {
                assert_relative_eq!(s.center, Vec3::new(12.0, 0.0, 0.0));
                assert_relative_eq!(s.radius, 2.0);
            }
            other => panic!("expected sphere, got {other}"),
        }

        match BoundingVolume::aabb(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)).xform(&mat) {
            BoundingVolume::Box(b) => {
                assert_relative_eq!(b.min, Vec3::new(10.0, 0.0, 0.0));
                assert_relative_eq!(b.max, Vec3::new(12.0, 2.0, 2.0));
            }
            other => panic!("expected box, got {other}"),
        }

        assert!(BoundingVolume::Empty.xform(&mat).is_empty());
    }

    #[test]
    fn test_xform_plane() {
        let plane = BoundingVolume::Plane(Plane::new(Vec3::y(), 0.0));
        let moved = plane.xform(&Mat4::translation(Vec3::new(0.0, 5.0, 0.0)));
        assert!(moved.contains_point(Vec3::new(0.0, 4.0, 0.0)));
        assert!(!moved.contains_point(Vec3::new(0.0, 6.0, 0.0)));
    }

    #[test]
    fn test_contains_volume_rules() {
        let big = BoundingVolume::sphere(Vec3::zeros(), 10.0);
        let small = BoundingVolume::aabb(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(big.contains_volume(&small));
        assert!(!small.contains_volume(&big));
        assert!(big.contains_volume(&BoundingVolume::Empty));
        assert!(!big.contains_volume(&BoundingVolume::Infinite));
        assert!(BoundingVolume::Infinite.contains_volume(&big));
    }
}
