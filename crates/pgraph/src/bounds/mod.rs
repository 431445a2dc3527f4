//! Bounding volumes and the per-stage bound cache

pub mod volume;
pub mod bounded_object;

pub use volume::{AABB, BoundingSphere, BoundingVolume, BoundingVolumeType, BoundsError, Plane};
pub use bounded_object::BoundedObject;
