//! Immutable node transforms

use std::fmt;
use std::sync::Arc;

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// An immutable local transform, shared by reference between nodes
#[derive(Debug, Clone, PartialEq)]
pub struct TransformState {
    mat: Mat4,
}

impl TransformState {
    /// The identity transform
    pub fn make_identity() -> Arc<Self> {
        Arc::new(Self { mat: Mat4::identity() })
    }

    /// Transform from an explicit matrix
    pub fn make_mat(mat: Mat4) -> Arc<Self> {
        Arc::new(Self { mat })
    }

    /// Pure translation
    pub fn make_pos(pos: Vec3) -> Arc<Self> {
        Self::make_mat(Mat4::translation(pos))
    }

    /// Translation applied after a non-uniform scale
    pub fn make_pos_scale(pos: Vec3, scale: Vec3) -> Arc<Self> {
        Self::make_mat(Mat4::translation(pos) * Mat4::scaling(scale))
    }

    /// The transform matrix
    pub fn get_mat(&self) -> &Mat4 {
        &self.mat
    }

    /// Whether this is exactly the identity
    pub fn is_identity(&self) -> bool {
        self.mat == Mat4::identity()
    }

    /// This transform followed by `other` in child space
    pub fn compose(&self, other: &TransformState) -> Arc<Self> {
        Self::make_mat(self.mat * other.mat)
    }

    /// Translation component
    pub fn get_pos(&self) -> Vec3 {
        Vec3::new(self.mat[(0, 3)], self.mat[(1, 3)], self.mat[(2, 3)])
    }
}

impl fmt::Display for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return f.write_str("T:(identity)");
        }
        let pos = self.get_pos();
        write!(f, "T:(pos {} {} {}", pos.x, pos.y, pos.z)?;
        let scale = self.mat.max_axis_scale();
        if (scale - 1.0).abs() > f32::EPSILON {
            write!(f, " scale {scale}")?;
        }
        f.write_str(")")
    }
}
