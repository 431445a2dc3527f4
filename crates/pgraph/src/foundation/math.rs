//! Math utilities and types
//!
//! Provides the fundamental math types used by transforms and bounding volumes.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Extension helpers for 4x4 transform matrices
pub trait Mat4Ext {
    /// Create a translation matrix
    fn translation(offset: Vec3) -> Mat4;

    /// Create a non-uniform scale matrix
    fn scaling(scale: Vec3) -> Mat4;

    /// Largest scale factor applied along any basis axis
    fn max_axis_scale(&self) -> f32;

    /// Upper bound on how far the linear part can stretch any vector
    ///
    /// Uses the Frobenius norm of the upper 3x3 block, which bounds the
    /// spectral norm even under shear.
    fn max_stretch(&self) -> f32;
}

impl Mat4Ext for Mat4 {
    fn translation(offset: Vec3) -> Mat4 {
        Mat4::new_translation(&offset)
    }

    fn scaling(scale: Vec3) -> Mat4 {
        Mat4::new_nonuniform_scaling(&scale)
    }

    fn max_axis_scale(&self) -> f32 {
        (0..3)
            .map(|axis| self.fixed_view::<3, 1>(0, axis).norm())
            .fold(0.0_f32, f32::max)
    }

    fn max_stretch(&self) -> f32 {
        self.fixed_view::<3, 3>(0, 0).norm()
    }
}
