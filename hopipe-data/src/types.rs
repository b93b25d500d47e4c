//! Core geometric types shared by the mesh processing stages.
//!
//! These are CPU-side representations; positions are stored as `f32` like the
//! meshes the reconstruction engine exports, while transforms are composed in
//! `f64` so that normalizing and restoring a mesh does not drift.

use glam::{DMat4, DVec3, Vec3};

/// A triangle given by its three corner positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex position.
    pub v0: Vec3,
    /// Second vertex position.
    pub v1: Vec3,
    /// Third vertex position.
    pub v2: Vec3,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the normal of the triangle (not normalized).
    pub fn normal(&self) -> Vec3 {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(e2)
    }

    /// Compute the area of the triangle.
    pub fn area(&self) -> f32 {
        self.normal().length() * 0.5
    }

    /// Signed volume of the tetrahedron spanned by the triangle and the origin.
    ///
    /// Summed over a closed, consistently oriented surface this yields the
    /// enclosed volume.
    pub fn signed_volume(&self) -> f64 {
        let a = self.v0.as_dvec3();
        let b = self.v1.as_dvec3();
        let c = self.v2.as_dvec3();
        a.dot(b.cross(c)) / 6.0
    }
}

/// Uniform scale plus translation used by the engine to normalize a scene.
///
/// A real-world point `p` maps into the fitting space as
/// `scale * (p + translation)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub scale: f64,
    pub translation: DVec3,
}

impl SimilarityTransform {
    pub fn new(scale: f64, translation: DVec3) -> Self {
        Self { scale, translation }
    }

    /// True when the transform can be inverted.
    pub fn is_invertible(&self) -> bool {
        self.scale.is_finite() && self.scale != 0.0 && self.translation.is_finite()
    }

    /// `Scale(scale) * Translate(translation)`: real world to normalized space.
    pub fn forward_matrix(&self) -> DMat4 {
        DMat4::from_scale(DVec3::splat(self.scale)) * DMat4::from_translation(self.translation)
    }

    /// Normalized space back to real world.
    pub fn inverse_matrix(&self) -> DMat4 {
        self.forward_matrix().inverse()
    }

    /// Map every position through `matrix` in place.
    pub fn apply_matrix(matrix: &DMat4, positions: &mut [Vec3]) {
        for p in positions.iter_mut() {
            *p = matrix.transform_point3(p.as_dvec3()).as_vec3();
        }
    }
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translation: DVec3::ZERO,
        }
    }
}
