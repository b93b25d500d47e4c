//! Per-frame RGB-D inputs handed to the reconstruction engine

use glam::{DMat3, DMat4};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use std::fmt;

/// Depth image in scene units (metres); 0 marks missing depth.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Fixed-width frame identifier.
///
/// Ids are the frame index zero-padded to six digits, so sorting ids as
/// strings gives the same order as sorting the indices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(String);

impl FrameId {
    pub const WIDTH: usize = 6;

    pub fn from_index(index: usize) -> Self {
        Self(format!("{:0width$}", index, width = Self::WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pinhole camera matrix `K`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub matrix: DMat3,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self::from_rows([[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]])
    }

    /// Build from a row-major 3x3 matrix.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self {
            matrix: DMat3::from_cols_array_2d(&rows).transpose(),
        }
    }

    /// Row-major 3x3 matrix.
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        self.matrix.transpose().to_cols_array_2d()
    }

    pub fn fx(&self) -> f64 {
        self.matrix.x_axis.x
    }

    pub fn fy(&self) -> f64 {
        self.matrix.y_axis.y
    }

    pub fn cx(&self) -> f64 {
        self.matrix.z_axis.x
    }

    pub fn cy(&self) -> f64 {
        self.matrix.z_axis.y
    }
}

/// One RGB-D frame with its object mask.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub color: RgbImage,
    pub depth: DepthImage,
    /// Object mask, nonzero = foreground.
    pub mask: GrayImage,
    pub intrinsics: CameraIntrinsics,
    /// Optional occluder mask. Always `None` today; engines must accept it.
    pub occlusion_mask: Option<GrayImage>,
    /// Object pose in the model frame, identity when unknown.
    pub pose_in_model: DMat4,
}

impl Frame {
    /// Create a frame with unknown pose and no occlusion mask.
    pub fn new(
        id: FrameId,
        color: RgbImage,
        depth: DepthImage,
        mask: GrayImage,
        intrinsics: CameraIntrinsics,
    ) -> Self {
        Self {
            id,
            color,
            depth,
            mask,
            intrinsics,
            occlusion_mask: None,
            pose_in_model: DMat4::IDENTITY,
        }
    }
}
