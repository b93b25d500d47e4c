//! Sequence reader interface for recorded multi-camera RGB-D captures

use crate::ingest::frame::{CameraIntrinsics, DepthImage};
use image::{GrayImage, RgbImage};
use std::path::{Path, PathBuf};

/// Read access to a recorded sequence.
///
/// A sequence holds frames `0..num_frames(serial)` for each camera serial.
/// Intrinsics are fixed per serial for the whole sequence.
pub trait SequenceReader {
    /// Root folder of the sequence.
    fn root(&self) -> &Path;

    /// Folder holding one mask sub-folder per serial.
    fn mask_root(&self) -> PathBuf;

    /// Mask folder of one serial.
    fn mask_dir(&self, serial: &str) -> PathBuf {
        self.mask_root().join(serial)
    }

    /// Whether the serial has masks at all. Serials without them are skipped.
    fn has_masks(&self, serial: &str) -> bool {
        self.mask_dir(serial).is_dir()
    }

    /// Number of frames recorded for the serial.
    fn num_frames(&self, serial: &str) -> Result<usize, SequenceError>;

    fn intrinsics(&self, serial: &str) -> Result<CameraIntrinsics, SequenceError>;

    fn color(&self, serial: &str, index: usize) -> Result<RgbImage, SequenceError>;

    /// Depth in scene units.
    fn depth(&self, serial: &str, index: usize) -> Result<DepthImage, SequenceError>;

    /// Object mask, nonzero = foreground.
    fn mask(&self, serial: &str, index: usize) -> Result<GrayImage, SequenceError>;
}

/// Errors that can occur while reading or sequencing frames
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("mask folder {path} for serial {serial} does not exist")]
    MissingMask { serial: String, path: PathBuf },

    #[error("frame {index} of serial {serial} is missing: {path}")]
    MissingFrame {
        serial: String,
        index: usize,
        path: PathBuf,
    },

    #[error("no intrinsics for serial {0}")]
    UnknownSerial(String),

    #[error("frame {index}: {what} is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        index: usize,
        what: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("sequencing cancelled after {submitted} frames")]
    Cancelled { submitted: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Invalid sequence data: {0}")]
    InvalidData(String),
}
