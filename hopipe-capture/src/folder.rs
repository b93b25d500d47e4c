//! Recorded hand-object sequences laid out as per-serial image folders.
//!
//! ```text
//! <seq>/color/<serial>/<id>.png|jpg
//! <seq>/depth/<serial>/<id>.png        16-bit millimetres
//! <seq>/mask/<serial>/<id>.png
//! <seq>/calibration/intrinsics.yml     { <serial>: 3x3 K }
//! ```

use hopipe_recon::ingest::{CameraIntrinsics, DepthImage, SequenceError, SequenceReader};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Depth PNGs store millimetres.
pub const DEPTH_SCALE: f32 = 1000.0;

const COLOR_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("sequence folder {0} does not exist")]
    MissingSequence(PathBuf),

    #[error("failed to parse calibration {path}: {source}")]
    Calibration {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("depth image {path} is {color:?}, expected 16-bit grayscale")]
    DepthFormat {
        path: PathBuf,
        color: image::ColorType,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReaderError> for SequenceError {
    fn from(err: ReaderError) -> Self {
        match err {
            ReaderError::Io(e) => SequenceError::Io(e),
            other => SequenceError::InvalidData(other.to_string()),
        }
    }
}

/// Reads a sequence folder. Frame `i` of a serial is the `i`-th color image
/// in file-name order; depth and mask share its stem.
#[derive(Debug, Clone)]
pub struct HoPipeReader {
    root: PathBuf,
    intrinsics: HashMap<String, CameraIntrinsics>,
    frames: HashMap<String, Vec<PathBuf>>,
}

impl HoPipeReader {
    #[tracing::instrument(skip_all, fields(path = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ReaderError::MissingSequence(root));
        }

        let intrinsics = load_intrinsics(&root.join("calibration").join("intrinsics.yml"))?;

        let mut frames = HashMap::new();
        let color_root = root.join("color");
        if color_root.is_dir() {
            for entry in std::fs::read_dir(&color_root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let serial = entry.file_name().to_string_lossy().into_owned();
                let images = list_color_images(&entry.path())?;
                debug!("Serial {}: {} frames", serial, images.len());
                frames.insert(serial, images);
            }
        }

        info!(
            "Opened sequence with {} serials, {} calibrated",
            frames.len(),
            intrinsics.len()
        );
        Ok(Self {
            root,
            intrinsics,
            frames,
        })
    }

    /// Serials that have a color folder, sorted.
    pub fn serials(&self) -> Vec<&str> {
        let mut serials: Vec<&str> = self.frames.keys().map(String::as_str).collect();
        serials.sort_unstable();
        serials
    }

    fn color_path(&self, serial: &str, index: usize) -> Result<&Path, SequenceError> {
        let images = self
            .frames
            .get(serial)
            .ok_or_else(|| SequenceError::UnknownSerial(serial.to_string()))?;
        images
            .get(index)
            .map(PathBuf::as_path)
            .ok_or_else(|| SequenceError::MissingFrame {
                serial: serial.to_string(),
                index,
                path: self.root.join("color").join(serial),
            })
    }

    /// `<seq>/<kind>/<serial>/<stem of color frame>.png`
    fn sibling_path(&self, kind: &str, serial: &str, index: usize) -> Result<PathBuf, SequenceError> {
        let color = self.color_path(serial, index)?;
        let stem = color.file_stem().unwrap_or_default();
        let path = self
            .root
            .join(kind)
            .join(serial)
            .join(stem)
            .with_extension("png");
        if !path.is_file() {
            return Err(SequenceError::MissingFrame {
                serial: serial.to_string(),
                index,
                path,
            });
        }
        Ok(path)
    }
}

impl SequenceReader for HoPipeReader {
    fn root(&self) -> &Path {
        &self.root
    }

    fn mask_root(&self) -> PathBuf {
        self.root.join("mask")
    }

    fn num_frames(&self, serial: &str) -> Result<usize, SequenceError> {
        self.frames
            .get(serial)
            .map(Vec::len)
            .ok_or_else(|| SequenceError::UnknownSerial(serial.to_string()))
    }

    fn intrinsics(&self, serial: &str) -> Result<CameraIntrinsics, SequenceError> {
        self.intrinsics
            .get(serial)
            .copied()
            .ok_or_else(|| SequenceError::UnknownSerial(serial.to_string()))
    }

    fn color(&self, serial: &str, index: usize) -> Result<RgbImage, SequenceError> {
        let path = self.color_path(serial, index)?;
        Ok(image::open(path)?.into_rgb8())
    }

    fn depth(&self, serial: &str, index: usize) -> Result<DepthImage, SequenceError> {
        let path = self.sibling_path("depth", serial, index)?;
        let millimetres = match image::open(&path)? {
            DynamicImage::ImageLuma16(buf) => buf,
            other => {
                return Err(ReaderError::DepthFormat {
                    path,
                    color: other.color(),
                }
                .into());
            }
        };
        Ok(depth_from_millimetres(&millimetres))
    }

    fn mask(&self, serial: &str, index: usize) -> Result<GrayImage, SequenceError> {
        let path = self.sibling_path("mask", serial, index)?;
        Ok(image::open(path)?.into_luma8())
    }
}

/// Convert a 16-bit millimetre depth map to metres.
pub fn depth_from_millimetres(buf: &ImageBuffer<Luma<u16>, Vec<u16>>) -> DepthImage {
    DepthImage::from_fn(buf.width(), buf.height(), |x, y| {
        Luma([buf.get_pixel(x, y)[0] as f32 / DEPTH_SCALE])
    })
}

fn list_color_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_color = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| COLOR_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_color {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn load_intrinsics(path: &Path) -> Result<HashMap<String, CameraIntrinsics>, ReaderError> {
    if !path.is_file() {
        debug!("No calibration at {}", path.display());
        return Ok(HashMap::new());
    }
    let text = std::fs::read_to_string(path)?;
    let rows: HashMap<String, [[f64; 3]; 3]> =
        serde_yaml::from_str(&text).map_err(|source| ReaderError::Calibration {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(rows
        .into_iter()
        .map(|(serial, k)| (serial, CameraIntrinsics::from_rows(k)))
        .collect())
}
