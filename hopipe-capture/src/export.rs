//! A file-exporting stand-in for the neural tracking engine.
//!
//! Online tracking is reduced to writing each frame into the engine's debug
//! tree; global refinement is delegated to an external command.

use glam::DMat4;
use hopipe_recon::config::TrackingConfig;
use hopipe_recon::engine::{EngineError, EngineFactory, EngineParams, ReconstructionEngine};
use hopipe_recon::ingest::{CameraIntrinsics, DepthImage, Frame};
use image::{ImageBuffer, Luma};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Keyframe list written by [`FrameExportEngine::finalize`].
pub const KEYFRAMES_FILE: &str = "keyframes.yml";

#[derive(Debug, Serialize)]
struct KeyframeLog<'a> {
    frames: &'a [String],
}

/// Writes every submitted frame under the tracking config's `debug_dir`.
pub struct FrameExportEngine {
    params: EngineParams,
    debug_dir: PathBuf,
    command: Option<Vec<String>>,
    submitted: Vec<String>,
    wrote_intrinsics: bool,
}

impl FrameExportEngine {
    pub fn new(params: EngineParams, debug_dir: impl Into<PathBuf>) -> Self {
        Self {
            params,
            debug_dir: debug_dir.into(),
            command: None,
            submitted: Vec::new(),
            wrote_intrinsics: false,
        }
    }

    /// Program plus leading arguments used for global refinement. The staged
    /// tracking and reconstruction config paths are appended.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command).filter(|c| !c.is_empty());
        self
    }

    pub fn debug_dir(&self) -> &Path {
        &self.debug_dir
    }

    /// Ids submitted so far, in order.
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }

    fn subdir(&self, name: &str) -> Result<PathBuf, EngineError> {
        let dir = self.debug_dir.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn write_intrinsics(&mut self, intrinsics: &CameraIntrinsics) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.debug_dir)?;
        std::fs::write(self.debug_dir.join("cam_K.txt"), format_rows(&intrinsics.to_rows()))?;
        self.wrote_intrinsics = true;
        Ok(())
    }
}

impl ReconstructionEngine for FrameExportEngine {
    fn submit_frame(&mut self, frame: Frame) -> Result<(), EngineError> {
        if !self.wrote_intrinsics {
            self.write_intrinsics(&frame.intrinsics)?;
        }
        let name = format!("{}.png", frame.id);

        frame
            .color
            .save(self.subdir("rgb")?.join(&name))
            .map_err(boxed)?;
        depth_to_millimetres(&frame.depth)
            .save(self.subdir("depth")?.join(&name))
            .map_err(boxed)?;
        frame
            .mask
            .save(self.subdir("masks")?.join(&name))
            .map_err(boxed)?;
        std::fs::write(
            self.subdir("ob_in_cam")?.join(format!("{}.txt", frame.id)),
            format_pose(&frame.pose_in_model),
        )?;

        debug!("Exported frame {}", frame.id);
        self.submitted.push(frame.id.to_string());
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), EngineError> {
        if self.submitted.is_empty() {
            return Ok(());
        }
        let text = serde_yaml::to_string(&KeyframeLog {
            frames: &self.submitted,
        })
        .map_err(boxed)?;
        std::fs::write(self.debug_dir.join(KEYFRAMES_FILE), text)?;
        info!("Exported {} frames to {}", self.submitted.len(), self.debug_dir.display());
        Ok(())
    }

    fn run_global_refinement(
        &mut self,
        extract_texture: bool,
        texture_resolution: u32,
    ) -> Result<(), EngineError> {
        let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) else {
            return Err(EngineError::Unavailable(
                "global refinement needs an external engine command".to_string(),
            ));
        };

        info!("Running {} for global refinement", program);
        let status = Command::new(program)
            .args(args)
            .arg(&self.params.tracking_config)
            .arg(&self.params.reconstruction_config)
            .env("HOPIPE_EXTRACT_TEXTURE", if extract_texture { "1" } else { "0" })
            .env("HOPIPE_TEXTURE_RESOLUTION", texture_resolution.to_string())
            .env("HOPIPE_START_KEYFRAMES", self.params.start_keyframes.to_string())
            .env("HOPIPE_USE_GUI", if self.params.use_gui { "1" } else { "0" })
            .env("HOPIPE_SEED", self.params.seed.to_string())
            .status()?;

        if !status.success() {
            return Err(EngineError::Failed(format!("{program} exited with {status}")));
        }
        Ok(())
    }
}

/// Builds a [`FrameExportEngine`] per phase.
#[derive(Debug, Clone, Default)]
pub struct FrameExportFactory {
    command: Vec<String>,
}

impl FrameExportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

impl EngineFactory for FrameExportFactory {
    type Engine = FrameExportEngine;

    fn create(&self, params: &EngineParams) -> Result<FrameExportEngine, EngineError> {
        let tracking = TrackingConfig::load(&params.tracking_config).map_err(boxed)?;
        Ok(FrameExportEngine::new(params.clone(), tracking.debug_dir()).with_command(self.command.clone()))
    }
}

fn boxed<E: std::error::Error + Send + Sync + 'static>(err: E) -> EngineError {
    EngineError::Other(Box::new(err))
}

/// Metres to 16-bit millimetres, saturating.
pub fn depth_to_millimetres(depth: &DepthImage) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    ImageBuffer::from_fn(depth.width(), depth.height(), |x, y| {
        let mm = (depth.get_pixel(x, y)[0] * 1000.0).round();
        Luma([mm.clamp(0.0, u16::MAX as f32) as u16])
    })
}

fn format_rows<const N: usize>(rows: &[[f64; N]; N]) -> String {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
        let _ = writeln!(out, "{}", line.join(" "));
    }
    out
}

fn format_pose(pose: &DMat4) -> String {
    format_rows(&pose.transpose().to_cols_array_2d())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopipe_recon::ingest::FrameId;
    use image::{GrayImage, RgbImage};

    fn frame(index: usize) -> Frame {
        Frame::new(
            FrameId::from_index(index),
            RgbImage::new(4, 4),
            DepthImage::from_pixel(4, 4, Luma([0.5])),
            GrayImage::from_pixel(4, 4, Luma([255])),
            CameraIntrinsics::new(600.0, 601.0, 2.0, 2.0),
        )
    }

    fn engine(dir: &Path) -> FrameExportEngine {
        FrameExportEngine::new(EngineParams::new(dir.join("t.yml"), dir.join("n.yml")), dir)
    }

    #[test]
    fn test_submit_writes_frame_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine(tmp.path());
        engine.submit_frame(frame(0)).unwrap();
        engine.submit_frame(frame(1)).unwrap();

        for file in ["rgb/000001.png", "depth/000000.png", "masks/000001.png", "ob_in_cam/000000.txt", "cam_K.txt"] {
            assert!(tmp.path().join(file).is_file(), "{file} missing");
        }
        let depth = image::open(tmp.path().join("depth/000000.png")).unwrap().into_luma16();
        assert_eq!(depth.get_pixel(1, 1)[0], 500);

        let pose = std::fs::read_to_string(tmp.path().join("ob_in_cam/000000.txt")).unwrap();
        assert_eq!(pose.lines().next(), Some("1.000000 0.000000 0.000000 0.000000"));
        let k = std::fs::read_to_string(tmp.path().join("cam_K.txt")).unwrap();
        assert_eq!(k.lines().next(), Some("600.000000 0.000000 2.000000"));
    }

    #[test]
    fn test_finalize_lists_keyframes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine(tmp.path());
        for i in 0..3 {
            engine.submit_frame(frame(i)).unwrap();
        }
        engine.finalize().unwrap();

        let text = std::fs::read_to_string(tmp.path().join(KEYFRAMES_FILE)).unwrap();
        let log: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        let frames: Vec<&str> = log["frames"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(frames, vec!["000000", "000001", "000002"]);
    }

    #[test]
    fn test_finalize_without_frames_keeps_keyframes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(KEYFRAMES_FILE), "frames: [\"000000\"]\n").unwrap();
        engine(tmp.path()).finalize().unwrap();
        let text = std::fs::read_to_string(tmp.path().join(KEYFRAMES_FILE)).unwrap();
        assert!(text.contains("000000"));
    }

    #[test]
    fn test_global_refinement_without_command_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = engine(tmp.path()).run_global_refinement(false, 512).unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_global_refinement_runs_command_with_configs() {
        let tmp = tempfile::tempdir().unwrap();
        let script = "printf '%s %s %s' \"$1\" \"$2\" \"$HOPIPE_TEXTURE_RESOLUTION\" > \"$(dirname \"$1\")/ran.txt\"";
        let mut engine = engine(tmp.path()).with_command(vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "sh".to_string(),
        ]);
        engine.run_global_refinement(false, 512).unwrap();

        let ran = std::fs::read_to_string(tmp.path().join("ran.txt")).unwrap();
        assert_eq!(
            ran,
            format!("{} {} 512", tmp.path().join("t.yml").display(), tmp.path().join("n.yml").display())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_engine_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine(tmp.path()).with_command(vec!["false".to_string()]);
        assert!(matches!(
            engine.run_global_refinement(false, 512),
            Err(EngineError::Failed(_))
        ));
    }

    #[test]
    fn test_depth_to_millimetres_saturates() {
        let depth = DepthImage::from_fn(3, 1, |x, _| Luma([[-1.0, 0.0123, 100.0][x as usize]]));
        let mm = depth_to_millimetres(&depth);
        assert_eq!(mm.get_pixel(0, 0)[0], 0);
        assert_eq!(mm.get_pixel(1, 0)[0], 12);
        assert_eq!(mm.get_pixel(2, 0)[0], u16::MAX);
    }
}
