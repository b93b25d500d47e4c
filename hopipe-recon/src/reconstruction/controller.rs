//! Lifecycle of one video: online tracking, global refinement, mesh
//! post-processing.

use crate::config::overrides::{online_reconstruction_overrides, tracking_overrides};
use crate::config::{ConfigStager, GlobalRefinementInputs};
use crate::engine::{EngineFactory, EngineParams, ReconstructionEngine};
use crate::error::PipelineError;
use crate::ingest::{CancelToken, FrameSequencer, SequenceReader};
use crate::reconstruction::postprocess::{MeshArtifacts, MeshPostprocessor};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Texture resolution requested from global refinement (texture extraction
/// itself is disabled).
pub const TEXTURE_RESOLUTION: u32 = 512;

/// Pipeline phases, visited strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Idle,
    OnlineRunning,
    OnlineFinalized,
    GlobalRunning,
    GlobalFinalized,
    PostProcessing,
    Done,
}

impl PhaseState {
    /// The only state reachable from this one.
    pub fn next(self) -> Option<PhaseState> {
        use PhaseState::*;
        match self {
            Idle => Some(OnlineRunning),
            OnlineRunning => Some(OnlineFinalized),
            OnlineFinalized => Some(GlobalRunning),
            GlobalRunning => Some(GlobalFinalized),
            GlobalFinalized => Some(PostProcessing),
            PostProcessing => Some(Done),
            Done => None,
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where the output tree of one serial lives inside a sequence.
pub fn output_dir_for(sequence_root: &Path, serial: &str) -> PathBuf {
    sequence_root
        .join("data_processing")
        .join("bundlesdf")
        .join("one_video")
        .join(serial)
}

/// Remove `folder` with everything in it, then create it empty.
pub fn make_clean_folder(folder: &Path) -> std::io::Result<()> {
    if folder.exists() {
        std::fs::remove_dir_all(folder)?;
    }
    std::fs::create_dir_all(folder)
}

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tracking_template: PathBuf,
    pub reconstruction_template: PathBuf,
    pub use_gui: bool,
    /// Engine log verbosity, written to the tracking config.
    pub debug_level: i64,
    pub seed: u64,
    pub cancel: Option<CancelToken>,
    pub postprocessor: MeshPostprocessor,
}

impl RunOptions {
    pub fn new(tracking_template: impl Into<PathBuf>, reconstruction_template: impl Into<PathBuf>) -> Self {
        Self {
            tracking_template: tracking_template.into(),
            reconstruction_template: reconstruction_template.into(),
            use_gui: false,
            debug_level: 2,
            seed: 0,
            cancel: None,
            postprocessor: MeshPostprocessor::default(),
        }
    }

    pub fn with_gui(mut self, use_gui: bool) -> Self {
        self.use_gui = use_gui;
        self
    }

    pub fn with_debug_level(mut self, level: i64) -> Self {
        self.debug_level = level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_postprocessor(mut self, postprocessor: MeshPostprocessor) -> Self {
        self.postprocessor = postprocessor;
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The serial has no mask folder; nothing was written.
    Skipped { mask_dir: PathBuf },
    Completed {
        out_dir: PathBuf,
        frames: usize,
        artifacts: MeshArtifacts,
    },
}

/// Drives one serial through every phase.
pub struct PhaseController<'a, R: SequenceReader + ?Sized, F: EngineFactory> {
    reader: &'a R,
    factory: &'a F,
    serial: String,
    out_dir: PathBuf,
    options: RunOptions,
    state: PhaseState,
}

impl<'a, R: SequenceReader + ?Sized, F: EngineFactory> PhaseController<'a, R, F> {
    pub fn new(reader: &'a R, factory: &'a F, serial: impl Into<String>, options: RunOptions) -> Self {
        let serial = serial.into();
        let out_dir = output_dir_for(reader.root(), &serial);
        Self {
            reader,
            factory,
            serial,
            out_dir,
            options,
            state: PhaseState::Idle,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn advance(&mut self, to: PhaseState) -> Result<(), PipelineError> {
        if self.state.next() != Some(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        info!("{} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    fn engine_params(&self, tracking: &Path, reconstruction: &Path) -> EngineParams {
        EngineParams::new(tracking, reconstruction)
            .with_gui(self.options.use_gui)
            .with_seed(self.options.seed)
    }

    /// Stage configs and track every frame, then flush the engine.
    pub fn run_online(&mut self) -> Result<usize, PipelineError> {
        self.advance(PhaseState::OnlineRunning)?;
        make_clean_folder(&self.out_dir)?;

        let stager = ConfigStager::new(&self.out_dir);
        let tracking = stager.stage_tracking_config(
            &self.options.tracking_template,
            &tracking_overrides(&self.out_dir, self.options.debug_level),
        )?;
        let reconstruction = stager.stage_reconstruction_config(
            &self.options.reconstruction_template,
            &online_reconstruction_overrides(&self.out_dir),
            tracking.depth_far(),
        )?;

        let params = self.engine_params(tracking.path(), reconstruction.path());
        let mut engine = self.factory.create(&params)?;

        let mut sequencer = FrameSequencer::new(self.reader, self.serial.as_str(), tracking.erode_mask());
        if let Some(token) = &self.options.cancel {
            sequencer = sequencer.with_cancel_token(token.clone());
        }
        let frames = sequencer.run(&mut engine)?;

        engine.finalize()?;
        self.advance(PhaseState::OnlineFinalized)?;
        Ok(frames)
    }

    /// Re-read the staged configs and refine over all keyframes.
    pub fn run_global(&mut self) -> Result<(), PipelineError> {
        self.advance(PhaseState::GlobalRunning)?;
        run_global_refinement(&self.out_dir, self.factory, &self.options)?;
        self.advance(PhaseState::GlobalFinalized)
    }

    pub fn run_postprocess(&mut self) -> Result<MeshArtifacts, PipelineError> {
        self.advance(PhaseState::PostProcessing)?;
        let artifacts = self.options.postprocessor.run(&self.out_dir)?;
        self.advance(PhaseState::Done)?;
        Ok(artifacts)
    }

    /// Run every phase in order.
    pub fn run(&mut self) -> Result<RunOutcome, PipelineError> {
        let frames = self.run_online()?;
        self.run_global()?;
        let artifacts = self.run_postprocess()?;
        Ok(RunOutcome::Completed {
            out_dir: self.out_dir.clone(),
            frames,
            artifacts,
        })
    }
}

/// Global refinement as a self-contained step over an existing output tree.
///
/// Only the files staged by the online phase are read; nothing is carried
/// over in memory.
#[tracing::instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn run_global_refinement<F: EngineFactory>(
    out_dir: &Path,
    factory: &F,
    options: &RunOptions,
) -> Result<(), PipelineError> {
    let (tracking, reconstruction) = GlobalRefinementInputs::from_output_dir(out_dir).stage()?;
    // The refinement engine always runs headless.
    let params = EngineParams::new(tracking.path(), reconstruction.path())
        .with_gui(false)
        .with_seed(options.seed);

    let mut engine = factory.create(&params)?;
    engine.run_global_refinement(false, TEXTURE_RESOLUTION)?;
    engine.finalize()?;
    info!("Global refinement done");
    Ok(())
}

/// Reconstruct one serial of a sequence end to end.
///
/// Returns [`RunOutcome::Skipped`] without touching the filesystem when the
/// serial has no mask folder.
#[tracing::instrument(skip_all, fields(serial = %serial))]
pub fn run_one_video<R: SequenceReader + ?Sized, F: EngineFactory>(
    reader: &R,
    serial: &str,
    factory: &F,
    options: RunOptions,
) -> Result<RunOutcome, PipelineError> {
    let mask_dir = reader.mask_dir(serial);
    info!("Mask folder: {}", mask_dir.display());
    if !reader.has_masks(serial) {
        warn!("Mask folder {} does not exist, skip...", mask_dir.display());
        return Ok(RunOutcome::Skipped { mask_dir });
    }

    PhaseController::new(reader, factory, serial, options).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_strictly_sequential() {
        let mut state = PhaseState::Idle;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            visited.push(next);
            state = next;
        }
        assert_eq!(
            visited,
            vec![
                PhaseState::Idle,
                PhaseState::OnlineRunning,
                PhaseState::OnlineFinalized,
                PhaseState::GlobalRunning,
                PhaseState::GlobalFinalized,
                PhaseState::PostProcessing,
                PhaseState::Done,
            ]
        );
    }

    #[test]
    fn test_output_dir_layout() {
        assert_eq!(
            output_dir_for(Path::new("/data/seq"), "cam1"),
            PathBuf::from("/data/seq/data_processing/bundlesdf/one_video/cam1")
        );
    }

    #[test]
    fn test_make_clean_folder_destroys_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("run");
        std::fs::create_dir_all(folder.join("old")).unwrap();
        std::fs::write(folder.join("stale.txt"), "x").unwrap();

        make_clean_folder(&folder).unwrap();
        assert!(folder.is_dir());
        assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 0);
    }
}
