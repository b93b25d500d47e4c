//! Interface to the external pose-tracking and surface-fitting engine.
//!
//! The pipeline never looks inside the engine. It builds one from the staged
//! config files, feeds it frames, asks it to flush, and later asks it to run
//! global refinement; everything else is exchanged through the output tree.

use crate::ingest::Frame;
use std::path::PathBuf;

/// Keyframes the engine collects before online surface fitting starts.
pub const START_KEYFRAMES: usize = 3;

/// Everything needed to construct an engine for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    pub tracking_config: PathBuf,
    pub reconstruction_config: PathBuf,
    pub start_keyframes: usize,
    pub use_gui: bool,
    /// Seed for any stochastic sampling inside the engine.
    pub seed: u64,
}

impl EngineParams {
    pub fn new(tracking_config: impl Into<PathBuf>, reconstruction_config: impl Into<PathBuf>) -> Self {
        Self {
            tracking_config: tracking_config.into(),
            reconstruction_config: reconstruction_config.into(),
            start_keyframes: START_KEYFRAMES,
            use_gui: false,
            seed: 0,
        }
    }

    pub fn with_gui(mut self, use_gui: bool) -> Self {
        self.use_gui = use_gui;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Errors reported by an engine. The pipeline treats all of them as fatal.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine failed: {0}")]
    Failed(String),

    #[error("engine operation unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A pose tracker plus implicit surface fitter.
pub trait ReconstructionEngine {
    /// Track one frame. Frames arrive in ascending id order and the next frame
    /// is only submitted after this returns.
    fn submit_frame(&mut self, frame: Frame) -> Result<(), EngineError>;

    /// Flush all pending optimization state to the output directory.
    fn finalize(&mut self) -> Result<(), EngineError>;

    /// Re-fit the surface over all collected keyframes.
    fn run_global_refinement(
        &mut self,
        extract_texture: bool,
        texture_resolution: u32,
    ) -> Result<(), EngineError>;
}

/// Builds a fresh engine for each phase.
pub trait EngineFactory {
    type Engine: ReconstructionEngine;

    fn create(&self, params: &EngineParams) -> Result<Self::Engine, EngineError>;
}
