use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::ingest::SequenceError;
use crate::reconstruction::{PhaseState, PostprocessError};
use thiserror::Error;

/// Anything that can stop a run. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("postprocess error: {0}")]
    Postprocess(#[from] PostprocessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: PhaseState, to: PhaseState },
}
