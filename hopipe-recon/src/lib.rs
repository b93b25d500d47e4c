//! Hand-object reconstruction pipeline
//!
//! Drives an external pose-tracking and surface-fitting engine over one
//! camera of a recorded RGB-D sequence and post-processes the mesh it
//! extracts into a clean, real-scale object model.
//!
//! ## Modules
//!
//! - [`config`]: YAML templates, per-phase overrides and staging
//! - [`engine`]: the interface the external engine implements
//! - [`ingest`]: frames, sequence readers and the frame sequencer
//! - [`reconstruction`]: phase control and mesh post-processing

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod reconstruction;

pub use engine::{EngineError, EngineFactory, EngineParams, ReconstructionEngine};
pub use error::PipelineError;
pub use reconstruction::{PhaseState, RunOptions, RunOutcome, run_global_refinement, run_one_video};
