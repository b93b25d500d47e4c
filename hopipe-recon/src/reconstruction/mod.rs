//! Phase control and mesh post-processing
//!
//! This module sequences the online and global reconstruction phases and
//! turns the engine's extracted surface into the final object mesh.

pub mod controller;
pub mod postprocess;

pub use controller::{
    PhaseController, PhaseState, RunOptions, RunOutcome, make_clean_folder, output_dir_for,
    run_global_refinement, run_one_video,
};
pub use postprocess::{MeshArtifacts, MeshPostprocessor, PostprocessError, find_latest_mesh, postprocess_mesh};
