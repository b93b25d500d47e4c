//! hopipe capture - on-disk sequences and frame export
//!
//! This crate provides implementations of the `SequenceReader` and
//! `ReconstructionEngine` traits from hopipe-recon:
//!
//! - [`HoPipeReader`]: per-serial color, depth and mask folders plus calibration
//! - [`FrameExportEngine`]: writes submitted frames into the engine's debug
//!   tree and hands global refinement to an external command
//!
//! ## Example
//!
//! ```ignore
//! use hopipe_capture::{FrameExportFactory, HoPipeReader};
//! use hopipe_recon::{RunOptions, run_one_video};
//!
//! let reader = HoPipeReader::open("/data/seq01")?;
//! let factory = FrameExportFactory::new();
//! run_one_video(&reader, "cam0", &factory, RunOptions::new(tracking, recon))?;
//! ```

mod export;
mod folder;

pub use export::{FrameExportEngine, FrameExportFactory, KEYFRAMES_FILE, depth_to_millimetres};
pub use folder::{DEPTH_SCALE, HoPipeReader, ReaderError, depth_from_millimetres};

// Re-export the traits for convenience
pub use hopipe_recon::engine::{EngineFactory, ReconstructionEngine};
pub use hopipe_recon::ingest::SequenceReader;
