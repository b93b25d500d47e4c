//! Data ingestion module
//!
//! Provides the frame types, the sequence reader interface, and the sequencer
//! that feeds recorded RGB-D frames to the reconstruction engine.

pub mod frame;
pub mod sequence;
pub mod sequencer;

pub use frame::{CameraIntrinsics, DepthImage, Frame, FrameId};
pub use sequence::{SequenceError, SequenceReader};
pub use sequencer::{CancelToken, FrameSequencer};
