//! Ordered submission of a serial's frames to the reconstruction engine.

use crate::engine::ReconstructionEngine;
use crate::error::PipelineError;
use crate::ingest::frame::{Frame, FrameId};
use crate::ingest::sequence::{SequenceError, SequenceReader};
use hopipe_data::erode_mask;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Thread-safe flag a caller can set to stop sequencing between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Feeds one serial's frames to an engine in ascending index order.
pub struct FrameSequencer<'a, R: SequenceReader + ?Sized> {
    reader: &'a R,
    serial: String,
    erode_radius: u32,
    cancel: Option<CancelToken>,
}

impl<'a, R: SequenceReader + ?Sized> FrameSequencer<'a, R> {
    pub fn new(reader: &'a R, serial: impl Into<String>, erode_radius: u32) -> Self {
        Self {
            reader,
            serial: serial.into(),
            erode_radius,
            cancel: None,
        }
    }

    /// Check `token` before every frame.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Read, erode and build frame `index`.
    pub fn load_frame(&self, index: usize) -> Result<Frame, SequenceError> {
        let color = self.reader.color(&self.serial, index)?;
        let depth = self.reader.depth(&self.serial, index)?;
        let raw_mask = self.reader.mask(&self.serial, index)?;
        let intrinsics = self.reader.intrinsics(&self.serial)?;

        let expected = color.dimensions();
        for (what, actual) in [("depth", depth.dimensions()), ("mask", raw_mask.dimensions())] {
            if actual != expected {
                return Err(SequenceError::SizeMismatch {
                    index,
                    what,
                    expected,
                    actual,
                });
            }
        }

        let mask = erode_mask(&raw_mask, self.erode_radius);
        Ok(Frame::new(
            FrameId::from_index(index),
            color,
            depth,
            mask,
            intrinsics,
        ))
    }

    /// Submit every frame, returning how many were submitted.
    ///
    /// Frame `i + 1` is not read until the engine has returned from frame `i`.
    #[tracing::instrument(skip_all, fields(serial = %self.serial))]
    pub fn run<E: ReconstructionEngine + ?Sized>(
        &self,
        engine: &mut E,
    ) -> Result<usize, PipelineError> {
        if !self.reader.has_masks(&self.serial) {
            return Err(SequenceError::MissingMask {
                serial: self.serial.clone(),
                path: self.reader.mask_dir(&self.serial),
            }
            .into());
        }

        let total = self.reader.num_frames(&self.serial)?;
        info!("Sequencing {} frames (erode_mask {})", total, self.erode_radius);

        for index in 0..total {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(SequenceError::Cancelled { submitted: index }.into());
            }
            let frame = self.load_frame(index)?;
            debug!("Submitting frame {}", frame.id);
            engine.submit_frame(frame)?;
        }

        Ok(total)
    }
}
