//! Fixed-length sequence assembly
//!
//! Turns a sparse, index-sorted snapshot into exactly `length` normalized
//! frames: gaps are filled at native resolution first, then the run is
//! truncated or zero-padded, then every frame is resized and scaled.

pub mod interpolate;
pub mod normalize;

use image::imageops::FilterType;
use ndarray::{s, Array5};
use tracing::{debug, instrument};

use crate::capture::Frame;
use crate::error::{Result, VigilError};
use crate::pipeline::BufferedFrame;
use crate::SequenceConfig;

/// Model input of shape `(1, length, height, width, channels)`
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSequence {
    pub tensor: Array5<f32>,
    /// Frames taken from the buffer
    pub source_frames: usize,
    /// Frames blended in to fill index gaps
    pub synthesized_frames: usize,
    /// Trailing all-zero frames
    pub padding_frames: usize,
}

impl AssembledSequence {
    pub fn len(&self) -> usize {
        self.tensor.dim().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }
}

/// Stateless transform from buffer snapshots to model input.
#[derive(Debug, Clone)]
pub struct SequenceAssembler {
    length: usize,
    width: u32,
    height: u32,
    channels: usize,
    filter: FilterType,
}

impl SequenceAssembler {
    pub fn new(config: &SequenceConfig) -> Self {
        Self {
            length: config.length,
            width: config.width,
            height: config.height,
            channels: config.channels,
            // bilinear
            filter: FilterType::Triangle,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Assemble from a buffer snapshot (already sorted by sequence index).
    pub fn assemble_snapshot(&self, snapshot: &[BufferedFrame]) -> Result<AssembledSequence> {
        let frames: Vec<(i64, Frame)> = snapshot
            .iter()
            .map(|b| (b.sequence_index, b.frame.clone()))
            .collect();
        self.assemble(&frames)
    }

    /// Assemble from `(sequence_index, frame)` pairs sorted ascending by index.
    ///
    /// The minimum-frame policy belongs to the caller; an empty input is
    /// still reported as [`VigilError::InsufficientData`].
    #[instrument(level = "debug", skip_all, fields(frames = frames.len()))]
    pub fn assemble(&self, frames: &[(i64, Frame)]) -> Result<AssembledSequence> {
        if frames.is_empty() {
            return Err(VigilError::InsufficientData {
                device_id: String::new(),
                available: 0,
                required: 1,
            });
        }

        let (run, synthesized) = interpolate::fill_gaps(frames, self.length)?;
        let (height, width) = (self.height as usize, self.width as usize);
        let mut tensor = Array5::<f32>::zeros((1, self.length, height, width, self.channels));
        for (i, frame) in run.iter().enumerate() {
            normalize::write_normalized(frame, tensor.slice_mut(s![0, i, .., .., ..]), self.filter)?;
        }

        let padding_frames = self.length - run.len();
        let source_frames = run.len() - synthesized;
        metrics::counter!("vigil_sequences_assembled_total").increment(1);
        debug!(
            source_frames,
            synthesized_frames = synthesized,
            padding_frames,
            "assembled sequence"
        );
        Ok(AssembledSequence {
            tensor,
            source_frames,
            synthesized_frames: synthesized,
            padding_frames,
        })
    }
}
