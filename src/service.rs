//! Ingest / retrieve entry points consumed by the transport layer

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, info_span};

use crate::capture::{decode_data_url, Frame};
use crate::error::{Result, VigilError};
use crate::pipeline::{BufferRegistry, Clock, SystemClock};
use crate::sequence::{AssembledSequence, SequenceAssembler};
use crate::Config;

/// Inference boundary: maps an assembled sequence to a class-1 probability.
pub trait Classifier: Send + Sync {
    fn predict(&self, sequence: &AssembledSequence) -> Result<f32>;
}

impl<F> Classifier for F
where
    F: Fn(&AssembledSequence) -> Result<f32> + Send + Sync,
{
    fn predict(&self, sequence: &AssembledSequence) -> Result<f32> {
        self(sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub device_id: String,
    pub probability: f32,
    /// Class 0 is the drowsy class
    pub is_drowsy: bool,
    pub detected_at: DateTime<Utc>,
}

/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct FrameService {
    registry: Arc<BufferRegistry>,
    assembler: SequenceAssembler,
    min_frames: usize,
    drowsy_threshold: f32,
}

impl FrameService {
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let registry = Arc::new(BufferRegistry::with_clock(&config.buffer, clock));
        Self::with_registry(registry, config)
    }

    pub fn with_registry(registry: Arc<BufferRegistry>, config: &Config) -> Self {
        Self {
            registry,
            assembler: SequenceAssembler::new(&config.sequence),
            min_frames: config.service.min_frames.max(1),
            drowsy_threshold: config.service.drowsy_threshold,
        }
    }

    pub fn registry(&self) -> &Arc<BufferRegistry> {
        &self.registry
    }

    /// Store a decoded frame for `device_id`, creating its buffer on first use.
    pub fn ingest(&self, device_id: &str, sequence_index: i64, frame: Frame) -> Result<()> {
        self.registry.get_or_create(device_id).put(sequence_index, frame)
    }

    /// Decode a base64 / data-URL payload and store it.
    ///
    /// Undecodable payloads are rejected before any buffer is created.
    pub fn ingest_encoded(&self, device_id: &str, sequence_index: i64, payload: &str) -> Result<()> {
        let frame = decode_data_url(payload).inspect_err(|e| {
            error!(device_id, sequence_index, code = e.code(), "rejected frame payload: {e}");
        })?;
        self.ingest(device_id, sequence_index, frame)
    }

    /// Assemble the current window of `device_id` into model input.
    pub fn retrieve(&self, device_id: &str) -> Result<AssembledSequence> {
        let span = info_span!("retrieve", device_id);
        let _enter = span.enter();

        let buffer = self.registry.get(device_id)?;
        let snapshot = buffer.snapshot();
        if snapshot.len() < self.min_frames {
            return Err(VigilError::InsufficientData {
                device_id: device_id.to_owned(),
                available: snapshot.len(),
                required: self.min_frames,
            });
        }
        self.assembler.assemble_snapshot(&snapshot).inspect_err(|e| {
            error!(code = e.code(), "sequence assembly failed: {e}");
        })
    }

    /// Retrieve, classify and threshold in one call.
    pub fn diagnose(&self, device_id: &str, classifier: &dyn Classifier) -> Result<Diagnosis> {
        let sequence = self.retrieve(device_id)?;

        let span = info_span!("diagnose", device_id);
        let _enter = span.enter();
        let probability = classifier.predict(&sequence).inspect_err(|e| {
            error!("classifier failed: {e}");
        })?;
        if !probability.is_finite() {
            error!(probability, "classifier returned a non-finite probability");
            return Err(VigilError::Inference(format!(
                "non-finite probability {probability}"
            )));
        }

        let class = u8::from(probability > self.drowsy_threshold);
        let diagnosis = Diagnosis {
            device_id: device_id.to_owned(),
            probability,
            is_drowsy: class == 0,
            detected_at: Utc::now(),
        };
        info!(probability, class, is_drowsy = diagnosis.is_drowsy, "diagnosis");
        Ok(diagnosis)
    }
}
