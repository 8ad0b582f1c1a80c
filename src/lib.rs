pub mod capture;
pub mod error;
pub mod pipeline;
pub mod sequence;
pub mod service;
pub mod utils;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::{Frame, PixelFormat};
pub use error::{Result, VigilError};
pub use pipeline::{BufferRegistry, FrameBuffer};
pub use sequence::{AssembledSequence, SequenceAssembler};
pub use service::{Classifier, Diagnosis, FrameService};

/// Environment variable prefix for configuration overrides, e.g. `VIGIL_BUFFER__CAPACITY`
pub const ENV_PREFIX: &str = "VIGIL";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub buffer: BufferConfig,
    pub sequence: SequenceConfig,
    pub service: ServiceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Max resident frames per device
    pub capacity: usize,
    /// Age at which a frame expires
    pub window_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Frames per assembled sequence
    pub length: usize,
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Frames a device must have buffered before a sequence is assembled
    pub min_frames: usize,
    /// Probability above which the classifier output counts as class 1 (alert)
    pub drowsy_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 48,
            window_ms: 2_000,
        }
    }
}

impl BufferConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            length: 48,
            width: 145,
            height: 145,
            channels: 3,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            min_frames: 1,
            drowsy_threshold: 0.5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "vigil=info".into(),
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `VIGIL_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(VigilError::InvalidConfig(msg.to_owned()));
        if self.buffer.capacity == 0 {
            return invalid("buffer.capacity must be positive");
        }
        if self.buffer.window_ms == 0 {
            return invalid("buffer.window_ms must be positive");
        }
        if self.sequence.length == 0 {
            return invalid("sequence.length must be positive");
        }
        if self.sequence.width == 0 || self.sequence.height == 0 {
            return invalid("sequence.width and sequence.height must be positive");
        }
        if !matches!(self.sequence.channels, 1 | 3 | 4) {
            return invalid("sequence.channels must be 1, 3 or 4");
        }
        if self.service.min_frames > self.buffer.capacity {
            return invalid("service.min_frames cannot exceed buffer.capacity");
        }
        if !(0.0..=1.0).contains(&self.service.drowsy_threshold) {
            return invalid("service.drowsy_threshold must be within [0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.buffer.window(), Duration::from_secs(2));
        assert_eq!((config.sequence.width, config.sequence.height), (145, 145));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[buffer]\ncapacity = 48\nwindow_ms = 500\n\n[service]\nmin_frames = 43").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.buffer.window_ms, 500);
        assert_eq!(config.service.min_frames, 43);
        assert_eq!(config.sequence.length, 48);
    }

    #[test]
    fn rejects_threshold_above_capacity() {
        let mut config = Config::default();
        config.service.min_frames = 49;
        assert!(matches!(config.validate(), Err(VigilError::InvalidConfig(_))));
    }
}
