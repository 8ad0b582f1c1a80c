use thiserror::Error;

pub type Result<T, E = VigilError> = std::result::Result<T, E>;

/// Expected, recoverable failures of the frame pipeline.
///
/// None of these are fatal to the process; callers map them onto their own
/// transport (see [`VigilError::status_code`]).
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("frame buffer for device {device_id} is full ({capacity} frames)")]
    Full { device_id: String, capacity: usize },

    #[error("no frame buffer for device {device_id}")]
    NotFound { device_id: String },

    #[error("device {device_id} has {available} frames, {required} required")]
    InsufficientData {
        device_id: String,
        available: usize,
        required: usize,
    },

    #[error("malformed frame data: {0}")]
    MalformedInput(String),

    #[error("base64 decoding failed: {0}")]
    InvalidBase64(String),

    #[error("image decoding failed: {0}")]
    InvalidImage(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VigilError {
    /// HTTP-style status the web layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Full { .. } => 429,
            Self::NotFound { .. } | Self::InsufficientData { .. } => 404,
            Self::MalformedInput(_) | Self::InvalidBase64(_) | Self::InvalidImage(_) => 422,
            Self::Inference(_) | Self::Config(_) | Self::InvalidConfig(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Full { .. } => "queue_full",
            Self::NotFound { .. } => "queue_not_found",
            Self::InsufficientData { .. } => "no_frames",
            Self::MalformedInput(_) => "invalid_data",
            Self::InvalidBase64(_) => "invalid_base64",
            Self::InvalidImage(_) => "invalid_image",
            Self::Inference(_) => "prediction_error",
            Self::Config(_) | Self::InvalidConfig(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_maps_to_rate_limit() {
        let err = VigilError::Full {
            device_id: "pi-1".into(),
            capacity: 48,
        };
        assert_eq!(err.status_code(), 429);
        assert_eq!(err.code(), "queue_full");
    }

    #[test]
    fn missing_data_is_not_found() {
        let missing = VigilError::NotFound {
            device_id: "pi-1".into(),
        };
        let short = VigilError::InsufficientData {
            device_id: "pi-1".into(),
            available: 0,
            required: 1,
        };
        assert_eq!(missing.status_code(), 404);
        assert_eq!(short.status_code(), 404);
        assert_eq!(short.code(), "no_frames");
    }
}
