//! Error types for voxrelay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Engine errors
    #[error("Engine not available: {engine}")]
    EngineUnavailable { engine: String },

    #[error("Engine load failed: {message}")]
    EngineLoad { message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    // Audio errors
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    // Protocol errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // Channel errors — peer disconnects are teardown, not failures
    #[error("Message channel closed")]
    ChannelClosed,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// True when the error only invalidates the attempted operation and the
    /// session should keep running.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::Inference { .. }
                | RelayError::Protocol { .. }
                | RelayError::AudioDecode { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_engine_unavailable_display() {
        let error = RelayError::EngineUnavailable {
            engine: "recognizer".to_string(),
        };
        assert_eq!(error.to_string(), "Engine not available: recognizer");
    }

    #[test]
    fn test_inference_display() {
        let error = RelayError::Inference {
            message: "out of memory".to_string(),
        };
        assert_eq!(error.to_string(), "Inference failed: out of memory");
    }

    #[test]
    fn test_protocol_display() {
        let error = RelayError::Protocol {
            message: "missing type field".to_string(),
        };
        assert_eq!(error.to_string(), "Protocol error: missing type field");
    }

    #[test]
    fn test_audio_decode_display() {
        let error = RelayError::AudioDecode {
            message: "odd byte count".to_string(),
        };
        assert_eq!(error.to_string(), "Audio decode failed: odd byte count");
    }

    #[test]
    fn test_channel_closed_display() {
        assert_eq!(RelayError::ChannelClosed.to_string(), "Message channel closed");
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            RelayError::Inference {
                message: "x".to_string()
            }
            .is_transient()
        );
        assert!(
            RelayError::Protocol {
                message: "x".to_string()
            }
            .is_transient()
        );
        assert!(
            !RelayError::EngineUnavailable {
                engine: "translator".to_string()
            }
            .is_transient()
        );
        assert!(!RelayError::ChannelClosed.is_transient());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: RelayError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: RelayError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RelayError>();
        assert_sync::<RelayError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
