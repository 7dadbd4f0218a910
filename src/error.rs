use thiserror::Error;

/// Main error type for the log forwarder
#[derive(Debug, Error)]
pub enum ForwarderError {
    // Container runtime errors
    #[error("Failed to inspect container {0}: {1}")]
    InspectError(String, String),

    #[error("Failed to attach to container {0}: {1}")]
    AttachError(String, String),

    #[error("Failed to exec in container {0}: {1}")]
    ExecError(String, String),

    #[error("Container runtime error: {0}")]
    RuntimeError(String),

    // Sink errors
    #[error("Failed to connect to sink {0}: {1}")]
    SinkConnectError(String, String),

    #[error("Sink write failed: {0}")]
    SinkWriteError(String),

    // Stream framing errors
    #[error("Malformed stream frame: {0}")]
    FrameError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for ForwarderError {
    fn from(e: bollard::errors::Error) -> Self {
        ForwarderError::RuntimeError(e.to_string())
    }
}

/// Result type alias for forwarder operations
pub type Result<T> = std::result::Result<T, ForwarderError>;
