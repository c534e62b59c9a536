use thiserror::Error;

/// Main error type for the proxy supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    // Lifecycle errors
    #[error("Core is already running")]
    AlreadyRunning,

    #[error("Core is not running")]
    NotRunning,

    #[error("Failed to spawn core: {0}")]
    SpawnError(String),

    #[error("Signal error: {0}")]
    SignalError(String),

    #[error("Core exited with error: {0}")]
    ProcessExitedWithError(String),

    // Core configuration errors
    #[error("Failed to generate core configuration: {0}")]
    ConfigSerializationFailed(String),

    #[error("Failed to write core configuration file: {0}")]
    ConfigWriteFailed(String),

    // Supervisor configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Log-related errors
    #[error("Log file unavailable: {0}")]
    LogFileUnavailable(String),

    // Traffic collection and reporting
    #[error("Failed to query core traffic: {0}")]
    TrafficQueryError(String),

    #[error("Failed to accumulate traffic: {0}")]
    AccumulatorError(String),

    #[error("External API unreachable: {0}")]
    ExternalApiUnreachable(String),

    #[error("External API returned non-success status code: {0}")]
    ExternalApiNonSuccess(u16),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
