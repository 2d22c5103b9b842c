use thiserror::Error;

/// Hard failures. Anything recoverable is reported as a
/// [`Condition`](crate::conditions::Condition) instead.
#[derive(Debug, Error)]
pub enum RiskEngineError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid {series} series: {reason}")]
    InvalidSeries { series: String, reason: String },

    #[error("Empty {0} series: no usable return observations")]
    EmptySeries(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RiskEngineError {
    fn from(e: serde_json::Error) -> Self {
        RiskEngineError::SerializationError(e.to_string())
    }
}
