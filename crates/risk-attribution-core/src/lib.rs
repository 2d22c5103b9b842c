pub mod attribution;
pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod records;
pub mod sanitize;
pub mod series;
pub mod source;
pub mod stats;
pub mod store;
pub mod types;

pub use conditions::{Condition, DataQualityIssue, Leg};
pub use config::EngineConfig;
pub use engine::{BatchOutput, EngineInput, RiskEngine};
pub use error::RiskEngineError;
pub use records::{AttributionStatus, RiskMetricRecord, SectorAttributionRecord};
pub use types::*;

/// Standard result type for all risk-engine operations
pub type RiskEngineResult<T> = Result<T, RiskEngineError>;
