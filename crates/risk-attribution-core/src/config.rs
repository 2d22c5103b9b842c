use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::attribution::{AllocationReference, AttributionParams, SectorClassification};
use crate::error::RiskEngineError;
use crate::metrics::MetricParams;
use crate::types::{Rate, Window, TRADING_DAYS_PER_YEAR};
use crate::RiskEngineResult;

/// Largest scale a `Decimal` can carry.
const MAX_OUTPUT_SCALE: u32 = 28;

/// Engine settings. Every field has a default, so a partial JSON document
/// only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Windows every windowed metric is evaluated over
    pub windows: Vec<Window>,
    /// Return periods per year
    pub annualization_factor: u32,
    /// Annual risk-free rate used by the Sharpe ratio
    pub risk_free_rate: Rate,
    pub weight_tolerance: Decimal,
    pub identity_tolerance: Decimal,
    pub stale_return_threshold: Rate,
    pub allocation_reference: AllocationReference,
    /// Decimal places kept on output values
    pub output_scale: u32,
    pub classification: SectorClassification,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                Window::Trailing(30),
                Window::Trailing(90),
                Window::Trailing(180),
                Window::Trailing(252),
                Window::Expanding,
            ],
            annualization_factor: TRADING_DAYS_PER_YEAR,
            risk_free_rate: Decimal::ZERO,
            weight_tolerance: dec!(0.0001),
            identity_tolerance: dec!(0.000000001),
            stale_return_threshold: dec!(0.0001),
            allocation_reference: AllocationReference::SectorReturn,
            output_scale: 10,
            classification: SectorClassification::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> RiskEngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RiskEngineResult<()> {
        if self.windows.is_empty() {
            return Err(RiskEngineError::Config("at least one window is required".into()));
        }
        if self.windows.contains(&Window::Trailing(0)) {
            return Err(RiskEngineError::Config("trailing window length must be positive".into()));
        }
        if self.annualization_factor == 0 {
            return Err(RiskEngineError::Config("annualization_factor must be positive".into()));
        }
        for (name, value) in [
            ("weight_tolerance", self.weight_tolerance),
            ("identity_tolerance", self.identity_tolerance),
            ("stale_return_threshold", self.stale_return_threshold),
        ] {
            if value < Decimal::ZERO {
                return Err(RiskEngineError::Config(format!("{} must not be negative", name)));
            }
        }
        if self.output_scale > MAX_OUTPUT_SCALE {
            return Err(RiskEngineError::Config(format!(
                "output_scale must be at most {}",
                MAX_OUTPUT_SCALE
            )));
        }
        Ok(())
    }

    pub fn metric_params(&self) -> RiskEngineResult<MetricParams> {
        MetricParams::new(Decimal::from(self.annualization_factor), self.risk_free_rate)
            .map_err(|e| RiskEngineError::Config(e.to_string()))
    }

    pub fn attribution_params(&self) -> AttributionParams {
        AttributionParams {
            allocation_reference: self.allocation_reference,
            weight_tolerance: self.weight_tolerance,
            identity_tolerance: self.identity_tolerance,
            stale_return_threshold: self.stale_return_threshold,
        }
    }
}
