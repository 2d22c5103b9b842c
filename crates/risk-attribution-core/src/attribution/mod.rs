//! Brinson sector attribution per scope (TOTAL, EQUITY, FIXED_INCOME).

pub mod brinson;
pub mod scope;

pub use brinson::{
    compute_attribution, AllocationReference, AttributionOutcome, AttributionParams, ScopeInput,
    ScopeSummary, SectorEffects, SectorRow,
};
pub use scope::{derive_scopes, merge_legs, period_return, AssetClass, SectorClassification, SectorLeg};
