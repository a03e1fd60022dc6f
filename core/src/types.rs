//! Shared primitive types used across the engine.

/// A company (tenant) identifier.
pub type CompanyId = String;

/// A job position identifier.
pub type PositionId = String;

/// A hazard (GES) identifier, stable across positions of one company.
pub type HazardId = String;

/// A risk template identifier.
pub type TemplateId = String;

/// Re-evaluation interval, in months.
pub type Months = u32;
