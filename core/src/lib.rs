//! GTC-45 risk control determination and adaptive risk templates.

pub mod catalog;
pub mod config;
pub mod consolidation;
pub mod controls;
pub mod engine;
pub mod error;
pub mod event;
pub mod hazard;
pub mod hazard_resolver;
pub mod inconsistency;
pub mod learning;
pub mod position;
pub mod risk_level;
pub mod store;
pub mod suggestion;
pub mod template;
pub mod toggle_resolver;
pub mod types;
