//! Cross-module test suites.
//!
//! - `integration.rs`: end-to-end battle scenarios through [`Battle`](crate::battle::Battle)
//! - `properties.rs`: property tests for mitigation, claims and status exclusivity
//! - `determinism.rs`: identical call sequences produce identical event logs
//! - `helpers.rs`: setup utilities and factory functions

mod determinism;
mod helpers;

pub use helpers::*;
