//! Risk vocabulary resolution: level parsing, envelope risk level, block threshold.
//!
//! - `level` -- multi-representation parser and envelope resolution
//! - `threshold` -- config / parameter-snapshot / default threshold search

pub mod level;
pub mod threshold;

pub use level::{level_from_score, parse_risk_level, resolve_risk_level, RiskLevelSource};
pub use threshold::{resolve_threshold, threshold_candidate_keys, ThresholdSource};
