//! Risk level parsing and resolution from an envelope.

use riskflow_types::envelope::Envelope;
use riskflow_types::risk::RiskLevel;
use serde_json::Value;

use crate::value::{as_finite_number, resolve_path_in};

/// Envelope fields consulted for a numeric score, in priority order.
pub const SCORE_FIELDS: [&str; 3] = ["hitScore", "confidence", "score"];

/// Parse any accepted risk level representation.
///
/// Accepts, case-insensitively: `LOW`/`MEDIUM`/`HIGH`/`EXTREME`, `L`/`M`/`H`/`E`,
/// `低`/`中`/`高`/`极高`, finite numbers and numeric strings (rounded:
/// `<=1` LOW, `<=2` MEDIUM, `<=3` HIGH, otherwise EXTREME). Anything else is
/// `None`.
pub fn parse_risk_level(value: &Value) -> Option<RiskLevel> {
    match value {
        Value::Number(_) => as_finite_number(value).map(level_from_rank),
        Value::String(s) => parse_label(s).or_else(|| as_finite_number(value).map(level_from_rank)),
        _ => None,
    }
}

fn parse_label(raw: &str) -> Option<RiskLevel> {
    match raw.trim().to_uppercase().as_str() {
        "LOW" | "L" | "低" => Some(RiskLevel::Low),
        "MEDIUM" | "M" | "中" => Some(RiskLevel::Medium),
        "HIGH" | "H" | "高" => Some(RiskLevel::High),
        "EXTREME" | "E" | "极高" => Some(RiskLevel::Extreme),
        _ => None,
    }
}

/// Map a numeric rank (1..=4) to a level after rounding half up.
fn level_from_rank(n: f64) -> RiskLevel {
    // half-up rounding, so 1.5 -> 2 and -0.5 -> 0
    let rounded = (n + 0.5).floor();
    if rounded <= 1.0 {
        RiskLevel::Low
    } else if rounded <= 2.0 {
        RiskLevel::Medium
    } else if rounded <= 3.0 {
        RiskLevel::High
    } else {
        RiskLevel::Extreme
    }
}

/// Map a 0-100 confidence-style score to a risk level. Higher score, lower risk.
pub fn level_from_score(score: f64) -> RiskLevel {
    if score >= 80.0 {
        RiskLevel::Low
    } else if score >= 60.0 {
        RiskLevel::Medium
    } else if score >= 40.0 {
        RiskLevel::High
    } else {
        RiskLevel::Extreme
    }
}

/// Where a resolved risk level came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskLevelSource {
    /// `input.riskLevel`.
    Explicit,
    /// `input.risk.level`.
    Nested,
    /// Derived from one of [`SCORE_FIELDS`].
    Score { field: &'static str, score: f64 },
    /// Nothing usable; MEDIUM.
    Default,
}

impl RiskLevelSource {
    pub fn label(&self) -> String {
        match self {
            RiskLevelSource::Explicit => "riskLevel".to_string(),
            RiskLevelSource::Nested => "risk.level".to_string(),
            RiskLevelSource::Score { field, .. } => format!("score:{field}"),
            RiskLevelSource::Default => "default".to_string(),
        }
    }
}

/// Resolve the envelope's risk level; first usable source wins.
pub fn resolve_risk_level(input: &Envelope) -> (RiskLevel, RiskLevelSource) {
    if let Some(level) = input.get("riskLevel").and_then(parse_risk_level) {
        return (level, RiskLevelSource::Explicit);
    }
    if let Some(level) = resolve_path_in(input.as_map(), "risk.level").and_then(parse_risk_level) {
        return (level, RiskLevelSource::Nested);
    }
    for field in SCORE_FIELDS {
        if let Some(score) = input.get(field).and_then(as_finite_number) {
            return (level_from_score(score), RiskLevelSource::Score { field, score });
        }
    }
    (RiskLevel::Medium, RiskLevelSource::Default)
}
