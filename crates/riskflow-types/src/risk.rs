//! Risk vocabulary shared by the risk gate and its consumers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered risk level. `LOW < MEDIUM < HIGH < EXTREME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }

    /// Position in the total order, starting at 1 for `LOW`.
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::Extreme => 4,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory action echoed by a blocking risk gate. No engine-side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradeAction {
    Hold,
    Reduce,
    ReviewOnly,
}

impl DegradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradeAction::Hold => "HOLD",
            DegradeAction::Reduce => "REDUCE",
            DegradeAction::ReviewOnly => "REVIEW_ONLY",
        }
    }
}

impl fmt::Display for DegradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DegradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "HOLD" => Ok(DegradeAction::Hold),
            "REDUCE" => Ok(DegradeAction::Reduce),
            "REVIEW_ONLY" => Ok(DegradeAction::ReviewOnly),
            _ => Err(format!("invalid degrade action: '{s}'")),
        }
    }
}
