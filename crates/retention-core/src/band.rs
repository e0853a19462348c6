use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::RetentionSettings;

// ---------------------------------------------------------------------------
// RiskBand
// ---------------------------------------------------------------------------

/// A named band from the organization's configuration, or `unknown` when no
/// configured range covers the score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskBand(String);

impl RiskBand {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return the first configured band whose inclusive range contains `score`.
///
/// No ordering is assumed. A score no range covers resolves to `unknown`,
/// which is a configuration gap and not an error.
pub fn resolve_risk_band(score: u32, settings: &RetentionSettings) -> RiskBand {
    settings
        .risk_bands
        .iter()
        .find(|band| band.contains(score))
        .map(|band| RiskBand::named(band.name.clone()))
        .unwrap_or_else(RiskBand::unknown)
}

// ---------------------------------------------------------------------------
// UiBand
// ---------------------------------------------------------------------------

/// Coarse three-level band used by roster views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UiBand {
    Low,
    Med,
    High,
}

impl UiBand {
    pub fn as_str(self) -> &'static str {
        match self {
            UiBand::Low => "Low",
            UiBand::Med => "Med",
            UiBand::High => "High",
        }
    }
}

impl From<&RiskBand> for UiBand {
    fn from(band: &RiskBand) -> Self {
        match band.as_str() {
            "high" | "critical" => UiBand::High,
            "medium" => UiBand::Med,
            _ => UiBand::Low,
        }
    }
}

impl fmt::Display for UiBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
