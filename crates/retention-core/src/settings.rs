//! Per-organization retention settings.
//!
//! Resolution merges stored overrides over the compiled-in defaults. Overrides
//! live in the database as `key -> JSON value` per organization; nested maps
//! merge key by key, everything else (scalars and arrays) replaces the default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Result, RetentionError};

/// Upper bound for every day-count window.
pub const MAX_WINDOW_DAYS: u32 = 3650;
/// Upper bound for the processing SLA (30 days).
pub const MAX_SLA_SECONDS: u64 = 30 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// RiskBandRange
// ---------------------------------------------------------------------------

/// An inclusive `[min, max]` score range mapped to a band name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBandRange {
    pub name: String,
    pub min: u32,
    pub max: u32,
}

impl RiskBandRange {
    pub fn new(name: impl Into<String>, min: u32, max: u32) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn contains(&self, score: u32) -> bool {
        self.min <= score && score <= self.max
    }
}

// ---------------------------------------------------------------------------
// Threshold groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedBookingsThreshold {
    pub count: u32,
    pub window_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRisk {
    pub overdue_days: u32,
}

// ---------------------------------------------------------------------------
// RetentionSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
    pub risk_bands: Vec<RiskBandRange>,
    pub streak_break_days: u32,
    pub missed_bookings_threshold: MissedBookingsThreshold,
    pub billing_risk: BillingRisk,
    pub processing_sla_seconds: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            risk_bands: vec![
                RiskBandRange::new("low", 0, 30),
                RiskBandRange::new("medium", 31, 60),
                RiskBandRange::new("high", 61, 85),
                RiskBandRange::new("critical", 86, 100),
            ],
            streak_break_days: 7,
            missed_bookings_threshold: MissedBookingsThreshold {
                count: 2,
                window_days: 14,
            },
            billing_risk: BillingRisk { overdue_days: 7 },
            processing_sla_seconds: 300,
        }
    }
}

impl RetentionSettings {
    /// Range checks for values that feed date arithmetic and band lookup.
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("streak_break_days", self.streak_break_days),
            ("missed_bookings_threshold.window_days", self.missed_bookings_threshold.window_days),
            ("billing_risk.overdue_days", self.billing_risk.overdue_days),
        ];
        for (field, days) in windows {
            if days > MAX_WINDOW_DAYS {
                return Err(RetentionError::invalid(
                    field,
                    format!("must be at most {MAX_WINDOW_DAYS} days, got {days}"),
                ));
            }
        }
        if self.processing_sla_seconds > MAX_SLA_SECONDS {
            return Err(RetentionError::invalid(
                "processing_sla_seconds",
                format!("must be at most {MAX_SLA_SECONDS}, got {}", self.processing_sla_seconds),
            ));
        }
        if let Some(band) = self.risk_bands.iter().find(|b| b.min > b.max) {
            return Err(RetentionError::invalid(
                "risk_bands",
                format!("band '{}' has min {} above max {}", band.name, band.min, band.max),
            ));
        }
        Ok(())
    }
}

/// Top-level keys an organization may override.
pub const SETTING_KEYS: &[&str] = &[
    "risk_bands",
    "streak_break_days",
    "missed_bookings_threshold",
    "billing_risk",
    "processing_sla_seconds",
];

pub fn is_known_key(key: &str) -> bool {
    SETTING_KEYS.contains(&key)
}

/// Check one override before it is stored: the key must be known, and the
/// value merged over `defaults` must parse and pass [`RetentionSettings::validate`].
pub fn check_override(defaults: &RetentionSettings, key: &str, value: &Value) -> Result<()> {
    if !is_known_key(key) {
        return Err(RetentionError::invalid(
            "setting",
            format!("unknown key '{key}' (expected one of: {})", SETTING_KEYS.join(", ")),
        ));
    }
    let mut candidate = serde_json::to_value(defaults)?;
    let mut patch = Map::new();
    patch.insert(key.to_string(), value.clone());
    deep_merge(&mut candidate, &Value::Object(patch));
    let merged: RetentionSettings = serde_json::from_value(candidate)
        .map_err(|e| RetentionError::invalid(key, e.to_string()))?;
    merged.validate()
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Resolve settings from `defaults` and an organization's stored overrides.
///
/// Overrides apply one key at a time. A key whose merged result no longer
/// parses as [`RetentionSettings`] is skipped with a warning, so resolution
/// always produces a usable settings object.
pub fn resolve(
    defaults: &RetentionSettings,
    overrides: &BTreeMap<String, Value>,
) -> RetentionSettings {
    let mut merged = match serde_json::to_value(defaults) {
        Ok(v) => v,
        Err(_) => return defaults.clone(),
    };

    for (key, value) in overrides {
        let mut candidate = merged.clone();
        let mut patch = Map::new();
        patch.insert(key.clone(), value.clone());
        deep_merge(&mut candidate, &Value::Object(patch));

        let parsed = serde_json::from_value::<RetentionSettings>(candidate.clone())
            .map_err(RetentionError::from)
            .and_then(|settings| settings.validate());
        match parsed {
            Ok(()) => merged = candidate,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ignoring malformed settings override");
            }
        }
    }

    serde_json::from_value(merged).unwrap_or_else(|_| defaults.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
