//! Engine configuration
//!
//! Feature flags and tunables are passed into the engine explicitly; nothing in the
//! computation reads the environment. `EngineConfig::from_env` is a convenience for
//! hosts that configure the engine through `TRAINING_METRICS_*` variables.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

pub const DEFAULT_BODYWEIGHT_KG: f64 = 70.0;
pub const DEFAULT_BASELINE_DENSITY_KG_PER_MIN: f64 = 50.0;
pub const DEFAULT_BASELINE_LOAD_PER_REP_KG: f64 = 100.0;
pub const DEFAULT_WORK_REST_RATIO_TARGET: f64 = 2.0;

/// FixedOffset only accepts offsets strictly inside one day
const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60 - 1;

const ENV_DERIVED_KPIS: &str = "TRAINING_METRICS_DERIVED_KPIS";
const ENV_DIAGNOSTICS: &str = "TRAINING_METRICS_DIAGNOSTICS";
const ENV_BODYWEIGHT_KG: &str = "TRAINING_METRICS_BODYWEIGHT_KG";
const ENV_MAX_ROWS: &str = "TRAINING_METRICS_MAX_ROWS";
const ENV_UTC_OFFSET_MINUTES: &str = "TRAINING_METRICS_UTC_OFFSET_MINUTES";
const ENV_MEMOIZE: &str = "TRAINING_METRICS_MEMOIZE";

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid configuration value for {key}: {value}")]
  Invalid { key: String, value: String },
}

impl Serialize for ConfigError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Config Structures
/// ---------------------------------------------------------------------------

/// Reference points the composite efficiency score is normalized against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyBaselines {
  /// Density that earns the full volume-efficiency sub-score
  pub density_kg_per_min: f64,
  /// Average load per rep treated as full intensity
  pub load_per_rep_kg: f64,
  /// Work:rest ratio that earns the full ratio half of time optimization
  pub work_rest_ratio_target: f64,
}

impl Default for EfficiencyBaselines {
  fn default() -> Self {
    Self {
      density_kg_per_min: DEFAULT_BASELINE_DENSITY_KG_PER_MIN,
      load_per_rep_kg: DEFAULT_BASELINE_LOAD_PER_REP_KG,
      work_rest_ratio_target: DEFAULT_WORK_REST_RATIO_TARGET,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Compute DerivedTotals at all
  pub derived_kpis_enabled: bool,
  /// Emit the tier label that satisfied each derived KPI
  pub diagnostics_enabled: bool,
  /// Substituted for zero-weight bodyweight sets
  pub bodyweight_kg: f64,
  /// Reject inputs with more workout + set rows than this
  pub max_rows: Option<usize>,
  /// Offset used to align calendar windows (week, month)
  pub utc_offset_minutes: i32,
  /// Keep the most recent input/output pair for repeated identical calls
  pub memoize: bool,
  pub efficiency: EfficiencyBaselines,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      derived_kpis_enabled: true,
      diagnostics_enabled: false,
      bodyweight_kg: DEFAULT_BODYWEIGHT_KG,
      max_rows: None,
      utc_offset_minutes: 0,
      memoize: false,
      efficiency: EfficiencyBaselines::default(),
    }
  }
}

impl EngineConfig {
  /// Load configuration from the environment (and a `.env` file if present).
  /// Unset variables keep their defaults; set-but-unparseable variables are an error.
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();

    let defaults = Self::default();
    let config = Self {
      derived_kpis_enabled: env_flag(ENV_DERIVED_KPIS)?.unwrap_or(defaults.derived_kpis_enabled),
      diagnostics_enabled: env_flag(ENV_DIAGNOSTICS)?.unwrap_or(defaults.diagnostics_enabled),
      bodyweight_kg: env_parse(ENV_BODYWEIGHT_KG)?.unwrap_or(defaults.bodyweight_kg),
      max_rows: env_parse(ENV_MAX_ROWS)?.or(defaults.max_rows),
      utc_offset_minutes: env_parse(ENV_UTC_OFFSET_MINUTES)?.unwrap_or(defaults.utc_offset_minutes),
      memoize: env_flag(ENV_MEMOIZE)?.unwrap_or(defaults.memoize),
      efficiency: defaults.efficiency,
    };

    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.bodyweight_kg.is_finite() || self.bodyweight_kg <= 0.0 {
      return Err(invalid("bodyweight_kg", self.bodyweight_kg));
    }
    if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
      return Err(invalid("utc_offset_minutes", self.utc_offset_minutes));
    }

    let baselines = [
      ("efficiency.density_kg_per_min", self.efficiency.density_kg_per_min),
      ("efficiency.load_per_rep_kg", self.efficiency.load_per_rep_kg),
      ("efficiency.work_rest_ratio_target", self.efficiency.work_rest_ratio_target),
    ];
    for (key, value) in baselines {
      if !value.is_finite() || value <= 0.0 {
        return Err(invalid(key, value));
      }
    }

    Ok(())
  }

  /// Offset for calendar-aligned windows; UTC if the configured value is out of range
  pub fn utc_offset(&self) -> FixedOffset {
    FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
  }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
  ConfigError::Invalid {
    key: key.to_string(),
    value: value.to_string(),
  }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
  match env::var(key) {
    Ok(raw) => raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|_| invalid(key, raw)),
    Err(_) => Ok(None),
  }
}

fn env_flag(key: &str) -> Result<Option<bool>, ConfigError> {
  match env::var(key) {
    Ok(raw) => match raw.trim().to_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Ok(Some(true)),
      "0" | "false" | "no" | "off" => Ok(Some(false)),
      _ => Err(invalid(key, raw)),
    },
    Err(_) => Ok(None),
  }
}
