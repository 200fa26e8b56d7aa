//! Derived KPI resolution
//!
//! Each derived KPI is defined by an ordered list of tiers. A tier is a
//! `(source, applies, compute)` triple; the first tier whose predicate holds produces the
//! value and its `source` is recorded. When no tier applies the KPI falls back to 0 or is
//! left absent, depending on the definition.
//!
//! Definitions live in a `KpiRegistry` built once by the host and passed in by reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::totals::BaseTotals;

/// ---------------------------------------------------------------------------
/// Keys and Sources
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiKey {
  AvgRepsPerSet,
  AvgTonnagePerSetKg,
  AvgTonnagePerRepKg,
  AvgDurationPerSetMin,
  AvgRestSec,
  SetEfficiencyKgPerMin,
}

impl KpiKey {
  pub fn as_str(&self) -> &'static str {
    match self {
      KpiKey::AvgRepsPerSet => "avg_reps_per_set",
      KpiKey::AvgTonnagePerSetKg => "avg_tonnage_per_set_kg",
      KpiKey::AvgTonnagePerRepKg => "avg_tonnage_per_rep_kg",
      KpiKey::AvgDurationPerSetMin => "avg_duration_per_set_min",
      KpiKey::AvgRestSec => "avg_rest_sec",
      KpiKey::SetEfficiencyKgPerMin => "set_efficiency_kg_per_min",
    }
  }
}

/// Which data source satisfied a KPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiSource {
  /// Precomputed by the upstream service
  V2,
  RestMinPerSet,
  ActiveMin,
  DensityFallback,
  /// No tier applied
  #[serde(rename = "none")]
  NoData,
}

impl KpiSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      KpiSource::V2 => "v2",
      KpiSource::RestMinPerSet => "rest_min_per_set",
      KpiSource::ActiveMin => "active_min",
      KpiSource::DensityFallback => "density_fallback",
      KpiSource::NoData => "none",
    }
  }
}

/// KPI values computed upstream, used as the highest-precedence tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PrecomputedKpis {
  pub avg_rest_sec: Option<f64>,
  pub set_efficiency_kg_per_min: Option<f64>,
}

/// Everything a tier may look at
#[derive(Debug, Clone, Copy)]
pub struct KpiInputs<'a> {
  pub base: &'a BaseTotals,
  pub precomputed: &'a PrecomputedKpis,
}

/// ---------------------------------------------------------------------------
/// Registry
/// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
pub struct Tier {
  /// Diagnostic label; `None` for an untagged safe division
  pub source: Option<KpiSource>,
  pub applies: fn(&KpiInputs<'_>) -> bool,
  pub compute: fn(&KpiInputs<'_>) -> f64,
}

impl std::fmt::Debug for Tier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Tier").field("source", &self.source).finish()
  }
}

/// What a KPI resolves to when no tier applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhausted {
  Zero,
  Absent,
}

#[derive(Debug, Clone)]
pub struct KpiDefinition {
  pub key: KpiKey,
  pub tiers: Vec<Tier>,
  pub exhausted: Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
  pub value: Option<f64>,
  /// `None` when an untagged tier fired
  pub source: Option<KpiSource>,
}

impl KpiDefinition {
  /// Whether this KPI reports a tier label in diagnostics
  pub fn is_tagged(&self) -> bool {
    self.tiers.iter().any(|t| t.source.is_some())
  }

  /// Walk the tiers in order; first match wins
  pub fn resolve(&self, inputs: &KpiInputs<'_>) -> Resolution {
    for tier in &self.tiers {
      if !(tier.applies)(inputs) {
        continue;
      }
      let raw = (tier.compute)(inputs);
      if raw.is_finite() {
        return Resolution {
          value: Some(round2(raw)),
          source: tier.source,
        };
      }
      log::warn!(
        "Tier {} of {} produced a non-finite value, trying next tier",
        tier.source.map_or("untagged", |s| s.as_str()),
        self.key.as_str()
      );
    }

    Resolution {
      value: match self.exhausted {
        Exhausted::Zero => Some(0.0),
        Exhausted::Absent => None,
      },
      source: Some(KpiSource::NoData),
    }
  }
}

#[derive(Debug, Clone)]
pub struct KpiRegistry {
  definitions: Vec<KpiDefinition>,
}

impl KpiRegistry {
  pub fn new(definitions: Vec<KpiDefinition>) -> Self {
    Self { definitions }
  }

  /// The standard definitions for every `DerivedTotals` field
  pub fn standard() -> Self {
    Self::new(vec![
      KpiDefinition {
        key: KpiKey::AvgRepsPerSet,
        tiers: vec![Tier {
          source: None,
          applies: |i| is_positive(i.base.sets as f64),
          compute: |i| i.base.reps as f64 / i.base.sets as f64,
        }],
        exhausted: Exhausted::Zero,
      },
      KpiDefinition {
        key: KpiKey::AvgTonnagePerSetKg,
        tiers: vec![Tier {
          source: None,
          applies: |i| is_positive(i.base.sets as f64),
          compute: |i| i.base.tonnage_kg / i.base.sets as f64,
        }],
        exhausted: Exhausted::Zero,
      },
      KpiDefinition {
        key: KpiKey::AvgTonnagePerRepKg,
        tiers: vec![Tier {
          source: None,
          applies: |i| is_positive(i.base.reps as f64),
          compute: |i| i.base.tonnage_kg / i.base.reps as f64,
        }],
        exhausted: Exhausted::Zero,
      },
      KpiDefinition {
        key: KpiKey::AvgDurationPerSetMin,
        tiers: vec![Tier {
          source: None,
          applies: |i| is_positive(i.base.sets as f64),
          compute: |i| i.base.duration_min / i.base.sets as f64,
        }],
        exhausted: Exhausted::Zero,
      },
      KpiDefinition {
        key: KpiKey::AvgRestSec,
        tiers: vec![
          Tier {
            source: Some(KpiSource::V2),
            applies: |i| i.precomputed.avg_rest_sec.is_some_and(is_positive),
            compute: |i| i.precomputed.avg_rest_sec.unwrap_or(0.0),
          },
          Tier {
            // rest_min == 0 is a measurement, not missing data
            source: Some(KpiSource::RestMinPerSet),
            applies: |i| i.base.rest_min.is_some() && i.base.sets > 0,
            compute: |i| i.base.rest_min.unwrap_or(0.0) * 60.0 / i.base.sets as f64,
          },
        ],
        exhausted: Exhausted::Absent,
      },
      KpiDefinition {
        key: KpiKey::SetEfficiencyKgPerMin,
        tiers: vec![
          Tier {
            source: Some(KpiSource::V2),
            applies: |i| i.precomputed.set_efficiency_kg_per_min.is_some_and(is_positive),
            compute: |i| i.precomputed.set_efficiency_kg_per_min.unwrap_or(0.0),
          },
          Tier {
            source: Some(KpiSource::ActiveMin),
            applies: |i| i.base.active_min.is_some_and(is_positive),
            compute: |i| i.base.tonnage_kg / i.base.active_min.unwrap_or(0.0),
          },
          Tier {
            source: Some(KpiSource::DensityFallback),
            applies: |i| is_positive(i.base.density_kg_per_min),
            compute: |i| i.base.density_kg_per_min,
          },
        ],
        exhausted: Exhausted::Zero,
      },
    ])
  }

  pub fn get(&self, key: KpiKey) -> Option<&KpiDefinition> {
    self.definitions.iter().find(|d| d.key == key)
  }

  pub fn definitions(&self) -> &[KpiDefinition] {
    &self.definitions
  }
}

impl Default for KpiRegistry {
  fn default() -> Self {
    Self::standard()
  }
}

fn is_positive(value: f64) -> bool {
  value.is_finite() && value > 0.0
}

pub(crate) fn round2(value: f64) -> f64 {
  (value * 100.0).round() / 100.0
}

/// ---------------------------------------------------------------------------
/// Derived Totals
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DerivedTotals {
  pub avg_reps_per_set: f64,
  pub avg_tonnage_per_set_kg: f64,
  pub avg_tonnage_per_rep_kg: f64,
  pub avg_duration_per_set_min: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub avg_rest_sec: Option<f64>,
  pub set_efficiency_kg_per_min: f64,
}

pub type KpiDiagnostics = BTreeMap<KpiKey, KpiSource>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedReport {
  pub totals: DerivedTotals,
  /// Present only when diagnostics are enabled
  #[serde(skip_serializing_if = "Option::is_none")]
  pub diagnostics: Option<KpiDiagnostics>,
}

/// Resolve every KPI the registry defines from base totals plus upstream values
pub fn resolve_derived(
  registry: &KpiRegistry,
  base: &BaseTotals,
  precomputed: &PrecomputedKpis,
  diagnostics_enabled: bool,
) -> DerivedReport {
  let inputs = KpiInputs { base, precomputed };
  let mut totals = DerivedTotals::default();
  let mut diagnostics = KpiDiagnostics::new();

  for definition in registry.definitions() {
    let resolution = definition.resolve(&inputs);
    let value = resolution.value.unwrap_or(0.0);

    match definition.key {
      KpiKey::AvgRepsPerSet => totals.avg_reps_per_set = value,
      KpiKey::AvgTonnagePerSetKg => totals.avg_tonnage_per_set_kg = value,
      KpiKey::AvgTonnagePerRepKg => totals.avg_tonnage_per_rep_kg = value,
      KpiKey::AvgDurationPerSetMin => totals.avg_duration_per_set_min = value,
      KpiKey::AvgRestSec => totals.avg_rest_sec = resolution.value,
      KpiKey::SetEfficiencyKgPerMin => totals.set_efficiency_kg_per_min = value,
    }

    if definition.is_tagged() {
      if let Some(source) = resolution.source {
        diagnostics.insert(definition.key, source);
      }
    }
  }

  DerivedReport {
    totals,
    diagnostics: diagnostics_enabled.then_some(diagnostics),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
