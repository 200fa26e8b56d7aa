//! Engine façade
//!
//! `TrainingMetricsEngine` wires the components together:
//! raw rows -> normalized sets -> (rest reconstruction, totals) -> derived KPIs,
//! period averages and per-workout efficiency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::config::{ConfigError, EngineConfig};
use crate::efficiency::{score_efficiency, EfficiencyInputs, EfficiencyScore};
use crate::kpi::{resolve_derived, DerivedReport, KpiRegistry, PrecomputedKpis};
use crate::models::{RawSet, RawWorkout};
use crate::normalize::normalize_sets;
use crate::periods::{compute_period_averages, PeriodAveragesReport};
use crate::rest_timing::{RestTimingResult, WorkoutTimingMetrics};
use crate::totals::{aggregate_workouts, AggregationOptions, BaseTotals, WorkoutTotals};

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

/// Caller contract violations. Bad data inside rows never surfaces here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
  #[error("Input has {rows} rows, limit is {limit}")]
  RowLimitExceeded { rows: usize, limit: usize },
  #[error("Workout id {0} appears more than once")]
  DuplicateWorkoutId(String),
  #[error(transparent)]
  Config(#[from] ConfigError),
}

impl Serialize for EngineError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Input / Output
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsInput {
  pub workouts: Vec<RawWorkout>,
  pub sets: Vec<RawSet>,
  pub precomputed: PrecomputedKpis,
}

impl MetricsInput {
  pub fn row_count(&self) -> usize {
    self.workouts.len() + self.sets.len()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutReport {
  pub workout_id: String,
  pub totals: WorkoutTotals,
  pub rest_timing: RestTimingResult,
  pub timing: WorkoutTimingMetrics,
  pub efficiency: EfficiencyScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetricsReport {
  pub reference: DateTime<Utc>,
  pub base_totals: BaseTotals,
  /// Absent when derived KPIs are switched off
  #[serde(skip_serializing_if = "Option::is_none")]
  pub derived: Option<DerivedReport>,
  pub periods: PeriodAveragesReport,
  pub workouts: Vec<WorkoutReport>,
}

/// Totals computed from already-summarized rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
  pub base_totals: BaseTotals,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub derived: Option<DerivedReport>,
}

/// ---------------------------------------------------------------------------
/// Engine
/// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TrainingMetricsEngine {
  config: EngineConfig,
  registry: KpiRegistry,
  last_result: Mutex<Option<(u64, TrainingMetricsReport)>>,
}

impl TrainingMetricsEngine {
  pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
    Self::with_registry(config, KpiRegistry::standard())
  }

  /// Use a custom KPI registry instead of the standard one
  pub fn with_registry(config: EngineConfig, registry: KpiRegistry) -> Result<Self, EngineError> {
    config.validate()?;
    Ok(Self {
      config,
      registry,
      last_result: Mutex::new(None),
    })
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn registry(&self) -> &KpiRegistry {
    &self.registry
  }

  /// Compute every metric for `input` as of `reference`
  pub fn compute(
    &self,
    input: &MetricsInput,
    reference: DateTime<Utc>,
  ) -> Result<TrainingMetricsReport, EngineError> {
    self.check_contract(input)?;

    let memo_key = if self.config.memoize {
      self.memo_key(input, reference)
    } else {
      None
    };
    if let Some(key) = memo_key {
      if let Some(report) = self.cached(key) {
        log::trace!("Memo hit for {} rows", input.row_count());
        return Ok(report);
      }
    }

    let report = self.build_report(input, reference);

    if let Some(key) = memo_key {
      if let Ok(mut slot) = self.last_result.lock() {
        *slot = Some((key, report.clone()));
      }
    }

    Ok(report)
  }

  /// Base and derived totals from per-workout summary rows
  pub fn summarize_rows(&self, rows: &[WorkoutTotals], precomputed: &PrecomputedKpis) -> SummaryReport {
    let base_totals = BaseTotals::from_rows(rows);
    let derived = self.derive(&base_totals, precomputed);
    SummaryReport { base_totals, derived }
  }

  fn check_contract(&self, input: &MetricsInput) -> Result<(), EngineError> {
    if let Some(limit) = self.config.max_rows {
      let rows = input.row_count();
      if rows > limit {
        return Err(EngineError::RowLimitExceeded { rows, limit });
      }
    }

    let mut seen = HashSet::with_capacity(input.workouts.len());
    for workout in &input.workouts {
      if !seen.insert(workout.id.as_str()) {
        return Err(EngineError::DuplicateWorkoutId(workout.id.clone()));
      }
    }

    Ok(())
  }

  fn build_report(&self, input: &MetricsInput, reference: DateTime<Utc>) -> TrainingMetricsReport {
    let sets = normalize_sets(&input.sets, self.config.bodyweight_kg);
    log::debug!(
      "Computing metrics for {} workouts, {} sets",
      input.workouts.len(),
      sets.len()
    );

    let (base_totals, aggregates) =
      aggregate_workouts(&input.workouts, &sets, AggregationOptions::default());
    let derived = self.derive(&base_totals, &input.precomputed);
    let periods = compute_period_averages(&input.workouts, &sets, reference, self.config.utc_offset());

    let workouts = aggregates
      .into_iter()
      .map(|aggregate| {
        let timing = WorkoutTimingMetrics::compute(
          aggregate.duration_ms,
          aggregate.totals.tonnage_kg,
          &aggregate.rest_timing,
        );
        let efficiency = score_efficiency(
          &EfficiencyInputs::from_workout(&aggregate, &timing),
          &self.config.efficiency,
        );
        WorkoutReport {
          workout_id: aggregate.workout_id,
          totals: aggregate.totals,
          rest_timing: aggregate.rest_timing,
          timing,
          efficiency,
        }
      })
      .collect();

    TrainingMetricsReport {
      reference,
      base_totals,
      derived,
      periods,
      workouts,
    }
  }

  fn derive(&self, base: &BaseTotals, precomputed: &PrecomputedKpis) -> Option<DerivedReport> {
    self.config.derived_kpis_enabled.then(|| {
      resolve_derived(
        &self.registry,
        base,
        precomputed,
        self.config.diagnostics_enabled,
      )
    })
  }

  /// Content hash of everything the report depends on
  fn memo_key(&self, input: &MetricsInput, reference: DateTime<Utc>) -> Option<u64> {
    let encoded = serde_json::to_string(&(input, reference, &self.config)).ok()?;
    let mut hasher = DefaultHasher::new();
    encoded.hash(&mut hasher);
    Some(hasher.finish())
  }

  fn cached(&self, key: u64) -> Option<TrainingMetricsReport> {
    let slot = self.last_result.lock().ok()?;
    match slot.as_ref() {
      Some((cached_key, report)) if *cached_key == key => Some(report.clone()),
      _ => None,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
