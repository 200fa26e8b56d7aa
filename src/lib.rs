//! Training metrics derivation.
//!
//! Turns raw, partially timestamped exercise-set rows into canonical training metrics:
//! tonnage, density, rest timing, derived KPIs with source tiers, windowed averages and a
//! composite efficiency score. The crate does no I/O; rows are passed in already fetched.

pub mod config;
pub mod efficiency;
pub mod engine;
pub mod kpi;
pub mod models;
pub mod normalize;
pub mod periods;
pub mod rest_timing;
pub mod totals;

#[cfg(test)]
mod test_utils;

pub use config::{ConfigError, EfficiencyBaselines, EngineConfig};
pub use efficiency::{score_efficiency, EfficiencyInputs, EfficiencyRating, EfficiencyScore};
pub use engine::{
  EngineError, MetricsInput, SummaryReport, TrainingMetricsEngine, TrainingMetricsReport,
  WorkoutReport,
};
pub use kpi::{resolve_derived, DerivedReport, DerivedTotals, KpiKey, KpiRegistry, KpiSource, PrecomputedKpis};
pub use models::{RawSet, RawWorkout};
pub use normalize::{normalize_set, normalize_sets, NormalizedSet};
pub use periods::{compute_period_averages, PeriodAverages, PeriodAveragesReport, PeriodKey, PeriodWindow};
pub use rest_timing::{reconstruct_rest, RestPeriod, RestTimingResult, WorkoutTimingMetrics};
pub use totals::{aggregate_workouts, AggregationOptions, BaseTotals, WorkoutTotals};
