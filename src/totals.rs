//! Base totals aggregation
//!
//! Raw rows are first folded into one `WorkoutTotals` row per workout, then rows are
//! summed into `BaseTotals`. Upstream services that already store per-workout summaries
//! can hand those rows straight to `BaseTotals::from_rows`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::RawWorkout;
use crate::normalize::NormalizedSet;
use crate::rest_timing::{reconstruct_rest, RestTimingResult, MAX_REST_MS};

/// Upper bound (exclusive) for a plausible single-set duration
pub const MAX_SET_DURATION_MS: i64 = MAX_REST_MS;

/// ---------------------------------------------------------------------------
/// Types
/// ---------------------------------------------------------------------------

/// Totals for a single workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkoutTotals {
  #[serde(default)]
  pub sets: u32,
  #[serde(default)]
  pub reps: u32,
  #[serde(default)]
  pub duration_min: f64,
  #[serde(default)]
  pub tonnage_kg: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rest_min: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub active_min: Option<f64>,
}

/// Canonical aggregate over a collection of workouts.
///
/// `rest_min` and `active_min` are omitted when no workout had data for them;
/// a measured 0 is kept as `Some(0.0)`.
///
/// `sets`, `reps`, `duration_min` and `tonnage_kg` sum over every row, while `rest_min` and
/// `active_min` only sum over rows that carried timing. With partial coverage, ratios that mix
/// the two (`avg_rest_sec`, `set_efficiency_kg_per_min`) are skewed; compare `rest_workouts`
/// and `active_workouts` against `workouts` before relying on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BaseTotals {
  pub sets: u32,
  pub reps: u32,
  pub duration_min: f64,
  pub tonnage_kg: f64,
  pub density_kg_per_min: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rest_min: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active_min: Option<f64>,
  /// Rows summed
  #[serde(default)]
  pub workouts: u32,
  /// Rows that contributed to `rest_min`
  #[serde(default)]
  pub rest_workouts: u32,
  /// Rows that contributed to `active_min`
  #[serde(default)]
  pub active_workouts: u32,
}

/// Which sets an aggregation admits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOptions {
  /// Count uncompleted sets in `sets` (they never add reps or tonnage)
  pub count_uncompleted_sets: bool,
  pub exclude_warmups: bool,
  /// Skip sets logged with zero reps
  pub require_positive_reps: bool,
}

impl Default for AggregationOptions {
  fn default() -> Self {
    Self {
      count_uncompleted_sets: false,
      exclude_warmups: true,
      require_positive_reps: false,
    }
  }
}

impl AggregationOptions {
  fn admits(&self, set: &NormalizedSet) -> bool {
    !(self.exclude_warmups && set.is_warmup) && !(self.require_positive_reps && set.reps == 0)
  }
}

/// One workout's totals plus the detail they were built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutAggregate {
  pub workout_id: String,
  pub totals: WorkoutTotals,
  pub rest_timing: RestTimingResult,
  /// Admitted sets regardless of completion
  pub recorded_sets: u32,
  pub completed_sets: u32,
  pub duration_ms: i64,
}

/// ---------------------------------------------------------------------------
/// Aggregation
/// ---------------------------------------------------------------------------

impl BaseTotals {
  /// Sum per-workout rows into base totals
  pub fn from_rows(rows: &[WorkoutTotals]) -> Self {
    let mut sets: u32 = 0;
    let mut reps: u32 = 0;
    let mut duration_min = 0.0;
    let mut tonnage_kg = 0.0;
    let mut rest_min: Option<f64> = None;
    let mut active_min: Option<f64> = None;
    let mut rest_workouts: u32 = 0;
    let mut active_workouts: u32 = 0;

    for row in rows {
      sets = sets.saturating_add(row.sets);
      reps = reps.saturating_add(row.reps);
      duration_min += non_negative(row.duration_min);
      tonnage_kg += non_negative(row.tonnage_kg);

      if let Some(rest) = row.rest_min.filter(|r| r.is_finite() && *r >= 0.0) {
        rest_min = Some(rest_min.unwrap_or(0.0) + rest);
        rest_workouts += 1;
      }
      if let Some(active) = row.active_min.filter(|a| a.is_finite() && *a >= 0.0) {
        active_min = Some(active_min.unwrap_or(0.0) + active);
        active_workouts += 1;
      }
    }

    let duration_min = finite_or_zero(duration_min, "duration_min");
    let tonnage_kg = finite_or_zero(tonnage_kg, "tonnage_kg");
    let density_kg_per_min = if duration_min > 0.0 {
      finite_or_zero(tonnage_kg / duration_min, "density_kg_per_min")
    } else {
      0.0
    };

    Self {
      sets,
      reps,
      duration_min,
      tonnage_kg,
      density_kg_per_min,
      rest_min: rest_min.filter(|r| r.is_finite()),
      active_min: active_min.filter(|a| a.is_finite()),
      workouts: u32::try_from(rows.len()).unwrap_or(u32::MAX),
      rest_workouts,
      active_workouts,
    }
  }
}

/// Fold one workout's sets into a totals row.
///
/// `sets` must already be scoped to this workout.
pub fn aggregate_workout(
  workout: &RawWorkout,
  sets: &[&NormalizedSet],
  options: AggregationOptions,
) -> WorkoutAggregate {
  let admitted: Vec<NormalizedSet> = sets
    .iter()
    .filter(|s| options.admits(s))
    .map(|s| (*s).clone())
    .collect();

  let recorded_sets = admitted.len() as u32;
  let completed_sets = admitted.iter().filter(|s| s.completed).count() as u32;
  let reps = admitted
    .iter()
    .fold(0u32, |acc, s| acc.saturating_add(s.counted_reps()));
  let tonnage_kg: f64 = admitted.iter().map(|s| s.tonnage_kg()).sum();

  let duration_secs = workout.duration_secs();
  let duration_ms = (duration_secs * 1000.0).round() as i64;

  let rest_timing = reconstruct_rest(&admitted);
  let rest_min = rest_timing
    .has_rest_data()
    .then(|| rest_timing.total_rest_ms as f64 / 60_000.0);

  let totals = WorkoutTotals {
    sets: if options.count_uncompleted_sets {
      recorded_sets
    } else {
      completed_sets
    },
    reps,
    duration_min: duration_secs / 60.0,
    tonnage_kg: finite_or_zero(tonnage_kg, "tonnage_kg"),
    rest_min,
    active_min: active_minutes(&workout.id, &admitted),
  };

  WorkoutAggregate {
    workout_id: workout.id.clone(),
    totals,
    rest_timing,
    recorded_sets,
    completed_sets,
    duration_ms,
  }
}

/// Aggregate a workout collection. Sets whose workout is not in `workouts` are ignored.
pub fn aggregate_workouts<'a, I>(
  workouts: I,
  sets: &[NormalizedSet],
  options: AggregationOptions,
) -> (BaseTotals, Vec<WorkoutAggregate>)
where
  I: IntoIterator<Item = &'a RawWorkout>,
{
  let mut by_workout: HashMap<&str, Vec<&NormalizedSet>> = HashMap::new();
  for set in sets {
    by_workout.entry(set.workout_id.as_str()).or_default().push(set);
  }

  let aggregates: Vec<WorkoutAggregate> = workouts
    .into_iter()
    .map(|workout| {
      let workout_sets = by_workout
        .get(workout.id.as_str())
        .map(Vec::as_slice)
        .unwrap_or(&[]);
      aggregate_workout(workout, workout_sets, options)
    })
    .collect();

  let rows: Vec<WorkoutTotals> = aggregates.iter().map(|a| a.totals.clone()).collect();
  (BaseTotals::from_rows(&rows), aggregates)
}

/// Sum of completed-set durations from their own timestamps.
/// Durations outside `(0, 30 min)` are discarded.
fn active_minutes(workout_id: &str, sets: &[NormalizedSet]) -> Option<f64> {
  let mut total_ms: i64 = 0;
  let mut counted = 0;

  for set in sets.iter().filter(|s| s.completed) {
    let Some(duration_ms) = set.active_duration_ms() else {
      continue;
    };
    if duration_ms > 0 && duration_ms < MAX_SET_DURATION_MS {
      total_ms += duration_ms;
      counted += 1;
    } else {
      log::debug!(
        "Discarding set duration of {} ms (set {} of workout {})",
        duration_ms,
        set.set_number,
        workout_id
      );
    }
  }

  (counted > 0).then(|| total_ms as f64 / 60_000.0)
}

fn non_negative(value: f64) -> f64 {
  if value.is_finite() && value > 0.0 {
    value
  } else {
    0.0
  }
}

fn finite_or_zero(value: f64, field: &str) -> f64 {
  if value.is_finite() {
    value
  } else {
    log::warn!("Non-finite {} ({}) replaced with 0", field, value);
    0.0
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
