//! Rest-timing reconstruction
//!
//! Rebuilds the rest taken between consecutive sets of one workout. Two generations of
//! data coexist:
//!
//! - timestamped rows: rest = next.started_at - current.completed_at
//! - legacy rows: rest = the rest-timer value stored on the following set
//!
//! Timestamp-derived values always win for a pair. Values outside `[0, 30 min)` are
//! dropped (never clamped) so a forgotten timer does not drag the averages around.

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizedSet;

/// Upper bound (exclusive) for a plausible rest period
pub const MAX_REST_MS: i64 = 30 * 60 * 1000;

const HIGH_QUALITY_SHARE: f64 = 0.8;
const MEDIUM_QUALITY_SHARE: f64 = 0.5;

/// ---------------------------------------------------------------------------
/// Types
/// ---------------------------------------------------------------------------

/// Where a single rest value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestTimingSource {
  /// Derived from the completed/started timestamps of the pair
  Actual,
  /// Legacy rest field on a pair where timestamps were partially recorded
  Estimated,
  /// Legacy rest field on a pair with no timestamps at all (hand-entered era)
  Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
  High,
  Medium,
  Low,
}

impl DataQuality {
  /// Classify by the share of adjacent pairs that produced a timestamp-derived rest
  pub fn from_actual_share(actual: usize, pairs: usize) -> Self {
    if pairs == 0 {
      return DataQuality::Low;
    }
    let share = actual as f64 / pairs as f64;
    if share >= HIGH_QUALITY_SHARE {
      DataQuality::High
    } else if share >= MEDIUM_QUALITY_SHARE {
      DataQuality::Medium
    } else {
      DataQuality::Low
    }
  }
}

/// Workout-level summary of how rest values were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSourceSummary {
  /// Every adjacent pair was timestamp-derived
  Actual,
  /// Some pairs were timestamp-derived
  Mixed,
  /// No pair was timestamp-derived
  Estimated,
}

impl TimingSourceSummary {
  pub fn from_counts(actual: usize, pairs: usize) -> Self {
    if pairs > 0 && actual == pairs {
      TimingSourceSummary::Actual
    } else if actual > 0 {
      TimingSourceSummary::Mixed
    } else {
      TimingSourceSummary::Estimated
    }
  }
}

/// Rest between two consecutive sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestPeriod {
  /// Set number of the set that finished
  pub after_set: i64,
  /// Set number of the set that followed
  pub before_set: i64,
  pub rest_ms: i64,
  pub timing_source: RestTimingSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestTimingResult {
  pub periods: Vec<RestPeriod>,
  pub total_rest_ms: i64,
  pub average_rest_ms: f64,
  pub median_rest_ms: f64,
  /// Coefficient of variation of the accepted periods (0 with fewer than two)
  pub variability: f64,
  /// Adjacent completed-set pairs considered
  pub pair_count: usize,
  /// Pairs whose rest came from timestamps
  pub actual_count: usize,
  /// Pairs whose value was out of range and discarded
  pub dropped_count: usize,
  pub data_quality: DataQuality,
  pub timing_source: TimingSourceSummary,
}

impl RestTimingResult {
  pub fn empty() -> Self {
    Self {
      periods: Vec::new(),
      total_rest_ms: 0,
      average_rest_ms: 0.0,
      median_rest_ms: 0.0,
      variability: 0.0,
      pair_count: 0,
      actual_count: 0,
      dropped_count: 0,
      data_quality: DataQuality::Low,
      timing_source: TimingSourceSummary::Estimated,
    }
  }

  pub fn has_rest_data(&self) -> bool {
    !self.periods.is_empty()
  }

  pub fn rest_values_ms(&self) -> Vec<i64> {
    self.periods.iter().map(|p| p.rest_ms).collect()
  }
}

/// ---------------------------------------------------------------------------
/// Reconstruction
/// ---------------------------------------------------------------------------

/// Reconstruct rest periods for one workout's sets.
///
/// Only completed sets take part. Sets are ordered by `completed_at` when every set has
/// one, otherwise by `set_number`; input position breaks any remaining tie.
pub fn reconstruct_rest(sets: &[NormalizedSet]) -> RestTimingResult {
  let ordered = order_sets(sets.iter().filter(|s| s.completed).collect());

  let mut periods = Vec::new();
  let mut actual_count = 0;
  let mut dropped_count = 0;

  for pair in ordered.windows(2) {
    let (current, next) = (pair[0], pair[1]);

    match (current.completed_at, next.started_at) {
      (Some(done), Some(start)) => {
        let rest_ms = (start - done).num_milliseconds();
        if is_plausible_rest(rest_ms) {
          actual_count += 1;
          periods.push(RestPeriod {
            after_set: current.set_number,
            before_set: next.set_number,
            rest_ms,
            timing_source: RestTimingSource::Actual,
          });
        } else {
          dropped_count += 1;
          log::debug!(
            "Dropping timestamp rest of {} ms between sets {} and {} of workout {}",
            rest_ms,
            current.set_number,
            next.set_number,
            current.workout_id
          );
        }
      }
      _ => {
        let Some(secs) = next.rest_seconds else {
          continue;
        };
        let rest_ms = (secs * 1000.0).round() as i64;
        if !is_plausible_rest(rest_ms) {
          dropped_count += 1;
          log::debug!(
            "Dropping legacy rest of {} s before set {} of workout {}",
            secs,
            next.set_number,
            next.workout_id
          );
          continue;
        }
        let timing_source = if current.has_timestamps() || next.has_timestamps() {
          RestTimingSource::Estimated
        } else {
          RestTimingSource::Manual
        };
        periods.push(RestPeriod {
          after_set: current.set_number,
          before_set: next.set_number,
          rest_ms,
          timing_source,
        });
      }
    }
  }

  let pair_count = ordered.len().saturating_sub(1);
  summarize(periods, pair_count, actual_count, dropped_count)
}

fn is_plausible_rest(rest_ms: i64) -> bool {
  (0..MAX_REST_MS).contains(&rest_ms)
}

fn order_sets(mut sets: Vec<&NormalizedSet>) -> Vec<&NormalizedSet> {
  if sets.iter().all(|s| s.completed_at.is_some()) {
    sets.sort_by(|a, b| {
      a.completed_at
        .cmp(&b.completed_at)
        .then(a.set_number.cmp(&b.set_number))
        .then(a.position.cmp(&b.position))
    });
  } else {
    sets.sort_by_key(|s| (s.set_number, s.position));
  }
  sets
}

fn summarize(
  periods: Vec<RestPeriod>,
  pair_count: usize,
  actual_count: usize,
  dropped_count: usize,
) -> RestTimingResult {
  let values: Vec<f64> = periods.iter().map(|p| p.rest_ms as f64).collect();
  let total_rest_ms: i64 = periods.iter().map(|p| p.rest_ms).sum();
  let average_rest_ms = if values.is_empty() {
    0.0
  } else {
    total_rest_ms as f64 / values.len() as f64
  };

  RestTimingResult {
    total_rest_ms,
    average_rest_ms,
    median_rest_ms: median(&values),
    variability: coefficient_of_variation(&values, average_rest_ms),
    pair_count,
    actual_count,
    dropped_count,
    data_quality: DataQuality::from_actual_share(actual_count, pair_count),
    timing_source: TimingSourceSummary::from_counts(actual_count, pair_count),
    periods,
  }
}

fn median(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  let mut sorted = values.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));
  let mid = sorted.len() / 2;
  if sorted.len() % 2 == 1 {
    sorted[mid]
  } else {
    (sorted[mid - 1] + sorted[mid]) / 2.0
  }
}

fn coefficient_of_variation(values: &[f64], mean: f64) -> f64 {
  if values.len() < 2 || mean <= 0.0 {
    return 0.0;
  }
  let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
  variance.sqrt() / mean
}

/// ---------------------------------------------------------------------------
/// Composite Workout Timing
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTimingMetrics {
  pub total_rest_ms: i64,
  /// Session time not spent resting
  pub total_work_ms: i64,
  /// `total_work_ms / total_rest_ms`; infinite when there is work but no rest
  pub work_rest_ratio: f64,
  pub density_kg_per_min: f64,
}

impl WorkoutTimingMetrics {
  pub fn compute(duration_ms: i64, tonnage_kg: f64, rest: &RestTimingResult) -> Self {
    let total_rest_ms = rest.total_rest_ms;
    let total_work_ms = (duration_ms - total_rest_ms).max(0);

    let work_rest_ratio = if total_rest_ms > 0 {
      total_work_ms as f64 / total_rest_ms as f64
    } else if total_work_ms > 0 {
      f64::INFINITY
    } else {
      0.0
    };

    let duration_min = duration_ms as f64 / 60_000.0;
    let density_kg_per_min = if duration_min > 0.0 && tonnage_kg.is_finite() {
      tonnage_kg / duration_min
    } else {
      0.0
    };

    Self {
      total_rest_ms,
      total_work_ms,
      work_rest_ratio,
      density_kg_per_min,
    }
  }

  /// Fraction of the session spent working, in `[0, 1]`
  pub fn active_fraction(&self) -> f64 {
    let duration_ms = self.total_work_ms + self.total_rest_ms;
    if duration_ms <= 0 {
      return 0.0;
    }
    (self.total_work_ms as f64 / duration_ms as f64).clamp(0.0, 1.0)
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{legacy_set, timed_set, utc};

  #[test]
  fn test_timestamp_rest_high_quality() {
    // Arrange: 3 sets, 60 s work, 120 s rest between
    let base = utc(2025, 1, 13, 18, 0, 0);
    let sets = vec![
      timed_set(1, base, 0, 60),
      timed_set(2, base, 180, 240),
      timed_set(3, base, 360, 420),
    ];

    // Act
    let result = reconstruct_rest(&sets);

    // Assert
    assert_eq!(result.periods.len(), 2);
    assert_eq!(result.total_rest_ms, 240_000);
    assert_eq!(result.average_rest_ms, 120_000.0);
    assert_eq!(result.median_rest_ms, 120_000.0);
    assert_eq!(result.variability, 0.0);
    assert_eq!(result.data_quality, DataQuality::High);
    assert_eq!(result.timing_source, TimingSourceSummary::Actual);
    assert!(result.periods.iter().all(|p| p.timing_source == RestTimingSource::Actual));
    assert_eq!((result.periods[0].after_set, result.periods[0].before_set), (1, 2));
  }

  #[test]
  fn test_thirty_minute_boundary_is_exclusive() {
    let base = utc(2025, 1, 13, 18, 0, 0);

    // Exactly 30:00 of rest is dropped
    let sets = vec![timed_set(1, base, 0, 60), timed_set(2, base, 60 + 1800, 1900)];
    let result = reconstruct_rest(&sets);
    assert!(result.periods.is_empty());
    assert_eq!(result.dropped_count, 1);
    assert_eq!(result.total_rest_ms, 0);
    assert_eq!(result.data_quality, DataQuality::Low);

    // 29:59 is kept
    let sets = vec![timed_set(1, base, 0, 60), timed_set(2, base, 60 + 1799, 1900)];
    let result = reconstruct_rest(&sets);
    assert_eq!(result.periods.len(), 1);
    assert_eq!(result.total_rest_ms, 1_799_000);
  }

  #[test]
  fn test_negative_rest_is_dropped_not_clamped() {
    // Set 2 "started" before set 1 completed (clock skew between devices)
    let base = utc(2025, 1, 13, 18, 0, 0);
    let sets = vec![
      timed_set(1, base, 0, 60),
      timed_set(2, base, 50, 120),
      timed_set(3, base, 200, 260),
    ];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.periods.len(), 1);
    assert_eq!(result.total_rest_ms, 80_000);
    assert_eq!(result.dropped_count, 1);
    assert_eq!(result.pair_count, 2);
    // 1 of 2 pairs timestamp-derived = 50%
    assert_eq!(result.data_quality, DataQuality::Medium);
    assert_eq!(result.timing_source, TimingSourceSummary::Mixed);
  }

  #[test]
  fn test_zero_rest_is_kept() {
    let base = utc(2025, 1, 13, 18, 0, 0);
    let sets = vec![timed_set(1, base, 0, 60), timed_set(2, base, 60, 120)];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.periods.len(), 1);
    assert_eq!(result.total_rest_ms, 0);
    assert!(result.has_rest_data());
  }

  #[test]
  fn test_legacy_rest_fallback() {
    // First set's rest value is ignored: nothing precedes it
    let sets = vec![legacy_set(1, 90.0), legacy_set(2, 90.0), legacy_set(3, 120.0)];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.rest_values_ms(), vec![90_000, 120_000]);
    assert!(result.periods.iter().all(|p| p.timing_source == RestTimingSource::Manual));
    assert_eq!(result.data_quality, DataQuality::Low);
    assert_eq!(result.timing_source, TimingSourceSummary::Estimated);
    assert_eq!(result.median_rest_ms, 105_000.0);
  }

  #[test]
  fn test_legacy_rest_outside_range_is_dropped() {
    let sets = vec![legacy_set(1, 60.0), legacy_set(2, 1800.0), legacy_set(3, 1799.0)];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.rest_values_ms(), vec![1_799_000]);
    assert_eq!(result.dropped_count, 1);
  }

  #[test]
  fn test_mixed_sources_quality() {
    // 5 sets: pairs 1-2, 2-3, 3-4 timestamped, pair 4-5 only has the legacy field
    let base = utc(2025, 1, 13, 18, 0, 0);
    let mut last = legacy_set(5, 75.0);
    last.position = 4;
    let sets = vec![
      timed_set(1, base, 0, 60),
      timed_set(2, base, 120, 180),
      timed_set(3, base, 240, 300),
      timed_set(4, base, 360, 420),
      last,
    ];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.pair_count, 4);
    assert_eq!(result.actual_count, 3);
    assert_eq!(result.periods.len(), 4);
    assert_eq!(result.periods[3].timing_source, RestTimingSource::Estimated);
    // 3 of 4 = 75%
    assert_eq!(result.data_quality, DataQuality::Medium);
    assert_eq!(result.timing_source, TimingSourceSummary::Mixed);
  }

  #[test]
  fn test_eighty_percent_actual_is_high_quality() {
    // 6 sets: pairs 1-2 .. 4-5 timestamped, pair 5-6 legacy only
    let base = utc(2025, 1, 13, 18, 0, 0);
    let mut sets: Vec<_> = (0..5).map(|i| timed_set(i + 1, base, i * 120, i * 120 + 60)).collect();
    sets.push(legacy_set(6, 90.0));

    let result = reconstruct_rest(&sets);

    assert_eq!(result.pair_count, 5);
    assert_eq!(result.actual_count, 4);
    // 4 of 5 = 80%, the bound is inclusive
    assert_eq!(result.data_quality, DataQuality::High);
    assert_eq!(result.timing_source, TimingSourceSummary::Mixed);
  }

  #[test]
  fn test_some_actual_below_half_is_low_quality() {
    // Only pair 1-2 is timestamped; 2-3 and 3-4 come from the legacy field
    let base = utc(2025, 1, 13, 18, 0, 0);
    let sets = vec![
      timed_set(1, base, 0, 60),
      timed_set(2, base, 120, 180),
      legacy_set(3, 90.0),
      legacy_set(4, 100.0),
    ];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.pair_count, 3);
    assert_eq!(result.actual_count, 1);
    assert_eq!(result.periods.len(), 3);
    assert_eq!(result.data_quality, DataQuality::Low);
    assert_eq!(result.timing_source, TimingSourceSummary::Mixed);
  }

  #[test]
  fn test_quality_share_bands() {
    assert_eq!(DataQuality::from_actual_share(4, 5), DataQuality::High);
    assert_eq!(DataQuality::from_actual_share(79, 100), DataQuality::Medium);
    assert_eq!(DataQuality::from_actual_share(1, 2), DataQuality::Medium);
    assert_eq!(DataQuality::from_actual_share(49, 100), DataQuality::Low);
    assert_eq!(DataQuality::from_actual_share(1, 3), DataQuality::Low);
    assert_eq!(DataQuality::from_actual_share(0, 0), DataQuality::Low);
  }

  #[test]
  fn test_orders_by_completed_at() {
    // Input arrives out of order, set numbers were mislabelled
    let base = utc(2025, 1, 13, 18, 0, 0);
    let sets = vec![
      timed_set(2, base, 200, 260),
      timed_set(1, base, 0, 60),
      timed_set(3, base, 100, 140),
    ];

    let result = reconstruct_rest(&sets);

    let order: Vec<(i64, i64)> = result.periods.iter().map(|p| (p.after_set, p.before_set)).collect();
    assert_eq!(order, vec![(1, 3), (3, 2)]);
    assert_eq!(result.rest_values_ms(), vec![40_000, 60_000]);
  }

  #[test]
  fn test_orders_by_set_number_when_timestamps_missing() {
    let base = utc(2025, 1, 13, 18, 0, 0);
    let mut untimed = legacy_set(2, 45.0);
    untimed.position = 0;
    let sets = vec![untimed, timed_set(1, base, 0, 60), legacy_set(3, 60.0)];

    let result = reconstruct_rest(&sets);

    let order: Vec<(i64, i64)> = result.periods.iter().map(|p| (p.after_set, p.before_set)).collect();
    assert_eq!(order, vec![(1, 2), (2, 3)]);
    assert_eq!(result.periods[0].timing_source, RestTimingSource::Estimated);
    assert_eq!(result.periods[1].timing_source, RestTimingSource::Manual);
  }

  #[test]
  fn test_uncompleted_sets_do_not_form_pairs() {
    let base = utc(2025, 1, 13, 18, 0, 0);
    let mut skipped = timed_set(2, base, 120, 180);
    skipped.completed = false;
    let sets = vec![timed_set(1, base, 0, 60), skipped, timed_set(3, base, 240, 300)];

    let result = reconstruct_rest(&sets);

    assert_eq!(result.pair_count, 1);
    assert_eq!(result.total_rest_ms, 180_000);
  }

  #[test]
  fn test_empty_and_single_set() {
    assert_eq!(reconstruct_rest(&[]), RestTimingResult::empty());

    let base = utc(2025, 1, 13, 18, 0, 0);
    let result = reconstruct_rest(&[timed_set(1, base, 0, 60)]);
    assert_eq!(result.pair_count, 0);
    assert!(!result.has_rest_data());
    assert_eq!(result.data_quality, DataQuality::Low);
  }

  #[test]
  fn test_variability() {
    // Rests of 60 s and 180 s: mean 120, population std-dev 60 -> CV 0.5
    let sets = vec![legacy_set(1, 30.0), legacy_set(2, 60.0), legacy_set(3, 180.0)];

    let result = reconstruct_rest(&sets);

    assert!((result.variability - 0.5).abs() < 1e-9);
  }

  #[test]
  fn test_timing_metrics() {
    let base = utc(2025, 1, 13, 18, 0, 0);
    let sets = vec![timed_set(1, base, 0, 60), timed_set(2, base, 180, 240)];
    let rest = reconstruct_rest(&sets);

    // 10 min session, 2 min rest, 1500 kg
    let timing = WorkoutTimingMetrics::compute(600_000, 1500.0, &rest);

    assert_eq!(timing.total_rest_ms, 120_000);
    assert_eq!(timing.total_work_ms, 480_000);
    assert_eq!(timing.work_rest_ratio, 4.0);
    assert_eq!(timing.density_kg_per_min, 150.0);
    assert!((timing.active_fraction() - 0.8).abs() < 1e-9);
  }

  #[test]
  fn test_timing_metrics_degenerate_cases() {
    let no_rest = RestTimingResult::empty();

    let timing = WorkoutTimingMetrics::compute(600_000, 1000.0, &no_rest);
    assert!(timing.work_rest_ratio.is_infinite());

    let timing = WorkoutTimingMetrics::compute(0, 1000.0, &no_rest);
    assert_eq!(timing.work_rest_ratio, 0.0);
    assert_eq!(timing.density_kg_per_min, 0.0);
    assert_eq!(timing.active_fraction(), 0.0);

    // Rest longer than the recorded session: work floors at 0
    let base = utc(2025, 1, 13, 18, 0, 0);
    let rest = reconstruct_rest(&[timed_set(1, base, 0, 60), timed_set(2, base, 660, 700)]);
    let timing = WorkoutTimingMetrics::compute(300_000, 500.0, &rest);
    assert_eq!(timing.total_work_ms, 0);
    assert_eq!(timing.work_rest_ratio, 0.0);
  }
}
