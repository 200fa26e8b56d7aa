//! Set normalization
//!
//! Turns a `RawSet` into the uniform shape every other component works on. Nothing is
//! rejected here: uncompleted sets are carried with `completed = false` and filtered by
//! the aggregators, so "total sets" denominators can still count them when asked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{parse_timestamp, RawSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSet {
  pub workout_id: String,
  pub exercise_name: String,
  /// 1-based set number; 0 when the row had none
  pub set_number: i64,
  /// Index of the row in the caller's input, used as the final ordering tie-break
  pub position: usize,
  /// Effective load, with bodyweight substituted where applicable
  pub weight_kg: f64,
  pub reps: u32,
  pub completed: bool,
  pub is_warmup: bool,
  pub is_bodyweight: bool,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Legacy rest value in seconds, only kept when positive
  pub rest_seconds: Option<f64>,
}

impl NormalizedSet {
  /// Load moved by this set; zero unless completed
  pub fn tonnage_kg(&self) -> f64 {
    if self.completed {
      self.weight_kg * self.reps as f64
    } else {
      0.0
    }
  }

  /// Reps that count toward totals; zero unless completed
  pub fn counted_reps(&self) -> u32 {
    if self.completed {
      self.reps
    } else {
      0
    }
  }

  /// Time under the bar from the set's own timestamps, in milliseconds.
  /// `None` when either timestamp is missing.
  pub fn active_duration_ms(&self) -> Option<i64> {
    match (self.started_at, self.completed_at) {
      (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
      _ => None,
    }
  }

  pub fn has_timestamps(&self) -> bool {
    self.started_at.is_some() || self.completed_at.is_some()
  }
}

/// Normalize one raw set.
///
/// - missing, negative or non-finite weight reads as 0
/// - missing or negative reps read as 0
/// - a bodyweight set logged at 0 kg is credited with `bodyweight_kg`
/// - malformed timestamps are dropped
pub fn normalize_set(raw: &RawSet, position: usize, bodyweight_kg: f64) -> NormalizedSet {
  let logged_weight = raw
    .weight
    .filter(|w| w.is_finite() && *w >= 0.0)
    .unwrap_or(0.0);

  let weight_kg = if raw.is_bodyweight && logged_weight == 0.0 {
    bodyweight_kg
  } else {
    logged_weight
  };

  let reps = raw
    .reps
    .map(|r| r.clamp(0, u32::MAX as i64) as u32)
    .unwrap_or(0);

  NormalizedSet {
    workout_id: raw.workout_id.clone(),
    exercise_name: raw.exercise_name.clone(),
    set_number: raw.set_number.unwrap_or(0),
    position,
    weight_kg,
    reps,
    completed: raw.completed,
    is_warmup: raw.is_warmup,
    is_bodyweight: raw.is_bodyweight,
    started_at: parse_timestamp(raw.started_at.as_deref()),
    completed_at: parse_timestamp(raw.completed_at.as_deref()),
    rest_seconds: raw.rest_seconds.filter(|s| s.is_finite() && *s > 0.0),
  }
}

pub fn normalize_sets(raw: &[RawSet], bodyweight_kg: f64) -> Vec<NormalizedSet> {
  raw
    .iter()
    .enumerate()
    .map(|(position, set)| normalize_set(set, position, bodyweight_kg))
    .collect()
}
