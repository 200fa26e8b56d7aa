//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Raw row factories
//! - Timestamp helpers
//! - A realistic multi-workout fixture

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{RawSet, RawWorkout};
use crate::normalize::{normalize_set, NormalizedSet};

/// ---------------------------------------------------------------------------
/// Timestamp Helpers
/// ---------------------------------------------------------------------------

pub fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
  Utc
    .with_ymd_and_hms(year, month, day, hour, min, sec)
    .single()
    .expect("valid test timestamp")
}

/// RFC 3339 string `secs` seconds after `base`
pub fn iso_after(base: DateTime<Utc>, secs: i64) -> String {
  (base + Duration::seconds(secs)).to_rfc3339()
}

/// ---------------------------------------------------------------------------
/// Row Factories
/// ---------------------------------------------------------------------------

pub fn raw_set(workout_id: &str, set_number: i64, weight: f64, reps: i64) -> RawSet {
  RawSet::new(workout_id, set_number, weight, reps)
}

pub fn timed_raw_set(
  workout_id: &str,
  set_number: i64,
  weight: f64,
  reps: i64,
  started_at: &str,
  completed_at: &str,
) -> RawSet {
  RawSet {
    started_at: Some(started_at.to_string()),
    completed_at: Some(completed_at.to_string()),
    ..RawSet::new(workout_id, set_number, weight, reps)
  }
}

pub fn legacy_raw_set(workout_id: &str, set_number: i64, weight: f64, reps: i64, rest_seconds: f64) -> RawSet {
  RawSet {
    rest_seconds: Some(rest_seconds),
    ..RawSet::new(workout_id, set_number, weight, reps)
  }
}

pub fn workout(id: &str, started_at: &str, duration_seconds: f64) -> RawWorkout {
  RawWorkout::new(id, started_at, duration_seconds)
}

/// A normalized, completed set performed from `start_offset` to `end_offset` seconds after `base`
pub fn timed_set(set_number: i64, base: DateTime<Utc>, start_offset: i64, end_offset: i64) -> NormalizedSet {
  let raw = timed_raw_set(
    "w1",
    set_number,
    60.0,
    10,
    &iso_after(base, start_offset),
    &iso_after(base, end_offset),
  );
  normalize_set(&raw, (set_number - 1).max(0) as usize, 70.0)
}

/// A normalized, completed set with only the legacy rest field
pub fn legacy_set(set_number: i64, rest_seconds: f64) -> NormalizedSet {
  let raw = legacy_raw_set("w1", set_number, 60.0, 10, rest_seconds);
  normalize_set(&raw, (set_number - 1).max(0) as usize, 70.0)
}

/// ---------------------------------------------------------------------------
/// Fixtures
/// ---------------------------------------------------------------------------

/// One fully timestamped workout: 3 sets of 100 kg x 5, 60 s work, 120 s rest, 10 min session.
///
/// Tonnage 1500 kg, total rest 240 s, active 180 s.
pub fn timestamped_workout() -> (RawWorkout, Vec<RawSet>) {
  let base = utc(2025, 1, 13, 18, 0, 0);
  let workout = workout("w1", &base.to_rfc3339(), 600.0);
  let sets = (0..3)
    .map(|i| {
      let start = i * 180;
      timed_raw_set(
        "w1",
        i + 1,
        100.0,
        5,
        &iso_after(base, start),
        &iso_after(base, start + 60),
      )
    })
    .collect();
  (workout, sets)
}
