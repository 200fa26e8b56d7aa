//! Time-period averages
//!
//! Workouts are partitioned into five named windows ending at a reference instant. Each
//! window reuses the base totals aggregator and divides by the number of workouts in it.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RawWorkout;
use crate::normalize::NormalizedSet;
use crate::totals::{aggregate_workouts, AggregationOptions};

/// Sets admitted into period rollups
const PERIOD_OPTIONS: AggregationOptions = AggregationOptions {
  count_uncompleted_sets: false,
  exclude_warmups: true,
  require_positive_reps: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodKey {
  ThisWeek,
  ThisMonth,
  Last7Days,
  Last30Days,
  AllTime,
}

impl PeriodKey {
  pub const ALL: [PeriodKey; 5] = [
    PeriodKey::ThisWeek,
    PeriodKey::ThisMonth,
    PeriodKey::Last7Days,
    PeriodKey::Last30Days,
    PeriodKey::AllTime,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      PeriodKey::ThisWeek => "This Week",
      PeriodKey::ThisMonth => "This Month",
      PeriodKey::Last7Days => "Last 7 Days",
      PeriodKey::Last30Days => "Last 30 Days",
      PeriodKey::AllTime => "All Time",
    }
  }

  /// Length of a rolling window; `None` for calendar-aligned and open windows
  pub fn rolling_days(&self) -> Option<i64> {
    match self {
      PeriodKey::Last7Days => Some(7),
      PeriodKey::Last30Days => Some(30),
      _ => None,
    }
  }
}

/// A closed `[start, end]` interval in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
  pub key: PeriodKey,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl PeriodWindow {
  /// Build the window for `key` ending at `reference`.
  ///
  /// Calendar windows start at local midnight in `offset`: Monday for the week, the 1st
  /// for the month.
  pub fn for_key(key: PeriodKey, reference: DateTime<Utc>, offset: FixedOffset) -> Self {
    let local_date = reference.with_timezone(&offset).date_naive();

    let start = match key {
      PeriodKey::ThisWeek => {
        let days_since_monday = local_date.weekday().num_days_from_monday() as i64;
        local_midnight(local_date - Duration::days(days_since_monday), offset)
      }
      PeriodKey::ThisMonth => local_midnight(local_date.with_day(1).unwrap_or(local_date), offset),
      PeriodKey::Last7Days | PeriodKey::Last30Days => {
        reference - Duration::days(key.rolling_days().unwrap_or(0))
      }
      PeriodKey::AllTime => DateTime::<Utc>::UNIX_EPOCH,
    };

    Self {
      key,
      start: start.min(reference),
      end: reference,
    }
  }

  pub fn contains(&self, instant: DateTime<Utc>) -> bool {
    self.start <= instant && instant <= self.end
  }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
  let local = date.and_time(NaiveTime::MIN);
  (local - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

/// Per-workout averages for one window, rounded to whole units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAverages {
  pub key: PeriodKey,
  pub label: String,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  pub total_workouts: u32,
  pub avg_tonnage_kg: i64,
  pub avg_duration_min: i64,
  pub avg_sets: i64,
  pub avg_reps: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAveragesReport {
  pub this_week: PeriodAverages,
  pub this_month: PeriodAverages,
  pub last_7_days: PeriodAverages,
  pub last_30_days: PeriodAverages,
  pub all_time: PeriodAverages,
}

impl PeriodAveragesReport {
  pub fn get(&self, key: PeriodKey) -> &PeriodAverages {
    match key {
      PeriodKey::ThisWeek => &self.this_week,
      PeriodKey::ThisMonth => &self.this_month,
      PeriodKey::Last7Days => &self.last_7_days,
      PeriodKey::Last30Days => &self.last_30_days,
      PeriodKey::AllTime => &self.all_time,
    }
  }
}

/// Averages for a single window
pub fn period_averages(
  window: &PeriodWindow,
  workouts: &[(&RawWorkout, DateTime<Utc>)],
  sets: &[NormalizedSet],
) -> PeriodAverages {
  let in_window: Vec<&RawWorkout> = workouts
    .iter()
    .filter(|(_, started_at)| window.contains(*started_at))
    .map(|(workout, _)| *workout)
    .collect();

  let total_workouts = in_window.len() as u32;
  let (totals, _) = aggregate_workouts(in_window, sets, PERIOD_OPTIONS);

  let per_workout = |total: f64| -> i64 {
    if total_workouts == 0 {
      return 0;
    }
    let avg = total / total_workouts as f64;
    if avg.is_finite() {
      avg.round() as i64
    } else {
      0
    }
  };

  PeriodAverages {
    key: window.key,
    label: window.key.label().to_string(),
    start: window.start,
    end: window.end,
    total_workouts,
    avg_tonnage_kg: per_workout(totals.tonnage_kg),
    avg_duration_min: per_workout(totals.duration_min),
    avg_sets: per_workout(totals.sets as f64),
    avg_reps: per_workout(totals.reps as f64),
  }
}

/// Averages for all five windows.
///
/// Workouts whose start time cannot be parsed belong to no window.
pub fn compute_period_averages(
  workouts: &[RawWorkout],
  sets: &[NormalizedSet],
  reference: DateTime<Utc>,
  offset: FixedOffset,
) -> PeriodAveragesReport {
  let dated: Vec<(&RawWorkout, DateTime<Utc>)> = workouts
    .iter()
    .filter_map(|w| match w.started_at_utc() {
      Some(started_at) => Some((w, started_at)),
      None => {
        log::debug!("Workout {} has no usable start time, excluded from periods", w.id);
        None
      }
    })
    .collect();

  let averages = |key: PeriodKey| period_averages(&PeriodWindow::for_key(key, reference, offset), &dated, sets);

  PeriodAveragesReport {
    this_week: averages(PeriodKey::ThisWeek),
    this_month: averages(PeriodKey::ThisMonth),
    last_7_days: averages(PeriodKey::Last7Days),
    last_30_days: averages(PeriodKey::Last30Days),
    all_time: averages(PeriodKey::AllTime),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
