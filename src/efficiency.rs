//! Composite efficiency score
//!
//! Four sub-scores, each capped at 25 points, summed into a 0-100 score:
//!
//! | Sub-score            | Blend                                                   |
//! |----------------------|---------------------------------------------------------|
//! | volume efficiency    | density vs baseline                                     |
//! | progression potential| mean of normalized intensity and normalized density      |
//! | consistency          | 60% set completion, 40% rest consistency                |
//! | time optimization    | 50% work:rest ratio vs target, 50% active-time share    |

use serde::{Deserialize, Serialize};

use crate::config::EfficiencyBaselines;
use crate::kpi::round2;
use crate::rest_timing::WorkoutTimingMetrics;
use crate::totals::WorkoutAggregate;

const SUB_SCORE_MAX: f64 = 25.0;
const TOTAL_MAX: u32 = 100;

const COMPLETION_WEIGHT: f64 = 0.6;
const REST_CONSISTENCY_WEIGHT: f64 = 0.4;
const RATIO_WEIGHT: f64 = 0.5;
const ACTIVE_WEIGHT: f64 = 0.5;

/// Rest consistency credited when a workout has no rest data
const NEUTRAL_REST_CONSISTENCY: f64 = 0.5;

/// ---------------------------------------------------------------------------
/// Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EfficiencyInputs {
  pub density_kg_per_min: f64,
  /// Average load moved per rep
  pub load_per_rep_kg: f64,
  /// Completed / recorded sets, in `[0, 1]`
  pub completion_rate: f64,
  /// Coefficient of variation of rest periods; `None` without rest data
  pub rest_variability: Option<f64>,
  pub work_rest_ratio: f64,
  /// Share of the session not spent resting, in `[0, 1]`
  pub active_fraction: f64,
}

impl EfficiencyInputs {
  pub fn from_workout(aggregate: &WorkoutAggregate, timing: &WorkoutTimingMetrics) -> Self {
    let totals = &aggregate.totals;

    let load_per_rep_kg = if totals.reps > 0 {
      totals.tonnage_kg / totals.reps as f64
    } else {
      0.0
    };
    let completion_rate = if aggregate.recorded_sets > 0 {
      aggregate.completed_sets as f64 / aggregate.recorded_sets as f64
    } else {
      0.0
    };

    Self {
      density_kg_per_min: timing.density_kg_per_min,
      load_per_rep_kg,
      completion_rate,
      rest_variability: aggregate
        .rest_timing
        .has_rest_data()
        .then_some(aggregate.rest_timing.variability),
      work_rest_ratio: timing.work_rest_ratio,
      active_fraction: timing.active_fraction(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
  /// 0-25
  pub points: f64,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyBreakdown {
  pub volume_efficiency: SubScore,
  pub progression_potential: SubScore,
  pub consistency: SubScore,
  pub time_optimization: SubScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyRating {
  Excellent,
  Good,
  Fair,
  NeedsWork,
}

impl EfficiencyRating {
  pub fn from_score(score: u32) -> Self {
    if score >= 80 {
      EfficiencyRating::Excellent
    } else if score >= 60 {
      EfficiencyRating::Good
    } else if score >= 40 {
      EfficiencyRating::Fair
    } else {
      EfficiencyRating::NeedsWork
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      EfficiencyRating::Excellent => "Excellent",
      EfficiencyRating::Good => "Good",
      EfficiencyRating::Fair => "Fair",
      EfficiencyRating::NeedsWork => "Needs Work",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyScore {
  /// 0-100
  pub total: u32,
  pub rating: EfficiencyRating,
  pub breakdown: EfficiencyBreakdown,
}

/// ---------------------------------------------------------------------------
/// Scoring
/// ---------------------------------------------------------------------------

pub fn score_efficiency(inputs: &EfficiencyInputs, baselines: &EfficiencyBaselines) -> EfficiencyScore {
  let density = unit(inputs.density_kg_per_min);
  let load = unit(inputs.load_per_rep_kg);

  // Volume
  let density_share = ratio_to(density, baselines.density_kg_per_min);
  let volume_points = scaled(density_share);
  let volume_efficiency = SubScore {
    points: round2(volume_points),
    description: format!(
      "{:.1} kg/min against a {:.0} kg/min baseline",
      density, baselines.density_kg_per_min
    ),
  };

  // Progression
  let intensity_share = ratio_to(load, baselines.load_per_rep_kg);
  let progression_points = scaled((intensity_share + density_share) / 2.0);
  let progression_potential = SubScore {
    points: round2(progression_points),
    description: format!(
      "{:.0}% intensity, {:.0}% density",
      intensity_share * 100.0,
      density_share * 100.0
    ),
  };

  // Consistency
  let completion = unit(inputs.completion_rate).min(1.0);
  let rest_consistency = match inputs.rest_variability {
    Some(cv) if cv.is_finite() => (1.0 - cv).clamp(0.0, 1.0),
    _ => NEUTRAL_REST_CONSISTENCY,
  };
  let consistency_points =
    scaled(COMPLETION_WEIGHT * completion + REST_CONSISTENCY_WEIGHT * rest_consistency);
  let consistency = SubScore {
    points: round2(consistency_points),
    description: match inputs.rest_variability {
      Some(_) => format!(
        "{:.0}% of sets completed, rest consistency {:.0}%",
        completion * 100.0,
        rest_consistency * 100.0
      ),
      None => format!("{:.0}% of sets completed, no rest data", completion * 100.0),
    },
  };

  // Time
  let ratio_share = if inputs.work_rest_ratio.is_infinite() && inputs.work_rest_ratio > 0.0 {
    1.0
  } else {
    ratio_to(unit(inputs.work_rest_ratio), baselines.work_rest_ratio_target)
  };
  let active = unit(inputs.active_fraction).min(1.0);
  let time_points = scaled(RATIO_WEIGHT * ratio_share + ACTIVE_WEIGHT * active);
  let time_optimization = SubScore {
    points: round2(time_points),
    description: if inputs.work_rest_ratio.is_finite() {
      format!(
        "work:rest {:.1}:1 against {:.0}:1, {:.0}% active",
        unit(inputs.work_rest_ratio),
        baselines.work_rest_ratio_target,
        active * 100.0
      )
    } else {
      format!("no rest recorded, {:.0}% active", active * 100.0)
    },
  };

  // Displayed points are rounded; the total is taken from the unrounded ones
  let sum = volume_points + progression_points + consistency_points + time_points;
  let total = (sum.round() as u32).min(TOTAL_MAX);

  EfficiencyScore {
    total,
    rating: EfficiencyRating::from_score(total),
    breakdown: EfficiencyBreakdown {
      volume_efficiency,
      progression_potential,
      consistency,
      time_optimization,
    },
  }
}

/// Finite and non-negative, else 0
fn unit(value: f64) -> f64 {
  if value.is_finite() && value > 0.0 {
    value
  } else {
    0.0
  }
}

/// `value / baseline` capped at 1
fn ratio_to(value: f64, baseline: f64) -> f64 {
  if baseline > 0.0 && baseline.is_finite() {
    (value / baseline).clamp(0.0, 1.0)
  } else {
    0.0
  }
}

/// Scale a `[0, 1]` share to sub-score points
fn scaled(share: f64) -> f64 {
  (share.clamp(0.0, 1.0) * SUB_SCORE_MAX).min(SUB_SCORE_MAX)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
