use serde::{Deserialize, Serialize};

use super::decode;

/// One recorded exercise set, as stored upstream.
///
/// Older rows carry only `rest_seconds` (the rest timer value); newer rows carry
/// `started_at`/`completed_at` timestamps. Either, both, or neither may be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSet {
  #[serde(deserialize_with = "decode::id")]
  pub workout_id: String,

  #[serde(default, deserialize_with = "decode::label")]
  pub exercise_name: String,

  #[serde(default, deserialize_with = "decode::number")]
  pub weight: Option<f64>,

  #[serde(default, deserialize_with = "decode::whole_number")]
  pub reps: Option<i64>,

  #[serde(default, deserialize_with = "decode::flag")]
  pub completed: bool,

  /// 1-based position within the workout
  #[serde(default, deserialize_with = "decode::whole_number")]
  pub set_number: Option<i64>,

  #[serde(default, deserialize_with = "decode::text")]
  pub started_at: Option<String>,

  #[serde(default, deserialize_with = "decode::text")]
  pub completed_at: Option<String>,

  /// Legacy rest duration preceding this set, in seconds
  #[serde(default, deserialize_with = "decode::number")]
  pub rest_seconds: Option<f64>,

  #[serde(default, deserialize_with = "decode::flag")]
  pub is_warmup: bool,

  #[serde(default, deserialize_with = "decode::flag")]
  pub is_bodyweight: bool,
}

impl RawSet {
  /// A completed working set with no timing data
  pub fn new(workout_id: impl Into<String>, set_number: i64, weight: f64, reps: i64) -> Self {
    Self {
      workout_id: workout_id.into(),
      exercise_name: String::new(),
      weight: Some(weight),
      reps: Some(reps),
      completed: true,
      set_number: Some(set_number),
      started_at: None,
      completed_at: None,
      rest_seconds: None,
      is_warmup: false,
      is_bodyweight: false,
    }
  }
}
