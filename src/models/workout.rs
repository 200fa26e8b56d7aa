use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decode;

/// One training session as stored upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkout {
  #[serde(deserialize_with = "decode::id")]
  pub id: String,

  /// Session start, RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC)
  #[serde(default, deserialize_with = "decode::text")]
  pub started_at: Option<String>,

  #[serde(default, deserialize_with = "decode::number")]
  pub duration_seconds: Option<f64>,
}

impl RawWorkout {
  pub fn new(id: impl Into<String>, started_at: impl Into<String>, duration_seconds: f64) -> Self {
    Self {
      id: id.into(),
      started_at: Some(started_at.into()),
      duration_seconds: Some(duration_seconds),
    }
  }

  /// Parsed start instant; malformed strings are treated as absent
  pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
    decode::parse_timestamp(self.started_at.as_deref())
  }

  /// Recorded duration in seconds, 0 when missing, negative or non-finite
  pub fn duration_secs(&self) -> f64 {
    self
      .duration_seconds
      .filter(|s| s.is_finite() && *s >= 0.0)
      .unwrap_or(0.0)
  }
}
