//! Lenient field decoding for rows coming out of the upstream store.
//!
//! Historical rows disagree on types (numbers stored as strings, nulls, stray objects).
//! Anything that cannot be read as the expected type decodes as absent rather than failing
//! the whole row. Only the row identifiers are strict.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn number_from_value(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  }
  .filter(|n| n.is_finite())
}

pub(crate) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(number_from_value))
}

pub(crate) fn whole_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(value.as_ref().and_then(number_from_value).map(|n| n.trunc() as i64))
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(matches!(value, Some(Value::Bool(true))))
}

pub(crate) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
    _ => None,
  })
}

/// Free-text label; numbers are kept as their text, anything else reads as empty
pub(crate) fn label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::String(s)) => s,
    Some(Value::Number(n)) => n.to_string(),
    _ => String::new(),
  })
}

pub(crate) fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(D::Error::custom(format!("expected string or numeric id, got {}", other))),
  }
}

/// Parse a stored timestamp. Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.fff]`
/// (read as UTC) and bare dates (UTC midnight). Anything else is `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
  let raw = raw?.trim();
  if raw.is_empty() {
    return None;
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }

  for format in NAIVE_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
      return Some(naive.and_utc());
    }
  }

  if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return Some(date.and_time(NaiveTime::MIN).and_utc());
  }

  log::debug!("Ignoring unparseable timestamp {:?}", raw);
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_parse_timestamp_formats() {
    let expected = Utc.with_ymd_and_hms(2025, 1, 13, 10, 0, 0).unwrap();

    assert_eq!(parse_timestamp(Some("2025-01-13T10:00:00Z")), Some(expected));
    assert_eq!(parse_timestamp(Some("2025-01-13T11:00:00+01:00")), Some(expected));
    assert_eq!(parse_timestamp(Some("2025-01-13 10:00:00")), Some(expected));
    assert_eq!(
      parse_timestamp(Some("2025-01-13")),
      Some(Utc.with_ymd_and_hms(2025, 1, 13, 0, 0, 0).unwrap())
    );
  }

  #[test]
  fn test_parse_timestamp_rejects_garbage() {
    assert_eq!(parse_timestamp(None), None);
    assert_eq!(parse_timestamp(Some("")), None);
    assert_eq!(parse_timestamp(Some("not a date")), None);
    assert_eq!(parse_timestamp(Some("2025-13-45T99:00:00Z")), None);
  }

  #[test]
  fn test_number_from_value() {
    assert_eq!(number_from_value(&serde_json::json!(12.5)), Some(12.5));
    assert_eq!(number_from_value(&serde_json::json!(" 40 ")), Some(40.0));
    assert_eq!(number_from_value(&serde_json::json!("NaN")), None);
    assert_eq!(number_from_value(&serde_json::json!(true)), None);
    assert_eq!(number_from_value(&serde_json::json!([1])), None);
  }
}
