//! Tick Schedule - Cron Expression Parsing
//!
//! Accepts classic 5-field crontab expressions (minute resolution) as
//! well as 6/7-field expressions with a leading seconds field. 5-field
//! expressions fire at second 0. Day-of-week follows the `cron` crate
//! convention (1-7, Sunday = 1, or names like `MON`).

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Invalid schedule expression.
#[derive(Debug, Error)]
pub enum ScheduleError {
  #[error("invalid cron expression `{expr}`: {reason}")]
  Invalid { expr: String, reason: String },
}

/// Parsed poll schedule.
#[derive(Debug, Clone)]
pub struct TickSchedule {
  expr: String,
  schedule: cron::Schedule,
}

impl TickSchedule {
  /// Parse a cron expression.
  pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
    let trimmed = expr.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
      format!("0 {trimmed}")
    } else {
      trimmed.to_string()
    };

    let schedule = cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::Invalid {
      expr: expr.to_string(),
      reason: e.to_string(),
    })?;

    Ok(Self {
      expr: trimmed.to_string(),
      schedule,
    })
  }

  /// Original expression, as configured.
  pub fn expr(&self) -> &str {
    &self.expr
  }

  /// First fire time strictly after `now`.
  pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    self.schedule.after(&now).next()
  }

  /// Time to wait from `now` until the next fire time.
  pub fn delay_from(&self, now: DateTime<Utc>) -> Option<Duration> {
    self
      .next_after(now)
      .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
  }
}

impl std::fmt::Display for TickSchedule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.expr)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_five_field_fires_on_the_minute() {
    let schedule = TickSchedule::parse("*/1 * * * *").unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap();

    let next = schedule.next_after(now).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap());
    assert_eq!(schedule.delay_from(now), Some(Duration::from_secs(30)));
  }

  #[test]
  fn test_six_field_with_seconds() {
    let schedule = TickSchedule::parse("*/15 * * * * *").unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 1).unwrap();

    let next = schedule.next_after(now).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 15).unwrap());
  }

  #[test]
  fn test_invalid_expression() {
    let err = TickSchedule::parse("every minute").unwrap_err();
    assert!(err.to_string().contains("every minute"));
  }

  #[test]
  fn test_display_keeps_original() {
    let schedule = TickSchedule::parse(" */5 * * * * ").unwrap();
    assert_eq!(schedule.to_string(), "*/5 * * * *");
  }
}
