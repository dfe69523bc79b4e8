//! Quiet-hours evaluation in the recipient's timezone.
//!
//! A window whose start is later than its end wraps past midnight
//! (`22:00`-`07:00`). A window whose start equals its end is empty.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use pharmahub_core::error::AppError;
use pharmahub_core::result::AppResult;
use pharmahub_entity::notification::QuietHours;

const TIME_FORMAT: &str = "%H:%M";

/// A parsed quiet-hours window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    start: NaiveTime,
    end: NaiveTime,
    tz: Tz,
}

impl QuietWindow {
    /// Parse an enabled window. Returns `Ok(None)` when quiet hours are off.
    pub fn parse(settings: &QuietHours) -> AppResult<Option<Self>> {
        if !settings.enabled {
            return Ok(None);
        }
        let start = parse_time(&settings.start)?;
        let end = parse_time(&settings.end)?;
        let tz: Tz = settings.timezone.parse().map_err(|_| {
            AppError::validation(format!("Unknown timezone '{}'", settings.timezone))
        })?;
        Ok(Some(Self { start, end, tz }))
    }

    /// End of the window containing `now`, or `None` if `now` is outside it.
    pub fn end_if_inside(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.start == self.end {
            return None;
        }
        let local = now.with_timezone(&self.tz);
        let time = local.time();
        let today = local.date_naive();

        let end_date = if self.start < self.end {
            if time < self.start || time >= self.end {
                return None;
            }
            today
        } else if time >= self.start {
            today.succ_opt()?
        } else if time < self.end {
            today
        } else {
            return None;
        };

        Some(self.resolve_local(end_date, now))
    }

    fn resolve_local(&self, date: NaiveDate, now: DateTime<Utc>) -> DateTime<Utc> {
        let naive = date.and_time(self.end);
        // A DST gap can swallow the end time; the first valid instant after it is used instead.
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.tz
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now + Duration::hours(1))
    }
}

/// Validate quiet-hours settings before they are stored.
pub fn validate(settings: &QuietHours) -> AppResult<()> {
    parse_time(&settings.start)?;
    parse_time(&settings.end)?;
    settings
        .timezone
        .parse::<Tz>()
        .map(|_| ())
        .map_err(|_| AppError::validation(format!("Unknown timezone '{}'", settings.timezone)))
}

/// End of the recipient's quiet window if `now` falls inside it.
///
/// Unparseable settings count as "not quiet" so delivery is never blocked
/// by a bad stored value.
pub fn quiet_until(settings: &QuietHours, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match QuietWindow::parse(settings) {
        Ok(window) => window.and_then(|w| w.end_if_inside(now)),
        Err(e) => {
            warn!(error = %e, "Ignoring invalid quiet hours settings");
            None
        }
    }
}

fn parse_time(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| AppError::validation(format!("Invalid time '{value}', expected HH:MM")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(start: &str, end: &str, tz: &str) -> QuietHours {
        QuietHours {
            enabled: true,
            start: start.into(),
            end: end.into(),
            timezone: tz.into(),
        }
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_overnight_window_before_midnight() {
        // 23:00 in New York (EST, UTC-5).
        let q = settings("22:00", "07:00", "America/New_York");
        let end = quiet_until(&q, at("2026-01-15T04:00:00Z")).unwrap();
        assert_eq!(end, at("2026-01-15T12:00:00Z"));
    }

    #[test]
    fn test_overnight_window_after_midnight() {
        let q = settings("22:00", "07:00", "UTC");
        let end = quiet_until(&q, at("2026-03-02T03:30:00Z")).unwrap();
        assert_eq!(end, at("2026-03-02T07:00:00Z"));
    }

    #[test]
    fn test_outside_window() {
        let q = settings("22:00", "07:00", "UTC");
        assert!(quiet_until(&q, at("2026-03-02T07:00:00Z")).is_none());
        assert!(quiet_until(&q, at("2026-03-02T21:59:00Z")).is_none());
    }

    #[test]
    fn test_daytime_window() {
        let q = settings("12:00", "13:30", "Europe/Berlin");
        // 12:15 CET.
        let end = quiet_until(&q, at("2026-01-20T11:15:00Z")).unwrap();
        assert_eq!(end, at("2026-01-20T12:30:00Z"));
        assert!(quiet_until(&q, at("2026-01-20T13:00:00Z")).is_none());
    }

    #[test]
    fn test_disabled_and_empty_windows() {
        let mut q = settings("22:00", "07:00", "UTC");
        q.enabled = false;
        assert!(quiet_until(&q, at("2026-03-02T23:00:00Z")).is_none());

        let q = settings("09:00", "09:00", "UTC");
        assert!(quiet_until(&q, at("2026-03-02T09:00:00Z")).is_none());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(validate(&settings("25:00", "07:00", "UTC")).is_err());
        assert!(validate(&settings("22:00", "07:00", "Mars/Olympus")).is_err());
        assert!(validate(&settings("22:00", "07:00", "Asia/Tokyo")).is_ok());
    }
}
