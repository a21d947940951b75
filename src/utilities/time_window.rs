//! Time window parsing for integrations that filter by date.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeWindowError {
    #[error("Invalid ISO-8601 timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Default upper bound for a window.
pub fn default_max_window() -> Duration {
    Duration::days(7)
}

/// A range query in `{gte, lte}` form. Empty when neither bound is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
}

impl IsoRange {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }
}

/// A parsed window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    /// Parse both bounds and clamp the window to `max_window`.
    ///
    /// When the window is longer than `max_window` the end is moved to
    /// `start + max_window`.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        max_window: Option<Duration>,
    ) -> Result<Self, TimeWindowError> {
        let start = start.filter(|s| !s.is_empty()).map(parse_timestamp).transpose()?;
        let mut end = end.filter(|s| !s.is_empty()).map(parse_timestamp).transpose()?;

        if let (Some(s), Some(e), Some(max)) = (start, end, max_window) {
            if e - s > max {
                log::warn!(
                    "Time window of {} exceeds maximum allowed {}; adjusting to end at {}",
                    e - s,
                    max,
                    s + max
                );
                end = Some(s + max);
            }
        }

        Ok(Self { start, end })
    }

    pub fn to_iso_range(&self) -> IsoRange {
        IsoRange {
            gte: self.start.map(format_iso),
            lte: self.end.map(format_iso),
        }
    }
}

/// Parse and clamp a window, returning it in range-query form.
pub fn convert_to_iso_range(
    start: Option<&str>,
    end: Option<&str>,
    max_window: Option<Duration>,
) -> Result<IsoRange, TimeWindowError> {
    TimeWindow::parse(start, end, max_window).map(|w| w.to_iso_range())
}

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]` and plain dates.
/// Offsets are normalised to UTC.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, TimeWindowError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| TimeWindowError::InvalidTimestamp(input.to_string()))
}

pub fn format_iso(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_bounds_is_empty() {
        let range = convert_to_iso_range(None, None, Some(default_max_window())).unwrap();
        assert!(range.is_empty());
        assert_eq!(serde_json::to_value(&range).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_open_ended_ranges() {
        let only_start = convert_to_iso_range(Some("2024-03-01T10:00:00"), None, None).unwrap();
        assert_eq!(only_start.gte.as_deref(), Some("2024-03-01T10:00:00"));
        assert!(only_start.lte.is_none());

        let only_end = convert_to_iso_range(None, Some("2024-03-02"), None).unwrap();
        assert!(only_end.gte.is_none());
        assert_eq!(only_end.lte.as_deref(), Some("2024-03-02T00:00:00"));
    }

    #[test]
    fn test_window_clamped_to_max() {
        let range = convert_to_iso_range(
            Some("2024-03-01T00:00:00"),
            Some("2024-03-20T00:00:00"),
            Some(default_max_window()),
        )
        .unwrap();
        assert_eq!(range.gte.as_deref(), Some("2024-03-01T00:00:00"));
        assert_eq!(range.lte.as_deref(), Some("2024-03-08T00:00:00"));
    }

    #[test]
    fn test_window_within_max_untouched() {
        let range = convert_to_iso_range(
            Some("2024-03-01T00:00:00"),
            Some("2024-03-03T12:30:00"),
            Some(default_max_window()),
        )
        .unwrap();
        assert_eq!(range.lte.as_deref(), Some("2024-03-03T12:30:00"));
    }

    #[test]
    fn test_rfc3339_offset_normalised() {
        let dt = parse_timestamp("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(format_iso(dt), "2024-03-01T08:00:00");
    }

    #[test]
    fn test_invalid_timestamp() {
        let err = parse_timestamp("last tuesday").unwrap_err();
        assert_eq!(err, TimeWindowError::InvalidTimestamp("last tuesday".into()));
    }
}
