use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;
use time::{Date, Duration, PrimitiveDateTime};

use crate::core::time::{day_bounds, format_date, parse_calendar_date};
use crate::db::types::AttendanceStatus;

/// Class id the client sends when a view spans every class.
pub(crate) const ALL_CLASSES: &str = "all";

pub(crate) const SUMMARY_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum FilterError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Date-bounded attendance predicate. `None` fields do not constrain the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AttendanceFilter {
    pub(crate) class_id: Option<String>,
    pub(crate) student_id: Option<String>,
    pub(crate) range: Option<(PrimitiveDateTime, PrimitiveDateTime)>,
}

impl AttendanceFilter {
    pub(crate) fn from_query(
        class_id: Option<&str>,
        date: Option<&str>,
        student_id: Option<&str>,
    ) -> Result<Self, FilterError> {
        let class_id = non_empty(class_id).filter(|id| *id != ALL_CLASSES).map(str::to_string);
        let student_id = non_empty(student_id).map(str::to_string);
        let range = match non_empty(date) {
            Some(raw) => Some(
                parse_calendar_date(raw)
                    .and_then(day_bounds)
                    .ok_or_else(|| FilterError::InvalidDate(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { class_id, student_id, range })
    }

    pub(crate) fn for_day(day: Date) -> Result<Self, FilterError> {
        Ok(Self { range: Some(bounds_of(day)?), ..Self::default() })
    }

    pub(crate) fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }
}

fn bounds_of(day: Date) -> Result<(PrimitiveDateTime, PrimitiveDateTime), FilterError> {
    day_bounds(day).ok_or_else(|| FilterError::InvalidDate(format_date(day)))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct StatusCounts {
    pub(crate) present: i64,
    pub(crate) absent: i64,
}

impl StatusCounts {
    pub(crate) fn total(&self) -> i64 {
        self.present + self.absent
    }

    pub(crate) fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }
}

impl FromIterator<AttendanceStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = AttendanceStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

/// `present / total * 100` with two decimals, or `N/A` when nothing was recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AttendancePercentage {
    NotAvailable,
    Percent(f64),
}

impl AttendancePercentage {
    pub(crate) fn from_counts(counts: StatusCounts) -> Self {
        let total = counts.total();
        if total <= 0 {
            return AttendancePercentage::NotAvailable;
        }
        AttendancePercentage::Percent(counts.present as f64 / total as f64 * 100.0)
    }
}

impl fmt::Display for AttendancePercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendancePercentage::NotAvailable => f.write_str("N/A"),
            AttendancePercentage::Percent(value) => write!(f, "{value:.2}"),
        }
    }
}

impl Serialize for AttendancePercentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct DailySummary {
    pub(crate) date: String,
    pub(crate) present: i64,
    pub(crate) absent: i64,
}

/// The `days` calendar days ending with `today`, oldest first.
pub(crate) fn trailing_window(today: Date, days: u32) -> Vec<Date> {
    (0..days).rev().map(|offset| today - Duration::days(i64::from(offset))).collect()
}

/// Inclusive-exclusive UTC range covering the whole trailing window.
pub(crate) fn window_bounds(
    today: Date,
    days: u32,
) -> Result<(PrimitiveDateTime, PrimitiveDateTime), FilterError> {
    let first = today - Duration::days(i64::from(days.max(1) - 1));
    Ok((first.midnight(), bounds_of(today)?.1))
}

/// One entry per day of the window; days missing from `counts` report zeros.
pub(crate) fn build_trailing_series(
    today: Date,
    days: u32,
    counts: &HashMap<Date, StatusCounts>,
) -> Vec<DailySummary> {
    trailing_window(today, days)
        .into_iter()
        .map(|day| {
            let day_counts = counts.get(&day).copied().unwrap_or_default();
            DailySummary {
                date: format_date(day),
                present: day_counts.present,
                absent: day_counts.absent,
            }
        })
        .collect()
}
