use serde::{Deserialize, Serialize};

use crate::core::time::{format_date, format_primitive};
use crate::db::types::AttendanceStatus;
use crate::repositories::attendance::AttendanceRow;
use crate::services::attendance_summary::{AttendancePercentage, StatusCounts};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AttendanceQuery {
    #[serde(default)]
    #[serde(alias = "classId")]
    pub(crate) class_id: Option<String>,
    #[serde(default)]
    pub(crate) date: Option<String>,
    #[serde(default)]
    #[serde(alias = "studentId")]
    pub(crate) student_id: Option<String>,
}

/// Replace-all batch for one class and day. Fields are optional so that a
/// missing one maps to a single "Missing required fields" error.
#[derive(Debug, Deserialize)]
pub(crate) struct AttendanceBatch {
    #[serde(default)]
    #[serde(alias = "classId", alias = "class_id")]
    pub(crate) class: Option<String>,
    #[serde(default)]
    pub(crate) date: Option<String>,
    #[serde(default)]
    pub(crate) records: Option<Vec<AttendanceEntry>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttendanceEntry {
    #[serde(alias = "studentId", alias = "student_id")]
    pub(crate) student: String,
    pub(crate) status: AttendanceStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttendanceSaveResponse {
    pub(crate) success: bool,
    pub(crate) saved: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttendanceRecordResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) class_id: String,
    pub(crate) class_name: String,
    pub(crate) date: String,
    pub(crate) status: AttendanceStatus,
    pub(crate) marked_by: String,
    pub(crate) marked_at: String,
}

impl AttendanceRecordResponse {
    pub(crate) fn from_row(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            student_id: row.student_id,
            student_name: row.student_name,
            class_id: row.class_id,
            class_name: row.class_name,
            date: format_date(row.attendance_date.date()),
            status: row.status,
            marked_by: row.marked_by,
            marked_at: format_primitive(row.marked_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttendanceCountsResponse {
    pub(crate) present: i64,
    pub(crate) absent: i64,
    pub(crate) total: i64,
}

impl From<StatusCounts> for AttendanceCountsResponse {
    fn from(counts: StatusCounts) -> Self {
        Self { present: counts.present, absent: counts.absent, total: counts.total() }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SummaryQuery {
    #[serde(default)]
    #[serde(alias = "studentId")]
    pub(crate) student_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PercentageQuery {
    #[serde(default)]
    #[serde(alias = "studentId")]
    pub(crate) student_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "classId")]
    pub(crate) class_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PercentageResponse {
    pub(crate) student_id: String,
    pub(crate) class_id: Option<String>,
    pub(crate) present: i64,
    pub(crate) total: i64,
    pub(crate) percentage: AttendancePercentage,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatsResponse {
    pub(crate) total_students: i64,
    pub(crate) total_teachers: i64,
    pub(crate) total_classes: i64,
    pub(crate) present_today: i64,
    pub(crate) absent_today: i64,
}
