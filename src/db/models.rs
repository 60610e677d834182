use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::{Date, PrimitiveDateTime};

use crate::db::types::{AbsenceStatus, AttendanceStatus, UserRole};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EmergencyContact {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) relationship: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) enrollment_date: Option<Date>,
    pub(crate) major: Option<String>,
    pub(crate) current_classes: Json<Vec<String>>,
    pub(crate) emergency_contact: Option<Json<EmergencyContact>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Class {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) teacher_id: String,
    pub(crate) schedule_day: Option<String>,
    pub(crate) schedule_time: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttendanceRecord {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) class_id: String,
    pub(crate) attendance_date: PrimitiveDateTime,
    pub(crate) status: AttendanceStatus,
    pub(crate) marked_by: String,
    pub(crate) marked_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AbsenceSubmission {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) absence_date: Date,
    pub(crate) reason: String,
    pub(crate) status: AbsenceStatus,
    pub(crate) comment: Option<String>,
    pub(crate) attachment: Option<String>,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) submitted_at: PrimitiveDateTime,
}
