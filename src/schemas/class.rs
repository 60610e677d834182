use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::repositories::classes::ClassWithRoster;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ClassCreate {
    #[validate(length(min = 1, max = 255, message = "Class name must not be empty"))]
    pub(crate) name: String,
    #[serde(alias = "teacherId", alias = "teacher")]
    pub(crate) teacher_id: String,
    #[serde(default)]
    #[serde(alias = "scheduleDay")]
    pub(crate) schedule_day: Option<String>,
    #[serde(default)]
    #[serde(alias = "scheduleTime")]
    pub(crate) schedule_time: Option<String>,
    #[serde(default)]
    #[serde(alias = "studentIds", alias = "students")]
    pub(crate) student_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ClassUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Class name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    #[serde(alias = "teacherId", alias = "teacher")]
    pub(crate) teacher_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "scheduleDay")]
    pub(crate) schedule_day: Option<String>,
    #[serde(default)]
    #[serde(alias = "scheduleTime")]
    pub(crate) schedule_time: Option<String>,
    /// Replaces the roster when present.
    #[serde(default)]
    #[serde(alias = "studentIds", alias = "students")]
    pub(crate) student_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) teacher_id: String,
    pub(crate) teacher_name: Option<String>,
    pub(crate) schedule_day: Option<String>,
    pub(crate) schedule_time: Option<String>,
    pub(crate) student_ids: Vec<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ClassResponse {
    pub(crate) fn from_db(row: ClassWithRoster) -> Self {
        let ClassWithRoster { class, teacher_name, student_ids } = row;
        Self {
            id: class.id,
            name: class.name,
            teacher_id: class.teacher_id,
            teacher_name,
            schedule_day: class.schedule_day,
            schedule_time: class.schedule_time,
            student_ids,
            created_at: format_primitive(class.created_at),
            updated_at: format_primitive(class.updated_at),
        }
    }
}
