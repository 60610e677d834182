use serde::{Deserialize, Serialize};

use crate::core::time::{format_date, format_primitive};
use crate::db::types::AbsenceStatus;
use crate::repositories::absences::AbsenceWithStudent;

/// Public path under which stored attachments are served.
pub(crate) const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AbsenceListQuery {
    #[serde(default)]
    pub(crate) status: Option<AbsenceStatus>,
    #[serde(default)]
    #[serde(alias = "studentId")]
    pub(crate) student_id: Option<String>,
}

/// `status` stays a raw string so unknown values surface as "Invalid status".
#[derive(Debug, Deserialize)]
pub(crate) struct AbsenceReview {
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AbsenceResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) date: String,
    pub(crate) reason: String,
    pub(crate) status: AbsenceStatus,
    pub(crate) comment: Option<String>,
    pub(crate) attachment: Option<String>,
    pub(crate) attachment_url: Option<String>,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) submitted_at: String,
}

impl AbsenceResponse {
    pub(crate) fn from_db(row: AbsenceWithStudent) -> Self {
        let AbsenceWithStudent { absence, student_name } = row;
        Self {
            attachment_url: absence.attachment.as_deref().map(attachment_url),
            id: absence.id,
            student_id: absence.student_id,
            student_name,
            date: format_date(absence.absence_date),
            reason: absence.reason,
            status: absence.status,
            comment: absence.comment,
            attachment: absence.attachment,
            reviewed_by: absence.reviewed_by,
            reviewed_at: absence.reviewed_at.map(format_primitive),
            submitted_at: format_primitive(absence.submitted_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AbsenceReviewResponse {
    pub(crate) success: bool,
    pub(crate) absence: AbsenceResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct AbsenceUploadResponse {
    pub(crate) success: bool,
    pub(crate) message: &'static str,
    pub(crate) absence: AbsenceResponse,
}

pub(crate) fn attachment_url(filename: &str) -> String {
    format!("{UPLOADS_ROUTE}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_url_points_at_static_route() {
        assert_eq!(attachment_url("1721779200000-note.pdf"), "/uploads/1721779200000-note.pdf");
    }

    #[test]
    fn list_query_accepts_capitalised_status() {
        let query: AbsenceListQuery =
            serde_json::from_value(serde_json::json!({ "status": "Pending" })).unwrap();
        assert_eq!(query.status, Some(AbsenceStatus::Pending));
    }
}
