use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::core::time::{format_date, format_primitive};
use crate::db::models::{EmergencyContact, User};
use crate::db::types::UserRole;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserLogin {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserRegister {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub(crate) password: String,
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub(crate) name: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserCreate {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub(crate) password: String,
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub(crate) name: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
    #[serde(default = "default_true")]
    #[serde(alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserUpdate {
    #[serde(default, deserialize_with = "normalized_optional_email")]
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub(crate) password: Option<String>,
    /// Accepted only when it matches the stored role.
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) enrollment_date: Option<String>,
    pub(crate) major: Option<String>,
    pub(crate) current_classes: Vec<String>,
    pub(crate) emergency_contact: Option<EmergencyContact>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            is_active: user.is_active,
            enrollment_date: user.enrollment_date.map(format_date),
            major: user.major,
            current_classes: user.current_classes.0,
            emergency_contact: user.emergency_contact.map(|contact| contact.0),
            created_at: format_primitive(user.created_at),
            updated_at: format_primitive(user.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentCreate {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub(crate) password: String,
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) major: Option<String>,
    #[serde(default)]
    #[serde(alias = "enrollmentDate")]
    pub(crate) enrollment_date: Option<String>,
    #[serde(default)]
    #[serde(alias = "classIds", alias = "classes")]
    pub(crate) class_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentUpdate {
    #[serde(default, deserialize_with = "normalized_optional_email")]
    #[validate(email(message = "Invalid email address"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
    /// `"Active"` / `"Inactive"`, mapped onto `is_active`.
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    #[serde(alias = "classIds", alias = "classes")]
    pub(crate) class_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentListQuery {
    #[serde(default)]
    #[serde(alias = "classId")]
    pub(crate) class_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) status: &'static str,
    pub(crate) is_active: bool,
    pub(crate) major: Option<String>,
    pub(crate) enrollment_date: Option<String>,
    pub(crate) class_ids: Vec<String>,
}

impl StudentResponse {
    pub(crate) fn from_db(user: User, class_ids: Vec<String>) -> Self {
        Self {
            status: if user.is_active { "Active" } else { "Inactive" },
            id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            major: user.major,
            enrollment_date: user.enrollment_date.map(format_date),
            class_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileQuery {
    #[serde(default)]
    #[serde(alias = "userId")]
    pub(crate) user_id: Option<String>,
}

/// Only profile fields; anything else in the body is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileUpdate {
    #[serde(default)]
    #[serde(alias = "enrollmentDate")]
    pub(crate) enrollment_date: Option<String>,
    #[serde(default)]
    pub(crate) major: Option<String>,
    #[serde(default)]
    #[serde(alias = "currentClasses")]
    pub(crate) current_classes: Option<Vec<String>>,
    #[serde(default)]
    #[serde(alias = "emergencyContact")]
    pub(crate) emergency_contact: Option<EmergencyContact>,
}

/// Trimmed, lowercased form under which emails are stored and looked up.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Normalises on the way in so `#[validate(email)]` sees the stored form.
fn normalized_email<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|email| normalize_email(&email))
}

fn normalized_optional_email<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|email| email.as_deref().map(normalize_email))
}

/// Maps the client's `"Active"` / `"Inactive"` labels onto the stored flag.
pub(crate) fn parse_student_status(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" => Some(true),
        "inactive" => Some(false),
        _ => None,
    }
}

fn default_user_role() -> UserRole {
    UserRole::Student
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_defaults_to_student_and_validates() {
        let payload: UserRegister = serde_json::from_value(serde_json::json!({
            "email": "ana@school.test",
            "password": "secret1",
            "name": "Ana"
        }))
        .unwrap();
        assert_eq!(payload.role, UserRole::Student);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn register_rejects_bad_email_and_short_password() {
        let payload: UserRegister = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "password": "123",
            "name": "Ana",
            "role": "Teacher"
        }))
        .unwrap();
        assert_eq!(payload.role, UserRole::Teacher);
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn padded_email_is_normalized_before_validation() {
        let payload: UserRegister = serde_json::from_value(serde_json::json!({
            "email": "  Ana@School.test ",
            "password": "secret1",
            "name": "Ana"
        }))
        .unwrap();
        assert_eq!(payload.email, "ana@school.test");
        assert!(payload.validate().is_ok());

        let update: StudentUpdate =
            serde_json::from_value(serde_json::json!({ "email": " Ben@School.test" })).unwrap();
        assert_eq!(update.email.as_deref(), Some("ben@school.test"));
        assert!(update.validate().is_ok());

        let update: StudentUpdate = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(update.email, None);
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ana@School.TEST "), "ana@school.test");
    }

    #[test]
    fn student_status_labels() {
        assert_eq!(parse_student_status("Active"), Some(true));
        assert_eq!(parse_student_status("inactive"), Some(false));
        assert_eq!(parse_student_status("graduated"), None);
    }
}
