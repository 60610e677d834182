use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    #[serde(alias = "Admin")]
    Admin,
    #[serde(alias = "Teacher")]
    Teacher,
    #[serde(alias = "Student")]
    Student,
}

impl UserRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }

    pub(crate) fn is_staff(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Teacher)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attendancestatus", rename_all = "lowercase")]
pub(crate) enum AttendanceStatus {
    #[serde(alias = "Present")]
    Present,
    #[serde(alias = "Absent")]
    Absent,
}

/// Wire form is capitalised (`"Pending"`), storage form is lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "absencestatus", rename_all = "lowercase")]
pub(crate) enum AbsenceStatus {
    Pending,
    Approved,
    Rejected,
}

impl AbsenceStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AbsenceStatus::Pending => "Pending",
            AbsenceStatus::Approved => "Approved",
            AbsenceStatus::Rejected => "Rejected",
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, AbsenceStatus::Pending)
    }
}
