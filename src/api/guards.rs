use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
/// Authenticated user allowed to manage accounts.
pub(crate) struct CurrentAdmin(pub(crate) User);

/// Actions gated by role. Each endpoint checks exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capability {
    MarkAttendance,
    ReviewAbsences,
    ViewStudents,
    ViewStats,
    ManageUsers,
    ManageStudents,
    ManageClasses,
    ViewAnyProfile,
}

impl Capability {
    pub(crate) fn allowed_for(self, role: UserRole) -> bool {
        match self {
            Capability::MarkAttendance
            | Capability::ReviewAbsences
            | Capability::ViewStudents
            | Capability::ViewStats => role.is_staff(),
            Capability::ManageUsers
            | Capability::ManageStudents
            | Capability::ManageClasses
            | Capability::ViewAnyProfile => role == UserRole::Admin,
        }
    }
}

pub(crate) fn require_capability(user: &User, capability: Capability) -> Result<(), ApiError> {
    if capability.allowed_for(user.role) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %user.id,
            role = user.role.as_str(),
            capability = ?capability,
            "Permission denied"
        );
        Err(ApiError::Forbidden("Not enough permissions"))
    }
}

/// Students only ever see their own data; staff may pick any student or none.
pub(crate) fn scoped_student_id(user: &User, requested: Option<String>) -> Option<String> {
    if user.role == UserRole::Student {
        return Some(user.id.clone());
    }
    requested.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings().security())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        require_capability(&user, Capability::ManageUsers)?;
        Ok(CurrentAdmin(user))
    }
}
