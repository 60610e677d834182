use axum::{
    extract::State,
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::guards::{require_capability, Capability, CurrentUser};
use crate::api::validation::{non_blank, parse_optional_date};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::user::{ProfileQuery, ProfileUpdate, UserResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(get_profile).put(update_profile))
}

/// Resolves whose profile a request targets. Anyone other than the caller
/// requires `ViewAnyProfile`.
fn target_id(user: &User, requested: Option<String>) -> Result<String, ApiError> {
    match non_blank(requested) {
        Some(id) if id != user.id => {
            require_capability(user, Capability::ViewAnyProfile)?;
            Ok(id)
        }
        _ => Ok(user.id.clone()),
    }
}

async fn get_profile(
    ApiQuery(params): ApiQuery<ProfileQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = target_id(&user, params.user_id)?;
    if target == user.id {
        return Ok(Json(UserResponse::from_db(user)));
    }

    let profile = repositories::users::find_by_id(state.db(), &target)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch profile"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from_db(profile)))
}

async fn update_profile(
    ApiQuery(params): ApiQuery<ProfileQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ProfileUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = target_id(&user, params.user_id)?;
    let enrollment_date =
        parse_optional_date(payload.enrollment_date.as_deref(), "enrollment_date")?;
    let current_classes = payload.current_classes.map(|classes| {
        classes
            .into_iter()
            .map(|class| class.trim().to_string())
            .filter(|class| !class.is_empty())
            .collect()
    });

    let updated = repositories::users::update_profile(
        state.db(),
        &target,
        repositories::users::UpdateProfile {
            enrollment_date,
            major: non_blank(payload.major),
            current_classes,
            emergency_contact: payload.emergency_contact,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update profile"))?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, target_id = %target, action = "profile_update", "Profile updated");

    Ok(Json(UserResponse::from_db(updated)))
}
