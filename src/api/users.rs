use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::guards::CurrentAdmin;
use crate::api::validation::{non_blank, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::user::{normalize_email, AdminUserCreate, AdminUserUpdate, UserResponse};
use crate::schemas::MessageResponse;

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    role: Option<UserRole>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    is_active: Option<bool>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_users).post(create_user)).route(
        "/:user_id",
        get(get_user).put(update_user).patch(update_user).delete(delete_user),
    )
}

async fn list_users(
    ApiQuery(params): ApiQuery<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let email = params.email.as_deref().map(normalize_email);
    let users = repositories::users::list(
        state.db(),
        repositories::users::ListUsers {
            role: params.role,
            email: email.as_deref(),
            is_active: params.is_active,
            class_id: None,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list users"))?;

    Ok(Json(users.into_iter().map(UserResponse::from_db).collect()))
}

async fn get_user(
    ApiPath(user_id): ApiPath<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from_db(user)))
}

async fn create_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AdminUserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    let existing = repositories::users::exists_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;

    if existing.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            name: payload.name.trim(),
            role: payload.role,
            is_active: payload.is_active,
            enrollment_date: None,
            major: None,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create user"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        action = "user_create",
        "Admin created user"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

async fn update_user(
    ApiPath(user_id): ApiPath<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AdminUserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_payload(&payload)?;

    let current = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if payload.role.is_some_and(|role| role != current.role) {
        return Err(ApiError::BadRequest("Role cannot be changed".to_string()));
    }

    let hashed_password = match payload.password.as_deref() {
        Some(password) => Some(
            security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
        ),
        None => None,
    };

    let updated = repositories::users::update(
        state.db(),
        &user_id,
        repositories::users::UpdateUser {
            email: payload.email.as_deref().map(normalize_email),
            name: non_blank(payload.name),
            is_active: payload.is_active,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to update user"))?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %updated.id,
        action = "user_update",
        "Admin updated user"
    );

    Ok(Json(UserResponse::from_db(updated)))
}

async fn delete_user(
    ApiPath(user_id): ApiPath<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    if admin.id == user_id {
        return Err(ApiError::BadRequest("Admins cannot delete their own account".to_string()));
    }

    let deleted = repositories::users::delete(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::from_db(e, "Failed to delete user"))?;

    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(admin_id = %admin.id, user_id = %user_id, action = "user_delete", "Admin deleted user");

    Ok(Json(MessageResponse { message: "User deleted successfully".to_string() }))
}

#[cfg(test)]
mod tests;
