use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::extract::ApiJson;
use crate::api::guards::CurrentUser;
use crate::api::validation::validate_payload;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::auth::TokenResponse;
use crate::schemas::user::{normalize_email, UserLogin, UserRegister, UserResponse};

/// Max attempts per window for login and register, keyed by email.
const AUTH_RATE_LIMIT: u64 = 10;
/// Rate limit window in seconds.
const AUTH_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UserRegister>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    enforce_rate_limit(&state, "register", &email, "Too many signup attempts, try again later")
        .await?;

    if payload.role == UserRole::Admin && !state.settings().security().allow_admin_signup {
        return Err(ApiError::Forbidden("Admin self-registration is disabled"));
    }

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
            is_active: true,
            enrollment_date: None,
            major: None,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create user"))?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), action = "register", "User registered");

    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UserLogin>,
) -> Result<Json<TokenResponse>, ApiError> {
    validate_payload(&payload)?;
    let email = normalize_email(&payload.email);

    enforce_rate_limit(&state, "login", &email, "Too many login attempts, try again later")
        .await?;

    let user = repositories::users::find_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Invalid email or password"))?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Invalid email or password"));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    Ok(Json(issue_token(&state, user)?))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

fn issue_token(state: &AppState, user: User) -> Result<TokenResponse, ApiError> {
    let token =
        security::create_access_token(&user.id, user.role, state.settings().security(), None)
            .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;
    Ok(TokenResponse::bearer(token, UserResponse::from_db(user)))
}

async fn enforce_rate_limit(
    state: &AppState,
    action: &str,
    email: &str,
    message: &'static str,
) -> Result<(), ApiError> {
    let rate_key = format!("rl:{action}:{email}");
    let allowed = state
        .redis()
        .rate_limit(&rate_key, AUTH_RATE_LIMIT, AUTH_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if allowed {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests(message))
    }
}
