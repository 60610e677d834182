use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::guards::{require_capability, Capability, CurrentUser};
use crate::api::validation::{non_blank, parse_optional_date, validate_payload};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::user::{
    normalize_email, parse_student_status, StudentCreate, StudentListQuery, StudentResponse,
    StudentUpdate,
};
use crate::schemas::MessageResponse;
use crate::services::attendance_summary::ALL_CLASSES;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/:student_id", get(get_student).put(update_student).delete(delete_student))
}

async fn list_students(
    ApiQuery(params): ApiQuery<StudentListQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    require_capability(&user, Capability::ViewStudents)?;

    let class_id = non_blank(params.class_id).filter(|id| id != ALL_CLASSES);
    let students = repositories::users::list(
        state.db(),
        repositories::users::ListUsers {
            role: Some(UserRole::Student),
            class_id: class_id.as_deref(),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list students"))?;

    let ids: Vec<String> = students.iter().map(|student| student.id.clone()).collect();
    let mut enrollments = repositories::classes::ids_for_students(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load enrollments"))?;

    Ok(Json(
        students
            .into_iter()
            .map(|student| {
                let class_ids = enrollments.remove(&student.id).unwrap_or_default();
                StudentResponse::from_db(student, class_ids)
            })
            .collect(),
    ))
}

async fn get_student(
    ApiPath(student_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StudentResponse>, ApiError> {
    require_capability(&user, Capability::ViewStudents)?;

    let student = fetch_student(&state, &student_id).await?;
    student_response(&state, student).await.map(Json)
}

async fn create_student(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>), ApiError> {
    require_capability(&user, Capability::ManageStudents)?;
    validate_payload(&payload)?;

    let email = normalize_email(&payload.email);
    let enrollment_date =
        parse_optional_date(payload.enrollment_date.as_deref(), "enrollment_date")?;
    ensure_classes_exist(&state, &payload.class_ids).await?;

    let existing = repositories::users::exists_by_email(state.db(), &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let student = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            email: &email,
            hashed_password,
            name: payload.name.trim(),
            role: UserRole::Student,
            is_active: true,
            enrollment_date,
            major: non_blank(payload.major),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create student"))?;

    repositories::classes::replace_enrollments(state.db(), &student.id, &payload.class_ids, now)
        .await
        .map_err(|e| ApiError::from_db(e, "Failed to enroll student"))?;

    tracing::info!(
        admin_id = %user.id,
        student_id = %student.id,
        classes = payload.class_ids.len(),
        action = "student_create",
        "Admin created student"
    );

    let response = student_response(&state, student).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update_student(
    ApiPath(student_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<StudentUpdate>,
) -> Result<Json<StudentResponse>, ApiError> {
    require_capability(&user, Capability::ManageStudents)?;
    validate_payload(&payload)?;

    fetch_student(&state, &student_id).await?;

    let is_active = match payload.status.as_deref() {
        Some(raw) => Some(
            parse_student_status(raw)
                .ok_or_else(|| ApiError::BadRequest("Invalid status".to_string()))?,
        ),
        None => payload.is_active,
    };

    if let Some(class_ids) = payload.class_ids.as_ref() {
        ensure_classes_exist(&state, class_ids).await?;
    }

    let now = primitive_now_utc();
    let student = repositories::users::update(
        state.db(),
        &student_id,
        repositories::users::UpdateUser {
            email: payload.email.as_deref().map(normalize_email),
            name: non_blank(payload.name),
            is_active,
            hashed_password: None,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to update student"))?
    .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    if let Some(class_ids) = payload.class_ids.as_ref() {
        repositories::classes::replace_enrollments(state.db(), &student_id, class_ids, now)
            .await
            .map_err(|e| ApiError::from_db(e, "Failed to update enrollments"))?;
    }

    tracing::info!(admin_id = %user.id, student_id = %student_id, action = "student_update", "Admin updated student");

    student_response(&state, student).await.map(Json)
}

async fn delete_student(
    ApiPath(student_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_capability(&user, Capability::ManageStudents)?;

    fetch_student(&state, &student_id).await?;

    repositories::users::delete(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::from_db(e, "Failed to delete student"))?;

    tracing::info!(admin_id = %user.id, student_id = %student_id, action = "student_delete", "Admin deleted student");

    Ok(Json(MessageResponse { message: "Student deleted successfully".to_string() }))
}

async fn fetch_student(state: &AppState, student_id: &str) -> Result<User, ApiError> {
    repositories::users::find_by_id(state.db(), student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .filter(|user| user.role == UserRole::Student)
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))
}

async fn student_response(state: &AppState, student: User) -> Result<StudentResponse, ApiError> {
    let class_ids = repositories::classes::ids_for_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load enrollments"))?;
    Ok(StudentResponse::from_db(student, class_ids))
}

async fn ensure_classes_exist(state: &AppState, class_ids: &[String]) -> Result<(), ApiError> {
    let missing = repositories::classes::missing_ids(state.db(), class_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify classes"))?;
    match missing.first() {
        Some(id) => Err(ApiError::NotFound(format!("Class not found: {id}"))),
        None => Ok(()),
    }
}
