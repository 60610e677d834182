use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::guards::{require_capability, Capability, CurrentUser};
use crate::api::validation::{non_blank, validate_payload};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::class::{ClassCreate, ClassResponse, ClassUpdate};
use crate::schemas::MessageResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_classes).post(create_class))
        .route("/:class_id", get(get_class).put(update_class).delete(delete_class))
}

async fn list_classes(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassResponse>>, ApiError> {
    let classes = repositories::classes::list(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classes"))?;

    Ok(Json(classes.into_iter().map(ClassResponse::from_db).collect()))
}

async fn get_class(
    ApiPath(class_id): ApiPath<String>,
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ClassResponse>, ApiError> {
    fetch_class(&state, &class_id).await.map(Json)
}

async fn create_class(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ClassCreate>,
) -> Result<(StatusCode, Json<ClassResponse>), ApiError> {
    require_capability(&user, Capability::ManageClasses)?;
    validate_payload(&payload)?;

    let name = non_blank(Some(payload.name))
        .ok_or_else(|| ApiError::BadRequest("Class name must not be empty".to_string()))?;
    let student_ids = dedup(payload.student_ids);

    ensure_teacher(&state, &payload.teacher_id).await?;
    ensure_students(&state, &student_ids).await?;

    let class_id = Uuid::new_v4().to_string();
    repositories::classes::create(
        state.db(),
        repositories::classes::CreateClass {
            id: &class_id,
            name: &name,
            teacher_id: &payload.teacher_id,
            schedule_day: non_blank(payload.schedule_day),
            schedule_time: non_blank(payload.schedule_time),
            student_ids: &student_ids,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to create class"))?;

    tracing::info!(
        admin_id = %user.id,
        class_id = %class_id,
        roster = student_ids.len(),
        action = "class_create",
        "Admin created class"
    );

    let created = fetch_class(&state, &class_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_class(
    ApiPath(class_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ClassUpdate>,
) -> Result<Json<ClassResponse>, ApiError> {
    require_capability(&user, Capability::ManageClasses)?;
    validate_payload(&payload)?;

    if let Some(teacher_id) = payload.teacher_id.as_deref() {
        ensure_teacher(&state, teacher_id).await?;
    }
    let student_ids = payload.student_ids.map(dedup);
    if let Some(student_ids) = student_ids.as_ref() {
        ensure_students(&state, student_ids).await?;
    }

    let updated = repositories::classes::update(
        state.db(),
        &class_id,
        repositories::classes::UpdateClass {
            name: non_blank(payload.name),
            teacher_id: payload.teacher_id,
            schedule_day: non_blank(payload.schedule_day),
            schedule_time: non_blank(payload.schedule_time),
            student_ids,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to update class"))?;

    if !updated {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }

    tracing::info!(admin_id = %user.id, class_id = %class_id, action = "class_update", "Admin updated class");

    fetch_class(&state, &class_id).await.map(Json)
}

async fn delete_class(
    ApiPath(class_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_capability(&user, Capability::ManageClasses)?;

    let deleted = repositories::classes::delete(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::from_db(e, "Failed to delete class"))?;

    if !deleted {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }

    tracing::info!(admin_id = %user.id, class_id = %class_id, action = "class_delete", "Admin deleted class");

    Ok(Json(MessageResponse { message: "Class deleted successfully".to_string() }))
}

async fn fetch_class(state: &AppState, class_id: &str) -> Result<ClassResponse, ApiError> {
    repositories::classes::find_by_id(state.db(), class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch class"))?
        .map(ClassResponse::from_db)
        .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))
}

async fn ensure_teacher(state: &AppState, teacher_id: &str) -> Result<(), ApiError> {
    let role = repositories::users::find_role_by_id(state.db(), teacher_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify teacher"))?;

    match role {
        Some(role) if role.is_staff() => Ok(()),
        Some(_) => Err(ApiError::BadRequest("Assigned teacher must be a teacher or admin".into())),
        None => Err(ApiError::NotFound("Teacher not found".to_string())),
    }
}

async fn ensure_students(state: &AppState, student_ids: &[String]) -> Result<(), ApiError> {
    let found = repositories::users::ids_with_role(state.db(), student_ids, UserRole::Student)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify roster"))?;

    match student_ids.iter().find(|id| !found.contains(id)) {
        Some(id) => Err(ApiError::BadRequest(format!("Unknown student in roster: {id}"))),
        None => Ok(()),
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::dedup;
    use crate::db::types::UserRole;
    use crate::test_support;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let ids = vec!["b".into(), " a ".into(), "b".into(), "".into(), "a".into()];
        assert_eq!(dedup(ids), vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn admin_creates_class_and_replaces_roster() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let admin =
            test_support::insert_user(db, "admin@school.test", "Admin", UserRole::Admin, "pass123")
                .await;
        let teacher = test_support::insert_user(
            db,
            "teacher@school.test",
            "Teacher",
            UserRole::Teacher,
            "pass123",
        )
        .await;
        let s1 =
            test_support::insert_user(db, "s1@school.test", "S1", UserRole::Student, "pass123")
                .await;
        let s2 =
            test_support::insert_user(db, "s2@school.test", "S2", UserRole::Student, "pass123")
                .await;
        let token = test_support::bearer_token(&admin, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/classes",
                Some(&token),
                Some(json!({
                    "name": "  Biology ",
                    "teacherId": teacher.id,
                    "scheduleDay": "Monday",
                    "scheduleTime": "09:00",
                    "studentIds": [s1.id]
                })),
            ))
            .await
            .expect("create class");

        let status = response.status();
        let created = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {created}");
        assert_eq!(created["name"], "Biology");
        assert_eq!(created["teacher_name"], "Teacher");
        assert_eq!(created["student_ids"], json!([s1.id]));
        let class_id = created["id"].as_str().expect("class id").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PUT,
                &format!("/api/classes/{class_id}"),
                Some(&token),
                Some(json!({ "studentIds": [s2.id] })),
            ))
            .await
            .expect("update class");

        let status = response.status();
        let updated = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {updated}");
        assert_eq!(updated["student_ids"], json!([s2.id]));
        assert_eq!(updated["schedule_day"], "Monday");
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn class_teacher_must_be_staff() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let admin =
            test_support::insert_user(db, "admin@school.test", "Admin", UserRole::Admin, "pass123")
                .await;
        let student =
            test_support::insert_user(db, "s1@school.test", "S1", UserRole::Student, "pass123")
                .await;
        let token = test_support::bearer_token(&admin, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/classes",
                Some(&token),
                Some(json!({ "name": "Art", "teacherId": student.id })),
            ))
            .await
            .expect("create class");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
