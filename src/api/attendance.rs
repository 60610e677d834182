use std::collections::HashSet;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::api::guards::{require_capability, scoped_student_id, Capability, CurrentUser};
use crate::api::validation::{non_blank, parse_date_field};
use crate::core::state::AppState;
use crate::core::time::{day_bounds, primitive_now_utc, today_utc};
use crate::db::models::User;
use crate::db::types::{AttendanceStatus, UserRole};
use crate::repositories;
use crate::schemas::attendance::{
    AttendanceBatch, AttendanceCountsResponse, AttendanceQuery, AttendanceRecordResponse,
    AttendanceSaveResponse, PercentageQuery, PercentageResponse, SummaryQuery,
};
use crate::services::attendance_summary::{
    build_trailing_series, window_bounds, AttendanceFilter, AttendancePercentage, DailySummary,
    ALL_CLASSES, SUMMARY_WINDOW_DAYS,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attendance).post(save_attendance))
        .route("/counts", get(attendance_counts))
        .route("/summary", get(attendance_summary))
        .route("/percentage", get(attendance_percentage))
}

fn scoped_filter(user: &User, params: AttendanceQuery) -> Result<AttendanceFilter, ApiError> {
    let student_id = scoped_student_id(user, params.student_id);
    Ok(AttendanceFilter::from_query(
        params.class_id.as_deref(),
        params.date.as_deref(),
        student_id.as_deref(),
    )?)
}

async fn list_attendance(
    ApiQuery(params): ApiQuery<AttendanceQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttendanceRecordResponse>>, ApiError> {
    let filter = scoped_filter(&user, params)?;

    let rows = repositories::attendance::list(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attendance"))?;

    Ok(Json(rows.into_iter().map(AttendanceRecordResponse::from_row).collect()))
}

async fn attendance_counts(
    ApiQuery(params): ApiQuery<AttendanceQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttendanceCountsResponse>, ApiError> {
    let filter = scoped_filter(&user, params)?;

    let counts = repositories::attendance::count_by_status(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attendance"))?;

    Ok(Json(counts.into()))
}

async fn attendance_summary(
    ApiQuery(params): ApiQuery<SummaryQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<DailySummary>>, ApiError> {
    let student_id = scoped_student_id(&user, params.student_id);
    let today = today_utc();
    let (start, end) = window_bounds(today, SUMMARY_WINDOW_DAYS)?;

    let counts =
        repositories::attendance::daily_counts(state.db(), start, end, student_id.as_deref())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load attendance summary"))?;

    Ok(Json(build_trailing_series(today, SUMMARY_WINDOW_DAYS, &counts)))
}

async fn attendance_percentage(
    ApiQuery(params): ApiQuery<PercentageQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<PercentageResponse>, ApiError> {
    let student_id = scoped_student_id(&user, params.student_id)
        .ok_or_else(|| ApiError::BadRequest("studentId is required".to_string()))?;

    let filter = AttendanceFilter::from_query(params.class_id.as_deref(), None, None)?
        .with_student(student_id.clone());

    let counts = repositories::attendance::count_by_status(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute attendance percentage"))?;

    Ok(Json(PercentageResponse {
        student_id,
        class_id: filter.class_id,
        present: counts.present,
        total: counts.total(),
        percentage: AttendancePercentage::from_counts(counts),
    }))
}

async fn save_attendance(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AttendanceBatch>,
) -> Result<Json<AttendanceSaveResponse>, ApiError> {
    require_capability(&user, Capability::MarkAttendance)?;

    let (Some(class_id), Some(raw_date), Some(records)) =
        (non_blank(payload.class), non_blank(payload.date), payload.records)
    else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };

    if class_id == ALL_CLASSES {
        return Err(ApiError::BadRequest(
            "Cannot save attendance for all classes at once.".to_string(),
        ));
    }

    let day = parse_date_field(&raw_date, "date")?;
    let (day_start, day_end) =
        day_bounds(day).ok_or_else(|| ApiError::BadRequest("Invalid date".to_string()))?;
    let entries = batch_entries(records.into_iter().map(|entry| (entry.student, entry.status)))?;

    let class_exists = repositories::classes::exists(state.db(), &class_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify class"))?;
    if !class_exists {
        return Err(ApiError::NotFound("Class not found".to_string()));
    }

    let student_ids: Vec<String> = entries.iter().map(|(id, _)| id.clone()).collect();
    let known =
        repositories::users::ids_with_role(state.db(), &student_ids, UserRole::Student)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to verify students"))?;
    if let Some(unknown) = student_ids.iter().find(|id| !known.contains(id)) {
        return Err(ApiError::BadRequest(format!("Unknown student: {unknown}")));
    }

    let saved = repositories::attendance::replace_for_class_date(
        state.db(),
        repositories::attendance::ReplaceAttendance {
            class_id: &class_id,
            day_start,
            day_end,
            entries: &entries,
            marked_by: &user.id,
            marked_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::from_db(e, "Failed to save attendance"))?;

    metrics::counter!("attendance_batches_saved_total").increment(1);
    tracing::info!(
        user_id = %user.id,
        class_id = %class_id,
        date = %day,
        saved,
        action = "attendance_replace",
        "Attendance batch saved"
    );

    Ok(Json(AttendanceSaveResponse { success: true, saved }))
}

/// Trims student ids and rejects blanks and repeats within one batch.
fn batch_entries(
    records: impl IntoIterator<Item = (String, AttendanceStatus)>,
) -> Result<Vec<(String, AttendanceStatus)>, ApiError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for (student, status) in records {
        let student = student.trim().to_string();
        if student.is_empty() {
            return Err(ApiError::BadRequest("Missing required fields".to_string()));
        }
        if !seen.insert(student.clone()) {
            return Err(ApiError::BadRequest(format!(
                "Duplicate student in attendance batch: {student}"
            )));
        }
        entries.push((student, status));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::batch_entries;
    use crate::api::errors::ApiError;
    use crate::core::time::{format_date, today_utc};
    use crate::db::types::{AttendanceStatus, UserRole};
    use crate::test_support;

    #[test]
    fn batch_entries_rejects_duplicates() {
        let err = batch_entries([
            ("s1".to_string(), AttendanceStatus::Present),
            (" s1 ".to_string(), AttendanceStatus::Absent),
        ])
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(message) if message.contains("s1")));
    }

    #[test]
    fn batch_entries_accepts_empty_roster() {
        assert!(batch_entries(Vec::new()).unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn saving_twice_replaces_the_batch() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let teacher = test_support::insert_user(
            db,
            "teacher@school.test",
            "Teacher",
            UserRole::Teacher,
            "pass123",
        )
        .await;
        let s1 = test_support::insert_user(db, "s1@school.test", "Ana", UserRole::Student, "pass123")
            .await;
        let s2 = test_support::insert_user(db, "s2@school.test", "Ben", UserRole::Student, "pass123")
            .await;
        let class_id = test_support::insert_class(
            db,
            "Math",
            &teacher.id,
            &[s1.id.clone(), s2.id.clone()],
        )
        .await;
        let token = test_support::bearer_token(&teacher, ctx.state.settings());

        for records in [
            json!([{ "student": s1.id, "status": "present" }, { "student": s2.id, "status": "present" }]),
            json!([{ "student": s1.id, "status": "present" }, { "student": s2.id, "status": "absent" }]),
        ] {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    "/api/attendance",
                    Some(&token),
                    Some(json!({ "class": class_id, "date": "2024-07-24", "records": records })),
                ))
                .await
                .expect("save attendance");
            let status = response.status();
            let body = test_support::read_json(response).await;
            assert_eq!(status, StatusCode::OK, "response: {body}");
            assert_eq!(body["saved"], 2);
        }

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/attendance/counts?classId={class_id}&date=2024-07-24"),
                Some(&token),
                None,
            ))
            .await
            .expect("counts");
        let counts = test_support::read_json(response).await;
        assert_eq!(counts, json!({ "present": 1, "absent": 1, "total": 2 }));

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/attendance/percentage?studentId={}", s2.id),
                Some(&token),
                None,
            ))
            .await
            .expect("percentage");
        let percentage = test_support::read_json(response).await;
        assert_eq!(percentage["percentage"], "0.00");
        assert_eq!(percentage["total"], 1);
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn batch_against_all_classes_is_rejected() {
        let ctx = test_support::setup_test_context().await;
        let teacher = test_support::insert_user(
            ctx.state.db(),
            "teacher@school.test",
            "Teacher",
            UserRole::Teacher,
            "pass123",
        )
        .await;
        let token = test_support::bearer_token(&teacher, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/attendance",
                Some(&token),
                Some(json!({ "class": "all", "date": "2024-07-24", "records": [] })),
            ))
            .await
            .expect("save attendance");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot save attendance for all classes at once.");
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn students_see_only_their_own_records_and_na_percentage() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let student =
            test_support::insert_user(db, "s1@school.test", "Ana", UserRole::Student, "pass123")
                .await;
        let token = test_support::bearer_token(&student, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/attendance/percentage?studentId=someone-else",
                Some(&token),
                None,
            ))
            .await
            .expect("percentage");
        let body = test_support::read_json(response).await;
        assert_eq!(body["student_id"], student.id.as_str());
        assert_eq!(body["percentage"], "N/A");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/attendance/summary",
                Some(&token),
                None,
            ))
            .await
            .expect("summary");
        let series = test_support::read_json(response).await;
        assert_eq!(series.as_array().map(Vec::len), Some(7));

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/attendance",
                Some(&token),
                Some(json!({ "class": "c", "date": "2024-07-24", "records": [] })),
            ))
            .await
            .expect("save attendance");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn summary_buckets_todays_batch_into_last_entry() {
        let ctx = test_support::setup_test_context().await;
        let db = ctx.state.db();
        let teacher = test_support::insert_user(
            db,
            "teacher@school.test",
            "Teacher",
            UserRole::Teacher,
            "pass123",
        )
        .await;
        let s1 = test_support::insert_user(db, "s1@school.test", "Ana", UserRole::Student, "pass123")
            .await;
        let s2 = test_support::insert_user(db, "s2@school.test", "Ben", UserRole::Student, "pass123")
            .await;
        let class_id = test_support::insert_class(
            db,
            "Math",
            &teacher.id,
            &[s1.id.clone(), s2.id.clone()],
        )
        .await;
        let token = test_support::bearer_token(&teacher, ctx.state.settings());
        let today = format_date(today_utc());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/attendance",
                Some(&token),
                Some(json!({
                    "class": class_id,
                    "date": today,
                    "records": [
                        { "student": s1.id, "status": "present" },
                        { "student": s2.id, "status": "absent" }
                    ]
                })),
            ))
            .await
            .expect("save attendance");
        assert_eq!(response.status(), StatusCode::OK);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/attendance/summary",
                Some(&token),
                None,
            ))
            .await
            .expect("summary");
        let series = test_support::read_json(response).await;
        let days = series.as_array().expect("series");

        assert_eq!(days.len(), 7);
        assert_eq!(days[6], json!({ "date": today, "present": 1, "absent": 1 }));
        for day in &days[..6] {
            assert_eq!(day["present"], 0, "day: {day}");
            assert_eq!(day["absent"], 0, "day: {day}");
        }
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn unknown_status_in_batch_returns_error_body() {
        let ctx = test_support::setup_test_context().await;
        let teacher = test_support::insert_user(
            ctx.state.db(),
            "teacher@school.test",
            "Teacher",
            UserRole::Teacher,
            "pass123",
        )
        .await;
        let token = test_support::bearer_token(&teacher, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/attendance",
                Some(&token),
                Some(json!({
                    "class": "c1",
                    "date": "2024-07-24",
                    "records": [{ "student": "s1", "status": "late" }]
                })),
            ))
            .await
            .expect("save attendance");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().is_some_and(|message| message.contains("late")));
    }

    #[tokio::test]
    #[ignore = "requires postgres"]
    async fn last_representable_date_is_a_bad_request() {
        let ctx = test_support::setup_test_context().await;
        let teacher = test_support::insert_user(
            ctx.state.db(),
            "teacher@school.test",
            "Teacher",
            UserRole::Teacher,
            "pass123",
        )
        .await;
        let token = test_support::bearer_token(&teacher, ctx.state.settings());

        for uri in ["/api/attendance?date=9999-12-31", "/api/attendance/counts?date=9999-12-31"] {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(Method::GET, uri, Some(&token), None))
                .await
                .expect("query attendance");
            let status = response.status();
            let body = test_support::read_json(response).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {body}");
            assert_eq!(body["error"], "Invalid date: 9999-12-31");
        }

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/attendance",
                Some(&token),
                Some(json!({ "class": "c1", "date": "9999-12-31", "records": [] })),
            ))
            .await
            .expect("save attendance");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
        assert_eq!(body["error"], "Invalid date");
    }
}
