use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::{require_capability, Capability, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::today_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attendance::StatsResponse;
use crate::services::attendance_summary::AttendanceFilter;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard_stats))
}

async fn dashboard_stats(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ApiError> {
    require_capability(&user, Capability::ViewStats)?;

    let db = state.db();
    let today = AttendanceFilter::for_day(today_utc())?;

    let (students, teachers, classes, counts) = tokio::try_join!(
        repositories::users::count_by_role(db, UserRole::Student),
        repositories::users::count_by_role(db, UserRole::Teacher),
        repositories::classes::count(db),
        repositories::attendance::count_by_status(db, &today),
    )
    .map_err(|e| ApiError::internal(e, "Failed to load dashboard stats"))?;

    Ok(Json(StatsResponse {
        total_students: students,
        total_teachers: teachers,
        total_classes: classes,
        present_today: counts.present,
        absent_today: counts.absent,
    }))
}
