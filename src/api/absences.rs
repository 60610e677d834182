use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::guards::{require_capability, scoped_student_id, Capability, CurrentUser};
use crate::api::validation::{non_blank, parse_date_field};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::absences::AbsenceWithStudent;
use crate::schemas::absence::{
    AbsenceListQuery, AbsenceResponse, AbsenceReview, AbsenceReviewResponse,
    AbsenceUploadResponse,
};
use crate::services::absence_workflow;

/// Headroom above the attachment ceiling for the other form fields.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub(crate) fn router(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(list_absences))
        .route(
            "/upload",
            post(upload_absence).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/:absence_id", get(get_absence).patch(review_absence))
}

async fn list_absences(
    ApiQuery(params): ApiQuery<AbsenceListQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AbsenceResponse>>, ApiError> {
    let student_id = scoped_student_id(&user, params.student_id);

    let absences = repositories::absences::list(
        state.db(),
        repositories::absences::ListAbsences {
            student_id: student_id.as_deref(),
            status: params.status,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list absences"))?;

    Ok(Json(absences.into_iter().map(AbsenceResponse::from_db).collect()))
}

async fn get_absence(
    ApiPath(absence_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AbsenceResponse>, ApiError> {
    let absence = fetch_absence(&state, &absence_id).await?;

    if !user.role.is_staff() && absence.absence.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    Ok(Json(AbsenceResponse::from_db(absence)))
}

async fn review_absence(
    ApiPath(absence_id): ApiPath<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AbsenceReview>,
) -> Result<Json<AbsenceReviewResponse>, ApiError> {
    require_capability(&user, Capability::ReviewAbsences)?;

    let current = fetch_absence(&state, &absence_id).await?;
    let target = absence_workflow::parse_target(payload.status.as_deref().unwrap_or_default())?;
    let decision = absence_workflow::review(
        current.absence.status,
        user.role,
        target,
        payload.comment.as_deref(),
    )?;

    let applied = repositories::absences::review(
        state.db(),
        &absence_id,
        repositories::absences::ReviewAbsence {
            status: decision.status,
            comment: &decision.comment,
            reviewed_by: &user.id,
            reviewed_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to review absence"))?;

    if !applied {
        tracing::warn!(
            absence_id = %absence_id,
            reviewer_id = %user.id,
            "Absence was reviewed concurrently"
        );
        return Err(ApiError::Conflict("Absence has already been reviewed".to_string()));
    }

    metrics::counter!("absence_transitions_total", "status" => decision.status.as_str())
        .increment(1);
    tracing::info!(
        absence_id = %absence_id,
        reviewer_id = %user.id,
        status = decision.status.as_str(),
        action = "absence_review",
        "Absence reviewed"
    );

    let absence = fetch_absence(&state, &absence_id).await?;
    Ok(Json(AbsenceReviewResponse { success: true, absence: AbsenceResponse::from_db(absence) }))
}

#[derive(Debug, Default)]
struct UploadForm {
    date: Option<String>,
    reason: Option<String>,
    student_id: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn upload_absence(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<AbsenceUploadResponse>), ApiError> {
    let form = read_upload_form(&state, multipart?).await?;

    let student_id = match user.role {
        UserRole::Student => user.id.clone(),
        _ => non_blank(form.student_id)
            .ok_or_else(|| ApiError::BadRequest("studentId is required".to_string()))?,
    };
    if student_id != user.id {
        let known = repositories::users::ids_with_role(
            state.db(),
            std::slice::from_ref(&student_id),
            UserRole::Student,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to verify student"))?;
        if known.is_empty() {
            return Err(ApiError::NotFound("Student not found".to_string()));
        }
    }

    let (Some(raw_date), Some(raw_reason)) = (non_blank(form.date), form.reason) else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };
    let absence_date = parse_date_field(&raw_date, "date")?;
    let reason = absence_workflow::submission_reason(&raw_reason)?;

    let attachment = match form.file {
        Some((original_name, bytes)) => Some(state.attachments().save(&original_name, &bytes).await?),
        None => None,
    };

    let created = repositories::absences::create(
        state.db(),
        repositories::absences::CreateAbsence {
            id: &Uuid::new_v4().to_string(),
            student_id: &student_id,
            absence_date,
            reason: &reason,
            attachment: attachment.as_deref(),
            submitted_at: primitive_now_utc(),
        },
    )
    .await;

    let absence = match created {
        Ok(absence) => absence,
        Err(err) => {
            if let Some(filename) = attachment.as_deref() {
                if let Err(remove_err) = state.attachments().remove(filename).await {
                    tracing::warn!(
                        filename = %filename,
                        error = %remove_err,
                        "Failed to remove attachment of unsaved absence"
                    );
                }
            }
            return Err(ApiError::from_db(err, "Failed to submit absence"));
        }
    };

    metrics::counter!("absence_submissions_total").increment(1);
    tracing::info!(
        absence_id = %absence.absence.id,
        student_id = %student_id,
        submitted_by = %user.id,
        has_attachment = attachment.is_some(),
        action = "absence_submit",
        "Absence submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(AbsenceUploadResponse {
            success: true,
            message: "Absence submitted successfully",
            absence: AbsenceResponse::from_db(absence),
        }),
    ))
}

/// Collects the text fields and at most one `file` part, enforcing the
/// attachment ceiling chunk by chunk.
async fn read_upload_form(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadForm, ApiError> {
    let store = state.attachments();
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if form.file.is_some() {
                    return Err(ApiError::BadRequest("Only one file may be attached".to_string()));
                }
                let original_name = field.file_name().unwrap_or_default().to_string();
                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
                {
                    store.check_size(bytes.len() as u64 + chunk.len() as u64)?;
                    bytes.extend_from_slice(&chunk);
                }
                if !bytes.is_empty() || !original_name.is_empty() {
                    form.file = Some((original_name, bytes));
                }
            }
            "date" | "reason" | "studentId" | "student_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest(format!("Invalid {name}")))?;
                match name.as_str() {
                    "date" => form.date = Some(text),
                    "reason" => form.reason = Some(text),
                    _ => form.student_id = Some(text),
                }
            }
            // `studentName` and anything else are display-only on the client.
            _ => {}
        }
    }

    Ok(form)
}

async fn fetch_absence(state: &AppState, absence_id: &str) -> Result<AbsenceWithStudent, ApiError> {
    repositories::absences::find_by_id(state.db(), absence_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch absence"))?
        .ok_or_else(|| ApiError::NotFound("Absence not found".to_string()))
}
