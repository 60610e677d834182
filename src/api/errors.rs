use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::absence_workflow::WorkflowError;
use crate::services::attachments::AttachmentError;
use crate::services::attendance_summary::FilterError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Maps constraint violations to client errors, everything else to 500.
    pub(crate) fn from_db(err: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::BadRequest("Resource already exists".to_string());
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(
                    "Operation violates a reference to another record".to_string(),
                );
            }
        }
        Self::internal(err, context)
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotPermitted => ApiError::Forbidden("Not enough permissions"),
            WorkflowError::AlreadyFinalized(_) => ApiError::Conflict(err.to_string()),
            WorkflowError::InvalidTarget
            | WorkflowError::CommentRequired
            | WorkflowError::EmptyReason
            | WorkflowError::ReasonTooLong => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AttachmentError> for ApiError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::TooLarge { .. } => ApiError::BadRequest(err.to_string()),
            AttachmentError::Io(io) => ApiError::internal(io, "Failed to store attachment"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::TooManyRequests(message) => message.to_string(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => message,
        };

        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), error: message }))
                .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn error_body_carries_status_and_message() {
        let response =
            ApiError::BadRequest("Missing required fields".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], 400);
        assert_eq!(json["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn unauthorized_sets_www_authenticate() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn workflow_errors_map_to_http_codes() {
        use crate::db::types::AbsenceStatus;

        assert_eq!(ApiError::from(WorkflowError::NotPermitted).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(WorkflowError::AlreadyFinalized(AbsenceStatus::Approved)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(WorkflowError::CommentRequired).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn attachment_limit_maps_to_bad_request() {
        let response = ApiError::from(AttachmentError::TooLarge { limit_mb: 5 }).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "File size exceeds 5MB limit");
    }
}
