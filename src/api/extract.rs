//! Request extractors whose rejections render as the shared `{status, error}` body.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::api::errors::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct ApiJson<T>(pub(crate) T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub(crate) struct ApiQuery<T>(pub(crate) T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub(crate) struct ApiPath<T>(pub(crate) T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected JSON body");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Method, Request, StatusCode};
    use axum::{body::Body, routing::post, Router};
    use serde::Deserialize;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::db::types::AttendanceStatus;
    use crate::test_support;

    #[derive(Debug, Deserialize)]
    struct Entry {
        #[allow(dead_code)]
        status: AttendanceStatus,
    }

    fn app() -> Router {
        Router::new()
            .route("/json", post(|ApiJson(_entry): ApiJson<Entry>| async { StatusCode::OK }))
            .route(
                "/query",
                post(|ApiQuery(_entry): ApiQuery<Entry>| async { StatusCode::OK }),
            )
    }

    #[tokio::test]
    async fn unknown_enum_variant_is_a_json_error_body() {
        let response = app()
            .oneshot(test_support::json_request(
                Method::POST,
                "/json",
                None,
                Some(json!({ "status": "late" })),
            ))
            .await
            .expect("request");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().is_some_and(|message| message.contains("late")));
    }

    #[tokio::test]
    async fn missing_content_type_is_a_json_error_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/json")
            .body(Body::from("{}"))
            .expect("request");

        let response = app().oneshot(request).await.expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn bad_query_is_a_json_error_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/query?status=late")
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .expect("request");

        let response = app().oneshot(request).await.expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = test_support::read_json(response).await;
        assert!(body["error"].is_string());
    }
}
