use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
#[ignore = "requires postgres"]
async fn admin_can_create_update_and_delete_user() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_user(
        ctx.state.db(),
        "admin@school.test",
        "Admin User",
        UserRole::Admin,
        "admin-pass",
    )
    .await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({
                "email": "teacher@school.test",
                "name": "Teacher User",
                "password": "teacher-pass",
                "role": "teacher"
            })),
        ))
        .await
        .expect("create user");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let user_id = created["id"].as_str().expect("user id").to_string();
    assert_eq!(created["role"], "teacher");
    assert_eq!(created["is_active"], true);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/users/{user_id}"),
            Some(&token),
            Some(json!({ "name": "Updated Teacher", "isActive": false })),
        ))
        .await
        .expect("update user");

    let status = response.status();
    let updated = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["name"], "Updated Teacher");
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["role"], "teacher");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/users/{user_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete user");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/users/{user_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("get user");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn role_cannot_change_through_update() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_user(
        ctx.state.db(),
        "admin@school.test",
        "Admin",
        UserRole::Admin,
        "admin-pass",
    )
    .await;
    let student = test_support::insert_user(
        ctx.state.db(),
        "student@school.test",
        "Student",
        UserRole::Student,
        "student-pass",
    )
    .await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/users/{}", student.id),
            Some(&token),
            Some(json!({ "role": "admin" })),
        ))
        .await
        .expect("update user");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "Role cannot be changed");

    let stored = repositories::users::find_by_id(ctx.state.db(), &student.id)
        .await
        .expect("load")
        .expect("student");
    assert_eq!(stored.role, UserRole::Student);
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn teacher_cannot_manage_users() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_user(
        ctx.state.db(),
        "teacher@school.test",
        "Teacher",
        UserRole::Teacher,
        "teacher-pass",
    )
    .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/users", Some(&token), None))
        .await
        .expect("list users");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["error"], "Not enough permissions");
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn inactive_user_token_is_rejected_by_guard() {
    let ctx = test_support::setup_test_context().await;

    let user = test_support::insert_user(
        ctx.state.db(),
        "inactive@school.test",
        "Inactive User",
        UserRole::Student,
        "student-pass",
    )
    .await;
    let token = test_support::bearer_token(&user, ctx.state.settings());

    repositories::users::update(
        ctx.state.db(),
        &user.id,
        repositories::users::UpdateUser {
            email: None,
            name: None,
            is_active: Some(false),
            hashed_password: None,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .expect("deactivate user");

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/auth/me", Some(&token), None))
        .await
        .expect("get me");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "response: {body}");
}
