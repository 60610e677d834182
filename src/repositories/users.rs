use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{Date, PrimitiveDateTime};

use crate::db::models::{EmergencyContact, User};
use crate::db::types::UserRole;

pub(crate) const COLUMNS: &str = "\
    id, email, hashed_password, name, role, is_active, enrollment_date, major, \
    current_classes, emergency_contact, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_role_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<UserRole>, sqlx::Error> {
    sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[derive(Debug, Default)]
pub(crate) struct ListUsers<'a> {
    pub(crate) role: Option<UserRole>,
    pub(crate) email: Option<&'a str>,
    pub(crate) is_active: Option<bool>,
    /// Only users on the roster of this class.
    pub(crate) class_id: Option<&'a str>,
}

pub(crate) async fn list(pool: &PgPool, filter: ListUsers<'_>) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users"));
    let mut has_where = false;

    if let Some(role) = filter.role {
        push_condition(&mut builder, &mut has_where);
        builder.push("role = ");
        builder.push_bind(role);
    }
    if let Some(email) = filter.email {
        push_condition(&mut builder, &mut has_where);
        builder.push("email = ");
        builder.push_bind(email.to_string());
    }
    if let Some(is_active) = filter.is_active {
        push_condition(&mut builder, &mut has_where);
        builder.push("is_active = ");
        builder.push_bind(is_active);
    }
    if let Some(class_id) = filter.class_id {
        push_condition(&mut builder, &mut has_where);
        builder.push("id IN (SELECT student_id FROM class_students WHERE class_id = ");
        builder.push_bind(class_id.to_string());
        builder.push(")");
    }

    builder.push(" ORDER BY name ASC, created_at ASC");

    builder.build_query_as::<User>().fetch_all(pool).await
}

fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, has_where: &mut bool) {
    builder.push(if *has_where { " AND " } else { " WHERE " });
    *has_where = true;
}

pub(crate) async fn count_by_role(pool: &PgPool, role: UserRole) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
        .bind(role)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateUser<'a> {
    pub(crate) id: &'a str,
    pub(crate) email: &'a str,
    pub(crate) hashed_password: String,
    pub(crate) name: &'a str,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) enrollment_date: Option<Date>,
    pub(crate) major: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, email, hashed_password, name, role, is_active,
            enrollment_date, major, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.email)
    .bind(params.hashed_password)
    .bind(params.name)
    .bind(params.role)
    .bind(params.is_active)
    .bind(params.enrollment_date)
    .bind(params.major)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

/// Account fields only; the role is immutable after creation.
pub(crate) struct UpdateUser {
    pub(crate) email: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) is_active: Option<bool>,
    pub(crate) hashed_password: Option<String>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateUser,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            email = COALESCE($1, email),
            name = COALESCE($2, name),
            is_active = COALESCE($3, is_active),
            hashed_password = COALESCE($4, hashed_password),
            updated_at = $5
         WHERE id = $6
         RETURNING {COLUMNS}",
    ))
    .bind(params.email)
    .bind(params.name)
    .bind(params.is_active)
    .bind(params.hashed_password)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct UpdateProfile {
    pub(crate) enrollment_date: Option<Date>,
    pub(crate) major: Option<String>,
    pub(crate) current_classes: Option<Vec<String>>,
    pub(crate) emergency_contact: Option<EmergencyContact>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update_profile(
    pool: &PgPool,
    id: &str,
    params: UpdateProfile,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            enrollment_date = COALESCE($1, enrollment_date),
            major = COALESCE($2, major),
            current_classes = COALESCE($3, current_classes),
            emergency_contact = COALESCE($4, emergency_contact),
            updated_at = $5
         WHERE id = $6
         RETURNING {COLUMNS}",
    ))
    .bind(params.enrollment_date)
    .bind(params.major)
    .bind(params.current_classes.map(Json))
    .bind(params.emergency_contact.map(Json))
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Removes a user. Returns `false` when no row matched.
pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn set_admin_credentials(
    pool: &PgPool,
    id: &str,
    hashed_password: &str,
    updated_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users
         SET hashed_password = $1, role = $2, is_active = TRUE, updated_at = $3
         WHERE id = $4",
    )
    .bind(hashed_password)
    .bind(UserRole::Admin)
    .bind(updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Subset of `ids` that belong to users with `role`.
pub(crate) async fn ids_with_role(
    pool: &PgPool,
    ids: &[String],
    role: UserRole,
) -> Result<Vec<String>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE id = ANY($1) AND role = $2")
        .bind(ids)
        .bind(role)
        .fetch_all(pool)
        .await
}
