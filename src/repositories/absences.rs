use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, PrimitiveDateTime};

use crate::db::models::AbsenceSubmission;
use crate::db::types::AbsenceStatus;

const COLUMNS: &str = "\
    a.id, a.student_id, a.absence_date, a.reason, a.status, a.comment, a.attachment, \
    a.reviewed_by, a.reviewed_at, a.submitted_at";

/// A submission together with the submitting student's name.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct AbsenceWithStudent {
    #[sqlx(flatten)]
    pub(crate) absence: AbsenceSubmission,
    pub(crate) student_name: String,
}

fn select_with_student() -> String {
    format!(
        "SELECT {COLUMNS}, s.name AS student_name
         FROM absences a
         JOIN users s ON s.id = a.student_id"
    )
}

pub(crate) struct CreateAbsence<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) absence_date: Date,
    pub(crate) reason: &'a str,
    pub(crate) attachment: Option<&'a str>,
    pub(crate) submitted_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAbsence<'_>,
) -> Result<AbsenceWithStudent, sqlx::Error> {
    sqlx::query(
        "INSERT INTO absences (
            id, student_id, absence_date, reason, status, attachment, submitted_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.absence_date)
    .bind(params.reason)
    .bind(AbsenceStatus::Pending)
    .bind(params.attachment)
    .bind(params.submitted_at)
    .execute(pool)
    .await?;

    fetch_one_by_id(pool, params.id).await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<AbsenceWithStudent>, sqlx::Error> {
    sqlx::query_as::<_, AbsenceWithStudent>(&format!("{} WHERE a.id = $1", select_with_student()))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn fetch_one_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<AbsenceWithStudent, sqlx::Error> {
    sqlx::query_as::<_, AbsenceWithStudent>(&format!("{} WHERE a.id = $1", select_with_student()))
        .bind(id)
        .fetch_one(pool)
        .await
}

#[derive(Debug, Default)]
pub(crate) struct ListAbsences<'a> {
    pub(crate) student_id: Option<&'a str>,
    pub(crate) status: Option<AbsenceStatus>,
}

/// Newest absence date first.
pub(crate) async fn list(
    pool: &PgPool,
    filter: ListAbsences<'_>,
) -> Result<Vec<AbsenceWithStudent>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(select_with_student());
    builder.push(" WHERE TRUE");

    if let Some(student_id) = filter.student_id {
        builder.push(" AND a.student_id = ");
        builder.push_bind(student_id.to_string());
    }
    if let Some(status) = filter.status {
        builder.push(" AND a.status = ");
        builder.push_bind(status);
    }

    builder.push(" ORDER BY a.absence_date DESC, a.submitted_at DESC");

    builder.build_query_as::<AbsenceWithStudent>().fetch_all(pool).await
}

pub(crate) struct ReviewAbsence<'a> {
    pub(crate) status: AbsenceStatus,
    pub(crate) comment: &'a str,
    pub(crate) reviewed_by: &'a str,
    pub(crate) reviewed_at: PrimitiveDateTime,
}

/// Applies a review only while the submission is still pending. Returns
/// `false` when another review already moved it to a terminal state.
pub(crate) async fn review(
    pool: &PgPool,
    id: &str,
    params: ReviewAbsence<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE absences SET
            status = $1,
            comment = $2,
            reviewed_by = $3,
            reviewed_at = $4
         WHERE id = $5 AND status = $6",
    )
    .bind(params.status)
    .bind(params.comment)
    .bind(params.reviewed_by)
    .bind(params.reviewed_at)
    .bind(id)
    .bind(AbsenceStatus::Pending)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
