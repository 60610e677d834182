use std::collections::HashMap;

use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, PrimitiveDateTime};
use uuid::Uuid;

use crate::db::types::AttendanceStatus;
use crate::services::attendance_summary::{AttendanceFilter, StatusCounts};

/// An attendance record joined with the student and class display names.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct AttendanceRow {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) class_id: String,
    pub(crate) class_name: String,
    pub(crate) attendance_date: PrimitiveDateTime,
    pub(crate) status: AttendanceStatus,
    pub(crate) marked_by: String,
    pub(crate) marked_at: PrimitiveDateTime,
}

#[derive(Debug, FromRow)]
struct DayCounts {
    day: Date,
    present: i64,
    absent: i64,
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AttendanceFilter) {
    builder.push(" WHERE TRUE");
    if let Some(class_id) = filter.class_id.as_ref() {
        builder.push(" AND a.class_id = ");
        builder.push_bind(class_id.clone());
    }
    if let Some(student_id) = filter.student_id.as_ref() {
        builder.push(" AND a.student_id = ");
        builder.push_bind(student_id.clone());
    }
    if let Some((start, end)) = filter.range {
        builder.push(" AND a.attendance_date >= ");
        builder.push_bind(start);
        builder.push(" AND a.attendance_date < ");
        builder.push_bind(end);
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &AttendanceFilter,
) -> Result<Vec<AttendanceRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT a.id, a.student_id, s.name AS student_name, a.class_id, c.name AS class_name,
                a.attendance_date, a.status, a.marked_by, a.marked_at
         FROM attendance_records a
         JOIN users s ON s.id = a.student_id
         JOIN classes c ON c.id = a.class_id",
    );
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY a.attendance_date DESC, c.name ASC, s.name ASC");

    builder.build_query_as::<AttendanceRow>().fetch_all(pool).await
}

pub(crate) async fn count_by_status(
    pool: &PgPool,
    filter: &AttendanceFilter,
) -> Result<StatusCounts, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FILTER (WHERE a.status = 'present') AS present,
                COUNT(*) FILTER (WHERE a.status = 'absent') AS absent
         FROM attendance_records a",
    );
    push_filter(&mut builder, filter);

    let (present, absent) =
        builder.build_query_as::<(i64, i64)>().fetch_one(pool).await?;
    Ok(StatusCounts { present, absent })
}

/// Per-day counts over `[start, end)`, keyed by UTC calendar day. Days without
/// records are absent from the map.
pub(crate) async fn daily_counts(
    pool: &PgPool,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    student_id: Option<&str>,
) -> Result<HashMap<Date, StatusCounts>, sqlx::Error> {
    let filter = AttendanceFilter {
        range: Some((start, end)),
        student_id: student_id.map(str::to_string),
        ..AttendanceFilter::default()
    };

    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT a.attendance_date::date AS day,
                COUNT(*) FILTER (WHERE a.status = 'present') AS present,
                COUNT(*) FILTER (WHERE a.status = 'absent') AS absent
         FROM attendance_records a",
    );
    push_filter(&mut builder, &filter);
    builder.push(" GROUP BY day");

    let rows = builder.build_query_as::<DayCounts>().fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.day, StatusCounts { present: row.present, absent: row.absent }))
        .collect())
}

pub(crate) struct ReplaceAttendance<'a> {
    pub(crate) class_id: &'a str,
    /// Start of the UTC day the batch belongs to.
    pub(crate) day_start: PrimitiveDateTime,
    pub(crate) day_end: PrimitiveDateTime,
    pub(crate) entries: &'a [(String, AttendanceStatus)],
    pub(crate) marked_by: &'a str,
    pub(crate) marked_at: PrimitiveDateTime,
}

/// Replaces every record of one class on one day with `entries`. Delete and
/// insert share a transaction, so readers see either the old or the new batch.
pub(crate) async fn replace_for_class_date(
    pool: &PgPool,
    params: ReplaceAttendance<'_>,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        "DELETE FROM attendance_records
         WHERE class_id = $1
           AND attendance_date >= $2
           AND attendance_date < $3",
    )
    .bind(params.class_id)
    .bind(params.day_start)
    .bind(params.day_end)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    for (student_id, status) in params.entries {
        sqlx::query(
            "INSERT INTO attendance_records (
                id, student_id, class_id, attendance_date, status, marked_by, marked_at
             ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(student_id)
        .bind(params.class_id)
        .bind(params.day_start)
        .bind(*status)
        .bind(params.marked_by)
        .bind(params.marked_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        class_id = %params.class_id,
        removed,
        inserted = params.entries.len(),
        "Replaced attendance batch"
    );

    Ok(params.entries.len() as u64)
}
