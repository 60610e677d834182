use std::collections::HashMap;

use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::db::models::Class;

const COLUMNS: &str =
    "c.id, c.name, c.teacher_id, c.schedule_day, c.schedule_time, c.created_at, c.updated_at";

/// A class with its teacher's display name and the roster's student ids.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ClassWithRoster {
    #[sqlx(flatten)]
    pub(crate) class: Class,
    pub(crate) teacher_name: Option<String>,
    pub(crate) student_ids: Vec<String>,
}

fn select_with_roster() -> String {
    format!(
        "SELECT {COLUMNS},
                t.name AS teacher_name,
                ARRAY(
                    SELECT cs.student_id::text FROM class_students cs
                    WHERE cs.class_id = c.id
                    ORDER BY cs.added_at, cs.student_id
                ) AS student_ids
         FROM classes c
         LEFT JOIN users t ON t.id = c.teacher_id"
    )
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<ClassWithRoster>, sqlx::Error> {
    sqlx::query_as::<_, ClassWithRoster>(&format!("{} ORDER BY c.name ASC", select_with_roster()))
        .fetch_all(pool)
        .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<ClassWithRoster>, sqlx::Error> {
    sqlx::query_as::<_, ClassWithRoster>(&format!("{} WHERE c.id = $1", select_with_roster()))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM classes").fetch_one(pool).await
}

pub(crate) struct CreateClass<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) teacher_id: &'a str,
    pub(crate) schedule_day: Option<String>,
    pub(crate) schedule_time: Option<String>,
    pub(crate) student_ids: &'a [String],
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateClass<'_>) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO classes (
            id, name, teacher_id, schedule_day, schedule_time, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$6)",
    )
    .bind(params.id)
    .bind(params.name)
    .bind(params.teacher_id)
    .bind(params.schedule_day)
    .bind(params.schedule_time)
    .bind(params.created_at)
    .execute(&mut *tx)
    .await?;

    insert_roster(&mut tx, params.id, params.student_ids, params.created_at).await?;

    tx.commit().await
}

pub(crate) struct UpdateClass {
    pub(crate) name: Option<String>,
    pub(crate) teacher_id: Option<String>,
    pub(crate) schedule_day: Option<String>,
    pub(crate) schedule_time: Option<String>,
    /// `Some` replaces the whole roster, `None` leaves it untouched.
    pub(crate) student_ids: Option<Vec<String>>,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Returns `false` when the class does not exist.
pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateClass,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE classes SET
            name = COALESCE($1, name),
            teacher_id = COALESCE($2, teacher_id),
            schedule_day = COALESCE($3, schedule_day),
            schedule_time = COALESCE($4, schedule_time),
            updated_at = $5
         WHERE id = $6",
    )
    .bind(params.name)
    .bind(params.teacher_id)
    .bind(params.schedule_day)
    .bind(params.schedule_time)
    .bind(params.updated_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    if let Some(student_ids) = params.student_ids {
        sqlx::query("DELETE FROM class_students WHERE class_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_roster(&mut tx, id, &student_ids, params.updated_at).await?;
    }

    tx.commit().await?;
    Ok(true)
}

async fn insert_roster(
    tx: &mut Transaction<'_, Postgres>,
    class_id: &str,
    student_ids: &[String],
    added_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    for student_id in student_ids {
        sqlx::query(
            "INSERT INTO class_students (class_id, student_id, added_at)
             VALUES ($1,$2,$3)
             ON CONFLICT (class_id, student_id) DO NOTHING",
        )
        .bind(class_id)
        .bind(student_id)
        .bind(added_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Class ids the student is enrolled in, ordered by class name.
pub(crate) async fn ids_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT c.id FROM class_students cs
         JOIN classes c ON c.id = cs.class_id
         WHERE cs.student_id = $1
         ORDER BY c.name",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Class ids per student for every id in `student_ids`; students without
/// enrollments map to an empty list.
pub(crate) async fn ids_for_students(
    pool: &PgPool,
    student_ids: &[String],
) -> Result<HashMap<String, Vec<String>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT cs.student_id, cs.class_id FROM class_students cs
         JOIN classes c ON c.id = cs.class_id
         WHERE cs.student_id = ANY($1)
         ORDER BY c.name",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await?;

    let mut enrollments: HashMap<String, Vec<String>> =
        student_ids.iter().map(|id| (id.clone(), Vec::new())).collect();
    for (student_id, class_id) in rows {
        enrollments.entry(student_id).or_default().push(class_id);
    }
    Ok(enrollments)
}

/// Replaces the set of classes a student is enrolled in.
pub(crate) async fn replace_enrollments(
    pool: &PgPool,
    student_id: &str,
    class_ids: &[String],
    added_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM class_students WHERE student_id = $1")
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

    for class_id in class_ids {
        sqlx::query(
            "INSERT INTO class_students (class_id, student_id, added_at)
             VALUES ($1,$2,$3)
             ON CONFLICT (class_id, student_id) DO NOTHING",
        )
        .bind(class_id)
        .bind(student_id)
        .bind(added_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Ids from `class_ids` that do not name an existing class.
pub(crate) async fn missing_ids(
    pool: &PgPool,
    class_ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if class_ids.is_empty() {
        return Ok(Vec::new());
    }
    let found = sqlx::query_scalar::<_, String>("SELECT id FROM classes WHERE id = ANY($1)")
        .bind(class_ids)
        .fetch_all(pool)
        .await?;
    Ok(class_ids.iter().filter(|id| !found.contains(id)).cloned().collect())
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM classes WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
