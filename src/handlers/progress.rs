// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{error::AppError, models::progress::CourseProgress, utils::jwt::Claims};

/// Column list for course_progress queries.
const PROGRESS_COLUMNS: &str =
    "id, user_id, course_id, completed_lesson_ids, percentage, completed, started_at, completed_at";

/// Completion percentage as an integer 0-100.
/// A course with no lessons reports 0, never a division error.
fn completion_percentage(completed_count: usize, total_lessons: i64) -> i32 {
    if total_lessons <= 0 {
        return 0;
    }
    ((completed_count as f64 / total_lessons as f64) * 100.0).round() as i32
}

/// Marks a lesson as completed for the current user.
///
/// The whole read-modify-write cycle runs in one transaction with the
/// progress row locked, so concurrent completions of different lessons for
/// the same (user, course) pair cannot lose updates.
///
/// * Creates the progress record lazily on first completion.
/// * Re-completing an already-completed lesson is an idempotent no-op.
/// * `completed_at` is written only on the first transition to 100%.
pub async fn mark_lesson_complete(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((course_id, lesson_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = pool.begin().await?;

    // The lesson must belong to the course.
    let lesson_exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM lessons WHERE id = $1 AND course_id = $2")
            .bind(lesson_id)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?;

    if lesson_exists.is_none() {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    }

    let total_lessons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

    // Lazy creation: insert an empty record if this is the first completion.
    // ON CONFLICT keeps concurrent first completions from failing.
    sqlx::query(
        "INSERT INTO course_progress (user_id, course_id)
         VALUES ($1, $2)
         ON CONFLICT (user_id, course_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(course_id)
    .execute(&mut *tx)
    .await?;

    let query = format!(
        "SELECT {PROGRESS_COLUMNS} FROM course_progress
         WHERE user_id = $1 AND course_id = $2
         FOR UPDATE"
    );
    let record = sqlx::query_as::<_, CourseProgress>(&query)
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

    // Idempotent no-op: the record is returned unchanged, nothing is written.
    if record.completed_lesson_ids.0.contains(&lesson_id) {
        tx.commit().await?;
        return Ok(Json(record));
    }

    let mut completed_ids = record.completed_lesson_ids.0.clone();
    completed_ids.push(lesson_id);

    let percentage = completion_percentage(completed_ids.len(), total_lessons);
    let completed = percentage >= 100;

    // Write-once: only the first false->true transition stamps completed_at.
    let completed_at = match record.completed_at {
        Some(ts) => Some(ts),
        None if completed => Some(chrono::Utc::now()),
        None => None,
    };

    let query = format!(
        "UPDATE course_progress
         SET completed_lesson_ids = $1, percentage = $2, completed = $3, completed_at = $4
         WHERE id = $5
         RETURNING {PROGRESS_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, CourseProgress>(&query)
        .bind(sqlx::types::Json(&completed_ids))
        .bind(percentage)
        .bind(completed)
        .bind(completed_at)
        .bind(record.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update course progress: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tx.commit().await?;

    Ok(Json(updated))
}

/// Current user's progress for one course.
pub async fn get_course_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!(
        "SELECT {PROGRESS_COLUMNS} FROM course_progress WHERE user_id = $1 AND course_id = $2"
    );
    let record = sqlx::query_as::<_, CourseProgress>(&query)
        .bind(claims.user_id())
        .bind(course_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("No progress for this course".to_string()))?;

    Ok(Json(record))
}

/// All progress records of the current user, most recently started first.
pub async fn list_my_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!(
        "SELECT {PROGRESS_COLUMNS} FROM course_progress
         WHERE user_id = $1
         ORDER BY started_at DESC"
    );
    let records = sqlx::query_as::<_, CourseProgress>(&query)
        .bind(claims.user_id())
        .fetch_all(&pool)
        .await?;

    Ok(Json(records))
}
