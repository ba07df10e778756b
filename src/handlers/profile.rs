use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, models::user::MeResponse, utils::jwt::Claims};

/// Get current user's profile and learning statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    // Subquery counts are cheap given the (user_id, ...) indexes.
    let me = sqlx::query_as::<_, MeResponse>(
        "SELECT
            u.id, u.username, u.role, u.created_at,
            (SELECT COUNT(*) FROM course_progress cp
              WHERE cp.user_id = u.id) AS courses_started,
            (SELECT COUNT(*) FROM course_progress cp
              WHERE cp.user_id = u.id AND cp.completed) AS courses_completed,
            (SELECT COUNT(DISTINCT qa.quiz_id) FROM quiz_attempts qa
              WHERE qa.user_id = u.id AND qa.passed) AS quizzes_passed
         FROM users u
         WHERE u.id = $1",
    )
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(me))
}
