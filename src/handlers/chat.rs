// src/handlers/chat.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::AppError,
    models::message::{CreateMessageRequest, MessageListParams, MessageResponse},
    utils::{html::clean_html, jwt::Claims},
};

/// Lists a course channel's messages, newest first, cursor-paginated.
pub async fn list_messages(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
    Query(params): Query<MessageListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let messages = sqlx::query_as::<_, MessageResponse>(
        "SELECT m.id, m.course_id, m.user_id, u.username, m.content, m.created_at
         FROM messages m
         JOIN users u ON m.user_id = u.id
         WHERE m.course_id = $1
           AND ($2::TIMESTAMPTZ IS NULL OR m.created_at < $2)
         ORDER BY m.created_at DESC
         LIMIT $3",
    )
    .bind(course_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list messages: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(messages))
}

/// Posts a message to a course channel.
pub async fn send_message(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(&pool)
        .await?;

    if course_exists.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO messages (course_id, user_id, content)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(course_id)
    .bind(claims.user_id())
    .bind(clean_html(&payload.content))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to send message: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}
