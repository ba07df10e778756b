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
    models::post::{CreatePostRequest, Post, PostListParams},
    utils::{html::clean_html, jwt::Claims},
};

/// Column list for posts queries.
const POST_COLUMNS: &str = "id, user_id, title, content, likes_count, comments_count, \
    created_at, updated_at, deleted_at";

/// Create a new post. Any authenticated user.
pub async fn create_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let content = clean_html(&payload.content);

    let post_id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (user_id, title, content)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(claims.user_id())
    .bind(payload.title)
    .bind(content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": post_id})),
    ))
}

/// List posts (Recent first).
/// Filters out soft-deleted posts. Supports cursor-based pagination.
pub async fn list_posts(
    State(pool): State<PgPool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts
         WHERE deleted_at IS NULL
           AND ($1::TIMESTAMPTZ IS NULL OR created_at < $1)
         ORDER BY created_at DESC
         LIMIT $2"
    );
    let posts = sqlx::query_as::<_, Post>(&query)
        .bind(params.cursor)
        .bind(limit)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list posts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(posts))
}

/// Get a single post by ID.
pub async fn get_post(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts
         WHERE id = $1 AND deleted_at IS NULL"
    );
    let post = sqlx::query_as::<_, Post>(&query)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// Delete a post (Soft Delete).
/// Requires: Login + (Author OR Admin).
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Fetch Post to check ownership
    let author_id: i64 = sqlx::query_scalar(
        "SELECT user_id FROM posts WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    // 2. Check Permission
    if author_id != claims.user_id() && !claims.role.can_moderate() {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    // 3. Soft Delete
    sqlx::query("UPDATE posts SET deleted_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}
