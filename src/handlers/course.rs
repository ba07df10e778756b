// src/handlers/course.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::course::{
        Course, CourseDetail, CourseListParams, CreateCourseRequest, CreateLessonRequest, Lesson,
        UpdateCourseRequest,
    },
    utils::jwt::Claims,
};

/// Column list for courses queries.
const COURSE_COLUMNS: &str = "id, instructor_id, title, description, category, cover_img, \
    is_published, created_at, updated_at";

/// Column list for lessons queries.
const LESSON_COLUMNS: &str = "id, course_id, title, content, position, created_at";

/// Fetches a course and checks the caller may manage it (owner or admin).
async fn fetch_managed_course(
    pool: &PgPool,
    claims: &Claims,
    course_id: i64,
) -> Result<Course, AppError> {
    let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
    let course = sqlx::query_as::<_, Course>(&query)
        .bind(course_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if course.instructor_id != claims.user_id() && !claims.role.can_moderate() {
        return Err(AppError::Forbidden(
            "You are not the instructor of this course".to_string(),
        ));
    }

    Ok(course)
}

/// Lists published courses, optionally filtered by category and search keyword.
pub async fn list_courses(
    State(pool): State<PgPool>,
    Query(params): Query<CourseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let search_pattern = params.q.map(|k| format!("%{}%", k));

    let query = format!(
        "SELECT {COURSE_COLUMNS} FROM courses
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR category = $1)
           AND ($2::TEXT IS NULL OR title ILIKE $2)
         ORDER BY created_at DESC"
    );
    let courses = sqlx::query_as::<_, Course>(&query)
        .bind(params.category)
        .bind(search_pattern)
        .fetch_all(&pool)
        .await?;

    Ok(Json(courses))
}

/// Retrieves a single course with its lessons.
///
/// Unpublished courses are visible only to their instructor and admins.
pub async fn get_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
    let course = sqlx::query_as::<_, Course>(&query)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if !course.is_published
        && course.instructor_id != claims.user_id()
        && !claims.role.can_moderate()
    {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let query = format!(
        "SELECT {LESSON_COLUMNS} FROM lessons
         WHERE course_id = $1
         ORDER BY position ASC, id ASC"
    );
    let lessons = sqlx::query_as::<_, Lesson>(&query)
        .bind(id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(CourseDetail { course, lessons }))
}

/// Creates a new course. Instructor or admin only.
pub async fn create_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.role.can_manage_courses() {
        return Err(AppError::Forbidden(
            "Only instructors may create courses".to_string(),
        ));
    }

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO courses (instructor_id, title, description, category, cover_img)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(claims.user_id())
    .bind(payload.title)
    .bind(payload.description)
    .bind(payload.category)
    .bind(payload.cover_img)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a course. Owner or admin only. Fields are optional.
pub async fn update_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    fetch_managed_course(&pool, &claims, id).await?;

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.category.is_none()
        && payload.cover_img.is_none()
        && payload.is_published.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE courses SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(category) = payload.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category);
    }

    if let Some(cover_img) = payload.cover_img {
        separated.push("cover_img = ");
        separated.push_bind_unseparated(cover_img);
    }

    if let Some(is_published) = payload.is_published {
        separated.push("is_published = ");
        separated.push_bind_unseparated(is_published);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a course and everything hanging off it. Owner or admin only.
pub async fn delete_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_managed_course(&pool, &claims, id).await?;

    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete course: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Adds a lesson to a course. Owner or admin only.
///
/// Without an explicit position the lesson is appended after the current
/// last one.
pub async fn create_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    fetch_managed_course(&pool, &claims, course_id).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let position = match payload.position {
        Some(p) => p,
        None => {
            let max: Option<i32> =
                sqlx::query_scalar("SELECT MAX(position) FROM lessons WHERE course_id = $1")
                    .bind(course_id)
                    .fetch_one(&pool)
                    .await?;
            max.unwrap_or(0) + 1
        }
    };

    let query = format!(
        "INSERT INTO lessons (course_id, title, content, position)
         VALUES ($1, $2, $3, $4)
         RETURNING {LESSON_COLUMNS}"
    );
    let lesson = sqlx::query_as::<_, Lesson>(&query)
        .bind(course_id)
        .bind(payload.title)
        .bind(payload.content)
        .bind(position)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create lesson: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Removes a lesson from a course. Owner or admin only.
pub async fn delete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((course_id, lesson_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    fetch_managed_course(&pool, &claims, course_id).await?;

    let result = sqlx::query("DELETE FROM lessons WHERE id = $1 AND course_id = $2")
        .bind(lesson_id)
        .bind(course_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
