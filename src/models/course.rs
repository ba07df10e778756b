// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,

    /// Owning instructor (or admin).
    pub instructor_id: i64,

    pub title: String,

    pub description: String,

    /// Course category (e.g., "Programming", "Design").
    pub category: String,

    /// URL to the cover image.
    pub cover_img: String,

    /// Unpublished courses are visible only to their instructor and admins.
    pub is_published: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'lessons' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub content: String,
    /// Display order within the course.
    pub position: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for a course together with its ordered lessons.
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

/// DTO for creating a new course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[validate(length(min = 1, max = 20000))]
    pub description: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(min = 1, max = 500), custom(function = validate_url_string))]
    pub cover_img: String,
}

/// DTO for updating a course. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_img: Option<String>,
    pub is_published: Option<bool>,
}

/// DTO for adding a lesson to a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 50000))]
    pub content: String,
    /// Optional explicit position; appended at the end when absent.
    pub position: Option<i32>,
}

/// Query parameters for listing courses.
#[derive(Debug, Deserialize)]
pub struct CourseListParams {
    pub category: Option<String>,
    /// Search keyword for title match.
    pub q: Option<String>,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}
