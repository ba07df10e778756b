// src/models/user.rs

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::LazyLock;
use validator::Validate;

/// Closed set of account roles, stored as the Postgres enum `user_role`.
///
/// All authorization decisions go through the capability methods below;
/// handlers never compare role strings directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// May create, update and delete courses and their lessons.
    pub fn can_manage_courses(self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }

    /// May access the admin console and moderate any content.
    pub fn can_moderate(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Upper bound on `max_attempts` of quizzes created by this role.
    /// Requested values above the cap are clamped to it.
    pub fn max_attempt_cap(self) -> i32 {
        match self {
            Role::Student => 3,
            Role::Instructor | Role::Admin => 20,
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub role: Role,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Aggregated profile data for the current user.
#[derive(Debug, Serialize, FromRow)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub courses_started: i64,
    pub courses_completed: i64,
    pub quizzes_passed: i64,
}

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid username regex"));

/// Restricts usernames to letters, digits, '_', '.' and '-'.
fn validate_username_charset(username: &str) -> Result<(), validator::ValidationError> {
    if !USERNAME_RE.is_match(username) {
        return Err(validator::ValidationError::new("invalid_username_charset"));
    }
    Ok(())
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(
            min = 3,
            max = 50,
            message = "Username length must be between 3 and 50 characters."
        ),
        custom(function = validate_username_charset)
    )]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
