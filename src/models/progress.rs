// src/models/progress.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'course_progress' table: one record per (user, course).
///
/// `percentage` and `completed` are derived from `completed_lesson_ids` and
/// recomputed on every mutation; `completed_at` is written exactly once, the
/// first time the record reaches 100%.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourseProgress {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,

    /// Completed lesson IDs, stored as a JSONB array and treated as a set.
    pub completed_lesson_ids: Json<Vec<i64>>,

    /// Integer 0-100.
    pub percentage: i32,

    pub completed: bool,

    /// Set at record creation, never mutated.
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Set on the first false->true transition of `completed`, then frozen.
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}
