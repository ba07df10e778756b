// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// One graded answer inside an attempt record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptAnswer {
    pub question_id: String,
    pub selected_answer_index: usize,
    pub is_correct: bool,
    pub time_spent_seconds: i32,
}

/// Represents the 'quiz_attempts' table: one row per (quiz, user, attempt number).
///
/// Created empty by `start_attempt`, mutated exactly once at submission to
/// attach answers and final scoring, never mutated again.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,

    /// 1-based, monotonically increasing per (quiz, user).
    pub attempt_number: i32,

    /// Graded answers, stored as a JSON array. Empty until submission.
    pub answers: Json<Vec<AttemptAnswer>>,

    /// Sum of point values over correct answers.
    pub score: i32,

    /// 100 * correct_count / question_count. Unrounded.
    pub percentage: f64,

    pub passed: bool,

    pub time_spent_seconds: i32,

    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Set once, at submission.
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One answer as submitted by the learner (correctness not yet computed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub selected_answer_index: usize,
    #[serde(default)]
    pub time_spent_seconds: i32,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(length(max = 200))]
    pub answers: Vec<SubmittedAnswer>,

    /// Total wall-clock time reported by the client.
    #[validate(range(min = 0))]
    pub time_spent_seconds: i32,
}
