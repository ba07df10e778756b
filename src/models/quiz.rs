// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// One question inside a quiz document.
///
/// Questions live as a JSONB array on the quiz row; they have no table of
/// their own. IDs are assigned server-side at creation ("q1", "q2", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    /// 2 to 6 answer options.
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct_answer_index: usize,
    /// 1 to 10 points.
    pub points: i32,
    /// Informational tag ("easy", "medium", "hard"); not used in scoring.
    pub difficulty: Option<String>,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: String,

    /// Ordered question list, stored as a JSON array in the database.
    pub questions: Json<Vec<Question>>,

    /// If present, the client force-submits when the countdown elapses.
    pub time_limit_minutes: Option<i32>,

    /// Minimum percentage for a passing attempt, 1-100.
    pub passing_score_percent: i32,

    /// Attempts allowed per learner, 1-20 (clamped by the creator's role).
    pub max_attempts: i32,

    /// Inactive quizzes are not offered to learners.
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for sending a question to learners (excludes the answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: i32,
    pub difficulty: Option<String>,
}

/// DTO for sending a quiz to learners (questions without answer keys).
#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub questions: Vec<PublicQuestion>,
    pub time_limit_minutes: Option<i32>,
    pub passing_score_percent: i32,
    pub max_attempts: i32,
    pub is_active: bool,
}

impl From<Quiz> for PublicQuiz {
    fn from(quiz: Quiz) -> Self {
        let questions = quiz
            .questions
            .0
            .into_iter()
            .map(|q| PublicQuestion {
                id: q.id,
                prompt: q.prompt,
                options: q.options,
                points: q.points,
                difficulty: q.difficulty,
            })
            .collect();

        PublicQuiz {
            id: quiz.id,
            course_id: quiz.course_id,
            title: quiz.title,
            description: quiz.description,
            questions,
            time_limit_minutes: quiz.time_limit_minutes,
            passing_score_percent: quiz.passing_score_percent,
            max_attempts: quiz.max_attempts,
            is_active: quiz.is_active,
        }
    }
}

/// DTO for one authored question.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_answer_index))]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[validate(range(min = 1, max = 10))]
    pub points: i32,
    #[validate(length(max = 20))]
    pub difficulty: Option<String>,
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub course_id: i64,
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 100), nested)]
    pub questions: Vec<QuestionInput>,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub passing_score_percent: i32,
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: i32,
}

/// DTO for toggling quiz availability.
#[derive(Debug, Deserialize)]
pub struct SetQuizActiveRequest {
    pub is_active: bool,
}

/// Every question needs 2-6 options, each non-empty and bounded.
fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 6 {
        return Err(validator::ValidationError::new("option_count_out_of_range"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length_out_of_range"));
        }
    }
    Ok(())
}

/// The correct answer must point at an existing option.
fn validate_answer_index(q: &QuestionInput) -> Result<(), validator::ValidationError> {
    if q.correct_answer_index >= q.options.len() {
        return Err(validator::ValidationError::new("answer_index_out_of_range"));
    }
    Ok(())
}
