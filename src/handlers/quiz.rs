// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptAnswer, QuizAttempt, SubmitAttemptRequest, SubmittedAnswer},
        quiz::{CreateQuizRequest, PublicQuiz, Question, Quiz, SetQuizActiveRequest},
    },
    utils::jwt::Claims,
};

/// Column list for quizzes queries.
const QUIZ_COLUMNS: &str = "id, course_id, creator_id, title, description, questions, \
    time_limit_minutes, passing_score_percent, max_attempts, is_active, created_at";

/// Column list for quiz_attempts queries.
const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, attempt_number, answers, score, \
    percentage, passed, time_spent_seconds, started_at, completed_at";

/// Result of grading one answer set against a quiz definition.
#[derive(Debug, PartialEq)]
struct GradedAttempt {
    answers: Vec<AttemptAnswer>,
    /// Sum of point values over correct answers.
    score: i32,
    correct_count: usize,
    /// 100 * correct_count / question_count. Unrounded; 0 for an empty quiz.
    percentage: f64,
}

/// Grades a submitted answer set.
///
/// * Entries whose question_id matches no question are silently dropped.
/// * Duplicate entries for the same question: the first one wins.
/// * Missing entries simply do not contribute; they are not marked incorrect.
fn grade_attempt(questions: &[Question], submitted: &[SubmittedAnswer]) -> GradedAttempt {
    let by_id: HashMap<&str, &Question> =
        questions.iter().map(|q| (q.id.as_str(), q)).collect();

    let mut answers = Vec::with_capacity(submitted.len());
    let mut score = 0;
    let mut correct_count = 0;

    for entry in submitted {
        let Some(question) = by_id.get(entry.question_id.as_str()) else {
            continue;
        };
        if answers
            .iter()
            .any(|a: &AttemptAnswer| a.question_id == entry.question_id)
        {
            continue;
        }

        let is_correct = entry.selected_answer_index == question.correct_answer_index;
        if is_correct {
            score += question.points;
            correct_count += 1;
        }

        answers.push(AttemptAnswer {
            question_id: entry.question_id.clone(),
            selected_answer_index: entry.selected_answer_index,
            is_correct,
            time_spent_seconds: entry.time_spent_seconds,
        });
    }

    let percentage = if questions.is_empty() {
        0.0
    } else {
        (correct_count as f64 / questions.len() as f64) * 100.0
    };

    GradedAttempt {
        answers,
        score,
        correct_count,
        percentage,
    }
}

/// Creates a new quiz for a course.
///
/// Question IDs are assigned server-side ("q1", "q2", ...). The requested
/// `max_attempts` is clamped to the creator's role cap.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE id = $1")
        .bind(payload.course_id)
        .fetch_optional(&pool)
        .await?;

    if course_exists.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let max_attempts = payload.max_attempts.min(claims.role.max_attempt_cap());

    let questions: Vec<Question> = payload
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| Question {
            id: format!("q{}", i + 1),
            prompt: q.prompt,
            options: q.options,
            correct_answer_index: q.correct_answer_index,
            points: q.points,
            difficulty: q.difficulty,
        })
        .collect();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO quizzes
            (course_id, creator_id, title, description, questions,
             time_limit_minutes, passing_score_percent, max_attempts)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id",
    )
    .bind(payload.course_id)
    .bind(claims.user_id())
    .bind(payload.title)
    .bind(payload.description)
    .bind(sqlx::types::Json(&questions))
    .bind(payload.time_limit_minutes)
    .bind(payload.passing_score_percent)
    .bind(max_attempts)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Lists a course's active quizzes (answer keys hidden).
pub async fn list_course_quizzes(
    State(pool): State<PgPool>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes
         WHERE course_id = $1 AND is_active = TRUE
         ORDER BY created_at DESC"
    );
    let quizzes = sqlx::query_as::<_, Quiz>(&query)
        .bind(course_id)
        .fetch_all(&pool)
        .await?;

    let public: Vec<PublicQuiz> = quizzes.into_iter().map(PublicQuiz::from).collect();

    Ok(Json(public))
}

/// Retrieves one quiz (answer keys hidden).
///
/// Inactive quizzes are visible only to their creator and admins; everyone
/// else gets a 404 rather than a hint that the quiz exists.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1");
    let quiz = sqlx::query_as::<_, Quiz>(&query)
        .bind(quiz_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_active && quiz.creator_id != claims.user_id() && !claims.role.can_moderate() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(Json(PublicQuiz::from(quiz)))
}

/// Starts a new attempt on a quiz.
///
/// The quiz row is locked for the duration of the transaction so the
/// prior-attempt count and the insert are atomic: two concurrent starts
/// cannot both observe the same count and collide on attempt_number.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let mut tx = pool.begin().await?;

    let query = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1 FOR UPDATE");
    let quiz = sqlx::query_as::<_, Quiz>(&query)
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_active {
        return Err(AppError::Conflict("Quiz is not active".to_string()));
    }

    let prior_attempts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND user_id = $2",
    )
    .bind(quiz_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    if prior_attempts >= quiz.max_attempts as i64 {
        return Err(AppError::Conflict(format!(
            "Attempt limit reached ({} of {})",
            prior_attempts, quiz.max_attempts
        )));
    }

    let query = format!(
        "INSERT INTO quiz_attempts (quiz_id, user_id, attempt_number)
         VALUES ($1, $2, $3)
         RETURNING {ATTEMPT_COLUMNS}"
    );
    let attempt = sqlx::query_as::<_, QuizAttempt>(&query)
        .bind(quiz_id)
        .bind(user_id)
        .bind(prior_attempts as i32 + 1)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz attempt: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Submits answers for an attempt and grades them.
///
/// A second submission of the same attempt is rejected with 409 rather
/// than silently overwriting the first result. Late submissions are
/// accepted; the time limit is a client-driven countdown.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, attempt_id)): Path<(i64, i64)>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    let query = format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
         WHERE id = $1 AND quiz_id = $2
         FOR UPDATE"
    );
    let attempt = sqlx::query_as::<_, QuizAttempt>(&query)
        .bind(attempt_id)
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "This attempt belongs to another user".to_string(),
        ));
    }

    if attempt.completed_at.is_some() {
        return Err(AppError::Conflict(
            "Attempt has already been submitted".to_string(),
        ));
    }

    let query = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1");
    let quiz = sqlx::query_as::<_, Quiz>(&query)
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let graded = grade_attempt(&quiz.questions.0, &payload.answers);
    let passed = graded.percentage >= quiz.passing_score_percent as f64;

    tracing::debug!(
        "Graded attempt {}: {}/{} correct, score {}, passed {}",
        attempt.id,
        graded.correct_count,
        quiz.questions.0.len(),
        graded.score,
        passed
    );

    let query = format!(
        "UPDATE quiz_attempts
         SET answers = $1, score = $2, percentage = $3, passed = $4,
             time_spent_seconds = $5, completed_at = NOW()
         WHERE id = $6
         RETURNING {ATTEMPT_COLUMNS}"
    );
    let submitted = sqlx::query_as::<_, QuizAttempt>(&query)
        .bind(sqlx::types::Json(&graded.answers))
        .bind(graded.score)
        .bind(graded.percentage)
        .bind(passed)
        .bind(payload.time_spent_seconds)
        .bind(attempt.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to submit quiz attempt: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tx.commit().await?;

    Ok(Json(submitted))
}

/// Current user's attempts on a quiz, newest first.
pub async fn list_my_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
         WHERE quiz_id = $1 AND user_id = $2
         ORDER BY attempt_number DESC"
    );
    let attempts = sqlx::query_as::<_, QuizAttempt>(&query)
        .bind(quiz_id)
        .bind(claims.user_id())
        .fetch_all(&pool)
        .await?;

    Ok(Json(attempts))
}

/// Activates or deactivates a quiz. Creator or admin only.
pub async fn set_quiz_active(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SetQuizActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let creator_id: i64 = sqlx::query_scalar("SELECT creator_id FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if creator_id != claims.user_id() && !claims.role.can_moderate() {
        return Err(AppError::Forbidden(
            "Only the quiz creator or an admin may change availability".to_string(),
        ));
    }

    sqlx::query("UPDATE quizzes SET is_active = $1 WHERE id = $2")
        .bind(payload.is_active)
        .bind(quiz_id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::OK)
}
