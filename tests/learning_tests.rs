// tests/learning_tests.rs
//
// End-to-end coverage of the two rule evaluators: lesson-completion
// progress tracking and quiz attempt grading.

use backend::{config::Config, routes, state::AppState};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;

async fn spawn_app() -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "learning_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

async fn register_and_login(client: &reqwest::Client, address: &str) -> (String, String) {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Register failed");

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found").to_string();
    (username, token)
}

/// Registers a user, promotes them to instructor and returns a token that
/// carries the instructor role.
async fn spawn_instructor(client: &reqwest::Client, address: &str) -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let (username, _token) = register_and_login(client, address).await;
    sqlx::query("UPDATE users SET role = 'instructor' WHERE username = $1")
        .bind(&username)
        .execute(&pool)
        .await
        .unwrap();

    // Fresh token so the role claim is up to date
    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": "password123"}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    login["token"].as_str().unwrap().to_string()
}

/// Creates a published course with three lessons; returns (course_id, lesson_ids).
async fn seed_course(
    client: &reqwest::Client,
    address: &str,
    instructor_token: &str,
) -> (i64, Vec<i64>) {
    let created = client
        .post(format!("{}/api/courses", address))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({
            "title": "Intro to Ownership",
            "description": "Borrowing without tears",
            "category": "Programming",
            "cover_img": "https://example.com/cover.png"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let course_id = created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap();

    let mut lesson_ids = Vec::new();
    for i in 1..=3 {
        let lesson = client
            .post(format!("{}/api/courses/{}/lessons", address, course_id))
            .header("Authorization", format!("Bearer {}", instructor_token))
            .json(&serde_json::json!({
                "title": format!("Lesson {}", i),
                "content": "..."
            }))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        lesson_ids.push(lesson["id"].as_i64().unwrap());
    }

    client
        .put(format!("{}/api/courses/{}", address, course_id))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({"is_published": true}))
        .send()
        .await
        .unwrap();

    (course_id, lesson_ids)
}

/// Creates a quiz with 3 questions worth 10 points each, correct answer
/// always option 0, passing threshold 70%, two attempts allowed.
/// Returns the quiz id.
async fn seed_quiz(
    client: &reqwest::Client,
    address: &str,
    instructor_token: &str,
    course_id: i64,
) -> i64 {
    let questions: Vec<serde_json::Value> = (1..=3)
        .map(|i| {
            serde_json::json!({
                "prompt": format!("Question {}", i),
                "options": ["right", "wrong", "also wrong", "very wrong"],
                "correct_answer_index": 0,
                "points": 10,
                "difficulty": "easy"
            })
        })
        .collect();

    let created = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({
            "course_id": course_id,
            "title": "Checkpoint quiz",
            "description": "",
            "questions": questions,
            "passing_score_percent": 70,
            "max_attempts": 2
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    created.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn test_progress_tracking_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let instructor_token = spawn_instructor(&client, &address).await;
    let (course_id, lesson_ids) = seed_course(&client, &address, &instructor_token).await;
    let (_student, token) = register_and_login(&client, &address).await;

    // 1. First completion lazily creates the record
    let progress: serde_json::Value = client
        .post(format!(
            "{}/api/courses/{}/lessons/{}/complete",
            address, course_id, lesson_ids[0]
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(progress["percentage"], 33);
    assert_eq!(progress["completed"], false);
    assert!(progress["completed_at"].is_null());
    assert!(progress["started_at"].is_string());

    // 2. Re-completing the same lesson is an idempotent no-op
    let repeat: serde_json::Value = client
        .post(format!(
            "{}/api/courses/{}/lessons/{}/complete",
            address, course_id, lesson_ids[0]
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(repeat, progress);

    // 3. Completing the rest reaches 100% and stamps completed_at once
    client
        .post(format!(
            "{}/api/courses/{}/lessons/{}/complete",
            address, course_id, lesson_ids[1]
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    let done: serde_json::Value = client
        .post(format!(
            "{}/api/courses/{}/lessons/{}/complete",
            address, course_id, lesson_ids[2]
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(done["percentage"], 100);
    assert_eq!(done["completed"], true);
    let completed_at = done["completed_at"]
        .as_str()
        .expect("completed_at must be set")
        .to_string();

    // 4. completed_at never changes afterwards
    let after: serde_json::Value = client
        .post(format!(
            "{}/api/courses/{}/lessons/{}/complete",
            address, course_id, lesson_ids[0]
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["completed_at"].as_str().unwrap(), completed_at);

    // 5. The record is readable on its own
    let fetched: serde_json::Value = client
        .get(format!("{}/api/courses/{}/progress", address, course_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["percentage"], 100);

    // 6. Unknown lesson is a 404, not a progress mutation
    let missing = client
        .post(format!(
            "{}/api/courses/{}/lessons/999999/complete",
            address, course_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn test_quiz_attempt_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let instructor_token = spawn_instructor(&client, &address).await;
    let (course_id, _lessons) = seed_course(&client, &address, &instructor_token).await;
    let quiz_id = seed_quiz(&client, &address, &instructor_token, course_id).await;
    let (_student, token) = register_and_login(&client, &address).await;

    // 1. The learner-facing view hides answer keys
    let quiz: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    for q in questions {
        assert!(q.get("correct_answer_index").is_none());
    }
    let qids: Vec<String> = questions
        .iter()
        .map(|q| q["id"].as_str().unwrap().to_string())
        .collect();

    // 2. First attempt is number 1
    let attempt: serde_json::Value = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["attempt_number"], 1);
    let attempt_id = attempt["id"].as_i64().unwrap();

    // 3. 2 of 3 correct: 20 points, 66.67% < 70% threshold, plus an
    // unknown question id that must be silently dropped.
    let submitted: serde_json::Value = client
        .post(format!(
            "{}/api/quizzes/{}/attempts/{}/submit",
            address, quiz_id, attempt_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "answers": [
                {"question_id": qids[0], "selected_answer_index": 0, "time_spent_seconds": 20},
                {"question_id": qids[1], "selected_answer_index": 0, "time_spent_seconds": 25},
                {"question_id": qids[2], "selected_answer_index": 3, "time_spent_seconds": 15},
                {"question_id": "ghost", "selected_answer_index": 0, "time_spent_seconds": 5}
            ],
            "time_spent_seconds": 65
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(submitted["score"], 20);
    assert!((submitted["percentage"].as_f64().unwrap() - 200.0 / 3.0).abs() < 1e-6);
    assert_eq!(submitted["passed"], false);
    assert_eq!(submitted["time_spent_seconds"], 65);
    assert_eq!(submitted["answers"].as_array().unwrap().len(), 3);
    assert!(submitted["completed_at"].is_string());

    // 4. Double submission is rejected
    let resubmit = client
        .post(format!(
            "{}/api/quizzes/{}/attempts/{}/submit",
            address, quiz_id, attempt_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"answers": [], "time_spent_seconds": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resubmit.status().as_u16(), 409);

    // 5. Second attempt is number 2 regardless of the first one's outcome
    let attempt2: serde_json::Value = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt2["attempt_number"], 2);
    let attempt2_id = attempt2["id"].as_i64().unwrap();

    // All correct: full score, passed
    let submitted2: serde_json::Value = client
        .post(format!(
            "{}/api/quizzes/{}/attempts/{}/submit",
            address, quiz_id, attempt2_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "answers": qids.iter().map(|id| serde_json::json!({
                "question_id": id, "selected_answer_index": 0, "time_spent_seconds": 10
            })).collect::<Vec<_>>(),
            "time_spent_seconds": 30
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(submitted2["score"], 30);
    assert_eq!(submitted2["percentage"], 100.0);
    assert_eq!(submitted2["passed"], true);

    // 6. max_attempts = 2: the third start is rejected before creating
    // any record.
    let third = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(third.status().as_u16(), 409);

    let attempts: Vec<serde_json::Value> = client
        .get(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.len(), 2);

    // 7. Deactivated quizzes accept no new attempts
    client
        .put(format!("{}/api/quizzes/{}/active", address, quiz_id))
        .header("Authorization", format!("Bearer {}", instructor_token))
        .json(&serde_json::json!({"is_active": false}))
        .send()
        .await
        .unwrap();

    let (_other, other_token) = register_and_login(&client, &address).await;
    let inactive = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", other_token))
        .send()
        .await
        .unwrap();
    assert_eq!(inactive.status().as_u16(), 409);
}

#[tokio::test]
async fn test_attempts_are_private_to_their_owner() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let instructor_token = spawn_instructor(&client, &address).await;
    let (course_id, _lessons) = seed_course(&client, &address, &instructor_token).await;
    let quiz_id = seed_quiz(&client, &address, &instructor_token, course_id).await;

    let (_user_a, token_a) = register_and_login(&client, &address).await;
    let (_user_b, token_b) = register_and_login(&client, &address).await;

    let attempt: serde_json::Value = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let attempt_id = attempt["id"].as_i64().unwrap();

    // B cannot submit A's attempt
    let forbidden = client
        .post(format!(
            "{}/api/quizzes/{}/attempts/{}/submit",
            address, quiz_id, attempt_id
        ))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({"answers": [], "time_spent_seconds": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
}

#[tokio::test]
async fn test_profile_aggregates_learning_stats() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let instructor_token = spawn_instructor(&client, &address).await;
    let (course_id, lesson_ids) = seed_course(&client, &address, &instructor_token).await;
    let quiz_id = seed_quiz(&client, &address, &instructor_token, course_id).await;
    let (_student, token) = register_and_login(&client, &address).await;

    // Complete the whole course
    for lesson_id in &lesson_ids {
        client
            .post(format!(
                "{}/api/courses/{}/lessons/{}/complete",
                address, course_id, lesson_id
            ))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap();
    }

    // Pass the quiz
    let quiz: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let qids: Vec<String> = quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_str().unwrap().to_string())
        .collect();

    let attempt: serde_json::Value = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    client
        .post(format!(
            "{}/api/quizzes/{}/attempts/{}/submit",
            address,
            quiz_id,
            attempt["id"].as_i64().unwrap()
        ))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "answers": qids.iter().map(|id| serde_json::json!({
                "question_id": id, "selected_answer_index": 0, "time_spent_seconds": 10
            })).collect::<Vec<_>>(),
            "time_spent_seconds": 30
        }))
        .send()
        .await
        .unwrap();

    let me: serde_json::Value = client
        .get(format!("{}/api/profile/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(me["courses_started"], 1);
    assert_eq!(me["courses_completed"], 1);
    assert_eq!(me["quizzes_passed"], 1);

    let my_progress: Vec<serde_json::Value> = client
        .get(format!("{}/api/profile/progress", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(my_progress.len(), 1);
    assert_eq!(my_progress[0]["course_id"].as_i64(), Some(course_id));
}
