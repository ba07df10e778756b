// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, chat, community, course, interaction, profile, progress, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, courses, quizzes, posts, profile, admin).
/// * Applies global middleware (Trace, CORS) and rate limiting on auth.
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Credential endpoints get a per-IP rate limit. Requires serving with
    // connect info so the peer address is available to the key extractor.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(50)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf));

    let course_routes = Router::new()
        // Public browsing
        .route("/", get(course::list_courses))
        // Everything below requires a valid token
        .merge(
            Router::new()
                .route("/", post(course::create_course))
                .route(
                    "/{id}",
                    get(course::get_course)
                        .put(course::update_course)
                        .delete(course::delete_course),
                )
                .route("/{id}/lessons", post(course::create_lesson))
                .route(
                    "/{id}/lessons/{lesson_id}",
                    delete(course::delete_lesson),
                )
                .route(
                    "/{id}/lessons/{lesson_id}/complete",
                    post(progress::mark_lesson_complete),
                )
                .route("/{id}/progress", get(progress::get_course_progress))
                .route("/{id}/quizzes", get(quiz::list_course_quizzes))
                .route(
                    "/{id}/messages",
                    get(chat::list_messages).post(chat::send_message),
                )
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let quiz_routes = Router::new()
        .route("/", post(quiz::create_quiz))
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/active", put(quiz::set_quiz_active))
        .route(
            "/{id}/attempts",
            post(quiz::start_attempt).get(quiz::list_my_attempts),
        )
        .route(
            "/{id}/attempts/{attempt_id}/submit",
            post(quiz::submit_attempt),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let post_routes = Router::new()
        .route("/", get(community::list_posts))
        .route("/{id}", get(community::get_post))
        .route("/{id}/comments", get(interaction::list_comments))
        .merge(
            Router::new()
                .route("/", post(community::create_post))
                .route("/{id}", delete(community::delete_post))
                .route("/{id}/like", post(interaction::toggle_like))
                .route("/{id}/comments", post(interaction::create_comment))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/progress", get(progress::list_my_progress))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
