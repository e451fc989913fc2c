pub mod auth;
pub mod cache;
pub mod classes;
pub mod courses;
pub mod middleware;
pub mod practice;
pub mod progress;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Builds the API router. Everything under `/me` requires an auth session.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/courses", get(courses::list_courses_handler))
        .route("/courses/{id}", get(courses::get_course_handler))
        .route("/tests", get(practice::list_tests_handler))
        .route("/tests/{id}", get(practice::get_test_handler))
        .route("/classes", get(classes::list_classes_handler))
        .route("/classes/{id}", get(classes::get_class_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/me/profile",
            get(progress::get_profile_handler).put(progress::update_profile_handler),
        )
        .route("/me/stats", get(progress::get_stats_handler))
        .route("/me/dashboard", get(progress::get_dashboard_handler))
        .route("/me/achievements", get(progress::list_achievements_handler))
        .route(
            "/me/achievements/{id}/unlock",
            post(progress::unlock_achievement_handler),
        )
        .route("/me/courses", get(courses::list_enrolled_courses_handler))
        .route("/me/courses/{id}/enroll", post(courses::enroll_course_handler))
        .route(
            "/me/modules/{id}/completion",
            put(courses::toggle_module_handler),
        )
        .route("/me/tests/upcoming", get(practice::upcoming_tests_handler))
        .route("/me/tests/{id}/schedule", post(practice::schedule_test_handler))
        .route("/me/tests/{id}/complete", post(practice::complete_test_handler))
        .route("/me/classes", get(classes::list_enrolled_classes_handler))
        .route("/me/classes/upcoming", get(classes::upcoming_classes_handler))
        .route("/me/classes/{id}/enroll", post(classes::enroll_class_handler))
        .route(
            "/me/classes/{id}/attendance",
            put(classes::mark_attendance_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
