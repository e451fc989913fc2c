//! services/api/src/web/courses.rs
//!
//! Handlers for the course catalog, course enrollment and module completion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::rest::{
    service_error_response, CourseDetailResponse, CourseResponse, EnrolledCourseResponse,
    EnrollmentResponse, ModuleCompletionRequest, ModuleCompletionResponse,
};
use crate::web::state::AppState;

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

/// GET /courses
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "All courses, newest first", body = [CourseResponse])),
    tag = "courses"
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Vec<CourseResponse>> {
    let courses = state
        .catalog
        .list_courses()
        .await
        .map_err(service_error_response)?;
    Ok(Json(courses.into_iter().map(Into::into).collect()))
}

/// GET /courses/{id}
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "The course and its ordered modules", body = CourseDetailResponse),
        (status = 404, description = "Course not found")
    ),
    tag = "courses"
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> HandlerResult<CourseDetailResponse> {
    let detail = state
        .catalog
        .course_detail(course_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(CourseDetailResponse {
        course: detail.course.into(),
        modules: detail.modules.into_iter().map(Into::into).collect(),
    }))
}

/// POST /me/courses/{id}/enroll
#[utoipa::path(
    post,
    path = "/me/courses/{id}/enroll",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 201, description = "Enrolled with zero progress", body = EnrollmentResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    ),
    tag = "courses"
)]
pub async fn enroll_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(course_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), (StatusCode, String)> {
    let enrollment = state
        .catalog
        .enroll_in_course(user_id, course_id)
        .await
        .map_err(service_error_response)?;
    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

/// GET /me/courses
#[utoipa::path(
    get,
    path = "/me/courses",
    responses(
        (status = 200, description = "The user's enrollments with their courses", body = [EnrolledCourseResponse]),
        (status = 401, description = "Not signed in")
    ),
    tag = "courses"
)]
pub async fn list_enrolled_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Vec<EnrolledCourseResponse>> {
    let courses = state
        .catalog
        .enrolled_courses(user_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(courses.into_iter().map(Into::into).collect()))
}

/// PUT /me/modules/{id}/completion
#[utoipa::path(
    put,
    path = "/me/modules/{id}/completion",
    params(("id" = i32, Path, description = "Module id")),
    request_body = ModuleCompletionRequest,
    responses(
        (status = 200, description = "The course's recomputed progress", body = ModuleCompletionResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Module or enrollment not found"),
        (status = 409, description = "The module listing did not reflect the write"),
        (status = 503, description = "A backing read or write failed; retry the request")
    ),
    tag = "courses"
)]
pub async fn toggle_module_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(module_id): Path<i32>,
    Json(req): Json<ModuleCompletionRequest>,
) -> HandlerResult<ModuleCompletionResponse> {
    let progress = state
        .courses
        .toggle_module_completion(user_id, module_id, req.completed)
        .await
        .map_err(service_error_response)?;
    info!(%user_id, module_id, progress = progress.percent(), "Module completion updated");
    Ok(Json(ModuleCompletionResponse {
        module_id,
        completed: req.completed,
        course_progress: progress.percent(),
    }))
}
