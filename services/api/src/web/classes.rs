//! services/api/src/web/classes.rs
//!
//! Handlers for live classes: browsing, enrollment and attendance.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use prep_core::ClassCategory;
use std::sync::Arc;
use uuid::Uuid;

use crate::web::rest::{
    service_error_response, AttendanceRequest, ClassDetailResponse, ClassEnrollmentResponse,
    ClassQuery, ClassResponse, LimitQuery,
};
use crate::web::state::AppState;

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

/// GET /classes
#[utoipa::path(
    get,
    path = "/classes",
    params(ClassQuery),
    responses(
        (status = 200, description = "Classes by start time", body = [ClassResponse]),
        (status = 400, description = "Unknown category")
    ),
    tag = "classes"
)]
pub async fn list_classes_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClassQuery>,
) -> HandlerResult<Vec<ClassResponse>> {
    let category = match query.category.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(ClassCategory::parse(raw).ok_or_else(|| {
            (StatusCode::BAD_REQUEST, format!("Unknown class category '{}'", raw))
        })?),
    };
    let classes = state
        .catalog
        .list_classes(category)
        .await
        .map_err(service_error_response)?;
    Ok(Json(classes.into_iter().map(Into::into).collect()))
}

/// GET /classes/{id}
#[utoipa::path(
    get,
    path = "/classes/{id}",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 200, description = "The class and how many seats are taken", body = ClassDetailResponse),
        (status = 404, description = "Class not found")
    ),
    tag = "classes"
)]
pub async fn get_class_handler(
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<Uuid>,
) -> HandlerResult<ClassDetailResponse> {
    let (class, enrolled_count) = tokio::try_join!(
        state.catalog.class_detail(class_id),
        state.catalog.class_enrollment_count(class_id),
    )
    .map_err(service_error_response)?;
    Ok(Json(ClassDetailResponse {
        class: class.into(),
        enrolled_count,
    }))
}

/// POST /me/classes/{id}/enroll
#[utoipa::path(
    post,
    path = "/me/classes/{id}/enroll",
    params(("id" = Uuid, Path, description = "Class id")),
    responses(
        (status = 201, description = "Enrolled in the class", body = ClassEnrollmentResponse),
        (status = 400, description = "The class is full"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Already enrolled")
    ),
    tag = "classes"
)]
pub async fn enroll_class_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(class_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ClassEnrollmentResponse>), (StatusCode, String)> {
    let enrollment = state
        .catalog
        .enroll_in_class(user_id, class_id)
        .await
        .map_err(service_error_response)?;
    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

/// PUT /me/classes/{id}/attendance
#[utoipa::path(
    put,
    path = "/me/classes/{id}/attendance",
    params(("id" = Uuid, Path, description = "Class id")),
    request_body = AttendanceRequest,
    responses(
        (status = 200, description = "The updated enrollment", body = ClassEnrollmentResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Not enrolled in this class")
    ),
    tag = "classes"
)]
pub async fn mark_attendance_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(class_id): Path<Uuid>,
    Json(req): Json<AttendanceRequest>,
) -> HandlerResult<ClassEnrollmentResponse> {
    let enrollment = state
        .catalog
        .mark_class_attendance(user_id, class_id, req.attended)
        .await
        .map_err(service_error_response)?;
    Ok(Json(enrollment.into()))
}

/// GET /me/classes
#[utoipa::path(
    get,
    path = "/me/classes",
    responses(
        (status = 200, description = "The user's class enrollments", body = [ClassEnrollmentResponse]),
        (status = 401, description = "Not signed in")
    ),
    tag = "classes"
)]
pub async fn list_enrolled_classes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Vec<ClassEnrollmentResponse>> {
    let enrollments = state
        .catalog
        .enrolled_classes(user_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(enrollments.into_iter().map(Into::into).collect()))
}

/// GET /me/classes/upcoming
#[utoipa::path(
    get,
    path = "/me/classes/upcoming",
    params(LimitQuery),
    responses(
        (status = 200, description = "Enrolled classes first, then recommendations", body = [ClassResponse]),
        (status = 401, description = "Not signed in")
    ),
    tag = "classes"
)]
pub async fn upcoming_classes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<LimitQuery>,
) -> HandlerResult<Vec<ClassResponse>> {
    let classes = state
        .catalog
        .upcoming_classes(user_id, query.resolve())
        .await
        .map_err(service_error_response)?;
    Ok(Json(classes.into_iter().map(Into::into).collect()))
}
