//! services/api/src/web/practice.rs
//!
//! Handlers for practice tests: browsing, scheduling and recording results.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::web::rest::{
    service_error_response, CompleteTestRequest, LimitQuery, ScheduleTestRequest,
    ScheduledTestResponse, SectionResponse, TestDetailResponse, TestResponse,
};
use crate::web::state::AppState;

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

/// GET /tests
#[utoipa::path(
    get,
    path = "/tests",
    responses((status = 200, description = "All practice tests, newest first", body = [TestResponse])),
    tag = "tests"
)]
pub async fn list_tests_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Vec<TestResponse>> {
    let tests = state
        .catalog
        .list_tests()
        .await
        .map_err(service_error_response)?;
    Ok(Json(tests.into_iter().map(Into::into).collect()))
}

/// GET /tests/{id}
#[utoipa::path(
    get,
    path = "/tests/{id}",
    params(("id" = Uuid, Path, description = "Test id")),
    responses(
        (status = 200, description = "The test and its ordered sections", body = TestDetailResponse),
        (status = 404, description = "Test not found")
    ),
    tag = "tests"
)]
pub async fn get_test_handler(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<Uuid>,
) -> HandlerResult<TestDetailResponse> {
    let detail = state
        .catalog
        .test_detail(test_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(TestDetailResponse {
        test: detail.test.into(),
        sections: detail
            .sections
            .into_iter()
            .map(SectionResponse::from)
            .collect(),
    }))
}

/// POST /me/tests/{id}/schedule
#[utoipa::path(
    post,
    path = "/me/tests/{id}/schedule",
    params(("id" = Uuid, Path, description = "Test id")),
    request_body = ScheduleTestRequest,
    responses(
        (status = 201, description = "The test was put on the user's calendar", body = ScheduledTestResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Test not found")
    ),
    tag = "tests"
)]
pub async fn schedule_test_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(test_id): Path<Uuid>,
    Json(req): Json<ScheduleTestRequest>,
) -> Result<(StatusCode, Json<ScheduledTestResponse>), (StatusCode, String)> {
    let scheduled = state
        .catalog
        .schedule_test(user_id, test_id, req.scheduled_for)
        .await
        .map_err(service_error_response)?;
    Ok((StatusCode::CREATED, Json(scheduled.into())))
}

/// POST /me/tests/{id}/complete
#[utoipa::path(
    post,
    path = "/me/tests/{id}/complete",
    params(("id" = Uuid, Path, description = "Test id")),
    request_body = CompleteTestRequest,
    responses(
        (status = 200, description = "The recorded attempt", body = ScheduledTestResponse),
        (status = 400, description = "Score outside 0-10"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "The test is not scheduled for this user")
    ),
    tag = "tests"
)]
pub async fn complete_test_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(test_id): Path<Uuid>,
    Json(req): Json<CompleteTestRequest>,
) -> HandlerResult<ScheduledTestResponse> {
    let completed = state
        .catalog
        .complete_test(user_id, test_id, req.score)
        .await
        .map_err(service_error_response)?;
    state.stats_cache.invalidate(user_id).await;
    Ok(Json(completed.into()))
}

/// GET /me/tests/upcoming
#[utoipa::path(
    get,
    path = "/me/tests/upcoming",
    params(LimitQuery),
    responses(
        (status = 200, description = "Scheduled tests first, then recommendations", body = [TestResponse]),
        (status = 401, description = "Not signed in")
    ),
    tag = "tests"
)]
pub async fn upcoming_tests_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<LimitQuery>,
) -> HandlerResult<Vec<TestResponse>> {
    let tests = state
        .catalog
        .upcoming_tests(user_id, query.resolve())
        .await
        .map_err(service_error_response)?;
    Ok(Json(tests.into_iter().map(Into::into).collect()))
}
