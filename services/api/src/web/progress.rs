//! services/api/src/web/progress.rs
//!
//! Handlers for the signed-in user's profile, statistics, dashboard and
//! achievements.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use prep_core::{ProfileUpdate, UserStats};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::web::rest::{
    service_error_response, AchievementResponse, DashboardResponse, LimitQuery, ProfileResponse,
    StatsResponse, UpdateProfileRequest,
};
use crate::web::state::AppState;

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Serves the user's stats from the cache, computing and storing them on a miss.
pub(crate) async fn cached_stats(
    state: &AppState,
    user_id: Uuid,
) -> Result<UserStats, (StatusCode, String)> {
    if let Some(stats) = state.stats_cache.get(user_id).await {
        debug!(%user_id, "Stats cache hit");
        return Ok(stats);
    }
    let stats = state
        .stats
        .compute_user_stats(user_id)
        .await
        .map_err(service_error_response)?;
    state.stats_cache.put(user_id, stats.clone()).await;
    Ok(stats)
}

/// GET /me/profile
#[utoipa::path(
    get,
    path = "/me/profile",
    responses(
        (status = 200, description = "The user's profile", body = ProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Profile not found")
    ),
    tag = "progress"
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<ProfileResponse> {
    let profile = state
        .catalog
        .profile(user_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(profile.into()))
}

/// PUT /me/profile
#[utoipa::path(
    put,
    path = "/me/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "The updated profile", body = ProfileResponse),
        (status = 401, description = "Not signed in")
    ),
    tag = "progress"
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> HandlerResult<ProfileResponse> {
    let update = ProfileUpdate {
        full_name: req.full_name,
        avatar_url: req.avatar_url,
    };
    let profile = state
        .catalog
        .update_profile(user_id, update)
        .await
        .map_err(service_error_response)?;
    Ok(Json(profile.into()))
}

/// GET /me/stats
#[utoipa::path(
    get,
    path = "/me/stats",
    responses(
        (status = 200, description = "A fresh or recently cached progress snapshot", body = StatsResponse),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "A backing read failed; retry the request")
    ),
    tag = "progress"
)]
pub async fn get_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<StatsResponse> {
    let stats = cached_stats(&state, user_id).await?;
    Ok(Json(stats.into()))
}

/// GET /me/dashboard
#[utoipa::path(
    get,
    path = "/me/dashboard",
    params(LimitQuery),
    responses(
        (status = 200, description = "Everything the home screen shows", body = DashboardResponse),
        (status = 401, description = "Not signed in"),
        (status = 503, description = "A backing read failed; retry the request")
    ),
    tag = "progress"
)]
pub async fn get_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<LimitQuery>,
) -> HandlerResult<DashboardResponse> {
    let limit = query.resolve();
    let (profile, stats, courses, upcoming_tests, upcoming_classes) = tokio::try_join!(
        async { state.catalog.profile(user_id).await.map_err(service_error_response) },
        cached_stats(&state, user_id),
        async {
            state
                .catalog
                .enrolled_courses(user_id)
                .await
                .map_err(service_error_response)
        },
        async {
            state
                .catalog
                .upcoming_tests(user_id, limit)
                .await
                .map_err(service_error_response)
        },
        async {
            state
                .catalog
                .upcoming_classes(user_id, limit)
                .await
                .map_err(service_error_response)
        },
    )?;

    Ok(Json(DashboardResponse {
        profile: profile.into(),
        stats: stats.into(),
        courses: courses.into_iter().map(Into::into).collect(),
        upcoming_tests: upcoming_tests.into_iter().map(Into::into).collect(),
        upcoming_classes: upcoming_classes.into_iter().map(Into::into).collect(),
    }))
}

/// GET /me/achievements
#[utoipa::path(
    get,
    path = "/me/achievements",
    responses(
        (status = 200, description = "Unlocked achievements, newest first", body = [AchievementResponse]),
        (status = 401, description = "Not signed in")
    ),
    tag = "progress"
)]
pub async fn list_achievements_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<Vec<AchievementResponse>> {
    let achievements = state
        .catalog
        .achievements(user_id)
        .await
        .map_err(service_error_response)?;
    Ok(Json(achievements.into_iter().map(Into::into).collect()))
}

/// POST /me/achievements/{id}/unlock
#[utoipa::path(
    post,
    path = "/me/achievements/{id}/unlock",
    params(("id" = i32, Path, description = "Achievement id")),
    responses(
        (status = 200, description = "The unlocked achievement", body = AchievementResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown achievement")
    ),
    tag = "progress"
)]
pub async fn unlock_achievement_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(achievement_id): Path<i32>,
) -> HandlerResult<AchievementResponse> {
    let achievement = state
        .catalog
        .unlock_achievement(user_id, achievement_id)
        .await
        .map_err(service_error_response)?;
    state.stats_cache.invalidate(user_id).await;
    Ok(Json(achievement.into()))
}
