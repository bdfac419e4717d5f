use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use agora_shared::errors::AppResult;
use agora_shared::extract::{ApiJson, ApiPath};
use agora_shared::types::auth::AuthUser;

use crate::services::policy::{FollowInput, FollowStatus};
use crate::AppState;

// --- POST /api/follow ---

pub async fn follow_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FollowInput>,
) -> AppResult<(StatusCode, Json<FollowStatus>)> {
    let status = state.policy.follow_user(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

// --- DELETE /api/unfollow/:id ---

pub async fn unfollow_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(target_id): ApiPath<Uuid>,
) -> AppResult<Json<FollowStatus>> {
    Ok(Json(state.policy.unfollow_user(user.id, target_id).await?))
}

// --- GET /api/follow/:id ---

pub async fn follow_status(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(target_id): ApiPath<Uuid>,
) -> AppResult<Json<FollowStatus>> {
    Ok(Json(state.policy.follow_status(user.id, target_id).await?))
}
