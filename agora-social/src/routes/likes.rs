use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use agora_shared::errors::AppResult;
use agora_shared::extract::{ApiJson, ApiPath};
use agora_shared::types::auth::AuthUser;

use crate::models::Like;
use crate::services::policy::LikeInput;
use crate::AppState;

// --- POST /api/likes ---

pub async fn like_post(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LikeInput>,
) -> AppResult<(StatusCode, Json<Like>)> {
    let like = state.policy.like_post(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

// --- DELETE /api/likes/:id ---

pub async fn unlike_post(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(like_id): ApiPath<Uuid>,
) -> AppResult<Json<Like>> {
    Ok(Json(state.policy.unlike_post(user.id, like_id).await?))
}
