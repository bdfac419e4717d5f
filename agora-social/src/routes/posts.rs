use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use agora_shared::errors::AppResult;
use agora_shared::extract::{ApiJson, ApiPath};
use agora_shared::types::auth::AuthUser;

use crate::services::aggregation::{PostDetailView, PostView};
use crate::services::policy::{CreatePostInput, DeletedPost};
use crate::AppState;

// --- POST /api/posts ---

pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePostInput>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let post = state.policy.create_post(user.id, req).await?;
    let detail = state.aggregator.post_detail(user.id, post.id).await?;
    Ok((StatusCode::CREATED, Json(detail.view)))
}

// --- GET /api/posts ---

pub async fn feed(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.aggregator.feed(user.id).await?))
}

// --- GET /api/posts/:id ---

pub async fn get_post(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> AppResult<Json<PostDetailView>> {
    Ok(Json(state.aggregator.post_detail(user.id, post_id).await?))
}

// --- DELETE /api/posts/:id ---

pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> AppResult<Json<DeletedPost>> {
    Ok(Json(state.policy.delete_post(user.id, post_id).await?))
}
