use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use agora_shared::errors::AppResult;
use agora_shared::extract::{ApiJson, ApiPath};
use agora_shared::types::auth::AuthUser;

use crate::models::Comment;
use crate::services::aggregation::CommentView;
use crate::services::policy::CreateCommentInput;
use crate::AppState;

// --- POST /api/comments ---

pub async fn create_comment(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateCommentInput>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let comment = state.policy.create_comment(user.id, req).await?;
    let view = state.aggregator.comment_view(comment).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

// --- DELETE /api/comments/:id ---

pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> AppResult<Json<Comment>> {
    Ok(Json(state.policy.delete_comment(user.id, comment_id).await?))
}
