use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::Json;
use uuid::Uuid;

use agora_shared::errors::{AppError, AppResult, ErrorCode};
use agora_shared::extract::ApiPath;
use agora_shared::types::auth::AuthUser;

use crate::avatar::AvatarUpload;
use crate::models::User;
use crate::services::accounts::ProfileUpdate;
use crate::services::aggregation::ProfileView;
use crate::AppState;

// --- GET /api/users/current ---

pub async fn current(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.aggregator.profile(user.id, user.id).await?))
}

// --- GET /api/users/:id ---

pub async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<ProfileView>> {
    Ok(Json(state.aggregator.profile(user.id, user_id).await?))
}

// --- PUT /api/users/:id (multipart) ---

pub async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<User>> {
    if user.id != user_id {
        return Err(AppError::new(ErrorCode::NotProfileOwner, "you can only edit your own profile"));
    }

    let mut multipart = multipart.map_err(|e| AppError::validation(e.body_text()))?;
    let mut update = ProfileUpdate::default();
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("failed to read multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "avatar" => avatar = read_avatar(field, state.max_avatar_bytes).await?,
            "email" => update.email = Some(read_text(field).await?),
            "name" => update.name = Some(read_text(field).await?),
            "bio" => update.bio = Some(read_text(field).await?),
            "location" => update.location = Some(read_text(field).await?),
            "dateOfBirth" => update.date_of_birth = Some(read_text(field).await?),
            other => tracing::debug!(field = other, "ignoring unknown profile field"),
        }
    }

    Ok(Json(state.accounts.update_user(user.id, user_id, update, avatar).await?))
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::validation(format!("failed to read form field: {e}")))
}

/// An empty file part means the client left the picker blank.
async fn read_avatar(field: Field<'_>, max_bytes: usize) -> AppResult<Option<AvatarUpload>> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field.bytes().await.map_err(|e| {
        AppError::with_details(
            ErrorCode::InvalidAvatar,
            format!("failed to read avatar: {e}"),
            serde_json::json!({ "maxBytes": max_bytes }),
        )
    })?;

    if data.is_empty() {
        return Ok(None);
    }
    AvatarUpload::new(data.to_vec(), &content_type, max_bytes).map(Some)
}
