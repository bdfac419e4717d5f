use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use agora_shared::errors::AppResult;
use agora_shared::extract::ApiJson;

use crate::models::User;
use crate::services::accounts::{LoginInput, LoginView, RegisterInput};
use crate::AppState;

// --- POST /api/auth/register ---

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.accounts.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

// --- POST /api/auth/login ---

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginInput>,
) -> AppResult<Json<LoginView>> {
    Ok(Json(state.accounts.login(req).await?))
}
