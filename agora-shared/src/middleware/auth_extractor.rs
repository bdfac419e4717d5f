use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, TokenIssuer};

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    TokenIssuer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let issuer = TokenIssuer::from_ref(state);
        let claims = issuer.verify(token)?;

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_valid_bearer() {
        let issuer = TokenIssuer::new("secret", 60);
        let user_id = Uuid::now_v7();
        let token = issuer.issue(user_id).unwrap();

        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let user = AuthUser::from_request_parts(&mut parts, &issuer).await.unwrap();
        assert_eq!(user.id, user_id);
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let issuer = TokenIssuer::new("secret", 60);
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &issuer).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn rejects_other_schemes() {
        let issuer = TokenIssuer::new("secret", 60);
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz"));
        let err = AuthUser::from_request_parts(&mut parts, &issuer).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }
}
