use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use agora_shared::errors::{AppError, AppResult, ErrorCode};
use agora_shared::types::auth::TokenIssuer;

use crate::avatar::{identicon, AvatarStore, AvatarUpload};
use crate::models::{NewUser, User, UserChanges};
use crate::services::credentials;
use crate::store::{SocialStore, StoreError};

#[derive(Debug, Default, Deserialize)]
pub struct RegisterInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Text fields of a profile update. Blank values leave the column unchanged.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginView {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

#[derive(Debug, Validate)]
struct NewAccount {
    #[validate(
        email(message = "invalid email format"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    email: String,
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    name: String,
}

/// Bounded text columns of an update; limits match the `users` table.
#[derive(Debug, Validate)]
struct ProfileFields {
    #[validate(
        email(message = "invalid email format"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    email: Option<String>,
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    name: Option<String>,
    #[validate(length(max = 255, message = "location must be at most 255 characters"))]
    location: Option<String>,
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date_of_birth(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::validation("dateOfBirth must be a date (YYYY-MM-DD)"))
}

fn invalid_credentials() -> AppError {
    AppError::new(ErrorCode::InvalidCredentials, "invalid email or password")
}

fn email_taken() -> AppError {
    AppError::new(ErrorCode::EmailAlreadyExists, "email already registered")
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn SocialStore>,
    avatars: Arc<dyn AvatarStore>,
    tokens: TokenIssuer,
}

impl AccountService {
    pub fn new(store: Arc<dyn SocialStore>, avatars: Arc<dyn AvatarStore>, tokens: TokenIssuer) -> Self {
        Self { store, avatars, tokens }
    }

    pub async fn register(&self, input: RegisterInput) -> AppResult<User> {
        let email = required(input.email, "email")?.to_lowercase();
        let password = input
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("password is required"))?;
        let name = required(input.name, "name")?;

        let account = NewAccount { email, name };
        account
            .validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
        credentials::validate_password(&password)?;

        if self.store.find_user_by_email(&account.email).await?.is_some() {
            return Err(email_taken());
        }

        let password_hash = credentials::hash_password(&password)?;

        let avatar_url = self
            .avatars
            .store(identicon::generate(&account.name), identicon::CONTENT_TYPE)
            .await
            .map_err(|e| AppError::new(ErrorCode::AvatarUploadFailed, format!("failed to store avatar: {e:#}")))?;

        let inserted = self
            .store
            .insert_user(NewUser {
                id: Uuid::now_v7(),
                email: account.email,
                password_hash,
                name: account.name,
                avatar_url: Some(avatar_url.clone()),
            })
            .await;

        let user = match inserted {
            Ok(user) => user,
            Err(e) => {
                self.discard_avatar(&avatar_url).await;
                return Err(match e {
                    StoreError::UniqueViolation(_) => email_taken(),
                    other => other.into(),
                });
            }
        };

        tracing::info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn login(&self, input: LoginInput) -> AppResult<LoginView> {
        let email = required(input.email, "email")?.to_lowercase();
        let password = input
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::validation("password is required"))?;

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(invalid_credentials)?;

        if !credentials::verify_password(&password, &user.password_hash)? {
            return Err(invalid_credentials());
        }

        let token = self.tokens.issue(user.id)?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(LoginView { user, token })
    }

    /// Owner-only profile edit. A new avatar is written to a fresh locator
    /// before the row changes; the old one is removed afterwards.
    pub async fn update_user(
        &self,
        requester_id: Uuid,
        user_id: Uuid,
        update: ProfileUpdate,
        avatar: Option<AvatarUpload>,
    ) -> AppResult<User> {
        if requester_id != user_id {
            return Err(AppError::new(ErrorCode::NotProfileOwner, "you can only edit your own profile"));
        }

        let current = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let fields = ProfileFields {
            email: non_blank(update.email).map(|e| e.to_lowercase()),
            name: non_blank(update.name),
            location: non_blank(update.location),
        };
        fields
            .validate()
            .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

        let mut changes = UserChanges {
            email: fields.email,
            name: fields.name,
            bio: non_blank(update.bio),
            location: fields.location,
            ..Default::default()
        };
        if let Some(date) = non_blank(update.date_of_birth) {
            changes.date_of_birth = Some(parse_date_of_birth(&date)?);
        }

        if let Some(upload) = avatar {
            let locator = self
                .avatars
                .store(upload.bytes, &upload.content_type)
                .await
                .map_err(|e| AppError::new(ErrorCode::AvatarUploadFailed, format!("failed to store avatar: {e:#}")))?;
            changes.avatar_url = Some(locator);
        }
        let new_avatar = changes.avatar_url.clone();

        let user = match self.store.update_user(user_id, changes).await {
            Ok(user) => user,
            Err(e) => {
                if let Some(locator) = &new_avatar {
                    self.discard_avatar(locator).await;
                }
                return Err(match e {
                    StoreError::UniqueViolation(_) => email_taken(),
                    StoreError::NotFound => AppError::new(ErrorCode::UserNotFound, "user not found"),
                    other => other.into(),
                });
            }
        };

        if new_avatar.is_some() {
            if let Some(old) = current.avatar_url.as_deref() {
                self.discard_avatar(old).await;
            }
        }

        tracing::info!(user_id = %user.id, avatar_replaced = new_avatar.is_some(), "profile updated");
        Ok(user)
    }

    async fn discard_avatar(&self, locator: &str) {
        if let Err(e) = self.avatars.delete(locator).await {
            tracing::warn!(error = %e, backend = self.avatars.backend(), "failed to delete avatar");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::InlineAvatarStore;
    use crate::store::MemoryStore;
    use agora_shared::errors::ErrorKind;

    fn service() -> AccountService {
        AccountService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(InlineAvatarStore),
            TokenIssuer::new("test-secret", 3600),
        )
    }

    fn alice() -> RegisterInput {
        RegisterInput {
            email: Some("A@X.com".into()),
            password: Some("pw123456".into()),
            name: Some("alice".into()),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let accounts = service();
        let user = accounts.register(alice()).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(user.avatar_url.as_deref().unwrap().starts_with("data:image/svg+xml;base64,"));

        let login = accounts
            .login(LoginInput { email: Some("a@x.com".into()), password: Some("pw123456".into()) })
            .await
            .unwrap();
        assert_eq!(login.user.id, user.id);
        assert_eq!(accounts.tokens.verify(&login.token).unwrap().sub, user.id);

        let json = serde_json::to_value(&login).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("token").is_some());
    }

    #[tokio::test]
    async fn register_validation() {
        let accounts = service();

        let missing = RegisterInput { name: None, ..alice() };
        assert_eq!(accounts.register(missing).await.unwrap_err().kind(), ErrorKind::Validation);

        let bad_email = RegisterInput { email: Some("nope".into()), ..alice() };
        assert_eq!(accounts.register(bad_email).await.unwrap_err().kind(), ErrorKind::Validation);

        let weak = RegisterInput { password: Some("short".into()), ..alice() };
        assert_eq!(accounts.register(weak).await.unwrap_err().code(), ErrorCode::PasswordTooWeak);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let accounts = service();
        accounts.register(alice()).await.unwrap();

        let again = RegisterInput { email: Some("a@x.COM".into()), ..alice() };
        let err = accounts.register(again).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmailAlreadyExists);
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn bad_login_is_unauthenticated() {
        let accounts = service();
        accounts.register(alice()).await.unwrap();

        for (email, password) in [("a@x.com", "wrong1234"), ("nobody@x.com", "pw123456")] {
            let err = accounts
                .login(LoginInput { email: Some(email.into()), password: Some(password.into()) })
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidCredentials);
            assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        }
    }

    #[tokio::test]
    async fn only_the_owner_updates() {
        let accounts = service();
        let user = accounts.register(alice()).await.unwrap();

        let err = accounts
            .update_user(Uuid::now_v7(), user.id, ProfileUpdate::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn update_ignores_blank_fields_and_replaces_avatar() {
        let accounts = service();
        let user = accounts.register(alice()).await.unwrap();

        let update = ProfileUpdate {
            name: Some("  ".into()),
            bio: Some("hello there".into()),
            date_of_birth: Some("1990-04-01".into()),
            ..Default::default()
        };
        let avatar = AvatarUpload::new(vec![0x89, b'P', b'N', b'G'], "image/png", 1024).unwrap();
        let updated = accounts.update_user(user.id, user.id, update, Some(avatar)).await.unwrap();

        assert_eq!(updated.name, "alice");
        assert_eq!(updated.bio.as_deref(), Some("hello there"));
        assert_eq!(updated.date_of_birth, NaiveDate::from_ymd_opt(1990, 4, 1));
        assert!(updated.avatar_url.unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn update_rejects_bad_input() {
        let accounts = service();
        let user = accounts.register(alice()).await.unwrap();
        accounts
            .register(RegisterInput { email: Some("b@x.com".into()), name: Some("bob".into()), ..alice() })
            .await
            .unwrap();

        let bad_date = ProfileUpdate { date_of_birth: Some("01/04/1990".into()), ..Default::default() };
        let err = accounts.update_user(user.id, user.id, bad_date, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let taken = ProfileUpdate { email: Some("B@x.com".into()), ..Default::default() };
        let err = accounts.update_user(user.id, user.id, taken, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmailAlreadyExists);
    }

    #[tokio::test]
    async fn update_enforces_column_lengths() {
        let accounts = service();
        let user = accounts.register(alice()).await.unwrap();

        let cases = [
            ProfileUpdate { name: Some("n".repeat(101)), ..Default::default() },
            ProfileUpdate { location: Some("l".repeat(256)), ..Default::default() },
            ProfileUpdate {
                email: Some(format!("{}@{}.com", "u".repeat(64), vec!["d".repeat(50); 4].join("."))),
                ..Default::default()
            },
            ProfileUpdate { email: Some("not-an-email".into()), ..Default::default() },
        ];
        for update in cases {
            let err = accounts.update_user(user.id, user.id, update, None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let unchanged = accounts.store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, "alice");
        assert_eq!(unchanged.location, None);

        let at_limit = ProfileUpdate {
            name: Some("ñ".repeat(100)),
            location: Some("l".repeat(255)),
            ..Default::default()
        };
        let updated = accounts.update_user(user.id, user.id, at_limit, None).await.unwrap();
        assert_eq!(updated.name.chars().count(), 100);
    }

    #[test]
    fn dates_accept_both_formats() {
        assert_eq!(parse_date_of_birth("2000-02-29").unwrap(), NaiveDate::from_ymd_opt(2000, 2, 29).unwrap());
        assert_eq!(
            parse_date_of_birth("2000-02-29T10:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2000, 2, 29).unwrap()
        );
        assert!(parse_date_of_birth("yesterday").is_err());
    }
}
