//! Persistence gateway.
//!
//! Every durable read and write goes through [`SocialStore`]. Implementations
//! must enforce the same constraints as the PostgreSQL schema: unique email,
//! unique (post, user) likes, unique (follower, following) follows, no
//! self-follow, and foreign keys on every parent reference. Constraint
//! failures are reported as [`StoreError`] variants so callers can reclassify
//! them instead of trusting their own pre-checks.

use async_trait::async_trait;
use uuid::Uuid;

use agora_shared::errors::{AppError, ErrorCode};

use crate::models::{
    CascadeSummary, Comment, Follow, FollowCounts, Like, NewComment, NewFollow, NewLike, NewPost,
    NewUser, Post, User, UserChanges,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Generic reclassification for failures a caller did not map itself.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::not_found("resource not found"),
            StoreError::UniqueViolation(c) => {
                AppError::new(ErrorCode::Conflict, format!("resource already exists ({c})"))
            }
            StoreError::ForeignKeyViolation(c) => {
                AppError::new(ErrorCode::NotFound, format!("referenced resource not found ({c})"))
            }
            StoreError::CheckViolation(c) => AppError::validation(format!("invalid data ({c})")),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

#[async_trait]
pub trait SocialStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // --- users ---

    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;

    // --- posts ---

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post>;
    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>>;
    /// Newest first; `author_id` narrows to one user's posts.
    async fn list_posts(&self, author_id: Option<Uuid>) -> StoreResult<Vec<Post>>;
    /// Removes the post with its comments and likes in one atomic unit.
    async fn delete_post_cascade(&self, id: Uuid) -> StoreResult<CascadeSummary>;

    // --- comments ---

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;
    async fn comments_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> StoreResult<()>;

    // --- likes ---

    async fn insert_like(&self, like: NewLike) -> StoreResult<Like>;
    async fn find_like(&self, id: Uuid) -> StoreResult<Option<Like>>;
    async fn find_like_by_pair(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Like>>;
    async fn likes_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Like>>;
    async fn delete_like(&self, id: Uuid) -> StoreResult<()>;

    // --- follows ---

    async fn insert_follow(&self, follow: NewFollow) -> StoreResult<Follow>;
    async fn find_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Option<Follow>>;
    async fn delete_follow(&self, id: Uuid) -> StoreResult<()>;
    /// Follow edges pointing at `user_id`, most recent first.
    async fn followers_of(&self, user_id: Uuid) -> StoreResult<Vec<Follow>>;
    /// Follow edges leaving `user_id`, most recent first.
    async fn following_of(&self, user_id: Uuid) -> StoreResult<Vec<Follow>>;
    async fn follow_counts(&self, user_id: Uuid) -> StoreResult<FollowCounts>;
}
