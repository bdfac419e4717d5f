//! Ownership and relationship rules for posts, comments, likes and follows.
//!
//! Each operation checks authorization and existence before it issues a
//! mutating store command. The store's constraints stay the final authority:
//! a duplicate or a vanished parent that slips past a pre-check comes back as
//! a [`StoreError`] and is reclassified here into the matching domain code.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agora_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Comment, Follow, Like, NewComment, NewFollow, NewLike, NewPost, Post};
use crate::store::{SocialStore, StoreError};

// --- Inputs ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    pub post_id: Option<Uuid>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeInput {
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowInput {
    pub following_id: Option<Uuid>,
}

// --- Results ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPost {
    #[serde(flatten)]
    pub post: Post,
    pub removed_comments: usize,
    pub removed_likes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
    pub user_id: Uuid,
    pub is_following: bool,
    pub followers_count: i64,
    pub following_count: i64,
}

fn required_text(value: Option<String>, field: &str) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::with_details(
            ErrorCode::ValidationError,
            format!("{field} is required"),
            serde_json::json!({ "field": field }),
        )),
    }
}

fn required_id(value: Option<Uuid>, field: &str) -> AppResult<Uuid> {
    value.ok_or_else(|| {
        AppError::with_details(
            ErrorCode::ValidationError,
            format!("{field} is required"),
            serde_json::json!({ "field": field }),
        )
    })
}

fn post_not_found() -> AppError {
    AppError::new(ErrorCode::PostNotFound, "post not found")
}

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

/// A violated `*_user_id_fkey` means the acting user vanished; any other
/// parent is the post.
fn missing_parent(constraint: &str) -> AppError {
    if constraint.contains("user") {
        user_not_found()
    } else {
        post_not_found()
    }
}

/// A foreign-key failure here means a comment or like landed on the post
/// between the child deletes and the post delete. The post still exists.
fn cascade_failed(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => post_not_found(),
        StoreError::ForeignKeyViolation(_) => {
            AppError::conflict("post gained new comments or likes while being deleted, try again")
        }
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct SocialPolicy {
    store: Arc<dyn SocialStore>,
}

impl SocialPolicy {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    // --- posts ---

    pub async fn create_post(&self, author_id: Uuid, input: CreatePostInput) -> AppResult<Post> {
        let content = required_text(input.content, "content")?;

        let post = self
            .store
            .insert_post(NewPost { id: Uuid::now_v7(), author_id, content })
            .await
            .map_err(|e| match e {
                StoreError::ForeignKeyViolation(_) => user_not_found(),
                other => other.into(),
            })?;

        tracing::info!(post_id = %post.id, author_id = %author_id, "post created");
        Ok(post)
    }

    pub async fn delete_post(&self, requester_id: Uuid, post_id: Uuid) -> AppResult<DeletedPost> {
        let post = self.store.find_post(post_id).await?.ok_or_else(post_not_found)?;

        if post.author_id != requester_id {
            return Err(AppError::new(ErrorCode::NotPostAuthor, "only the author can delete this post"));
        }

        let summary = self.store.delete_post_cascade(post_id).await.map_err(cascade_failed)?;

        tracing::info!(
            post_id = %post_id,
            removed_comments = summary.comments,
            removed_likes = summary.likes,
            "post deleted"
        );

        Ok(DeletedPost {
            post,
            removed_comments: summary.comments,
            removed_likes: summary.likes,
        })
    }

    // --- comments ---

    pub async fn create_comment(&self, requester_id: Uuid, input: CreateCommentInput) -> AppResult<Comment> {
        let post_id = required_id(input.post_id, "postId")?;
        let content = required_text(input.content, "content")?;

        if self.store.find_post(post_id).await?.is_none() {
            return Err(post_not_found());
        }

        let comment = self
            .store
            .insert_comment(NewComment {
                id: Uuid::now_v7(),
                post_id,
                user_id: requester_id,
                content,
            })
            .await
            .map_err(|e| match e {
                StoreError::ForeignKeyViolation(c) => missing_parent(&c),
                other => other.into(),
            })?;

        tracing::info!(comment_id = %comment.id, post_id = %post_id, "comment created");
        Ok(comment)
    }

    /// Allowed for the comment's author and for the author of the post it
    /// was written under.
    pub async fn delete_comment(&self, requester_id: Uuid, comment_id: Uuid) -> AppResult<Comment> {
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::CommentNotFound, "comment not found"))?;

        if comment.user_id != requester_id {
            let post_author = self.store.find_post(comment.post_id).await?.map(|p| p.author_id);
            if post_author != Some(requester_id) {
                return Err(AppError::new(
                    ErrorCode::NotCommentModerator,
                    "only the comment author or the post author can delete this comment",
                ));
            }
        }

        self.store.delete_comment(comment_id).await.map_err(|e| match e {
            StoreError::NotFound => AppError::new(ErrorCode::CommentNotFound, "comment not found"),
            other => other.into(),
        })?;

        tracing::info!(comment_id = %comment_id, requester_id = %requester_id, "comment deleted");
        Ok(comment)
    }

    // --- likes ---

    pub async fn like_post(&self, requester_id: Uuid, input: LikeInput) -> AppResult<Like> {
        let post_id = required_id(input.post_id, "postId")?;

        if self.store.find_post(post_id).await?.is_none() {
            return Err(post_not_found());
        }
        if self.store.find_like_by_pair(post_id, requester_id).await?.is_some() {
            return Err(AppError::new(ErrorCode::AlreadyLiked, "post already liked"));
        }

        let like = self
            .store
            .insert_like(NewLike { id: Uuid::now_v7(), post_id, user_id: requester_id })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AppError::new(ErrorCode::AlreadyLiked, "post already liked"),
                StoreError::ForeignKeyViolation(c) => missing_parent(&c),
                other => other.into(),
            })?;

        tracing::info!(like_id = %like.id, post_id = %post_id, user_id = %requester_id, "post liked");
        Ok(like)
    }

    pub async fn unlike_post(&self, requester_id: Uuid, like_id: Uuid) -> AppResult<Like> {
        let not_found = || AppError::new(ErrorCode::LikeNotFound, "like not found");

        let like = self.store.find_like(like_id).await?.ok_or_else(not_found)?;
        if like.user_id != requester_id {
            return Err(AppError::new(ErrorCode::NotLikeOwner, "only the liking user can remove this like"));
        }

        self.store.delete_like(like_id).await.map_err(|e| match e {
            StoreError::NotFound => not_found(),
            other => other.into(),
        })?;

        tracing::info!(like_id = %like_id, post_id = %like.post_id, "post unliked");
        Ok(like)
    }

    // --- follows ---

    pub async fn follow_user(&self, requester_id: Uuid, input: FollowInput) -> AppResult<FollowStatus> {
        let target_id = required_id(input.following_id, "followingId")?;

        if target_id == requester_id {
            return Err(AppError::new(ErrorCode::CannotFollowSelf, "cannot follow yourself"));
        }
        if self.store.find_user(target_id).await?.is_none() {
            return Err(user_not_found());
        }
        if self.store.find_follow(requester_id, target_id).await?.is_some() {
            return Err(AppError::new(ErrorCode::FollowAlreadyExists, "already following this user"));
        }

        let follow: Follow = self
            .store
            .insert_follow(NewFollow {
                id: Uuid::now_v7(),
                follower_id: requester_id,
                following_id: target_id,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    AppError::new(ErrorCode::FollowAlreadyExists, "already following this user")
                }
                StoreError::CheckViolation(_) => AppError::new(ErrorCode::CannotFollowSelf, "cannot follow yourself"),
                StoreError::ForeignKeyViolation(_) => user_not_found(),
                other => other.into(),
            })?;

        tracing::info!(follow_id = %follow.id, follower_id = %requester_id, following_id = %target_id, "user followed");
        self.status_of(target_id, true).await
    }

    pub async fn unfollow_user(&self, requester_id: Uuid, target_id: Uuid) -> AppResult<FollowStatus> {
        let not_found = || AppError::new(ErrorCode::FollowNotFound, "you are not following this user");

        let follow = self
            .store
            .find_follow(requester_id, target_id)
            .await?
            .ok_or_else(not_found)?;

        self.store.delete_follow(follow.id).await.map_err(|e| match e {
            StoreError::NotFound => not_found(),
            other => other.into(),
        })?;

        tracing::info!(follower_id = %requester_id, following_id = %target_id, "user unfollowed");
        self.status_of(target_id, false).await
    }

    pub async fn follow_status(&self, requester_id: Uuid, target_id: Uuid) -> AppResult<FollowStatus> {
        if self.store.find_user(target_id).await?.is_none() {
            return Err(user_not_found());
        }
        let is_following = self.store.find_follow(requester_id, target_id).await?.is_some();
        self.status_of(target_id, is_following).await
    }

    async fn status_of(&self, target_id: Uuid, is_following: bool) -> AppResult<FollowStatus> {
        let counts = self.store.follow_counts(target_id).await?;
        Ok(FollowStatus {
            user_id: target_id,
            is_following,
            followers_count: counts.followers,
            following_count: counts.following,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, User};
    use crate::store::MemoryStore;
    use agora_shared::errors::ErrorKind;

    struct Fixture {
        store: Arc<MemoryStore>,
        policy: SocialPolicy,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let policy = SocialPolicy::new(store.clone());
            Self { store, policy }
        }

        async fn user(&self, name: &str) -> User {
            self.store
                .insert_user(NewUser {
                    id: Uuid::now_v7(),
                    email: format!("{name}@x.com"),
                    password_hash: "hash".into(),
                    name: name.into(),
                    avatar_url: None,
                })
                .await
                .unwrap()
        }

        async fn post(&self, author: &User, content: &str) -> Post {
            self.policy
                .create_post(author.id, CreatePostInput { content: Some(content.into()) })
                .await
                .unwrap()
        }

        async fn comment(&self, author: &User, post: &Post) -> Comment {
            self.policy
                .create_comment(
                    author.id,
                    CreateCommentInput { post_id: Some(post.id), content: Some("nice".into()) },
                )
                .await
                .unwrap()
        }

        async fn like(&self, user: &User, post: &Post) -> AppResult<Like> {
            self.policy.like_post(user.id, LikeInput { post_id: Some(post.id) }).await
        }

        async fn follow(&self, follower: &User, target: Uuid) -> AppResult<FollowStatus> {
            self.policy
                .follow_user(follower.id, FollowInput { following_id: Some(target) })
                .await
        }
    }

    #[tokio::test]
    async fn blank_post_is_rejected() {
        let f = Fixture::new();
        let alice = f.user("alice").await;

        for content in [None, Some("".to_string()), Some("   \n".to_string())] {
            let err = f.policy.create_post(alice.id, CreatePostInput { content }).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(f.store.list_posts(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn following_twice_conflicts() {
        let f = Fixture::new();
        let (alice, bob) = (f.user("alice").await, f.user("bob").await);

        let status = f.follow(&alice, bob.id).await.unwrap();
        assert!(status.is_following);
        assert_eq!(status.followers_count, 1);

        let err = f.follow(&alice, bob.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FollowAlreadyExists);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.store.followers_of(bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn self_follow_is_a_validation_error() {
        let f = Fixture::new();
        let alice = f.user("alice").await;

        let err = f.follow(&alice, alice.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CannotFollowSelf);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(f.store.following_of(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn follow_unknown_user_is_not_found() {
        let f = Fixture::new();
        let alice = f.user("alice").await;

        let err = f.follow(&alice, Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserNotFound);
        let err = f.policy.follow_status(alice.id, Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unfollow_updates_counts() {
        let f = Fixture::new();
        let (alice, bob) = (f.user("alice").await, f.user("bob").await);

        let err = f.policy.unfollow_user(alice.id, bob.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FollowNotFound);

        f.follow(&alice, bob.id).await.unwrap();
        let status = f.policy.unfollow_user(alice.id, bob.id).await.unwrap();
        assert_eq!(
            status,
            FollowStatus { user_id: bob.id, is_following: false, followers_count: 0, following_count: 0 }
        );
        assert!(!f.policy.follow_status(alice.id, bob.id).await.unwrap().is_following);
    }

    #[tokio::test]
    async fn only_the_author_deletes_a_post() {
        let f = Fixture::new();
        let (alice, bob) = (f.user("alice").await, f.user("bob").await);
        let post = f.post(&bob, "mine").await;
        f.comment(&alice, &post).await;
        f.like(&alice, &post).await.unwrap();

        let err = f.policy.delete_post(alice.id, post.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        assert!(f.store.find_post(post.id).await.unwrap().is_some());
        assert_eq!(f.store.comments_for_posts(&[post.id]).await.unwrap().len(), 1);
        assert_eq!(f.store.likes_for_posts(&[post.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_post_cascades() {
        let f = Fixture::new();
        let (alice, bob) = (f.user("alice").await, f.user("bob").await);
        let post = f.post(&alice, "hello").await;
        let comment = f.comment(&bob, &post).await;
        let like = f.like(&bob, &post).await.unwrap();

        let deleted = f.policy.delete_post(alice.id, post.id).await.unwrap();
        assert_eq!((deleted.removed_comments, deleted.removed_likes), (1, 1));

        let err = f.policy.delete_post(alice.id, post.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PostNotFound);
        let err = f.policy.delete_comment(bob.id, comment.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CommentNotFound);
        let err = f.policy.unlike_post(bob.id, like.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::LikeNotFound);
    }

    #[test]
    fn racing_child_insert_during_cascade_is_a_conflict() {
        let err = cascade_failed(StoreError::ForeignKeyViolation("comments_post_id_fkey".into()));
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(cascade_failed(StoreError::NotFound).code(), ErrorCode::PostNotFound);
    }

    #[tokio::test]
    async fn comment_on_missing_post() {
        let f = Fixture::new();
        let alice = f.user("alice").await;

        let err = f
            .policy
            .create_comment(alice.id, CreateCommentInput { post_id: Some(Uuid::now_v7()), content: Some("x".into()) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PostNotFound);

        let err = f
            .policy
            .create_comment(alice.id, CreateCommentInput { post_id: None, content: Some("x".into()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn comment_author_and_post_author_may_delete() {
        let f = Fixture::new();
        let (alice, bob, carol) = (f.user("alice").await, f.user("bob").await, f.user("carol").await);
        let post = f.post(&alice, "hello").await;

        let by_bob = f.comment(&bob, &post).await;
        let err = f.policy.delete_comment(carol.id, by_bob.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotCommentModerator);
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        f.policy.delete_comment(bob.id, by_bob.id).await.unwrap();

        let again = f.comment(&bob, &post).await;
        f.policy.delete_comment(alice.id, again.id).await.unwrap();
        assert!(f.store.comments_for_posts(&[post.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn liking_twice_conflicts() {
        let f = Fixture::new();
        let alice = f.user("alice").await;
        let post = f.post(&alice, "hello").await;

        f.like(&alice, &post).await.unwrap();
        let err = f.like(&alice, &post).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyLiked);
        assert_eq!(f.store.likes_for_posts(&[post.id]).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_likes_admit_exactly_one() {
        let f = Fixture::new();
        let alice = f.user("alice").await;
        let post = f.post(&alice, "hello").await;

        let (user_id, post_id) = (alice.id, post.id);
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let policy = f.policy.clone();
                tokio::spawn(async move { policy.like_post(user_id, LikeInput { post_id: Some(post_id) }).await })
            })
            .collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let err = results.into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(f.store.likes_for_posts(&[post.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_the_liker_unlikes() {
        let f = Fixture::new();
        let (alice, bob) = (f.user("alice").await, f.user("bob").await);
        let post = f.post(&alice, "hello").await;
        let like = f.like(&bob, &post).await.unwrap();

        let err = f.policy.unlike_post(alice.id, like.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotLikeOwner);

        f.policy.unlike_post(bob.id, like.id).await.unwrap();
        assert!(f.store.likes_for_posts(&[post.id]).await.unwrap().is_empty());
    }
}
