//! Read-side view models assembled from raw rows for a given viewer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use agora_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Comment, Follow, Like, Post, User};
use crate::store::SocialStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: UserSummary,
    pub likes_count: usize,
    pub comments_count: usize,
    pub liked_by_user: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeView {
    #[serde(flatten)]
    pub like: Like,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailView {
    #[serde(flatten)]
    pub view: PostView,
    pub comments: Vec<CommentView>,
    pub likes: Vec<LikeView>,
}

/// One follow edge seen from the profile: `user` is the other party.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationView {
    #[serde(flatten)]
    pub follow: Follow,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: User,
    /// Absent when the viewer looks at their own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
    pub followers_count: usize,
    pub following_count: usize,
    pub followers: Vec<RelationView>,
    pub following: Vec<RelationView>,
    pub posts: Vec<PostView>,
}

type UserIndex = HashMap<Uuid, User>;

/// Builds post views newest first. Posts whose author is missing from
/// `users` are dropped.
pub fn build_post_views(
    viewer_id: Uuid,
    posts: Vec<Post>,
    likes: &[Like],
    comments: &[Comment],
    users: &UserIndex,
) -> Vec<PostView> {
    let mut like_counts: HashMap<Uuid, usize> = HashMap::new();
    let mut liked: HashSet<Uuid> = HashSet::new();
    for like in likes {
        *like_counts.entry(like.post_id).or_default() += 1;
        if like.user_id == viewer_id {
            liked.insert(like.post_id);
        }
    }

    let mut comment_counts: HashMap<Uuid, usize> = HashMap::new();
    for comment in comments {
        *comment_counts.entry(comment.post_id).or_default() += 1;
    }

    let mut views: Vec<PostView> = posts
        .into_iter()
        .filter_map(|post| {
            let Some(author) = users.get(&post.author_id) else {
                tracing::warn!(post_id = %post.id, author_id = %post.author_id, "post author missing");
                return None;
            };
            Some(PostView {
                author: author.into(),
                likes_count: like_counts.get(&post.id).copied().unwrap_or(0),
                comments_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                liked_by_user: liked.contains(&post.id),
                post,
            })
        })
        .collect();

    views.sort_by(|a, b| (b.post.created_at, b.post.id).cmp(&(a.post.created_at, a.post.id)));
    views
}

fn with_users<T>(rows: Vec<T>, users: &UserIndex, user_of: impl Fn(&T) -> Uuid) -> Vec<(T, UserSummary)> {
    rows.into_iter()
        .filter_map(|row| {
            let user = users.get(&user_of(&row))?;
            Some((row, UserSummary::from(user)))
        })
        .collect()
}

#[derive(Clone)]
pub struct ContentAggregator {
    store: Arc<dyn SocialStore>,
}

impl ContentAggregator {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    async fn user_index(&self, ids: impl IntoIterator<Item = Uuid>) -> AppResult<UserIndex> {
        let ids: Vec<Uuid> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = self.store.find_users(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    async fn post_views(&self, viewer_id: Uuid, posts: Vec<Post>) -> AppResult<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let likes = self.store.likes_for_posts(&ids).await?;
        let comments = self.store.comments_for_posts(&ids).await?;
        let users = self.user_index(posts.iter().map(|p| p.author_id)).await?;

        Ok(build_post_views(viewer_id, posts, &likes, &comments, &users))
    }

    /// Every post, newest first.
    pub async fn feed(&self, viewer_id: Uuid) -> AppResult<Vec<PostView>> {
        let posts = self.store.list_posts(None).await?;
        self.post_views(viewer_id, posts).await
    }

    pub async fn post_detail(&self, viewer_id: Uuid, post_id: Uuid) -> AppResult<PostDetailView> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::PostNotFound, "post not found"))?;

        let likes = self.store.likes_for_posts(&[post_id]).await?;
        let comments = self.store.comments_for_posts(&[post_id]).await?;
        let users = self
            .user_index(
                std::iter::once(post.author_id)
                    .chain(likes.iter().map(|l| l.user_id))
                    .chain(comments.iter().map(|c| c.user_id)),
            )
            .await?;

        let view = build_post_views(viewer_id, vec![post], &likes, &comments, &users)
            .pop()
            .ok_or_else(|| AppError::new(ErrorCode::PostNotFound, "post not found"))?;

        Ok(PostDetailView {
            view,
            comments: with_users(comments, &users, |c| c.user_id)
                .into_iter()
                .map(|(comment, user)| CommentView { comment, user })
                .collect(),
            likes: with_users(likes, &users, |l| l.user_id)
                .into_iter()
                .map(|(like, user)| LikeView { like, user })
                .collect(),
        })
    }

    pub async fn profile(&self, viewer_id: Uuid, user_id: Uuid) -> AppResult<ProfileView> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let is_following = if viewer_id == user_id {
            None
        } else {
            Some(self.store.find_follow(viewer_id, user_id).await?.is_some())
        };

        let followers = self.store.followers_of(user_id).await?;
        let following = self.store.following_of(user_id).await?;
        let posts = self.store.list_posts(Some(user_id)).await?;

        let others = self
            .user_index(
                followers
                    .iter()
                    .map(|f| f.follower_id)
                    .chain(following.iter().map(|f| f.following_id)),
            )
            .await?;
        let followers: Vec<RelationView> = with_users(followers, &others, |f| f.follower_id)
            .into_iter()
            .map(|(follow, user)| RelationView { follow, user })
            .collect();
        let following: Vec<RelationView> = with_users(following, &others, |f| f.following_id)
            .into_iter()
            .map(|(follow, user)| RelationView { follow, user })
            .collect();

        let posts = self.post_views(viewer_id, posts).await?;

        Ok(ProfileView {
            user,
            is_following,
            followers_count: followers.len(),
            following_count: following.len(),
            followers,
            following,
            posts,
        })
    }

    pub async fn comment_view(&self, comment: Comment) -> AppResult<CommentView> {
        let user = self
            .store
            .find_user(comment.user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "comment author not found"))?;
        Ok(CommentView {
            user: UserSummary::from(&user),
            comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::models::NewUser;
    use crate::services::policy::{CreateCommentInput, CreatePostInput, FollowInput, LikeInput, SocialPolicy};
    use crate::store::MemoryStore;

    fn user(name: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            email: format!("{name}@x.com"),
            password_hash: "secret-hash".into(),
            name: name.into(),
            avatar_url: None,
            bio: None,
            location: None,
            date_of_birth: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn views_are_newest_first_with_id_tiebreak() {
        let author = user("alice");
        let users: UserIndex = [(author.id, author.clone())].into_iter().collect();
        let now = Utc::now();
        let post = |id: u128, created_at| Post {
            id: Uuid::from_u128(id),
            author_id: author.id,
            content: "x".into(),
            created_at,
        };
        let old = post(3, now - Duration::minutes(5));
        let tie_a = post(1, now);
        let tie_b = post(2, now);

        let views = build_post_views(
            author.id,
            vec![old.clone(), tie_a.clone(), tie_b.clone()],
            &[],
            &[],
            &users,
        );
        let order: Vec<Uuid> = views.iter().map(|v| v.post.id).collect();
        assert_eq!(order, vec![tie_b.id, tie_a.id, old.id]);
    }

    #[test]
    fn counts_and_viewer_flag() {
        let (alice, bob) = (user("alice"), user("bob"));
        let users: UserIndex = [(alice.id, alice.clone()), (bob.id, bob.clone())].into_iter().collect();
        let post = Post {
            id: Uuid::now_v7(),
            author_id: alice.id,
            content: "hello".into(),
            created_at: Utc::now(),
        };
        let like = Like { id: Uuid::now_v7(), post_id: post.id, user_id: bob.id, created_at: Utc::now() };
        let comment = Comment {
            id: Uuid::now_v7(),
            post_id: post.id,
            user_id: bob.id,
            content: "hi".into(),
            created_at: Utc::now(),
        };

        let for_alice = build_post_views(alice.id, vec![post.clone()], &[like.clone()], &[comment.clone()], &users);
        let for_bob = build_post_views(bob.id, vec![post], &[like], &[comment], &users);

        assert_eq!((for_alice[0].likes_count, for_alice[0].comments_count), (1, 1));
        assert!(!for_alice[0].liked_by_user);
        assert!(for_bob[0].liked_by_user);
        assert_eq!(for_bob[0].author.name, "alice");
    }

    #[tokio::test]
    async fn profile_for_owner_and_for_others() {
        let store = Arc::new(MemoryStore::new());
        let policy = SocialPolicy::new(store.clone());
        let aggregator = ContentAggregator::new(store.clone());

        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            let u = store
                .insert_user(NewUser {
                    id: Uuid::now_v7(),
                    email: format!("{name}@x.com"),
                    password_hash: "secret-hash".into(),
                    name: name.into(),
                    avatar_url: None,
                })
                .await
                .unwrap();
            ids.push(u.id);
        }
        let (alice, bob) = (ids[0], ids[1]);

        let post = policy
            .create_post(alice, CreatePostInput { content: Some("hello".into()) })
            .await
            .unwrap();
        policy.like_post(bob, LikeInput { post_id: Some(post.id) }).await.unwrap();
        policy
            .create_comment(bob, CreateCommentInput { post_id: Some(post.id), content: Some("hey".into()) })
            .await
            .unwrap();
        policy.follow_user(bob, FollowInput { following_id: Some(alice) }).await.unwrap();

        let own = aggregator.profile(alice, alice).await.unwrap();
        assert_eq!(own.is_following, None);
        assert_eq!(own.followers_count, 1);
        assert_eq!(own.followers[0].user.name, "bob");
        assert_eq!(own.posts.len(), 1);

        let json = serde_json::to_value(&own).unwrap();
        assert!(json.get("isFollowing").is_none());
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["posts"][0]["likesCount"], 1);

        let seen_by_bob = aggregator.profile(bob, alice).await.unwrap();
        assert_eq!(seen_by_bob.is_following, Some(true));
        assert!(seen_by_bob.posts[0].liked_by_user);

        let detail = aggregator.post_detail(alice, post.id).await.unwrap();
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.likes[0].user.id, bob);
        assert!(!detail.view.liked_by_user);

        let err = aggregator.post_detail(alice, Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PostNotFound);
    }
}
