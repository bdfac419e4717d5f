use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{SocialStore, StoreError, StoreResult};
use crate::models::{
    CascadeSummary, Comment, Follow, FollowCounts, Like, NewComment, NewFollow, NewLike, NewPost,
    NewUser, Post, User, UserChanges,
};

/// In-process gateway with the same constraint semantics as the SQL schema.
/// Each command runs under a single lock, so check-and-insert is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    likes: HashMap<Uuid, Like>,
    follows: HashMap<Uuid, Follow>,
}

impl Tables {
    fn require_user(&self, id: Uuid, constraint: &str) -> StoreResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(constraint.to_string()))
        }
    }

    fn require_post(&self, id: Uuid, constraint: &str) -> StoreResult<()> {
        if self.posts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(constraint.to_string()))
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, Uuid)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.tables().map(|_| ())
    }

    // --- users ---

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.tables()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        let now = Utc::now();
        let row = User {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            avatar_url: user.avatar_url,
            bio: None,
            location: None,
            date_of_birth: None,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let t = self.tables()?;
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut t = self.tables()?;
        if let Some(email) = &changes.email {
            if t.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation("users_email_key".into()));
            }
        }
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(avatar_url) = changes.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        if let Some(location) = changes.location {
            user.location = Some(location);
        }
        if let Some(date_of_birth) = changes.date_of_birth {
            user.date_of_birth = Some(date_of_birth);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    // --- posts ---

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut t = self.tables()?;
        t.require_user(post.author_id, "posts_author_id_fkey")?;
        let row = Post {
            id: post.id,
            author_id: post.author_id,
            content: post.content,
            created_at: Utc::now(),
        };
        t.posts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        Ok(self.tables()?.posts.get(&id).cloned())
    }

    async fn list_posts(&self, author_id: Option<Uuid>) -> StoreResult<Vec<Post>> {
        let t = self.tables()?;
        let mut rows: Vec<Post> = t
            .posts
            .values()
            .filter(|p| author_id.map_or(true, |a| p.author_id == a))
            .cloned()
            .collect();
        newest_first(&mut rows, |p| (p.created_at, p.id));
        Ok(rows)
    }

    async fn delete_post_cascade(&self, id: Uuid) -> StoreResult<CascadeSummary> {
        let mut t = self.tables()?;
        if t.posts.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        let comments_before = t.comments.len();
        t.comments.retain(|_, c| c.post_id != id);
        let likes_before = t.likes.len();
        t.likes.retain(|_, l| l.post_id != id);
        Ok(CascadeSummary {
            comments: comments_before - t.comments.len(),
            likes: likes_before - t.likes.len(),
        })
    }

    // --- comments ---

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut t = self.tables()?;
        t.require_post(comment.post_id, "comments_post_id_fkey")?;
        t.require_user(comment.user_id, "comments_user_id_fkey")?;
        let row = Comment {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: Utc::now(),
        };
        t.comments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.tables()?.comments.get(&id).cloned())
    }

    async fn comments_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        let t = self.tables()?;
        let mut rows: Vec<Comment> = t
            .comments
            .values()
            .filter(|c| post_ids.contains(&c.post_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |c| (c.created_at, c.id));
        Ok(rows)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<()> {
        self.tables()?
            .comments
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    // --- likes ---

    async fn insert_like(&self, like: NewLike) -> StoreResult<Like> {
        let mut t = self.tables()?;
        t.require_post(like.post_id, "likes_post_id_fkey")?;
        t.require_user(like.user_id, "likes_user_id_fkey")?;
        if t
            .likes
            .values()
            .any(|l| l.post_id == like.post_id && l.user_id == like.user_id)
        {
            return Err(StoreError::UniqueViolation("likes_post_user_unique".into()));
        }
        let row = Like {
            id: like.id,
            post_id: like.post_id,
            user_id: like.user_id,
            created_at: Utc::now(),
        };
        t.likes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_like(&self, id: Uuid) -> StoreResult<Option<Like>> {
        Ok(self.tables()?.likes.get(&id).cloned())
    }

    async fn find_like_by_pair(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Like>> {
        Ok(self
            .tables()?
            .likes
            .values()
            .find(|l| l.post_id == post_id && l.user_id == user_id)
            .cloned())
    }

    async fn likes_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Like>> {
        let t = self.tables()?;
        let mut rows: Vec<Like> = t
            .likes
            .values()
            .filter(|l| post_ids.contains(&l.post_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |l| (l.created_at, l.id));
        Ok(rows)
    }

    async fn delete_like(&self, id: Uuid) -> StoreResult<()> {
        self.tables()?
            .likes
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    // --- follows ---

    async fn insert_follow(&self, follow: NewFollow) -> StoreResult<Follow> {
        let mut t = self.tables()?;
        if follow.follower_id == follow.following_id {
            return Err(StoreError::CheckViolation("follows_no_self".into()));
        }
        t.require_user(follow.follower_id, "follows_follower_id_fkey")?;
        t.require_user(follow.following_id, "follows_following_id_fkey")?;
        if t
            .follows
            .values()
            .any(|f| f.follower_id == follow.follower_id && f.following_id == follow.following_id)
        {
            return Err(StoreError::UniqueViolation("follows_pair_unique".into()));
        }
        let row = Follow {
            id: follow.id,
            follower_id: follow.follower_id,
            following_id: follow.following_id,
            created_at: Utc::now(),
        };
        t.follows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Option<Follow>> {
        Ok(self
            .tables()?
            .follows
            .values()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
            .cloned())
    }

    async fn delete_follow(&self, id: Uuid) -> StoreResult<()> {
        self.tables()?
            .follows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn followers_of(&self, user_id: Uuid) -> StoreResult<Vec<Follow>> {
        let t = self.tables()?;
        let mut rows: Vec<Follow> = t
            .follows
            .values()
            .filter(|f| f.following_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |f| (f.created_at, f.id));
        Ok(rows)
    }

    async fn following_of(&self, user_id: Uuid) -> StoreResult<Vec<Follow>> {
        let t = self.tables()?;
        let mut rows: Vec<Follow> = t
            .follows
            .values()
            .filter(|f| f.follower_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |f| (f.created_at, f.id));
        Ok(rows)
    }

    async fn follow_counts(&self, user_id: Uuid) -> StoreResult<FollowCounts> {
        let t = self.tables()?;
        let followers = t.follows.values().filter(|f| f.following_id == user_id).count();
        let following = t.follows.values().filter(|f| f.follower_id == user_id).count();
        Ok(FollowCounts {
            followers: followers as i64,
            following: following as i64,
        })
    }
}
