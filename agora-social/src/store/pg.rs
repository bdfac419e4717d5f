use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use agora_shared::clients::db::DbPool;

use super::{SocialStore, StoreError, StoreResult};
use crate::models::{
    CascadeSummary, Comment, Follow, FollowCounts, Like, NewComment, NewFollow, NewLike, NewPost,
    NewUser, Post, User, UserChanges,
};
use crate::schema::{comments, follows, likes, posts, users};

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(kind, info) => {
                let constraint = info.constraint_name().unwrap_or("unknown").to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => StoreError::UniqueViolation(constraint),
                    DatabaseErrorKind::ForeignKeyViolation => StoreError::ForeignKeyViolation(constraint),
                    DatabaseErrorKind::CheckViolation => StoreError::CheckViolation(constraint),
                    _ => StoreError::Backend(DieselError::DatabaseError(kind, info).into()),
                }
            }
            other => StoreError::Backend(other.into()),
        }
    }
}

/// PostgreSQL gateway. diesel is synchronous, so every query runs on the
/// blocking pool with its own pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().context("failed to check out a database connection")?;
            op(&mut conn).map_err(StoreError::from)
        })
        .await
        .context("database task failed")?
    }
}

fn expect_one(affected: usize) -> QueryResult<()> {
    if affected == 0 {
        Err(DieselError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl SocialStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        self.run(|conn| diesel::sql_query("SELECT 1").execute(conn).map(|_| ()))
            .await
    }

    // --- users ---

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(&user)
                .get_result::<User>(conn)
        })
        .await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.run(move |conn| users::table.find(id).first::<User>(conn).optional())
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(email))
                .first::<User>(conn)
                .optional()
        })
        .await
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let ids = ids.to_vec();
        self.run(move |conn| users::table.filter(users::id.eq_any(ids)).load::<User>(conn))
            .await
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        self.run(move |conn| {
            diesel::update(users::table.find(id))
                .set((&changes, users::updated_at.eq(Utc::now())))
                .get_result::<User>(conn)
        })
        .await
    }

    // --- posts ---

    async fn insert_post(&self, post: NewPost) -> StoreResult<Post> {
        self.run(move |conn| {
            diesel::insert_into(posts::table)
                .values(&post)
                .get_result::<Post>(conn)
        })
        .await
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        self.run(move |conn| posts::table.find(id).first::<Post>(conn).optional())
            .await
    }

    async fn list_posts(&self, author_id: Option<Uuid>) -> StoreResult<Vec<Post>> {
        self.run(move |conn| {
            let mut query = posts::table.into_boxed();
            if let Some(author_id) = author_id {
                query = query.filter(posts::author_id.eq(author_id));
            }
            query
                .order((posts::created_at.desc(), posts::id.desc()))
                .load::<Post>(conn)
        })
        .await
    }

    async fn delete_post_cascade(&self, id: Uuid) -> StoreResult<CascadeSummary> {
        self.run(move |conn| {
            conn.transaction::<_, DieselError, _>(|conn| {
                let comments = diesel::delete(comments::table.filter(comments::post_id.eq(id)))
                    .execute(conn)?;
                let likes = diesel::delete(likes::table.filter(likes::post_id.eq(id)))
                    .execute(conn)?;
                // Rolls the whole unit back if the post vanished concurrently.
                expect_one(diesel::delete(posts::table.find(id)).execute(conn)?)?;
                Ok(CascadeSummary { comments, likes })
            })
        })
        .await
    }

    // --- comments ---

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        self.run(move |conn| {
            diesel::insert_into(comments::table)
                .values(&comment)
                .get_result::<Comment>(conn)
        })
        .await
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        self.run(move |conn| comments::table.find(id).first::<Comment>(conn).optional())
            .await
    }

    async fn comments_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        let post_ids = post_ids.to_vec();
        self.run(move |conn| {
            comments::table
                .filter(comments::post_id.eq_any(post_ids))
                .order((comments::created_at.desc(), comments::id.desc()))
                .load::<Comment>(conn)
        })
        .await
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| expect_one(diesel::delete(comments::table.find(id)).execute(conn)?))
            .await
    }

    // --- likes ---

    async fn insert_like(&self, like: NewLike) -> StoreResult<Like> {
        self.run(move |conn| {
            diesel::insert_into(likes::table)
                .values(&like)
                .get_result::<Like>(conn)
        })
        .await
    }

    async fn find_like(&self, id: Uuid) -> StoreResult<Option<Like>> {
        self.run(move |conn| likes::table.find(id).first::<Like>(conn).optional())
            .await
    }

    async fn find_like_by_pair(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Like>> {
        self.run(move |conn| {
            likes::table
                .filter(likes::post_id.eq(post_id))
                .filter(likes::user_id.eq(user_id))
                .first::<Like>(conn)
                .optional()
        })
        .await
    }

    async fn likes_for_posts(&self, post_ids: &[Uuid]) -> StoreResult<Vec<Like>> {
        let post_ids = post_ids.to_vec();
        self.run(move |conn| {
            likes::table
                .filter(likes::post_id.eq_any(post_ids))
                .order((likes::created_at.desc(), likes::id.desc()))
                .load::<Like>(conn)
        })
        .await
    }

    async fn delete_like(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| expect_one(diesel::delete(likes::table.find(id)).execute(conn)?))
            .await
    }

    // --- follows ---

    async fn insert_follow(&self, follow: NewFollow) -> StoreResult<Follow> {
        self.run(move |conn| {
            diesel::insert_into(follows::table)
                .values(&follow)
                .get_result::<Follow>(conn)
        })
        .await
    }

    async fn find_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Option<Follow>> {
        self.run(move |conn| {
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::following_id.eq(following_id))
                .first::<Follow>(conn)
                .optional()
        })
        .await
    }

    async fn delete_follow(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| expect_one(diesel::delete(follows::table.find(id)).execute(conn)?))
            .await
    }

    async fn followers_of(&self, user_id: Uuid) -> StoreResult<Vec<Follow>> {
        self.run(move |conn| {
            follows::table
                .filter(follows::following_id.eq(user_id))
                .order((follows::created_at.desc(), follows::id.desc()))
                .load::<Follow>(conn)
        })
        .await
    }

    async fn following_of(&self, user_id: Uuid) -> StoreResult<Vec<Follow>> {
        self.run(move |conn| {
            follows::table
                .filter(follows::follower_id.eq(user_id))
                .order((follows::created_at.desc(), follows::id.desc()))
                .load::<Follow>(conn)
        })
        .await
    }

    async fn follow_counts(&self, user_id: Uuid) -> StoreResult<FollowCounts> {
        self.run(move |conn| {
            let followers = follows::table
                .filter(follows::following_id.eq(user_id))
                .count()
                .get_result::<i64>(conn)?;
            let following = follows::table
                .filter(follows::follower_id.eq(user_id))
                .count()
                .get_result::<i64>(conn)?;
            Ok(FollowCounts { followers, following })
        })
        .await
    }
}
