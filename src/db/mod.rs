mod comment;
mod like;
mod subscription;
mod tweet;
mod user;
mod video;

use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use comment::{Comment, CommentStore, CommentView};
pub use like::{LikeStore, LikeTarget, LikedVideo, LikedVideoDetails, OwnerDetails};
pub use subscription::{
    ChannelDetails, LatestVideo, SubscribedChannel, SubscriberDetails, SubscriberView,
    SubscriptionStore,
};
pub use tweet::{Tweet, TweetOwner, TweetStore, TweetView};
pub use user::{ChannelProfile, NewUser, User, UserCredentials, UserStore};
pub use video::{
    ChannelOwner, NewVideo, Video, VideoDetail, VideoFilter, VideoSort, VideoStore, VideoUpdate,
    VideoWithOwner,
};

/// Page request for paginated views. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Build a page, clamping out-of-range values instead of rejecting them.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

/// One page of a view plus the size of the whole unpaginated view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: i64,
    pub paging_counter: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl<T> Paginated<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, page: Page) -> Self {
        let limit = page.limit as i64;
        let total_pages = ((total_docs + limit - 1) / limit).max(1);
        let has_prev_page = page.page > 1;
        let has_next_page = (page.page as i64) < total_pages;

        Self {
            docs,
            total_docs,
            limit: page.limit,
            page: page.page,
            total_pages,
            paging_counter: page.offset() + 1,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page.page - 1),
            next_page: has_next_page.then(|| page.page + 1),
        }
    }
}

/// Account summary embedded in joined views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: crate::media::MediaRef,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    username TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL,
                    full_name TEXT NOT NULL,
                    password TEXT NOT NULL,
                    avatar_public_id TEXT NOT NULL,
                    avatar_url TEXT NOT NULL,
                    cover_image_public_id TEXT,
                    cover_image_url TEXT,
                    refresh_token TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_full_name ON users(full_name)",
                // Target columns on comments/likes/history carry no foreign key:
                // deletes never cascade and orphans are dropped by the joins.
                "CREATE TABLE videos (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    owner_id INTEGER NOT NULL REFERENCES users(id),
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    video_public_id TEXT NOT NULL,
                    video_url TEXT NOT NULL,
                    thumbnail_public_id TEXT NOT NULL,
                    thumbnail_url TEXT NOT NULL,
                    views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
                    duration REAL NOT NULL DEFAULT 0 CHECK (duration >= 0),
                    is_published INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_videos_owner_id ON videos(owner_id)",
                "CREATE TABLE comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    content TEXT NOT NULL,
                    video_id INTEGER NOT NULL,
                    owner_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_comments_video_id ON comments(video_id)",
                "CREATE TABLE tweets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    content TEXT NOT NULL,
                    owner_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_tweets_owner_id ON tweets(owner_id)",
                "CREATE TABLE likes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    video_id INTEGER,
                    comment_id INTEGER,
                    tweet_id INTEGER,
                    liked_by INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    CHECK ((video_id IS NOT NULL) + (comment_id IS NOT NULL) + (tweet_id IS NOT NULL) = 1)
                )",
                "CREATE UNIQUE INDEX idx_likes_video ON likes(liked_by, video_id) WHERE video_id IS NOT NULL",
                "CREATE UNIQUE INDEX idx_likes_comment ON likes(liked_by, comment_id) WHERE comment_id IS NOT NULL",
                "CREATE UNIQUE INDEX idx_likes_tweet ON likes(liked_by, tweet_id) WHERE tweet_id IS NOT NULL",
                "CREATE INDEX idx_likes_video_id ON likes(video_id)",
                "CREATE INDEX idx_likes_comment_id ON likes(comment_id)",
                "CREATE INDEX idx_likes_tweet_id ON likes(tweet_id)",
                "CREATE TABLE subscriptions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    subscriber_id INTEGER NOT NULL REFERENCES users(id),
                    channel_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (subscriber_id, channel_id)
                )",
                "CREATE INDEX idx_subscriptions_channel_id ON subscriptions(channel_id)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Watch history: one row per (user, video), re-watching moves it to the front
                "CREATE TABLE watch_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    video_id INTEGER NOT NULL,
                    watched_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (user_id, video_id)
                )",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the video store.
    pub fn videos(&self) -> VideoStore {
        VideoStore::new(self.pool.clone())
    }

    /// Get the comment store.
    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    /// Get the like store.
    pub fn likes(&self) -> LikeStore {
        LikeStore::new(self.pool.clone())
    }

    /// Get the subscription store.
    pub fn subscriptions(&self) -> SubscriptionStore {
        SubscriptionStore::new(self.pool.clone())
    }

    /// Get the tweet store.
    pub fn tweets(&self) -> TweetStore {
        TweetStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Whether a database error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(0, 0), Page { page: 1, limit: 1 });
        assert_eq!(Page::new(3, 1000), Page { page: 3, limit: Page::MAX_LIMIT });
        assert_eq!(Page::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_paginated_metadata() {
        let page: Paginated<u8> = Paginated::new(vec![1, 2], 12, Page::new(2, 5));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.paging_counter, 6);
        assert!(page.has_prev_page);
        assert!(page.has_next_page);
        assert_eq!(page.prev_page, Some(1));
        assert_eq!(page.next_page, Some(3));

        let empty: Paginated<u8> = Paginated::new(vec![], 0, Page::default());
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_next_page);
        assert_eq!(empty.next_page, None);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 2);
    }
}
