//! Likes on videos, comments and tweets.
//!
//! A like row points at exactly one target. Toggling is check-then-act in a
//! transaction; the partial unique indexes per target reject a concurrent
//! duplicate insert.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::media::MediaRef;

#[derive(Clone)]
pub struct LikeStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video(i64),
    Comment(i64),
    Tweet(i64),
}

impl LikeTarget {
    fn id(&self) -> i64 {
        match self {
            LikeTarget::Video(id) | LikeTarget::Comment(id) | LikeTarget::Tweet(id) => *id,
        }
    }

    fn find_query(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "SELECT id FROM likes WHERE liked_by = ? AND video_id = ?",
            LikeTarget::Comment(_) => "SELECT id FROM likes WHERE liked_by = ? AND comment_id = ?",
            LikeTarget::Tweet(_) => "SELECT id FROM likes WHERE liked_by = ? AND tweet_id = ?",
        }
    }

    fn insert_query(&self) -> &'static str {
        match self {
            LikeTarget::Video(_) => "INSERT INTO likes (uuid, liked_by, video_id) VALUES (?, ?, ?)",
            LikeTarget::Comment(_) => {
                "INSERT INTO likes (uuid, liked_by, comment_id) VALUES (?, ?, ?)"
            }
            LikeTarget::Tweet(_) => "INSERT INTO likes (uuid, liked_by, tweet_id) VALUES (?, ?, ?)",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDetails {
    pub username: String,
    pub full_name: String,
    pub avatar: MediaRef,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedVideoDetails {
    pub id: String,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    /// Owner's public id
    pub owner: String,
    pub title: String,
    pub description: String,
    pub views: i64,
    pub duration: f64,
    pub created_at: String,
    pub is_published: bool,
    pub owner_details: OwnerDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedVideo {
    pub liked_video: LikedVideoDetails,
}

#[derive(sqlx::FromRow)]
struct LikedVideoRow {
    uuid: String,
    video_public_id: String,
    video_url: String,
    thumbnail_public_id: String,
    thumbnail_url: String,
    owner_uuid: String,
    title: String,
    description: String,
    views: i64,
    duration: f64,
    created_at: String,
    is_published: bool,
    owner_username: String,
    owner_full_name: String,
    owner_avatar_public_id: String,
    owner_avatar_url: String,
}

impl From<LikedVideoRow> for LikedVideo {
    fn from(row: LikedVideoRow) -> Self {
        Self {
            liked_video: LikedVideoDetails {
                id: row.uuid,
                video_file: MediaRef {
                    public_id: row.video_public_id,
                    url: row.video_url,
                },
                thumbnail: MediaRef {
                    public_id: row.thumbnail_public_id,
                    url: row.thumbnail_url,
                },
                owner: row.owner_uuid,
                title: row.title,
                description: row.description,
                views: row.views,
                duration: row.duration,
                created_at: row.created_at,
                is_published: row.is_published,
                owner_details: OwnerDetails {
                    username: row.owner_username,
                    full_name: row.owner_full_name,
                    avatar: MediaRef {
                        public_id: row.owner_avatar_public_id,
                        url: row.owner_avatar_url,
                    },
                },
            },
        }
    }
}

impl LikeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Like the target if the user has not, unlike it otherwise.
    /// Returns `true` when the target is liked afterwards.
    pub async fn toggle(&self, user_id: i64, target: LikeTarget) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as(target.find_query())
            .bind(user_id)
            .bind(target.id())
            .fetch_optional(&mut *tx)
            .await?;

        let liked = match existing {
            Some((like_id,)) => {
                sqlx::query("DELETE FROM likes WHERE id = ?")
                    .bind(like_id)
                    .execute(&mut *tx)
                    .await?;
                false
            }
            None => {
                sqlx::query(target.insert_query())
                    .bind(uuid::Uuid::new_v4().to_string())
                    .bind(user_id)
                    .bind(target.id())
                    .execute(&mut *tx)
                    .await?;
                true
            }
        };

        tx.commit().await?;
        Ok(liked)
    }

    /// Number of like rows a user holds on a target (0 or 1).
    pub async fn count(&self, user_id: i64, target: LikeTarget) -> Result<i64, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(target.find_query())
            .bind(user_id)
            .bind(target.id())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.len() as i64)
    }

    /// Videos the user liked, newest like first. Likes whose video or
    /// video owner no longer exists are skipped.
    pub async fn liked_videos(&self, user_id: i64) -> Result<Vec<LikedVideo>, sqlx::Error> {
        let rows: Vec<LikedVideoRow> = sqlx::query_as(
            "SELECT v.uuid, v.video_public_id, v.video_url,
                v.thumbnail_public_id, v.thumbnail_url,
                u.uuid AS owner_uuid, v.title, v.description, v.views, v.duration,
                v.created_at, v.is_published,
                u.username AS owner_username, u.full_name AS owner_full_name,
                u.avatar_public_id AS owner_avatar_public_id, u.avatar_url AS owner_avatar_url
             FROM likes l
             JOIN videos v ON v.id = l.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE l.liked_by = ?
             ORDER BY l.created_at DESC, l.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LikedVideo::from).collect())
    }
}
