//! Video storage and the video read views (listing, detail, watch history).

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::{OwnerSummary, Page, Paginated};
use crate::media::MediaRef;

#[derive(Clone)]
pub struct VideoStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Video {
    pub id: i64,
    pub uuid: String,
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub views: i64,
    pub duration: f64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewVideo<'a> {
    pub owner_id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub video_file: &'a MediaRef,
    pub thumbnail: &'a MediaRef,
    pub duration: f64,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Default)]
pub struct VideoUpdate<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub thumbnail: Option<&'a MediaRef>,
}

/// A video joined with its owner's public summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoWithOwner {
    pub id: String,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,
    pub views: i64,
    pub duration: f64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub owner: OwnerSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOwner {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: MediaRef,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

/// Single video page as seen by a viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: String,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,
    pub views: i64,
    pub duration: f64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub owner: ChannelOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSort {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(VideoSort::CreatedAt),
            "views" => Some(VideoSort::Views),
            "duration" => Some(VideoSort::Duration),
            "title" => Some(VideoSort::Title),
            _ => None,
        }
    }
}

/// Which videos a listing shows. Unpublished videos are only visible to
/// their owner.
pub struct VideoFilter<'a> {
    pub viewer_id: i64,
    pub owner_id: Option<i64>,
    pub search: Option<&'a str>,
    pub sort: VideoSort,
    pub ascending: bool,
}

macro_rules! video_columns {
    () => {
        "v.id, v.uuid, v.owner_id, v.title, v.description, v.video_public_id, v.video_url, \
         v.thumbnail_public_id, v.thumbnail_url, v.views, v.duration, v.is_published, \
         v.created_at, v.updated_at"
    };
}

macro_rules! owner_columns {
    () => {
        "u.uuid AS owner_uuid, u.username AS owner_username, u.full_name AS owner_full_name, \
         u.avatar_public_id AS owner_avatar_public_id, u.avatar_url AS owner_avatar_url"
    };
}

macro_rules! list_filter {
    () => {
        " FROM videos v JOIN users u ON u.id = v.owner_id
          WHERE (v.is_published = 1 OR v.owner_id = ?)
            AND (? IS NULL OR v.owner_id = ?)
            AND (? IS NULL OR v.title LIKE ? ESCAPE '\\' OR v.description LIKE ? ESCAPE '\\')"
    };
}

macro_rules! list_sql {
    ($order:literal) => {
        concat!(
            "SELECT ",
            video_columns!(),
            ", ",
            owner_columns!(),
            list_filter!(),
            " ORDER BY ",
            $order,
            " LIMIT ? OFFSET ?"
        )
    };
}

fn list_query(sort: VideoSort, ascending: bool) -> &'static str {
    match (sort, ascending) {
        (VideoSort::CreatedAt, true) => list_sql!("v.created_at ASC, v.id ASC"),
        (VideoSort::CreatedAt, false) => list_sql!("v.created_at DESC, v.id DESC"),
        (VideoSort::Views, true) => list_sql!("v.views ASC, v.id ASC"),
        (VideoSort::Views, false) => list_sql!("v.views DESC, v.id DESC"),
        (VideoSort::Duration, true) => list_sql!("v.duration ASC, v.id ASC"),
        (VideoSort::Duration, false) => list_sql!("v.duration DESC, v.id DESC"),
        (VideoSort::Title, true) => list_sql!("v.title COLLATE NOCASE ASC, v.id ASC"),
        (VideoSort::Title, false) => list_sql!("v.title COLLATE NOCASE DESC, v.id DESC"),
    }
}

/// Escape LIKE wildcards and wrap the term for a substring match.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    id: i64,
    uuid: String,
    owner_id: i64,
    title: String,
    description: String,
    video_public_id: String,
    video_url: String,
    thumbnail_public_id: String,
    thumbnail_url: String,
    views: i64,
    duration: f64,
    is_published: bool,
    created_at: String,
    updated_at: String,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            video_file: MediaRef {
                public_id: row.video_public_id,
                url: row.video_url,
            },
            thumbnail: MediaRef {
                public_id: row.thumbnail_public_id,
                url: row.thumbnail_url,
            },
            views: row.views,
            duration: row.duration,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OwnerRow {
    owner_uuid: String,
    owner_username: String,
    owner_full_name: String,
    owner_avatar_public_id: String,
    owner_avatar_url: String,
}

impl From<OwnerRow> for OwnerSummary {
    fn from(row: OwnerRow) -> Self {
        Self {
            id: row.owner_uuid,
            username: row.owner_username,
            full_name: row.owner_full_name,
            avatar: MediaRef {
                public_id: row.owner_avatar_public_id,
                url: row.owner_avatar_url,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoWithOwnerRow {
    #[sqlx(flatten)]
    video: VideoRow,
    #[sqlx(flatten)]
    owner: OwnerRow,
}

impl From<VideoWithOwnerRow> for VideoWithOwner {
    fn from(row: VideoWithOwnerRow) -> Self {
        let video = Video::from(row.video);
        Self {
            id: video.uuid,
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            views: video.views,
            duration: video.duration,
            is_published: video.is_published,
            created_at: video.created_at,
            updated_at: video.updated_at,
            owner: row.owner.into(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoDetailRow {
    #[sqlx(flatten)]
    video: VideoRow,
    #[sqlx(flatten)]
    owner: OwnerRow,
    likes_count: i64,
    is_liked: i64,
    owner_subscribers_count: i64,
    owner_is_subscribed: i64,
}

impl From<VideoDetailRow> for VideoDetail {
    fn from(row: VideoDetailRow) -> Self {
        let video = Video::from(row.video);
        let owner = OwnerSummary::from(row.owner);
        Self {
            id: video.uuid,
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            views: video.views,
            duration: video.duration,
            is_published: video.is_published,
            created_at: video.created_at,
            updated_at: video.updated_at,
            likes_count: row.likes_count,
            is_liked: row.is_liked != 0,
            owner: ChannelOwner {
                id: owner.id,
                username: owner.username,
                full_name: owner.full_name,
                avatar: owner.avatar,
                subscribers_count: row.owner_subscribers_count,
                is_subscribed: row.owner_is_subscribed != 0,
            },
        }
    }
}

impl VideoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Publish a new video and return it.
    pub async fn create(&self, new_video: &NewVideo<'_>) -> Result<Video, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO videos (uuid, owner_id, title, description, video_public_id, video_url,
                thumbnail_public_id, thumbnail_url, duration)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(new_video.owner_id)
        .bind(new_video.title)
        .bind(new_video.description)
        .bind(&new_video.video_file.public_id)
        .bind(&new_video.video_file.url)
        .bind(&new_video.thumbnail.public_id)
        .bind(&new_video.thumbnail.url)
        .bind(new_video.duration.max(0.0))
        .execute(&self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Video>, sqlx::Error> {
        let row: Option<VideoRow> =
            sqlx::query_as(concat!("SELECT ", video_columns!(), " FROM videos v WHERE v.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Video::from))
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Video>, sqlx::Error> {
        let row: Option<VideoRow> = sqlx::query_as(concat!(
            "SELECT ",
            video_columns!(),
            " FROM videos v WHERE v.uuid = ?"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Video::from))
    }

    /// Get a video joined with its owner.
    pub async fn get_with_owner(&self, id: i64) -> Result<Option<VideoWithOwner>, sqlx::Error> {
        let row: Option<VideoWithOwnerRow> = sqlx::query_as(concat!(
            "SELECT ",
            video_columns!(),
            ", ",
            owner_columns!(),
            " FROM videos v JOIN users u ON u.id = v.owner_id WHERE v.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VideoWithOwner::from))
    }

    /// Apply a partial update. Returns `false` if the video does not exist.
    pub async fn update(&self, id: i64, update: &VideoUpdate<'_>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                thumbnail_public_id = COALESCE(?, thumbnail_public_id),
                thumbnail_url = COALESCE(?, thumbnail_url),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.title)
        .bind(update.description)
        .bind(update.thumbnail.map(|t| t.public_id.as_str()))
        .bind(update.thumbnail.map(|t| t.url.as_str()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip the published flag. Returns the new state, or `None` if the
    /// video does not exist.
    pub async fn toggle_publish(&self, id: i64) -> Result<Option<bool>, sqlx::Error> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE videos SET is_published = NOT is_published, updated_at = datetime('now')
             WHERE id = ?
             RETURNING is_published",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Hard delete. Comments, likes and history entries pointing at the
    /// video are left in place.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a view and move the video to the front of the viewer's history.
    pub async fn record_view(&self, video_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE videos SET views = views + 1 WHERE id = ?")
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM watch_history WHERE user_id = ? AND video_id = ?")
            .bind(user_id)
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO watch_history (user_id, video_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The viewer's watch history, most recently watched first.
    /// Entries whose video no longer exists are skipped.
    pub async fn watch_history(&self, user_id: i64) -> Result<Vec<VideoWithOwner>, sqlx::Error> {
        let rows: Vec<VideoWithOwnerRow> = sqlx::query_as(concat!(
            "SELECT ",
            video_columns!(),
            ", ",
            owner_columns!(),
            " FROM watch_history h
              JOIN videos v ON v.id = h.video_id
              JOIN users u ON u.id = v.owner_id
              WHERE h.user_id = ?
              ORDER BY h.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VideoWithOwner::from).collect())
    }

    /// One page of videos matching the filter, plus the total match count.
    pub async fn list(
        &self,
        filter: &VideoFilter<'_>,
        page: Page,
    ) -> Result<Paginated<VideoWithOwner>, sqlx::Error> {
        let pattern = filter.search.map(like_pattern);

        let total: (i64,) = sqlx::query_as(concat!("SELECT COUNT(*)", list_filter!()))
            .bind(filter.viewer_id)
            .bind(filter.owner_id)
            .bind(filter.owner_id)
            .bind(pattern.as_deref())
            .bind(pattern.as_deref())
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<VideoWithOwnerRow> =
            sqlx::query_as(list_query(filter.sort, filter.ascending))
                .bind(filter.viewer_id)
                .bind(filter.owner_id)
                .bind(filter.owner_id)
                .bind(pattern.as_deref())
                .bind(pattern.as_deref())
                .bind(pattern.as_deref())
                .bind(page.limit as i64)
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await?;

        Ok(Paginated::new(
            rows.into_iter().map(VideoWithOwner::from).collect(),
            total.0,
            page,
        ))
    }

    /// A video with like and subscription data for the given viewer.
    pub async fn detail(
        &self,
        video_id: i64,
        viewer_id: i64,
    ) -> Result<Option<VideoDetail>, sqlx::Error> {
        let row: Option<VideoDetailRow> = sqlx::query_as(concat!(
            "SELECT ",
            video_columns!(),
            ", ",
            owner_columns!(),
            ",
                (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id) AS likes_count,
                EXISTS (SELECT 1 FROM likes l
                        WHERE l.video_id = v.id AND l.liked_by = ?) AS is_liked,
                (SELECT COUNT(*) FROM subscriptions s
                 WHERE s.channel_id = v.owner_id) AS owner_subscribers_count,
                EXISTS (SELECT 1 FROM subscriptions s
                        WHERE s.channel_id = v.owner_id AND s.subscriber_id = ?)
                    AS owner_is_subscribed
             FROM videos v JOIN users u ON u.id = v.owner_id
             WHERE v.id = ?"
        ))
        .bind(viewer_id)
        .bind(viewer_id)
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VideoDetail::from))
    }
}
