use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::media::MediaRef;

#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberDetails {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: MediaRef,
    /// Whether the channel subscribes back to this subscriber
    pub subscribed_to_subscriber: bool,
    pub subscribers_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriberView {
    pub subscriber: SubscriberDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestVideo {
    pub id: String,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    /// Owner's public id
    pub owner: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDetails {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: MediaRef,
    pub latest_video: Option<LatestVideo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedChannel {
    pub channel_details: ChannelDetails,
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    uuid: String,
    username: String,
    full_name: String,
    avatar_public_id: String,
    avatar_url: String,
    subscribed_to_subscriber: i64,
    subscribers_count: i64,
}

impl From<SubscriberRow> for SubscriberView {
    fn from(row: SubscriberRow) -> Self {
        Self {
            subscriber: SubscriberDetails {
                id: row.uuid,
                username: row.username,
                full_name: row.full_name,
                avatar: MediaRef {
                    public_id: row.avatar_public_id,
                    url: row.avatar_url,
                },
                subscribed_to_subscriber: row.subscribed_to_subscriber != 0,
                subscribers_count: row.subscribers_count,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubscribedChannelRow {
    uuid: String,
    username: String,
    full_name: String,
    avatar_public_id: String,
    avatar_url: String,
    video_uuid: Option<String>,
    video_public_id: Option<String>,
    video_url: Option<String>,
    thumbnail_public_id: Option<String>,
    thumbnail_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    video_created_at: Option<String>,
}

impl From<SubscribedChannelRow> for SubscribedChannel {
    fn from(row: SubscribedChannelRow) -> Self {
        let latest_video = match (
            row.video_uuid,
            row.video_public_id,
            row.video_url,
            row.thumbnail_public_id,
            row.thumbnail_url,
        ) {
            (Some(id), Some(video_public_id), Some(video_url), Some(thumb_id), Some(thumb_url)) => {
                Some(LatestVideo {
                    id,
                    video_file: MediaRef {
                        public_id: video_public_id,
                        url: video_url,
                    },
                    thumbnail: MediaRef {
                        public_id: thumb_id,
                        url: thumb_url,
                    },
                    owner: row.uuid.clone(),
                    title: row.title.unwrap_or_default(),
                    description: row.description.unwrap_or_default(),
                    duration: row.duration.unwrap_or_default(),
                    created_at: row.video_created_at.unwrap_or_default(),
                })
            }
            _ => None,
        };

        Self {
            channel_details: ChannelDetails {
                id: row.uuid,
                username: row.username,
                full_name: row.full_name,
                avatar: MediaRef {
                    public_id: row.avatar_public_id,
                    url: row.avatar_url,
                },
                latest_video,
            },
        }
    }
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe if not subscribed, unsubscribe otherwise.
    /// Returns `true` when subscribed afterwards.
    pub async fn toggle(&self, subscriber_id: i64, channel_id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .fetch_optional(&mut *tx)
        .await?;

        let subscribed = match existing {
            Some((id,)) => {
                sqlx::query("DELETE FROM subscriptions WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                false
            }
            None => {
                sqlx::query(
                    "INSERT INTO subscriptions (uuid, subscriber_id, channel_id) VALUES (?, ?, ?)",
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(subscriber_id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
                true
            }
        };

        tx.commit().await?;
        Ok(subscribed)
    }

    /// Whether `subscriber_id` currently subscribes to `channel_id`.
    pub async fn is_subscribed(
        &self,
        subscriber_id: i64,
        channel_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM subscriptions
                            WHERE subscriber_id = ? AND channel_id = ?)",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 != 0)
    }

    /// Subscribers of a channel, each with their own subscriber count and
    /// whether the channel subscribes back to them.
    pub async fn subscribers(&self, channel_id: i64) -> Result<Vec<SubscriberView>, sqlx::Error> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            "SELECT u.uuid, u.username, u.full_name, u.avatar_public_id, u.avatar_url,
                EXISTS (SELECT 1 FROM subscriptions back
                        WHERE back.subscriber_id = s.channel_id
                          AND back.channel_id = u.id) AS subscribed_to_subscriber,
                (SELECT COUNT(*) FROM subscriptions theirs
                 WHERE theirs.channel_id = u.id) AS subscribers_count
             FROM subscriptions s
             JOIN users u ON u.id = s.subscriber_id
             WHERE s.channel_id = ?
             ORDER BY s.id",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SubscriberView::from).collect())
    }

    /// Channels a user subscribes to, each with its most recent video.
    pub async fn subscribed_channels(
        &self,
        subscriber_id: i64,
    ) -> Result<Vec<SubscribedChannel>, sqlx::Error> {
        let rows: Vec<SubscribedChannelRow> = sqlx::query_as(
            "SELECT u.uuid, u.username, u.full_name, u.avatar_public_id, u.avatar_url,
                v.uuid AS video_uuid, v.video_public_id, v.video_url,
                v.thumbnail_public_id, v.thumbnail_url, v.title, v.description, v.duration,
                v.created_at AS video_created_at
             FROM subscriptions s
             JOIN users u ON u.id = s.channel_id
             LEFT JOIN videos v ON v.id = (SELECT MAX(id) FROM videos WHERE owner_id = u.id)
             WHERE s.subscriber_id = ?
             ORDER BY s.id",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SubscribedChannel::from).collect())
    }
}
