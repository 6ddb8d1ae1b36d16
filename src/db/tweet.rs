use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TweetStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tweet {
    pub id: i64,
    pub uuid: String,
    pub content: String,
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetAvatar {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetOwner {
    pub username: String,
    pub avatar: TweetAvatar,
}

/// A tweet in an author's feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub likes_count: i64,
    pub owner_details: TweetOwner,
}

#[derive(sqlx::FromRow)]
struct TweetViewRow {
    uuid: String,
    content: String,
    created_at: String,
    likes_count: i64,
    username: String,
    avatar_url: String,
}

impl From<TweetViewRow> for TweetView {
    fn from(row: TweetViewRow) -> Self {
        Self {
            id: row.uuid,
            content: row.content,
            created_at: row.created_at,
            likes_count: row.likes_count,
            owner_details: TweetOwner {
                username: row.username,
                avatar: TweetAvatar {
                    url: row.avatar_url,
                },
            },
        }
    }
}

impl TweetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner_id: i64, content: &str) -> Result<Tweet, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO tweets (uuid, content, owner_id) VALUES (?, ?, ?)
             RETURNING id, uuid, content, owner_id, created_at, updated_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(content)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Tweet>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, content, owner_id, created_at, updated_at
             FROM tweets WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<Tweet>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE tweets SET content = ?, updated_at = datetime('now') WHERE id = ?
             RETURNING id, uuid, content, owner_id, created_at, updated_at",
        )
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tweets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All tweets of one author with their like counts, oldest first.
    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<TweetView>, sqlx::Error> {
        let rows: Vec<TweetViewRow> = sqlx::query_as(
            "SELECT t.uuid, t.content, t.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id) AS likes_count,
                u.username, u.avatar_url
             FROM tweets t JOIN users u ON u.id = t.owner_id
             WHERE t.owner_id = ?
             ORDER BY t.id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TweetView::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::create_user;
    use crate::db::{Database, LikeTarget};

    #[tokio::test]
    async fn test_feed_with_like_counts() {
        let db = Database::open(":memory:").await.unwrap();
        let amy = create_user(&db, "amy").await;
        let bob = create_user(&db, "bob").await;

        let first = db.tweets().create(amy.id, "first").await.unwrap();
        db.tweets().create(amy.id, "second").await.unwrap();
        db.tweets().create(bob.id, "not amy's").await.unwrap();

        db.likes().toggle(bob.id, LikeTarget::Tweet(first.id)).await.unwrap();

        let feed = db.tweets().list_by_owner(amy.id).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].id, first.uuid);
        assert_eq!(feed[0].likes_count, 1);
        assert_eq!(feed[1].likes_count, 0);
        assert_eq!(feed[0].owner_details.username, "amy");
        assert_eq!(feed[0].owner_details.avatar.url, amy.avatar.url);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = Database::open(":memory:").await.unwrap();
        let amy = create_user(&db, "amy").await;
        let tweet = db.tweets().create(amy.id, "draft").await.unwrap();

        let updated = db.tweets().update_content(tweet.id, "final").await.unwrap().unwrap();
        assert_eq!(updated.content, "final");

        assert!(db.tweets().delete(tweet.id).await.unwrap());
        assert!(db.tweets().update_content(tweet.id, "x").await.unwrap().is_none());
    }
}
