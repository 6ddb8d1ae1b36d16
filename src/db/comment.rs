use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::{OwnerSummary, Page, Paginated};
use crate::media::MediaRef;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub uuid: String,
    pub content: String,
    pub video_id: i64,
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A comment in a video's feed, as seen by one viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub likes_count: i64,
    pub is_liked: bool,
    pub owner: OwnerSummary,
}

#[derive(sqlx::FromRow)]
struct CommentViewRow {
    uuid: String,
    content: String,
    created_at: String,
    likes_count: i64,
    is_liked: i64,
    owner_uuid: String,
    owner_username: String,
    owner_full_name: String,
    owner_avatar_public_id: String,
    owner_avatar_url: String,
}

impl From<CommentViewRow> for CommentView {
    fn from(row: CommentViewRow) -> Self {
        Self {
            id: row.uuid,
            content: row.content,
            created_at: row.created_at,
            likes_count: row.likes_count,
            is_liked: row.is_liked != 0,
            owner: OwnerSummary {
                id: row.owner_uuid,
                username: row.owner_username,
                full_name: row.owner_full_name,
                avatar: MediaRef {
                    public_id: row.owner_avatar_public_id,
                    url: row.owner_avatar_url,
                },
            },
        }
    }
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        video_id: i64,
        owner_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        sqlx::query_as(
            "INSERT INTO comments (uuid, content, video_id, owner_id) VALUES (?, ?, ?, ?)
             RETURNING id, uuid, content, video_id, owner_id, created_at, updated_at",
        )
        .bind(&uuid)
        .bind(content)
        .bind(video_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, content, video_id, owner_id, created_at, updated_at
             FROM comments WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
    }

    /// Replace the content. Returns the updated comment.
    pub async fn update_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE comments SET content = ?, updated_at = datetime('now') WHERE id = ?
             RETURNING id, uuid, content, video_id, owner_id, created_at, updated_at",
        )
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Comment feed of a video in posting order, with like counts and
    /// whether the viewer liked each comment.
    pub async fn list_for_video(
        &self,
        video_id: i64,
        viewer_id: i64,
        page: Page,
    ) -> Result<Paginated<CommentView>, sqlx::Error> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM comments c JOIN users u ON u.id = c.owner_id
             WHERE c.video_id = ?",
        )
        .bind(video_id)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<CommentViewRow> = sqlx::query_as(
            "SELECT c.uuid, c.content, c.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id) AS likes_count,
                EXISTS (SELECT 1 FROM likes l
                        WHERE l.comment_id = c.id AND l.liked_by = ?) AS is_liked,
                u.uuid AS owner_uuid, u.username AS owner_username,
                u.full_name AS owner_full_name,
                u.avatar_public_id AS owner_avatar_public_id, u.avatar_url AS owner_avatar_url
             FROM comments c JOIN users u ON u.id = c.owner_id
             WHERE c.video_id = ?
             ORDER BY c.id
             LIMIT ? OFFSET ?",
        )
        .bind(viewer_id)
        .bind(video_id)
        .bind(page.limit as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(
            rows.into_iter().map(CommentView::from).collect(),
            total.0,
            page,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_user, create_video};
    use crate::db::{Database, LikeTarget};

    #[tokio::test]
    async fn test_create_update_delete() {
        let db = Database::open(":memory:").await.unwrap();
        let amy = create_user(&db, "amy").await;
        let video = create_video(&db, &amy, "clip").await;

        let comment = db.comments().create(video.id, amy.id, "hello").await.unwrap();
        assert_eq!(comment.owner_id, amy.id);

        let updated = db
            .comments()
            .update_content(comment.id, "edited")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.content, "edited");
        assert_eq!(updated.uuid, comment.uuid);

        assert!(db.comments().delete(comment.id).await.unwrap());
        assert!(db.comments().get_by_uuid(&comment.uuid).await.unwrap().is_none());
        assert!(!db.comments().delete(comment.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_feed_counts_likes_and_paginates() {
        let db = Database::open(":memory:").await.unwrap();
        let amy = create_user(&db, "amy").await;
        let bob = create_user(&db, "bob").await;
        let video = create_video(&db, &amy, "clip").await;
        let other = create_video(&db, &amy, "other").await;

        let mut comments = Vec::new();
        for i in 0..5 {
            comments.push(
                db.comments()
                    .create(video.id, bob.id, &format!("comment {}", i))
                    .await
                    .unwrap(),
            );
        }
        db.comments().create(other.id, bob.id, "elsewhere").await.unwrap();

        db.likes()
            .toggle(amy.id, LikeTarget::Comment(comments[0].id))
            .await
            .unwrap();
        db.likes()
            .toggle(bob.id, LikeTarget::Comment(comments[0].id))
            .await
            .unwrap();

        let first = db
            .comments()
            .list_for_video(video.id, amy.id, Page::new(1, 2))
            .await
            .unwrap();
        assert_eq!(first.total_docs, 5);
        assert_eq!(first.docs.len(), 2);
        assert_eq!(first.docs[0].content, "comment 0");
        assert_eq!(first.docs[0].likes_count, 2);
        assert!(first.docs[0].is_liked);
        assert!(!first.docs[1].is_liked);
        assert_eq!(first.docs[0].owner.username, "bob");

        let last = db
            .comments()
            .list_for_video(video.id, amy.id, Page::new(3, 2))
            .await
            .unwrap();
        assert_eq!(last.docs.len(), 1);
        assert_eq!(last.docs[0].content, "comment 4");
        assert!(!last.has_next_page);
    }
}
