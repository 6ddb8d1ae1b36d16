use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use crate::media::MediaRef;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// An account as seen by the rest of the server.
/// Never carries the password hash or the stored refresh token.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: MediaRef,
    pub cover_image: Option<MediaRef>,
    pub created_at: String,
    pub updated_at: String,
}

/// An account together with its password hash, used only by login and
/// password changes.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Input for account creation. Username and email are stored lowercased.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar: &'a MediaRef,
    pub cover_image: Option<&'a MediaRef>,
}

/// Public channel page for a username, as seen by a given viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar: MediaRef,
    pub cover_image: Option<MediaRef>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

macro_rules! user_columns {
    () => {
        "id, uuid, username, email, full_name, avatar_public_id, avatar_url, \
         cover_image_public_id, cover_image_url, created_at, updated_at"
    };
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    username: String,
    email: String,
    full_name: String,
    avatar_public_id: String,
    avatar_url: String,
    cover_image_public_id: Option<String>,
    cover_image_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            avatar: MediaRef {
                public_id: row.avatar_public_id,
                url: row.avatar_url,
            },
            cover_image: media_ref(row.cover_image_public_id, row.cover_image_url),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password: String,
}

#[derive(sqlx::FromRow)]
struct ChannelProfileRow {
    id: String,
    username: String,
    full_name: String,
    email: String,
    avatar_public_id: String,
    avatar_url: String,
    cover_image_public_id: Option<String>,
    cover_image_url: Option<String>,
    subscribers_count: i64,
    channels_subscribed_to_count: i64,
    is_subscribed: i64,
}

impl From<ChannelProfileRow> for ChannelProfile {
    fn from(row: ChannelProfileRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            email: row.email,
            avatar: MediaRef {
                public_id: row.avatar_public_id,
                url: row.avatar_url,
            },
            cover_image: media_ref(row.cover_image_public_id, row.cover_image_url),
            subscribers_count: row.subscribers_count,
            channels_subscribed_to_count: row.channels_subscribed_to_count,
            is_subscribed: row.is_subscribed != 0,
        }
    }
}

/// Rebuild an optional media reference from its two nullable columns.
fn media_ref(public_id: Option<String>, url: Option<String>) -> Option<MediaRef> {
    match (public_id, url) {
        (Some(public_id), Some(url)) => Some(MediaRef { public_id, url }),
        _ => None,
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new account and return it.
    pub async fn create(&self, new_user: &NewUser<'_>) -> Result<User, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO users (uuid, username, email, full_name, password,
                avatar_public_id, avatar_url, cover_image_public_id, cover_image_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(new_user.username.to_lowercase())
        .bind(new_user.email.to_lowercase())
        .bind(new_user.full_name)
        .bind(new_user.password_hash)
        .bind(&new_user.avatar.public_id)
        .bind(&new_user.avatar.url)
        .bind(new_user.cover_image.map(|c| c.public_id.as_str()))
        .bind(new_user.cover_image.map(|c| c.url.as_str()))
        .execute(&self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(concat!("SELECT ", user_columns!(), " FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(concat!("SELECT ", user_columns!(), " FROM users WHERE uuid = ?"))
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Whether a username or email is already taken.
    pub async fn is_taken(&self, username: &str, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username.to_lowercase())
                .bind(email.to_lowercase())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Look up login credentials by username or email. Either may be absent.
    pub async fn find_credentials(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserCredentials>, sqlx::Error> {
        let row: Option<CredentialsRow> = sqlx::query_as(concat!(
            "SELECT ",
            user_columns!(),
            ", password FROM users WHERE username = ? OR email = ? LIMIT 1"
        ))
        .bind(username.map(str::to_lowercase))
        .bind(email.map(str::to_lowercase))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| UserCredentials {
            user: User::from(row.user),
            password_hash: row.password,
        }))
    }

    /// Get the stored password hash for a user.
    pub async fn get_password_hash(&self, id: i64) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT password FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Replace the stored password hash.
    pub async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the single active refresh token of a user.
    /// Outer `None` means the user does not exist.
    #[cfg(test)]
    pub(crate) async fn get_refresh_token(&self, id: i64) -> Result<Option<Option<String>>, sqlx::Error> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT refresh_token FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Overwrite (or clear with `None`) the active refresh token.
    pub async fn set_refresh_token(
        &self,
        id: i64,
        token: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Swap the active refresh token for `next`, but only while it still
    /// equals `current`. Returns false when another rotation got there first.
    pub async fn replace_refresh_token(
        &self,
        id: i64,
        current: &str,
        next: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ? AND refresh_token = ?")
                .bind(next)
                .bind(id)
                .bind(current)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update full name and email. Returns the updated user.
    pub async fn update_account(
        &self,
        id: i64,
        full_name: &str,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET full_name = ?, email = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(full_name)
        .bind(email.to_lowercase())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Point the avatar at a new asset. Returns the updated user.
    pub async fn set_avatar(&self, id: i64, avatar: &MediaRef) -> Result<Option<User>, sqlx::Error> {
        sqlx::query(
            "UPDATE users SET avatar_public_id = ?, avatar_url = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&avatar.public_id)
        .bind(&avatar.url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_by_id(id).await
    }

    /// Point the cover image at a new asset. Returns the updated user.
    pub async fn set_cover_image(
        &self,
        id: i64,
        cover_image: &MediaRef,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query(
            "UPDATE users SET cover_image_public_id = ?, cover_image_url = ?,
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&cover_image.public_id)
        .bind(&cover_image.url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.get_by_id(id).await
    }

    /// Channel page for a username with subscription counts, computed per read.
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: i64,
    ) -> Result<Option<ChannelProfile>, sqlx::Error> {
        let row: Option<ChannelProfileRow> = sqlx::query_as(
            "SELECT u.uuid AS id, u.username, u.full_name, u.email,
                u.avatar_public_id, u.avatar_url, u.cover_image_public_id, u.cover_image_url,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                    AS subscribers_count,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                    AS channels_subscribed_to_count,
                EXISTS (SELECT 1 FROM subscriptions s
                        WHERE s.channel_id = u.id AND s.subscriber_id = ?) AS is_subscribed
             FROM users u
             WHERE u.username = ?",
        )
        .bind(viewer_id)
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ChannelProfile::from))
    }
}
