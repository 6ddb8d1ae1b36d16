//! JWT token generation and validation.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::User;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, checked on every protected request
    Access,
    /// Long-lived refresh token, the single active one is stored on the user row
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user UUID)
    pub sub: String,
    pub email: String,
    pub username: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens. Carries the user id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID, makes two tokens issued in the same second distinct
    pub jti: String,
    /// Subject (user UUID)
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Default access token duration: 1 day
pub const DEFAULT_ACCESS_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Default refresh token duration: 10 days
pub const DEFAULT_REFRESH_TOKEN_DURATION_SECS: u64 = 10 * 24 * 60 * 60;

/// Configuration for JWT operations.
///
/// Access and refresh tokens are signed with separate secrets so a leaked
/// refresh secret cannot mint access tokens and vice versa.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_duration: u64,
    refresh_duration: u64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    /// Create a JWT configuration with the default token lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_durations(
            access_secret,
            refresh_secret,
            DEFAULT_ACCESS_TOKEN_DURATION_SECS,
            DEFAULT_REFRESH_TOKEN_DURATION_SECS,
        )
    }

    pub fn with_durations(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_duration: u64,
        refresh_duration: u64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_duration,
            refresh_duration,
        }
    }

    /// Generate an access token carrying the user's id, email and username.
    pub fn generate_access_token(&self, user: &User) -> Result<SignedToken, JwtError> {
        let now = unix_now()?;

        let claims = AccessClaims {
            sub: user.uuid.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            token_type: TokenType::Access,
            iat: now,
            exp: now + self.access_duration,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            duration: self.access_duration,
        })
    }

    /// Generate a refresh token for a user.
    pub fn generate_refresh_token(&self, user_uuid: &str) -> Result<SignedToken, JwtError> {
        let now = unix_now()?;

        let claims = RefreshClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_uuid.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + self.refresh_duration,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            duration: self.refresh_duration,
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &strict_validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let token_data = jsonwebtoken::decode::<RefreshClaims>(
            token,
            &self.refresh_decoding,
            &strict_validation(),
        )
        .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, expired, malformed)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: 1,
            uuid: "uuid-123".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: "Alice Example".to_string(),
            avatar: crate::media::MediaRef {
                public_id: "avatar".to_string(),
                url: "http://localhost/media/avatar".to_string(),
            },
            cover_image: None,
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    fn config() -> JwtConfig {
        JwtConfig::new(b"access-secret-for-testing", b"refresh-secret-for-testing")
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = config();

        let result = config.generate_access_token(&test_user()).unwrap();
        assert_eq!(result.duration, DEFAULT_ACCESS_TOKEN_DURATION_SECS);

        let claims = config.validate_access_token(&result.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let config = config();

        let result = config.generate_refresh_token("uuid-123").unwrap();
        assert_eq!(result.duration, DEFAULT_REFRESH_TOKEN_DURATION_SECS);

        let claims = config.validate_refresh_token(&result.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let config = config();

        let first = config.generate_refresh_token("uuid-123").unwrap();
        let second = config.generate_refresh_token("uuid-123").unwrap();

        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let config = config();

        let access = config.generate_access_token(&test_user()).unwrap();
        let refresh = config.generate_refresh_token("uuid-123").unwrap();

        assert!(config.validate_refresh_token(&access.token).is_err());
        assert!(config.validate_access_token(&refresh.token).is_err());
    }

    #[test]
    fn test_same_secret_still_checks_token_type() {
        let config = JwtConfig::new(b"shared-secret", b"shared-secret");

        let refresh = config.generate_refresh_token("uuid-123").unwrap();
        let result = config.validate_access_token(&refresh.token);

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_token() {
        assert!(config().validate_access_token("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1", b"refresh-1");
        let config2 = JwtConfig::new(b"secret-2", b"refresh-2");

        let result = config1.generate_access_token(&test_user()).unwrap();

        assert!(config2.validate_access_token(&result.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let secret = b"test-secret";
        let now = unix_now().unwrap();

        let claims = AccessClaims {
            sub: "uuid-123".to_string(),
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            token_type: TokenType::Access,
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let config = JwtConfig::new(secret, b"refresh");
        assert!(config.validate_access_token(&token).is_err());
    }
}
