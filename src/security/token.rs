//! Stateless session tokens (HS256 JWT signed with the server secret).
//!
//! A token binds a user id and username to an expiry. Validation needs only
//! the token and the secret; there is no revocation list, expiry is the only
//! way a token stops working.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{JwtConfig, MAX_JWT_EXPIRY_HOURS};
use crate::error::{AppError, Result};

const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // User ID
    pub username: String,
    pub iat: i64,         // Issued at
    pub exp: i64,         // Expiration time
}

/// Authenticated caller, as recovered from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            config.secret.as_bytes(),
            Duration::hours(config.expiry_hours.min(MAX_JWT_EXPIRY_HOURS) as i64),
        )
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<IssuedToken> {
        self.issue_at(user_id, username, Utc::now())
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Token expiry out of range")))?;
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token generation failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.lifetime.num_seconds(),
        })
    }

    /// Every failure mode (bad signature, malformed, expired, foreign
    /// algorithm) collapses to `Unauthenticated`.
    pub fn validate(&self, token: &str) -> Result<UserIdentity> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                AppError::Unauthenticated
            })?
            .claims;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthenticated)?;

        Ok(UserIdentity {
            user_id,
            username: claims.username,
        })
    }
}
