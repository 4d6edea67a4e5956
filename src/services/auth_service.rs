//! Credential service: registration, login and token validation.
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::{StorageError, Store};
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use crate::security::{self, IssuedToken, TokenService, UserIdentity};
use crate::validators;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(max = 254))]
    pub email: String,
}

impl RegisterInput {
    /// Trim identifiers and lower-case the email; the password is kept verbatim.
    fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            password: self.password,
            email: self.email.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<User> {
        let input = input.normalized();
        input.validate()?;

        if !validators::validate_username(&input.username) {
            return Err(AppError::Validation(
                "username may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }
        if !validators::validate_email(&input.email) {
            return Err(AppError::Validation("email is not a valid address".to_string()));
        }

        // Hash outside the transaction so no row or store lock is held for it.
        let password = input.password;
        let password_hash = run_blocking(move || security::hash_password(&password)).await?;

        let mut tx = self.store.begin().await?;

        if tx.find_user_by_username(&input.username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if tx.find_user_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let user = tx
            .insert_user(NewUser {
                username: input.username,
                email: input.email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StorageError::UniqueViolation { constraint } if constraint.contains("email") => {
                    AppError::Conflict("Email already exists".to_string())
                }
                StorageError::UniqueViolation { .. } => {
                    AppError::Conflict("Username already exists".to_string())
                }
                other => AppError::Storage(other),
            })?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Unknown username and wrong password are indistinguishable to the
    /// caller: same error, same hashing work.
    pub async fn authenticate(&self, input: LoginInput) -> Result<(User, IssuedToken)> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let user = tx.find_user_by_username(input.username.trim()).await?;
        tx.commit().await?;

        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let password = input.password;
        let verified = run_blocking(move || {
            security::verify_password_or_dummy(&password, stored_hash.as_deref())
        })
        .await?;

        match user {
            Some(user) if verified => {
                let token = self.tokens.issue(user.id, &user.username)?;
                tracing::info!(user_id = %user.id, "User logged in");
                Ok((user, token))
            }
            _ => {
                tracing::warn!("Login failed");
                Err(AppError::InvalidCredentials)
            }
        }
    }

    /// Pure check of the token against the signing secret; no storage access.
    pub fn validate_token(&self, token: &str) -> Result<UserIdentity> {
        self.tokens.validate(token)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User> {
        let mut tx = self.store.begin().await?;
        let user = tx
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        tx.commit().await?;
        Ok(user)
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Blocking task failed: {}", e)))?
}
