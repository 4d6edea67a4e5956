use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::json_body;
use crate::error::Result;
use crate::models::User;
use crate::security::UserIdentity;
use crate::services::{AuthService, LoginInput, RegisterInput};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            post_count: user.post_count,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

pub(super) async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterInput>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let input = json_body(payload)?;

    let auth_service = AuthService::new(state.store.clone(), state.tokens.clone());
    let user = auth_service.register(input).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub(super) async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let input = json_body(payload)?;

    let auth_service = AuthService::new(state.store.clone(), state.tokens.clone());
    let (user, issued) = auth_service.authenticate(input).await?;

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_in: issued.expires_in,
        user: user.into(),
    }))
}

pub(super) async fn profile(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<UserResponse>> {
    let auth_service = AuthService::new(state.store.clone(), state.tokens.clone());
    let user = auth_service.profile(identity.user_id).await?;

    Ok(Json(user.into()))
}
