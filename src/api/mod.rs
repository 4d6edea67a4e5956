mod auth;
mod comments;
mod posts;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::require_auth;
use crate::models::{CommentWithAuthor, Post, UserSummary};
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let gate = from_fn_with_state(state, require_auth);

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/auth/profile",
            get(auth::profile).route_layer(gate.clone()),
        )
        .route(
            "/posts",
            get(posts::list_posts).merge(post(posts::create_post).route_layer(gate.clone())),
        )
        .route(
            "/posts/:id",
            get(posts::get_post).merge(
                put(posts::update_post)
                    .delete(posts::delete_post)
                    .route_layer(gate.clone()),
            ),
        )
        .route(
            "/posts/:id/comments",
            get(comments::list_comments)
                .merge(post(comments::create_comment).route_layer(gate.clone())),
        )
        .route(
            "/posts/:id/comments/:cid",
            delete(comments::delete_comment).route_layer(gate),
        )
}

/// Unwrap a JSON body, reporting malformed payloads as validation errors.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(e.body_text()))
}

pub(crate) fn query_params<T>(
    query: std::result::Result<Query<T>, QueryRejection>,
) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| AppError::Validation(e.body_text()))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid {} ID", what)))
}

#[derive(Debug, Serialize)]
pub struct AuthorResponse {
    pub id: Uuid,
    pub username: String,
}

impl From<UserSummary> for AuthorResponse {
    fn from(summary: UserSummary) -> Self {
        Self {
            id: summary.id,
            username: summary.username,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub comment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            comment_status: post.comment_status.to_string(),
            title: post.title,
            content: post.content,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResponse>,
}

impl From<CommentWithAuthor> for CommentResponse {
    fn from(CommentWithAuthor { comment, author }: CommentWithAuthor) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: comment.created_at,
            author: Some(author.into()),
        }
    }
}
