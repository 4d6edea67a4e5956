use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;

use super::{json_body, parse_id, CommentResponse};
use crate::error::Result;
use crate::security::UserIdentity;
use crate::services::{CommentInput, CommentService};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
}

pub(super) async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CommentListResponse>> {
    let post_id = parse_id(&id, "post")?;

    let comment_service = CommentService::new(state.store.clone());
    let comments = comment_service.list_comments(post_id).await?;

    Ok(Json(CommentListResponse {
        comments: comments.into_iter().map(Into::into).collect(),
    }))
}

pub(super) async fn create_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<CommentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let post_id = parse_id(&id, "post")?;
    let input = json_body(payload)?;

    let comment_service = CommentService::new(state.store.clone());
    let comment = comment_service
        .create_comment(post_id, identity.user_id, input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: comment.created_at,
            author: None,
        }),
    ))
}

pub(super) async fn delete_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path((id, cid)): Path<(String, String)>,
) -> Result<StatusCode> {
    let post_id = parse_id(&id, "post")?;
    let comment_id = parse_id(&cid, "comment")?;

    let comment_service = CommentService::new(state.store.clone());
    comment_service
        .delete_comment(post_id, comment_id, identity.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
