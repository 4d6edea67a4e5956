use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;

use super::{json_body, parse_id, query_params, AuthorResponse, CommentResponse, PostResponse};
use crate::error::Result;
use crate::models::{PostDetail, PostWithAuthor};
use crate::security::UserIdentity;
use crate::services::{ListParams, PostInput, PostService};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PostSummaryResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub author: AuthorResponse,
}

impl From<PostWithAuthor> for PostSummaryResponse {
    fn from(PostWithAuthor { post, author }: PostWithAuthor) -> Self {
        Self {
            post: post.into(),
            author: author.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummaryResponse>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub author: AuthorResponse,
    pub comments: Vec<CommentResponse>,
}

impl From<PostDetail> for PostDetailResponse {
    fn from(detail: PostDetail) -> Self {
        Self {
            post: detail.post.into(),
            author: detail.author.into(),
            comments: detail.comments.into_iter().map(Into::into).collect(),
        }
    }
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<PostListResponse>> {
    let params = query_params(query)?;

    let post_service = PostService::new(state.store.clone());
    let page = post_service.list_posts(params).await?;

    Ok(Json(PostListResponse {
        posts: page.posts.into_iter().map(Into::into).collect(),
        limit: page.limit,
        offset: page.offset,
    }))
}

pub(super) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetailResponse>> {
    let post_id = parse_id(&id, "post")?;

    let post_service = PostService::new(state.store.clone());
    let detail = post_service.get_post(post_id).await?;

    Ok(Json(detail.into()))
}

pub(super) async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    payload: std::result::Result<Json<PostInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    let input = json_body(payload)?;

    let post_service = PostService::new(state.store.clone());
    let post = post_service.create_post(identity.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(post.into())))
}

pub(super) async fn update_post(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<PostInput>, JsonRejection>,
) -> Result<Json<PostResponse>> {
    let post_id = parse_id(&id, "post")?;
    let input = json_body(payload)?;

    let post_service = PostService::new(state.store.clone());
    let post = post_service
        .update_post(post_id, identity.user_id, input)
        .await?;

    Ok(Json(post.into()))
}

pub(super) async fn delete_post(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let post_id = parse_id(&id, "post")?;

    let post_service = PostService::new(state.store.clone());
    post_service.delete_post(post_id, identity.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
