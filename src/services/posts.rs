use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::check_post_ownership;
use crate::models::{Post, PostDetail, PostWithAuthor};
use crate::services::consistency::{ConsistencyMaintainer, ContentEvent};
use crate::validators::is_blank;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 20000))]
    pub content: String,
}

impl PostInput {
    fn check(&self) -> Result<()> {
        self.validate()?;
        if is_blank(&self.title) {
            return Err(AppError::Validation("title must not be blank".to_string()));
        }
        if is_blank(&self.content) {
            return Err(AppError::Validation("content must not be blank".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    /// Clamped `(limit, offset)`.
    pub fn resolve(&self) -> Result<(i64, i64)> {
        let limit = match self.limit {
            None => DEFAULT_PAGE_SIZE,
            Some(l) if l < 1 => {
                return Err(AppError::Validation("limit must be at least 1".to_string()))
            }
            Some(l) => l.min(MAX_PAGE_SIZE),
        };
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(AppError::Validation("offset must not be negative".to_string()));
        }
        Ok((limit, offset))
    }
}

/// One page of the listing together with the bounds it was read with.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostWithAuthor>,
    pub limit: i64,
    pub offset: i64,
}

/// Post lifecycle: create, read, update, soft-delete.
pub struct PostService {
    store: Arc<dyn Store>,
}

impl PostService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert the post and bump the owner's `post_count` in one transaction.
    pub async fn create_post(&self, owner_id: Uuid, input: PostInput) -> Result<Post> {
        input.check()?;

        let mut tx = self.store.begin().await?;

        if tx.find_user_by_id(owner_id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }

        let post = tx.insert_post(owner_id, &input.title, &input.content).await?;

        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::PostCreated {
                post_id: post.id,
                owner_id,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(post_id = %post.id, user_id = %owner_id, "Post created");
        Ok(post)
    }

    pub async fn list_posts(&self, params: ListParams) -> Result<PostPage> {
        let (limit, offset) = params.resolve()?;

        let mut tx = self.store.begin().await?;
        let posts = tx.list_posts(limit, offset).await?;
        tx.commit().await?;

        Ok(PostPage {
            posts,
            limit,
            offset,
        })
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<PostDetail> {
        let mut tx = self.store.begin().await?;

        let PostWithAuthor { post, author } = tx
            .find_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
        let comments = tx.list_comments(post_id).await?;

        tx.commit().await?;

        Ok(PostDetail {
            post,
            author,
            comments,
        })
    }

    pub async fn update_post(
        &self,
        post_id: Uuid,
        requester_id: Uuid,
        input: PostInput,
    ) -> Result<Post> {
        input.check()?;

        let mut tx = self.store.begin().await?;

        let post = tx
            .lock_post(post_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| AppError::not_found("Post"))?;
        check_post_ownership(requester_id, &post)?;

        let updated = tx.update_post(post_id, &input.title, &input.content).await?;
        tx.commit().await?;

        tracing::info!(%post_id, user_id = %requester_id, "Post updated");
        Ok(updated)
    }

    /// Soft delete. The owner's `post_count` and the post's `comment_status`
    /// are left as they are.
    pub async fn delete_post(&self, post_id: Uuid, requester_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;

        let post = tx
            .lock_post(post_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| AppError::not_found("Post"))?;
        check_post_ownership(requester_id, &post)?;

        tx.soft_delete_post(post_id).await?;
        tx.commit().await?;

        tracing::info!(%post_id, user_id = %requester_id, "Post deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, content: &str) -> PostInput {
        PostInput {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_post_input_bounds() {
        assert!(input("Hello", "World").check().is_ok());
        assert!(input("", "World").check().is_err());
        assert!(input("   ", "World").check().is_err());
        assert!(input("Hello", "\n\t").check().is_err());
        assert!(input(&"t".repeat(201), "World").check().is_err());
        assert!(input(&"t".repeat(200), "World").check().is_ok());
        assert!(input("Hello", &"c".repeat(20001)).check().is_err());
    }

    #[test]
    fn test_list_params_defaults_and_clamp() {
        assert_eq!(ListParams::default().resolve().unwrap(), (20, 0));
        let params = ListParams {
            limit: Some(500),
            offset: Some(40),
        };
        assert_eq!(params.resolve().unwrap(), (100, 40));
    }

    #[test]
    fn test_list_params_rejects_out_of_range() {
        let zero = ListParams {
            limit: Some(0),
            offset: None,
        };
        let negative = ListParams {
            limit: None,
            offset: Some(-1),
        };
        assert!(matches!(zero.resolve(), Err(AppError::Validation(_))));
        assert!(matches!(negative.resolve(), Err(AppError::Validation(_))));
    }
}
