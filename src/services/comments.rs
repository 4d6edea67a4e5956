use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::check_comment_ownership;
use crate::models::{Comment, CommentWithAuthor};
use crate::services::consistency::{ConsistencyMaintainer, ContentEvent};
use crate::validators::is_blank;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

pub struct CommentService {
    store: Arc<dyn Store>,
}

impl CommentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        input: CommentInput,
    ) -> Result<Comment> {
        input.validate()?;
        if is_blank(&input.content) {
            return Err(AppError::Validation("content must not be blank".to_string()));
        }

        let mut tx = self.store.begin().await?;

        // Locked so a concurrent post delete cannot slip in before the insert.
        let post = tx
            .lock_post(post_id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| AppError::not_found("Post"))?;

        if tx.find_user_by_id(author_id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }

        let comment = tx.insert_comment(post.id, author_id, &input.content).await?;

        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::CommentCreated {
                post_id,
                comment_id: comment.id,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(comment_id = %comment.id, %post_id, user_id = %author_id, "Comment created");
        Ok(comment)
    }

    /// Live comments of a live post, newest first.
    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<CommentWithAuthor>> {
        let mut tx = self.store.begin().await?;

        if tx.find_post(post_id).await?.is_none() {
            return Err(AppError::not_found("Post"));
        }
        let comments = tx.list_comments(post_id).await?;

        tx.commit().await?;
        Ok(comments)
    }

    pub async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        requester_id: Uuid,
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;

        let comment = tx
            .lock_comment(comment_id)
            .await?
            .filter(|c| c.post_id == post_id)
            .ok_or_else(|| AppError::not_found("Comment"))?;
        check_comment_ownership(requester_id, &comment)?;

        tx.soft_delete_comment(comment_id).await?;

        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::CommentDeleted {
                post_id,
                comment_id,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(%comment_id, %post_id, user_id = %requester_id, "Comment deleted");
        Ok(())
    }
}
