//! Ownership-based permission checks for posts and comments.
//!
//! Single-owner model: the creating user is the only one allowed to modify
//! or delete a post or comment.
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Comment, Post};

/// The ownership predicate itself.
pub fn check_ownership(requester_id: Uuid, owner_id: Uuid) -> Result<()> {
    if requester_id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only modify your own content".to_string(),
        ))
    }
}

pub fn check_post_ownership(requester_id: Uuid, post: &Post) -> Result<()> {
    check_ownership(requester_id, post.user_id)
        .map_err(|_| AppError::Forbidden("You can only modify your own posts".to_string()))
}

pub fn check_comment_ownership(requester_id: Uuid, comment: &Comment) -> Result<()> {
    check_ownership(requester_id, comment.user_id)
        .map_err(|_| AppError::Forbidden("You can only delete your own comments".to_string()))
}
