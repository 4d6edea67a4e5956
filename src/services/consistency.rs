//! Maintains the denormalized fields `users.post_count` and
//! `posts.comment_status`.
//!
//! Services call [`ConsistencyMaintainer::apply`] with the transaction that
//! performed the triggering write, before committing it. The derived update
//! therefore commits or rolls back together with the write that caused it.
use uuid::Uuid;

use crate::db::StoreTx;
use crate::error::{AppError, Result};
use crate::models::CommentStatus;

/// Lifecycle events that affect derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEvent {
    PostCreated { post_id: Uuid, owner_id: Uuid },
    CommentCreated { post_id: Uuid, comment_id: Uuid },
    CommentDeleted { post_id: Uuid, comment_id: Uuid },
}

pub struct ConsistencyMaintainer;

impl ConsistencyMaintainer {
    pub async fn apply(tx: &mut dyn StoreTx, event: &ContentEvent) -> Result<()> {
        match *event {
            ContentEvent::PostCreated { post_id, owner_id } => {
                if !tx.increment_post_count(owner_id).await? {
                    return Err(AppError::not_found("User"));
                }
                tracing::debug!(%owner_id, %post_id, "post_count incremented");
            }
            ContentEvent::CommentCreated {
                post_id,
                comment_id,
            } => {
                let post = tx
                    .lock_post(post_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Post"))?;

                if post.comment_status != CommentStatus::HasComments {
                    tx.set_comment_status(post_id, CommentStatus::HasComments)
                        .await?;
                    tracing::info!(
                        %post_id,
                        %comment_id,
                        comment_status = %CommentStatus::HasComments,
                        "comment_status changed"
                    );
                }
            }
            ContentEvent::CommentDeleted {
                post_id,
                comment_id,
            } => {
                // Lock before counting: a concurrent delete on the same post
                // waits here and recounts after this transaction commits.
                let post = tx
                    .lock_post(post_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Post"))?;

                let live = tx.count_live_comments(post_id).await?;
                let status = CommentStatus::from_live_count(live);

                if status != post.comment_status {
                    tx.set_comment_status(post_id, status).await?;
                    tracing::info!(
                        %post_id,
                        %comment_id,
                        live_comments = live,
                        comment_status = %status,
                        "comment_status changed"
                    );
                } else {
                    tracing::debug!(%post_id, live_comments = live, "comment_status unchanged");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::recording::{Call, RecordingStore};
    use crate::db::{MemoryStore, Store};
    use crate::models::NewUser;

    async fn seed(store: &MemoryStore) -> (Uuid, Uuid) {
        let mut tx = store.begin().await.unwrap();
        let user = tx
            .insert_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let post = tx.insert_post(user.id, "Hello", "World").await.unwrap();
        tx.commit().await.unwrap();
        (user.id, post.id)
    }

    #[tokio::test]
    async fn test_post_created_increments_count() {
        let store = MemoryStore::new();
        let (user_id, post_id) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::PostCreated {
                post_id,
                owner_id: user_id,
            },
        )
        .await
        .unwrap();
        let user = tx.find_user_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.post_count, 1);
    }

    #[tokio::test]
    async fn test_post_created_for_missing_owner_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let result = ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::PostCreated {
                post_id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_comment_created_is_idempotent() {
        let store = MemoryStore::new();
        let (user_id, post_id) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        for _ in 0..2 {
            let comment = tx.insert_comment(post_id, user_id, "nice").await.unwrap();
            ConsistencyMaintainer::apply(
                tx.as_mut(),
                &ContentEvent::CommentCreated {
                    post_id,
                    comment_id: comment.id,
                },
            )
            .await
            .unwrap();
            let post = tx.lock_post(post_id).await.unwrap().unwrap();
            assert_eq!(post.comment_status, CommentStatus::HasComments);
        }
    }

    #[tokio::test]
    async fn test_comment_deleted_recounts_live_comments() {
        let store = MemoryStore::new();
        let (user_id, post_id) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_comment(post_id, user_id, "one").await.unwrap();
        let second = tx.insert_comment(post_id, user_id, "two").await.unwrap();
        tx.set_comment_status(post_id, CommentStatus::HasComments)
            .await
            .unwrap();

        tx.soft_delete_comment(first.id).await.unwrap();
        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::CommentDeleted {
                post_id,
                comment_id: first.id,
            },
        )
        .await
        .unwrap();
        let post = tx.lock_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.comment_status, CommentStatus::HasComments);

        tx.soft_delete_comment(second.id).await.unwrap();
        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::CommentDeleted {
                post_id,
                comment_id: second.id,
            },
        )
        .await
        .unwrap();
        let post = tx.lock_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.comment_status, CommentStatus::NoComments);
    }

    #[tokio::test]
    async fn test_comment_deleted_locks_post_before_recount() {
        let memory = MemoryStore::new();
        let (user_id, post_id) = seed(&memory).await;
        let store = RecordingStore::new(memory);

        let mut tx = store.begin().await.unwrap();
        let comment = tx.insert_comment(post_id, user_id, "nice").await.unwrap();
        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::CommentCreated {
                post_id,
                comment_id: comment.id,
            },
        )
        .await
        .unwrap();
        tx.soft_delete_comment(comment.id).await.unwrap();
        let deleted_at = store.calls().len();
        ConsistencyMaintainer::apply(
            tx.as_mut(),
            &ContentEvent::CommentDeleted {
                post_id,
                comment_id: comment.id,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            store.calls()[deleted_at..],
            [
                Call::LockPost(post_id),
                Call::CountLiveComments(post_id),
                Call::SetCommentStatus(post_id, CommentStatus::NoComments),
            ]
        );
    }
}
