//! Storage boundary.
//!
//! Services talk to storage only through [`Store`] and the transaction
//! handle it hands out. Every mutating service call opens one transaction,
//! performs the entity write and the derived-field update through it, and
//! commits once, so both land or neither does.
//!
//! Two backends implement the boundary:
//! - [`PgStore`]: PostgreSQL via sqlx, row locks through `SELECT ... FOR UPDATE`
//! - [`MemoryStore`]: in-process, one transaction at a time
mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod recording;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::models::{
    Comment, CommentStatus, CommentWithAuthor, NewUser, Post, PostWithAuthor, User,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("storage operation timed out")]
    Timeout,

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Open a transaction. Dropping the handle without `commit` rolls it back.
    async fn begin(&self) -> StorageResult<Box<dyn StoreTx>>;
}

/// Operations available inside one storage transaction.
///
/// Reads of posts and comments skip soft-deleted rows unless the method says
/// otherwise.
#[async_trait]
pub trait StoreTx: Send {
    async fn insert_user(&mut self, user: NewUser) -> StorageResult<User>;
    async fn find_user_by_id(&mut self, user_id: Uuid) -> StorageResult<Option<User>>;
    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>>;
    /// Returns false when no such user exists.
    async fn increment_post_count(&mut self, user_id: Uuid) -> StorageResult<bool>;

    async fn insert_post(&mut self, user_id: Uuid, title: &str, content: &str)
        -> StorageResult<Post>;
    async fn find_post(&mut self, post_id: Uuid) -> StorageResult<Option<PostWithAuthor>>;
    /// Row-locks the post until the transaction ends. Returns soft-deleted
    /// rows too so callers can tell "gone" from "never existed".
    async fn lock_post(&mut self, post_id: Uuid) -> StorageResult<Option<Post>>;
    /// Newest first, ties broken by descending id.
    async fn list_posts(&mut self, limit: i64, offset: i64) -> StorageResult<Vec<PostWithAuthor>>;
    async fn update_post(&mut self, post_id: Uuid, title: &str, content: &str)
        -> StorageResult<Post>;
    async fn soft_delete_post(&mut self, post_id: Uuid) -> StorageResult<()>;
    async fn set_comment_status(&mut self, post_id: Uuid, status: CommentStatus)
        -> StorageResult<()>;

    async fn insert_comment(&mut self, post_id: Uuid, user_id: Uuid, content: &str)
        -> StorageResult<Comment>;
    /// Row-locks a live comment until the transaction ends.
    async fn lock_comment(&mut self, comment_id: Uuid) -> StorageResult<Option<Comment>>;
    /// Newest first.
    async fn list_comments(&mut self, post_id: Uuid) -> StorageResult<Vec<CommentWithAuthor>>;
    async fn soft_delete_comment(&mut self, comment_id: Uuid) -> StorageResult<()>;
    async fn count_live_comments(&mut self, post_id: Uuid) -> StorageResult<i64>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// Build the configured backend, running migrations when asked to.
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.database.backend {
        StorageBackend::Postgres => {
            let store = PgStore::connect(&config.database).await?;
            if config.database.run_migrations {
                store.run_migrations().await?;
            }
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
