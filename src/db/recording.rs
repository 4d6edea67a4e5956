//! Store decorator for unit tests.
//!
//! Records the locking and counting calls each transaction makes, in order,
//! and can hide existing users from the username/email lookups so a
//! registration reaches the unique index the way a concurrent one would.
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{MemoryStore, StorageResult, Store, StoreTx};
use crate::models::{
    Comment, CommentStatus, CommentWithAuthor, NewUser, Post, PostWithAuthor, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    LockPost(Uuid),
    LockComment(Uuid),
    SoftDeleteComment(Uuid),
    CountLiveComments(Uuid),
    SetCommentStatus(Uuid, CommentStatus),
    Commit,
}

#[derive(Clone)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    calls: Arc<Mutex<Vec<Call>>>,
    hide_users: bool,
}

impl RecordingStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: Arc::default(),
            hide_users: false,
        }
    }

    /// Username and email lookups report no match.
    pub(crate) fn hiding_users(inner: MemoryStore) -> Self {
        Self {
            hide_users: true,
            ..Self::new(inner)
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn position(&self, call: Call) -> Option<usize> {
        self.calls().iter().position(|c| *c == call)
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTx>> {
        Ok(Box::new(RecordingTx {
            inner: self.inner.begin().await?,
            calls: self.calls.clone(),
            hide_users: self.hide_users,
        }))
    }
}

struct RecordingTx {
    inner: Box<dyn StoreTx>,
    calls: Arc<Mutex<Vec<Call>>>,
    hide_users: bool,
}

impl RecordingTx {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StoreTx for RecordingTx {
    async fn insert_user(&mut self, user: NewUser) -> StorageResult<User> {
        self.inner.insert_user(user).await
    }

    async fn find_user_by_id(&mut self, user_id: Uuid) -> StorageResult<Option<User>> {
        self.inner.find_user_by_id(user_id).await
    }

    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>> {
        if self.hide_users {
            return Ok(None);
        }
        self.inner.find_user_by_username(username).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>> {
        if self.hide_users {
            return Ok(None);
        }
        self.inner.find_user_by_email(email).await
    }

    async fn increment_post_count(&mut self, user_id: Uuid) -> StorageResult<bool> {
        self.inner.increment_post_count(user_id).await
    }

    async fn insert_post(
        &mut self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> StorageResult<Post> {
        self.inner.insert_post(user_id, title, content).await
    }

    async fn find_post(&mut self, post_id: Uuid) -> StorageResult<Option<PostWithAuthor>> {
        self.inner.find_post(post_id).await
    }

    async fn lock_post(&mut self, post_id: Uuid) -> StorageResult<Option<Post>> {
        self.record(Call::LockPost(post_id));
        self.inner.lock_post(post_id).await
    }

    async fn list_posts(&mut self, limit: i64, offset: i64) -> StorageResult<Vec<PostWithAuthor>> {
        self.inner.list_posts(limit, offset).await
    }

    async fn update_post(
        &mut self,
        post_id: Uuid,
        title: &str,
        content: &str,
    ) -> StorageResult<Post> {
        self.inner.update_post(post_id, title, content).await
    }

    async fn soft_delete_post(&mut self, post_id: Uuid) -> StorageResult<()> {
        self.inner.soft_delete_post(post_id).await
    }

    async fn set_comment_status(
        &mut self,
        post_id: Uuid,
        status: CommentStatus,
    ) -> StorageResult<()> {
        self.record(Call::SetCommentStatus(post_id, status));
        self.inner.set_comment_status(post_id, status).await
    }

    async fn insert_comment(
        &mut self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StorageResult<Comment> {
        self.inner.insert_comment(post_id, user_id, content).await
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> StorageResult<Option<Comment>> {
        self.record(Call::LockComment(comment_id));
        self.inner.lock_comment(comment_id).await
    }

    async fn list_comments(&mut self, post_id: Uuid) -> StorageResult<Vec<CommentWithAuthor>> {
        self.inner.list_comments(post_id).await
    }

    async fn soft_delete_comment(&mut self, comment_id: Uuid) -> StorageResult<()> {
        self.record(Call::SoftDeleteComment(comment_id));
        self.inner.soft_delete_comment(comment_id).await
    }

    async fn count_live_comments(&mut self, post_id: Uuid) -> StorageResult<i64> {
        self.record(Call::CountLiveComments(post_id));
        self.inner.count_live_comments(post_id).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.record(Call::Commit);
        let RecordingTx { inner, .. } = *self;
        inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        let RecordingTx { inner, .. } = *self;
        inner.rollback().await
    }
}
