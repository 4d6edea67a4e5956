use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{StorageError, StorageResult, Store, StoreTx};
use crate::models::{
    Comment, CommentStatus, CommentWithAuthor, NewUser, Post, PostWithAuthor, User, UserSummary,
};

/// Named operations at which a test can make the store fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    IncrementPostCount,
    SetCommentStatus,
    CountLiveComments,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    last_created: Option<DateTime<Utc>>,
}

impl State {
    /// Creation timestamp, strictly increasing so newest-first order is stable.
    fn creation_time(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_created = Some(now);
        now
    }

    fn summary(&self, user_id: Uuid) -> StorageResult<UserSummary> {
        self.users
            .get(&user_id)
            .map(User::summary)
            .ok_or_else(|| StorageError::Corrupt(format!("dangling user reference {}", user_id)))
    }
}

/// In-process store.
///
/// A transaction holds the state lock from `begin` until it is committed or
/// dropped and works on a private copy, so transactions are fully serialized
/// and an uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_points: Arc<StdMutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call reaching `point` fail with a backend error.
    pub fn fail_once(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }
}

fn check_fail_point(points: &StdMutex<HashSet<FailPoint>>, point: FailPoint) -> StorageResult<()> {
    let triggered = points.lock().map(|mut p| p.remove(&point)).unwrap_or(false);
    if triggered {
        return Err(StorageError::Backend(format!("injected failure at {:?}", point)));
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTx>> {
        check_fail_point(&self.fail_points, FailPoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_points: self.fail_points.clone(),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    fail_points: Arc<StdMutex<HashSet<FailPoint>>>,
}

impl MemoryTx {
    fn fail_at(&self, point: FailPoint) -> StorageResult<()> {
        check_fail_point(&self.fail_points, point)
    }

    fn post_mut(&mut self, post_id: Uuid) -> StorageResult<&mut Post> {
        self.working
            .posts
            .get_mut(&post_id)
            .ok_or_else(|| StorageError::Backend(format!("post {} does not exist", post_id)))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_user(&mut self, user: NewUser) -> StorageResult<User> {
        if self.working.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::UniqueViolation {
                constraint: "users_username_key".to_string(),
            });
        }
        if self.working.users.values().any(|u| u.email == user.email) {
            return Err(StorageError::UniqueViolation {
                constraint: "users_email_key".to_string(),
            });
        }

        let now = self.working.creation_time();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            post_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.working.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&mut self, user_id: Uuid) -> StorageResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>> {
        Ok(self.working.users.values().find(|u| u.email == email).cloned())
    }

    async fn increment_post_count(&mut self, user_id: Uuid) -> StorageResult<bool> {
        self.fail_at(FailPoint::IncrementPostCount)?;
        match self.working.users.get_mut(&user_id) {
            Some(user) => {
                user.post_count += 1;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_post(
        &mut self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> StorageResult<Post> {
        if !self.working.users.contains_key(&user_id) {
            return Err(StorageError::Backend(format!(
                "foreign key violation: user {} does not exist",
                user_id
            )));
        }
        let now = self.working.creation_time();
        let post = Post {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            content: content.to_string(),
            comment_status: CommentStatus::NoComments,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_post(&mut self, post_id: Uuid) -> StorageResult<Option<PostWithAuthor>> {
        match self.working.posts.get(&post_id) {
            Some(post) if !post.is_deleted() => {
                let author = self.working.summary(post.user_id)?;
                Ok(Some(PostWithAuthor {
                    post: post.clone(),
                    author,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn lock_post(&mut self, post_id: Uuid) -> StorageResult<Option<Post>> {
        Ok(self.working.posts.get(&post_id).cloned())
    }

    async fn list_posts(&mut self, limit: i64, offset: i64) -> StorageResult<Vec<PostWithAuthor>> {
        let mut posts: Vec<&Post> = self
            .working
            .posts
            .values()
            .filter(|p| !p.is_deleted())
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|post| -> StorageResult<PostWithAuthor> {
                Ok(PostWithAuthor {
                    post: post.clone(),
                    author: self.working.summary(post.user_id)?,
                })
            })
            .collect()
    }

    async fn update_post(
        &mut self,
        post_id: Uuid,
        title: &str,
        content: &str,
    ) -> StorageResult<Post> {
        let post = self.post_mut(post_id)?;
        post.title = title.to_string();
        post.content = content.to_string();
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn soft_delete_post(&mut self, post_id: Uuid) -> StorageResult<()> {
        let post = self.post_mut(post_id)?;
        if post.deleted_at.is_none() {
            let now = Utc::now();
            post.deleted_at = Some(now);
            post.updated_at = now;
        }
        Ok(())
    }

    async fn set_comment_status(
        &mut self,
        post_id: Uuid,
        status: CommentStatus,
    ) -> StorageResult<()> {
        self.fail_at(FailPoint::SetCommentStatus)?;
        self.post_mut(post_id)?.comment_status = status;
        Ok(())
    }

    async fn insert_comment(
        &mut self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StorageResult<Comment> {
        if !self.working.posts.contains_key(&post_id) || !self.working.users.contains_key(&user_id)
        {
            return Err(StorageError::Backend(
                "foreign key violation on comments".to_string(),
            ));
        }
        let now = self.working.creation_time();
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> StorageResult<Option<Comment>> {
        Ok(self
            .working
            .comments
            .get(&comment_id)
            .filter(|c| !c.is_deleted())
            .cloned())
    }

    async fn list_comments(&mut self, post_id: Uuid) -> StorageResult<Vec<CommentWithAuthor>> {
        let mut comments: Vec<&Comment> = self
            .working
            .comments
            .values()
            .filter(|c| c.post_id == post_id && !c.is_deleted())
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        comments
            .into_iter()
            .map(|comment| -> StorageResult<CommentWithAuthor> {
                Ok(CommentWithAuthor {
                    comment: comment.clone(),
                    author: self.working.summary(comment.user_id)?,
                })
            })
            .collect()
    }

    async fn soft_delete_comment(&mut self, comment_id: Uuid) -> StorageResult<()> {
        let comment = self
            .working
            .comments
            .get_mut(&comment_id)
            .ok_or_else(|| StorageError::Backend(format!("comment {} does not exist", comment_id)))?;
        if comment.deleted_at.is_none() {
            let now = Utc::now();
            comment.deleted_at = Some(now);
            comment.updated_at = now;
        }
        Ok(())
    }

    async fn count_live_comments(&mut self, post_id: Uuid) -> StorageResult<i64> {
        self.fail_at(FailPoint::CountLiveComments)?;
        Ok(self
            .working
            .comments
            .values()
            .filter(|c| c.post_id == post_id && !c.is_deleted())
            .count() as i64)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.fail_at(FailPoint::Commit)?;
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("alice")).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_writes_are_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user("alice")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_user_by_id(user.id).await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("alice")).await.unwrap();

        let err = tx.insert_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));

        let mut other = new_user("alicia");
        other.email = "alice@example.com".to_string();
        let err = tx.insert_user(other).await.unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_hidden_from_reads() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user("alice")).await.unwrap();
        let post = tx.insert_post(user.id, "t", "c").await.unwrap();
        let comment = tx.insert_comment(post.id, user.id, "hi").await.unwrap();

        tx.soft_delete_comment(comment.id).await.unwrap();
        assert!(tx.lock_comment(comment.id).await.unwrap().is_none());
        assert_eq!(tx.count_live_comments(post.id).await.unwrap(), 0);

        tx.soft_delete_post(post.id).await.unwrap();
        assert!(tx.find_post(post.id).await.unwrap().is_none());
        assert!(tx.list_posts(10, 0).await.unwrap().is_empty());
        // lock_post still sees the row
        assert!(tx.lock_post(post.id).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_fail_point_fires_once() {
        let store = MemoryStore::new();
        store.fail_once(FailPoint::Begin);
        assert!(store.begin().await.is_err());
        assert!(store.begin().await.is_ok());
    }
}
