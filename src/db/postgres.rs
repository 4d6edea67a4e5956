use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::{StorageError, StorageResult, Store, StoreTx};
use crate::config::DatabaseConfig;
use crate::models::{
    Comment, CommentStatus, CommentWithAuthor, NewUser, Post, PostWithAuthor, User, UserSummary,
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, post_count, created_at, updated_at";
const POST_COLUMNS: &str =
    "id, user_id, title, content, comment_status, created_at, updated_at, deleted_at";
const COMMENT_COLUMNS: &str =
    "id, post_id, user_id, content, created_at, updated_at, deleted_at";

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => StorageError::Timeout,
            sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                StorageError::Timeout
            }
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // query_canceled: raised when statement_timeout fires
                Some("57014") => StorageError::Timeout,
                Some("23505") => StorageError::UniqueViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                _ => StorageError::Backend(err.to_string()),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Corrupt(err.to_string())
            }
            _ => StorageError::Backend(err.to_string()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    comment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PostRow> for Post {
    type Error = StorageError;

    fn try_from(row: PostRow) -> StorageResult<Self> {
        let comment_status = CommentStatus::from_str(&row.comment_status)
            .map_err(StorageError::Corrupt)?;
        Ok(Post {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            comment_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PostWithAuthorRow {
    #[sqlx(flatten)]
    post: PostRow,
    author_username: String,
}

impl TryFrom<PostWithAuthorRow> for PostWithAuthor {
    type Error = StorageError;

    fn try_from(row: PostWithAuthorRow) -> StorageResult<Self> {
        let post = Post::try_from(row.post)?;
        let author = UserSummary {
            id: post.user_id,
            username: row.author_username,
        };
        Ok(PostWithAuthor { post, author })
    }
}

#[derive(sqlx::FromRow)]
struct CommentWithAuthorRow {
    #[sqlx(flatten)]
    comment: Comment,
    author_username: String,
}

impl From<CommentWithAuthorRow> for CommentWithAuthor {
    fn from(row: CommentWithAuthorRow) -> Self {
        let author = UserSummary {
            id: row.comment.user_id,
            username: row.author_username,
        };
        CommentWithAuthor {
            comment: row.comment,
            author,
        }
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let options = PgConnectOptions::from_str(&config.url)?.options([(
            "statement_timeout",
            format!("{}s", config.statement_timeout_secs),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout_secs,
            statement_timeout_secs = config.statement_timeout_secs,
            "PostgreSQL connection pool established"
        );

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StorageResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_user(&mut self, user: NewUser) -> StorageResult<User> {
        let query = format!(
            "INSERT INTO users (id, username, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&mut self, user_id: Uuid) -> StorageResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&mut self, username: &str) -> StorageResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StorageResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn increment_post_count(&mut self, user_id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET post_count = post_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_post(
        &mut self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> StorageResult<Post> {
        let query = format!(
            "INSERT INTO posts (id, user_id, title, content, comment_status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(title)
            .bind(content)
            .bind(CommentStatus::NoComments.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        Post::try_from(row)
    }

    async fn find_post(&mut self, post_id: Uuid) -> StorageResult<Option<PostWithAuthor>> {
        let row = sqlx::query_as::<_, PostWithAuthorRow>(
            r#"
            SELECT p.id, p.user_id, p.title, p.content, p.comment_status,
                   p.created_at, p.updated_at, p.deleted_at,
                   u.username AS author_username
            FROM posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.id = $1 AND p.deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(PostWithAuthor::try_from).transpose()
    }

    async fn lock_post(&mut self, post_id: Uuid) -> StorageResult<Option<Post>> {
        let query = format!("SELECT {} FROM posts WHERE id = $1 FOR UPDATE", POST_COLUMNS);
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(post_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(Post::try_from).transpose()
    }

    async fn list_posts(&mut self, limit: i64, offset: i64) -> StorageResult<Vec<PostWithAuthor>> {
        let rows = sqlx::query_as::<_, PostWithAuthorRow>(
            r#"
            SELECT p.id, p.user_id, p.title, p.content, p.comment_status,
                   p.created_at, p.updated_at, p.deleted_at,
                   u.username AS author_username
            FROM posts p
            JOIN users u ON u.id = p.user_id
            WHERE p.deleted_at IS NULL
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.into_iter().map(PostWithAuthor::try_from).collect()
    }

    async fn update_post(
        &mut self,
        post_id: Uuid,
        title: &str,
        content: &str,
    ) -> StorageResult<Post> {
        let query = format!(
            "UPDATE posts SET title = $1, content = $2, updated_at = NOW() \
             WHERE id = $3 RETURNING {}",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(title)
            .bind(content)
            .bind(post_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Post::try_from(row)
    }

    async fn soft_delete_post(&mut self, post_id: Uuid) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_comment_status(
        &mut self,
        post_id: Uuid,
        status: CommentStatus,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE posts SET comment_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(post_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_comment(
        &mut self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StorageResult<Comment> {
        let query = format!(
            "INSERT INTO comments (id, post_id, user_id, content) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            COMMENT_COLUMNS
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(Uuid::new_v4())
            .bind(post_id)
            .bind(user_id)
            .bind(content)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(comment)
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> StorageResult<Option<Comment>> {
        let query = format!(
            "SELECT {} FROM comments WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            COMMENT_COLUMNS
        );
        let comment = sqlx::query_as::<_, Comment>(&query)
            .bind(comment_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(comment)
    }

    async fn list_comments(&mut self, post_id: Uuid) -> StorageResult<Vec<CommentWithAuthor>> {
        let rows = sqlx::query_as::<_, CommentWithAuthorRow>(
            r#"
            SELECT c.id, c.post_id, c.user_id, c.content,
                   c.created_at, c.updated_at, c.deleted_at,
                   u.username AS author_username
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.post_id = $1 AND c.deleted_at IS NULL
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(CommentWithAuthor::from).collect())
    }

    async fn soft_delete_comment(&mut self, comment_id: Uuid) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE comments
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(comment_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn count_live_comments(&mut self, post_id: Uuid) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
