use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{CommentWithAuthor, UserSummary};

/// Whether a post currently has any live comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    HasComments,
    #[default]
    NoComments,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::HasComments => "has_comments",
            CommentStatus::NoComments => "no_comments",
        }
    }

    pub fn from_live_count(count: i64) -> Self {
        if count > 0 {
            CommentStatus::HasComments
        } else {
            CommentStatus::NoComments
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "has_comments" => Ok(CommentStatus::HasComments),
            "no_comments" => Ok(CommentStatus::NoComments),
            other => Err(format!("unknown comment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub comment_status: CommentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Post row joined with its owner, used by listings.
#[derive(Debug, Clone)]
pub struct PostWithAuthor {
    pub post: Post,
    pub author: UserSummary,
}

/// Post with its owner and live comments.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub author: UserSummary,
    pub comments: Vec<CommentWithAuthor>,
}
