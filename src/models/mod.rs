//! Domain records for the publishing backend.
//!
//! - `User`: account with the derived `post_count`
//! - `Post`: owned article with the derived `comment_status`
//! - `Comment`: owned reply attached to a post
mod comment;
mod post;
mod user;

pub use comment::{Comment, CommentWithAuthor};
pub use post::{CommentStatus, Post, PostDetail, PostWithAuthor};
pub use user::{NewUser, User, UserSummary};
