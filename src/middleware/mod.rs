mod auth;
mod permissions;

pub use auth::{authorize, require_auth};
pub use permissions::{check_comment_ownership, check_ownership, check_post_ownership};
