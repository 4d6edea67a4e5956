pub mod auth_service;
pub mod comments;
pub mod consistency;
pub mod posts;

pub use auth_service::{AuthService, LoginInput, RegisterInput};
pub use comments::{CommentInput, CommentService};
pub use consistency::{ConsistencyMaintainer, ContentEvent};
pub use posts::{ListParams, PostInput, PostPage, PostService};
