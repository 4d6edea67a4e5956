//! Credential primitives: Argon2id password hashing and signed session tokens.
pub mod password;
pub mod token;

pub use password::{hash_password, prepare_dummy_hash, verify_password, verify_password_or_dummy};
pub use token::{Claims, IssuedToken, TokenService, UserIdentity};
