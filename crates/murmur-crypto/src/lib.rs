//! Murmur credential primitives.
//!
//! Passwords are hashed with Argon2id (slow, salted, PHC encoded).
//! Invitation tokens are random UUIDs; only their SHA-256 digest is stored.

pub mod password;
pub mod token;

pub use password::{dummy_verify, hash_password, verify_password};
pub use token::{InvitationToken, hash_token};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}
