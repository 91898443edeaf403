use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A freshly minted invitation token.
///
/// `plaintext` goes to the user exactly once; `digest` is what gets stored.
#[derive(Debug, Clone)]
pub struct InvitationToken {
    pub plaintext: String,
    pub digest: String,
}

impl InvitationToken {
    pub fn generate() -> Self {
        let plaintext = Uuid::new_v4().to_string();
        let digest = hash_token(&plaintext);
        Self { plaintext, digest }
    }
}

/// SHA-256 of the token, lowercase hex.
pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
