use rand::Rng;
use sha2::{Digest, Sha256};

use crate::types::ResetToken;

const RESET_TOKEN_LENGTH: usize = 48;

/// SHA-256 of `value` as lowercase hex; used to store reset tokens
pub fn sha256_hex(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

/// Generate a URL-safe random password reset token
pub fn generate_reset_token() -> ResetToken {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                             abcdefghijklmnopqrstuvwxyz\
                             0123456789";

    let mut rng = rand::rng();
    let token: String = (0..RESET_TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    ResetToken::from(token)
}
