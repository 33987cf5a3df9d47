//! Random key material generation.

use rand::RngCore;

use crate::hash::ContentHash;

/// Material for a newly created API key.
///
/// The plaintext is handed to the caller exactly once; only the hash and
/// display prefix are ever stored.
#[derive(Debug)]
pub struct ApiKeyMaterial {
    /// The full plaintext key, `sy_` prefixed. Returned to the creator once.
    pub plaintext: String,
    /// SHA-256 of the plaintext, for storage and lookup.
    pub hash: ContentHash,
    /// Short display prefix (`sy_` plus the first few characters).
    pub prefix: String,
}

/// Generate a 256-bit API key.
#[must_use]
pub fn generate_api_key() -> ApiKeyMaterial {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let plaintext = format!("sy_{}", hex::encode(bytes));
    let hash = ContentHash::hash(plaintext.as_bytes());
    let prefix = plaintext.chars().take(8).collect();
    ApiKeyMaterial {
        plaintext,
        hash,
        prefix,
    }
}

/// Generate a 128-bit random nonce, hex-encoded.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_shape() {
        let key = generate_api_key();
        assert!(key.plaintext.starts_with("sy_"));
        assert_eq!(key.plaintext.len(), 3 + 64);
        assert_eq!(key.prefix.len(), 8);
        assert!(key.plaintext.starts_with(&key.prefix));
        assert_eq!(key.hash, ContentHash::hash(key.plaintext.as_bytes()));
    }

    #[test]
    fn test_keys_unique() {
        assert_ne!(generate_api_key().plaintext, generate_api_key().plaintext);
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
