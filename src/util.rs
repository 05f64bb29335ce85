use sha2::{Digest, Sha256};

/// SHA-256 hex digest of an API key. Keys are stored hashed; lookups hash the
/// presented key and compare digests.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_and_distinct() {
        assert_eq!(hash_api_key("bx_abc"), hash_api_key("bx_abc"));
        assert_ne!(hash_api_key("bx_abc"), hash_api_key("bx_abd"));
        assert_eq!(hash_api_key("bx_abc").len(), 64);
    }
}
