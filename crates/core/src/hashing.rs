//! Shared SHA-256 hex digest utility.
//!
//! Used to derive a document's canonical hash from its normalized text.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Canonical content hash of a normalized source text.
pub fn content_hash(normalized_text: &str) -> String {
    sha256_hex(normalized_text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_text_hashes_identically() {
        let text = "It was the best of times.";
        assert_eq!(content_hash(text), content_hash(text));
        assert_eq!(content_hash(text).len(), 64);
        assert_ne!(content_hash(text), content_hash("It was the worst of times."));
    }
}
