//! Document identity helpers.

/// Source type recorded for texts fetched from Project Gutenberg.
pub const SOURCE_TYPE_GUTENBERG: &str = "gutenberg";

/// Job type for the essay pipeline.
pub const JOB_TYPE_ESSAY_PIPELINE: &str = "essay_pipeline";

/// Number of hash characters folded into a vector namespace.
const NAMESPACE_HASH_PREFIX: usize = 8;

/// Derive the vector-index namespace for a document.
///
/// Called exactly once, when the document row is created. The namespace is
/// stored on the row and never recomputed.
pub fn derive_namespace(source_ref: &str, canonical_hash: &str) -> String {
    let prefix: String = canonical_hash.chars().take(NAMESPACE_HASH_PREFIX).collect();
    format!("gb:{source_ref}:{prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_uses_hash_prefix() {
        let ns = derive_namespace("1342", "abcdef0123456789");
        assert_eq!(ns, "gb:1342:abcdef01");
    }

    #[test]
    fn short_hash_is_used_whole() {
        assert_eq!(derive_namespace("7", "abc"), "gb:7:abc");
    }
}
