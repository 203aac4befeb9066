//! Stable cache keys for request parameters.

use sha2::{Digest, Sha256};

/// Build a cache key of the form `{kind}:{sha256(parts)}`.
///
/// Parts are length-prefixed before hashing so `["ab", "c"]` and
/// `["a", "bc"]` do not collide.
pub fn cache_key<S: AsRef<str>>(kind: &str, parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{}:{}", kind, hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_parts_same_key() {
        let a = cache_key("reading", &["tarot", "celtic-cross", "42"]);
        let b = cache_key("reading", &["tarot", "celtic-cross", "42"]);
        assert_eq!(a, b);
        assert!(a.starts_with("reading:"));
        assert_eq!(a.len(), "reading:".len() + 64);
    }

    #[test]
    fn part_boundaries_matter() {
        assert_ne!(cache_key("k", &["ab", "c"]), cache_key("k", &["a", "bc"]));
    }

    #[test]
    fn kind_is_part_of_key() {
        assert_ne!(cache_key("a", &["x"]), cache_key("b", &["x"]));
    }

    #[test]
    fn accepts_owned_strings() {
        let parts = vec![String::from("x"), String::from("y")];
        assert_eq!(cache_key("k", &parts), cache_key("k", &["x", "y"]));
    }
}
