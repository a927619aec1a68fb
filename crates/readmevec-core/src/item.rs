use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use uuid::Uuid;

/// Content shorter than this after trimming is rejected outright.
pub const MIN_CONTENT_LEN: usize = 10;

/// Content is truncated to at most this many characters before embedding.
pub const MAX_CONTENT_LEN: usize = 16_000;

/// A de-duplicated, embeddable unit of work: one README's trimmed content,
/// its repo, and the content hash that derives its vector-store ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub repo: String,
    pub content: String,
    pub content_hash: String,
}

impl Item {
    /// Builds an item from raw file bytes, applying the trim / minimum
    /// length / truncation rules. Returns `Ok(None)` for content that must
    /// be dropped rather than embedded (empty or under [`MIN_CONTENT_LEN`]),
    /// which is not an error condition — the caller simply skips the file.
    #[must_use]
    pub fn from_raw(repo: impl Into<String>, raw_content: &str) -> Option<Self> {
        let trimmed = raw_content.trim();
        if trimmed.chars().count() < MIN_CONTENT_LEN {
            return None;
        }
        let truncated = truncate_chars(trimmed, MAX_CONTENT_LEN);
        let content_hash = sha1_hex(truncated.as_bytes());
        let id = id_from_content_hash(&content_hash);
        Some(Self {
            id,
            repo: repo.into(),
            content: truncated,
            content_hash,
        })
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

/// Computes the lowercase hex SHA-1 digest of `bytes`.
#[must_use]
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Derives a canonical UUID from a SHA-1 hex digest by laying its first 32
/// hex characters (16 bytes) into standard UUID grouping. Two READMEs with
/// identical content therefore collapse onto a single vector-store ID.
#[must_use]
pub fn id_from_content_hash(content_hash_hex: &str) -> Uuid {
    let mut bytes = [0u8; 16];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let hi = content_hash_hex.as_bytes()[i * 2];
        let lo = content_hash_hex.as_bytes()[i * 2 + 1];
        *byte = (hex_val(hi) << 4) | hex_val(lo);
    }
    Uuid::from_bytes(bytes)
}

fn hex_val(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_empty_content() {
        assert!(Item::from_raw("foo/bar", "   \n\t  ").is_none());
    }

    #[test]
    fn drops_content_under_minimum_length() {
        assert!(Item::from_raw("foo/bar", "short").is_none());
    }

    #[test]
    fn accepts_content_at_minimum_length() {
        let item = Item::from_raw("foo/bar", "0123456789").unwrap();
        assert_eq!(item.content, "0123456789");
    }

    #[test]
    fn truncates_content_over_the_maximum() {
        let long = "a".repeat(MAX_CONTENT_LEN + 500);
        let item = Item::from_raw("foo/bar", &long).unwrap();
        assert_eq!(item.content.chars().count(), MAX_CONTENT_LEN);
    }

    #[test]
    fn identical_content_collapses_to_the_same_id() {
        let a = Item::from_raw("foo/bar", "# hello world readme").unwrap();
        let b = Item::from_raw("other/repo", "# hello world readme").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn id_is_a_canonical_uuid_string() {
        let hash = sha1_hex(b"hello");
        let id = id_from_content_hash(&hash);
        let canonical = id.hyphenated().to_string();
        assert_eq!(canonical.len(), 36);
        assert_eq!(canonical.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn id_derivation_is_deterministic() {
        let hash = sha1_hex(b"determinism");
        assert_eq!(id_from_content_hash(&hash), id_from_content_hash(&hash));
    }
}
