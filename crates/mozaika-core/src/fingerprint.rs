//! Content fingerprinting for event deduplication.

use sha2::{Digest, Sha256};

/// Compute the dedupe fingerprint for an event.
///
/// The fingerprint is the SHA-256 hex digest of `url|title|prefix` where
/// `prefix` is the first 200 characters of the normalized text, all
/// lower-cased. Re-scrapes of the same announcement hash identically even
/// when trailing content (comments, reactions) differs.
pub fn fingerprint(source_url: &str, title: &str, normalized_text: &str) -> String {
    let prefix: String = normalized_text.chars().take(200).collect();
    let material = format!("{}|{}|{}", source_url, title, prefix).to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = fingerprint("https://e.com/1", "Title", "body text");
        let b = fingerprint("https://e.com/1", "Title", "body text");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn case_insensitive() {
        let a = fingerprint("https://E.com/1", "TITLE", "Body Text");
        let b = fingerprint("https://e.com/1", "title", "body text");
        assert_eq!(a, b);
    }

    #[test]
    fn ignores_text_beyond_200_chars() {
        let base = "x".repeat(200);
        let a = fingerprint("u", "t", &base);
        let b = fingerprint("u", "t", &format!("{}trailing junk", base));
        assert_eq!(a, b);
    }

    #[test]
    fn sensitive_within_200_chars() {
        let a = fingerprint("u", "t", "alpha");
        let b = fingerprint("u", "t", "omega");
        assert_ne!(a, b);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        // Cyrillic chars are 2 bytes each; 200 chars exceed 200 bytes.
        let base: String = std::iter::repeat('ї').take(200).collect();
        let a = fingerprint("u", "t", &base);
        let b = fingerprint("u", "t", &format!("{}ще", base));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_urls_distinct_fingerprints() {
        let a = fingerprint("https://e.com/1", "t", "text");
        let b = fingerprint("https://e.com/2", "t", "text");
        assert_ne!(a, b);
    }
}
