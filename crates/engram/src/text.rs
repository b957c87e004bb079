//! Text utilities: heuristic token counting and content hashing
//!
//! Token counts here are a word + punctuation approximation, not a provider
//! tokenization. They are used for buffer accounting and prompt budgets,
//! where a consistent heuristic matters more than exactness.

use std::sync::OnceLock;

use regex::Regex;
use sha1::{Digest, Sha1};

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+|[^\w\s]").expect("token pattern is valid"))
}

/// Count tokens in a single text using the word + punctuation heuristic.
pub fn count_tokens(text: &str) -> usize {
    token_pattern().find_iter(text).count()
}

/// Count tokens across a sequence of texts.
pub fn count_tokens_all<S: AsRef<str>>(texts: &[S]) -> usize {
    texts.iter().map(|t| count_tokens(t.as_ref())).sum()
}

/// SHA-1 hash of the text's UTF-8 bytes, as lowercase hex.
///
/// Used for dedup keys and artifact checksums, not for any security purpose.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_words_and_punctuation() {
        assert_eq!(count_tokens("Hello, world!"), 4);
        assert_eq!(count_tokens("one two three"), 3);
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("   "), 0);
    }

    #[test]
    fn test_count_tokens_all_sums() {
        let texts = ["Hello", "a b c"];
        assert_eq!(count_tokens_all(&texts), 4);
    }

    #[test]
    fn test_content_hash_is_stable_sha1() {
        // Known SHA-1 of "abc"
        assert_eq!(content_hash("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
