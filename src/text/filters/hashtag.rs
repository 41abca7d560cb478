//! Hashtag extraction. Works directly over raw text rather than a token
//! stream: hashtags carry punctuation (`-`, `_`, `/`) the tokenizer
//! strips, so a regex pass ahead of tokenization is the practical fit,
//! in the same spirit as the teacher's `filters::ngram::NGramFilter`
//! producing derived tokens from an existing stream.

use regex::Regex;
use std::sync::LazyLock;

static HASHTAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}\p{N}_/-]+)").expect("static hashtag pattern"));

/// Lowercased, deduplicated hashtags found in `text`, in first-seen order.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut tags = Vec::new();
    for capture in HASHTAG_PATTERN.captures_iter(text) {
        let tag = capture[1].to_lowercase();
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_lowercases_hashtags() {
        let tags = extract_hashtags("Notes on #Rust and #knowledge-graphs, also #rust");
        assert_eq!(tags, vec!["rust".to_string(), "knowledge-graphs".to_string()]);
    }

    #[test]
    fn empty_when_no_hashtags_present() {
        assert!(extract_hashtags("plain text here").is_empty());
    }
}
