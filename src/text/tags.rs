//! Tag extraction: hashtag-priority, falling back to frequency-ranked
//! unigrams plus a capped share of body bigrams.

use std::collections::{BTreeMap, BTreeSet};

use crate::text::filter::TokenFilter;
use crate::text::filters::hashtag::extract_hashtags;
use crate::text::filters::ngram::BigramFilter;
use crate::text::filters::stopword::StopWordFilter;
use crate::text::tokenizer::{StandardTokenizer, Tokenizer};

/// Generic technical terms excluded from tag extraction and down-weighted
/// 0.4x in the Scorer's cosine path (never in tag extraction, per the
/// engine specification's dual use of this list).
pub const GENERIC_TERMS: &[&str] = &[
    "data", "system", "code", "file", "function", "value", "type", "method", "object", "thing",
    "example", "way", "use", "case", "item", "note", "info",
];

fn is_blacklisted(term: &str) -> bool {
    GENERIC_TERMS.contains(&term)
}

/// Produces the sorted, deduplicated, lowercased tag set for `text`, given
/// its already-stemmed `token_counts`. `max_tags` is the configured cap
/// (default 8); bigrams are capped at half of it.
pub fn extract_tags(text: &str, token_counts: &BTreeMap<String, u32>, max_tags: usize) -> BTreeSet<String> {
    let hashtags = extract_hashtags(text);
    if !hashtags.is_empty() {
        return hashtags.into_iter().collect();
    }

    let bigram_cap = max_tags / 2;
    let unigram_cap = max_tags.saturating_sub(bigram_cap);

    let mut unigrams: Vec<(&String, &u32)> = token_counts
        .iter()
        .filter(|(term, _)| !is_blacklisted(term))
        .collect();
    unigrams.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut tags: BTreeSet<String> = unigrams.into_iter().take(unigram_cap).map(|(t, _)| t.clone()).collect();

    for bigram in top_bigrams(text, bigram_cap) {
        tags.insert(bigram);
    }

    tags
}

fn top_bigrams(body: &str, cap: usize) -> Vec<String> {
    if cap == 0 {
        return Vec::new();
    }

    let tokenizer = StandardTokenizer::default();
    let stopwords = StopWordFilter::english();
    let tokens = stopwords.filter(tokenizer.tokenize(body));
    let bigram_tokens = BigramFilter.filter(tokens);

    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for token in bigram_tokens {
        if token.text.split(' ').any(is_blacklisted) {
            continue;
        }
        *counts.entry(token.text).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(cap).map(|(t, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::analyzer::TextProcessor;

    #[test]
    fn hashtags_are_authoritative() {
        let processor = TextProcessor::standard();
        let text = "Thoughts on #Rust and #graphs";
        let counts = processor.tokenize(text);
        let tags = extract_tags(text, &counts, 8);
        assert_eq!(tags, BTreeSet::from(["rust".to_string(), "graphs".to_string()]));
    }

    #[test]
    fn falls_back_to_frequency_ranked_unigrams() {
        let processor = TextProcessor::standard();
        let text = "rust rust rust memory memory safety";
        let counts = processor.tokenize(text);
        let tags = extract_tags(text, &counts, 2);
        assert!(tags.contains("rust"));
    }

    #[test]
    fn extraction_is_idempotent_under_surrounding_whitespace() {
        let processor = TextProcessor::standard();
        let text = "knowledge graphs link related notes automatically";
        let wrapped = format!("\n{}\n", text);

        let tags = extract_tags(text, &processor.tokenize(text), 8);
        let wrapped_tags = extract_tags(&wrapped, &processor.tokenize(&wrapped), 8);
        assert_eq!(tags, wrapped_tags);
    }
}
