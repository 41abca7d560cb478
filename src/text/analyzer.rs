//! Deterministic text-to-token-counts pipeline, following the teacher's
//! `analysis::analyzer::Analyzer` composition of a tokenizer with a
//! filter chain.

use std::collections::BTreeMap;

use crate::text::filters::stemmer::StemmerFilter;
use crate::text::filters::stopword::StopWordFilter;
use crate::text::filter::TokenFilter;
use crate::text::tokenizer::{StandardTokenizer, Tokenizer};

pub struct TextProcessor {
    tokenizer: Box<dyn Tokenizer>,
    filters: Vec<Box<dyn TokenFilter>>,
}

impl TextProcessor {
    pub fn standard() -> Self {
        TextProcessor {
            tokenizer: Box::new(StandardTokenizer::default()),
            filters: vec![Box::new(StopWordFilter::english()), Box::new(StemmerFilter)],
        }
    }

    /// Lowercase, split, drop stop-words and short tokens, stem; returns
    /// deterministic token -> count map.
    pub fn tokenize(&self, text: &str) -> BTreeMap<String, u32> {
        let mut tokens = self.tokenizer.tokenize(text);
        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        let mut counts = BTreeMap::new();
        for token in tokens {
            *counts.entry(token.text).or_insert(0u32) += 1;
        }
        counts
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::standard()
    }
}
