//! Stop-word and minimum-length filtering, extending the teacher's
//! `analysis::filters::stopword::StopWordFilter` with the spec's "drop
//! tokens shorter than 2 characters" rule.

use std::collections::HashSet;

use crate::text::filter::TokenFilter;
use crate::text::token::Token;

pub struct StopWordFilter {
    pub stop_words: HashSet<String>,
    pub min_length: usize,
}

impl StopWordFilter {
    pub fn new(stop_words: Vec<String>, min_length: usize) -> Self {
        StopWordFilter {
            stop_words: stop_words.into_iter().collect(),
            min_length,
        }
    }

    pub fn english() -> Self {
        let words = [
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in",
            "is", "it", "its", "of", "on", "that", "the", "to", "was", "will", "with",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        StopWordFilter::new(words, 2)
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .into_iter()
            .filter(|token| token.text.len() >= self.min_length && !self.stop_words.contains(&token.text))
            .collect()
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(StopWordFilter {
            stop_words: self.stop_words.clone(),
            min_length: self.min_length,
        })
    }
}
