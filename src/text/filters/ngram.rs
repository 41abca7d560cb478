//! Word-bigram extraction, grounded on the teacher's
//! `analysis::filters::ngram::NGramFilter` (character n-grams) but
//! generalized to adjacent-token bigrams for tag extraction.

use crate::text::filter::TokenFilter;
use crate::text::token::Token;

pub struct BigramFilter;

impl TokenFilter for BigramFilter {
    /// Replaces the token stream with the bigrams formed from adjacent
    /// tokens in the original order. Positions are not meaningful on
    /// the emitted tokens; only `text` is consumed downstream.
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let text = format!("{} {}", pair[0].text, pair[1].text);
                Token::new(text, i as u32, 0)
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(BigramFilter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_adjacent_bigrams() {
        let tokens = vec![
            Token::new("knowledge".into(), 0, 0),
            Token::new("graph".into(), 1, 0),
            Token::new("engine".into(), 2, 0),
        ];
        let filtered = BigramFilter.filter(tokens);
        let bigrams: Vec<&str> = filtered.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(bigrams, vec!["knowledge graph", "graph engine"]);
    }
}
