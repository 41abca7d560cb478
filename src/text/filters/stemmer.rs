//! Bespoke suffix stemmer, grounded on the teacher's
//! `analysis::filters::stemmer::StemmerFilter` shape (a `TokenFilter`
//! wrapping a stemming algorithm) but implementing the engine
//! specification's own suffix rules rather than Porter/Snowball:
//! trailing `ies -> y`; `-ing`, `-ed`, `-s` stripped, with a short list of
//! common exceptions left untouched.

use crate::text::filter::TokenFilter;
use crate::text::token::Token;

/// Short, frequent words that the suffix rules would otherwise mangle.
const EXCEPTIONS: &[&str] = &[
    "is", "was", "has", "his", "its", "this", "thus", "us", "bus", "gas", "ring", "king", "sing",
    "wing", "thing", "spring", "bring", "during", "being",
];

pub struct ForestStemmer;

impl ForestStemmer {
    pub fn stem(word: &str) -> String {
        if EXCEPTIONS.contains(&word) {
            return word.to_string();
        }

        if let Some(stem) = word.strip_suffix("ies") {
            if stem.len() >= 2 {
                return format!("{}y", stem);
            }
        }

        if let Some(stem) = word.strip_suffix("ing") {
            if stem.len() >= 3 {
                return undouble(stem);
            }
        }

        if let Some(stem) = word.strip_suffix("ed") {
            if stem.len() >= 3 {
                return undouble(stem);
            }
        }

        if let Some(stem) = word.strip_suffix("s") {
            if !word.ends_with("ss") && stem.len() >= 3 {
                return stem.to_string();
            }
        }

        word.to_string()
    }
}

/// Undoes consonant doubling left by stripping `-ing`/`-ed`
/// (e.g. "running" -> "runn" -> "run").
fn undouble(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let len = chars.len();
    if len >= 2 && chars[len - 1] == chars[len - 2] && !is_vowel(chars[len - 1]) {
        chars[..len - 1].iter().collect()
    } else {
        stem.to_string()
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

pub struct StemmerFilter;

impl TokenFilter for StemmerFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens
            .into_iter()
            .map(|mut token| {
                token.text = ForestStemmer::stem(&token.text);
                token
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(StemmerFilter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ies_becomes_y() {
        assert_eq!(ForestStemmer::stem("studies"), "study");
    }

    #[test]
    fn strips_common_suffixes() {
        assert_eq!(ForestStemmer::stem("linking"), "link");
        assert_eq!(ForestStemmer::stem("linked"), "link");
        assert_eq!(ForestStemmer::stem("notes"), "note");
    }

    #[test]
    fn undoubles_doubled_consonant() {
        assert_eq!(ForestStemmer::stem("running"), "run");
    }

    #[test]
    fn respects_exceptions() {
        assert_eq!(ForestStemmer::stem("ring"), "ring");
        assert_eq!(ForestStemmer::stem("was"), "was");
    }
}
