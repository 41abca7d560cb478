//! Unicode word tokenizer, following the teacher's
//! `analysis::tokenizer::StandardTokenizer`.

use unicode_segmentation::UnicodeSegmentation;

use crate::text::token::Token;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer { max_token_length: 255 }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let lowered = text.to_lowercase();
        let mut tokens = Vec::new();
        let mut position = 0u32;
        let mut offset = 0;

        for word in lowered.unicode_words() {
            if word.len() <= self.max_token_length {
                tokens.push(Token::new(word.to_string(), position, offset));
                position += 1;
            }
            offset += word.len();
        }

        tokens
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}
