//! Token filter trait, following the teacher's `analysis::filter::TokenFilter`.

use crate::text::token::Token;

pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token>;
    fn clone_box(&self) -> Box<dyn TokenFilter>;
}
