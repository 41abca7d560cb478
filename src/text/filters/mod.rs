pub mod hashtag;
pub mod ngram;
pub mod stemmer;
pub mod stopword;
