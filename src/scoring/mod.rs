pub mod scorer;
pub mod tag_idf;
