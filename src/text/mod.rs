//! Keyword analysis shared by the classifier, the context cache and the
//! relevance validator.

pub mod keywords;

pub use keywords::{coverage, keywords, overlap_ratio, tokens, STOP_WORDS};
