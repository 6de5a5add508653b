//! Per-record signal extraction: tokens and sentiment
mod lexicon;
mod sentiment;
mod tokenizer;

pub use lexicon::LexiconModel;
pub use sentiment::{Score, SentimentModel, SentimentScorer};
pub use tokenizer::{tokenize, Tokenizer};
