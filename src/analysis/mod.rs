//! Text analysis for intent matching.
//!
//! Templates and utterances go through the same tokenization, so a
//! template token position always lines up with an utterance token
//! position during extraction.

pub mod token;
pub mod tokenizer;

pub use token::Token;
pub use tokenizer::{Tokenizer, WordTokenizer};
