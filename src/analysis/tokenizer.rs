//! Tokenizer trait and the default word tokenizer.

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::Token;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a sequence of tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;

    /// Get the name of this tokenizer (for debugging and configuration).
    fn name(&self) -> &'static str;
}

/// A tokenizer that lowercases and splits text on Unicode word boundaries.
///
/// Uses the Unicode Text Segmentation algorithm (UAX #29), which discards
/// punctuation and whitespace segments while handling international text.
/// Token order is preserved and the output is deterministic: identical
/// input always yields identical tokens.
///
/// # Examples
///
/// ```
/// use parlance::analysis::{Tokenizer, WordTokenizer};
///
/// let tokenizer = WordTokenizer::new();
/// let tokens = tokenizer.tokenize("Book a flight, please!").unwrap();
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, vec!["book", "a", "flight", "please"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct WordTokenizer;

impl WordTokenizer {
    /// Create a new word tokenizer.
    pub fn new() -> Self {
        WordTokenizer
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let tokens = text
            .unicode_word_indices()
            .enumerate()
            .map(|(position, (offset, word))| {
                Token::with_offsets(
                    word.to_lowercase(),
                    position,
                    offset,
                    offset + word.len(),
                )
            })
            .collect();
        Ok(tokens)
    }

    fn name(&self) -> &'static str {
        "word"
    }
}
