//! Token types for text analysis.
//!
//! A [`Token`] is the fundamental unit flowing through the analysis
//! pipeline: templates are tokenized at registration, utterances at query
//! time, and both sides of slot extraction align on token positions.

use serde::{Deserialize, Serialize};

/// A token represents a single unit of text after tokenization.
///
/// # Examples
///
/// ```
/// use parlance::analysis::Token;
///
/// let token = Token::new("hello", 0);
/// assert_eq!(token.text, "hello");
/// assert_eq!(token.position, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token's text content (already lowercased by the tokenizer).
    pub text: String,
    /// Position in the token stream (0-based).
    pub position: usize,
    /// Byte offset of the token start in the original text.
    pub start_offset: usize,
    /// Byte offset of the token end in the original text.
    pub end_offset: usize,
}

impl Token {
    /// Create a new token with text and position.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        let text = text.into();
        let end = text.len();
        Token {
            text,
            position,
            start_offset: 0,
            end_offset: end,
        }
    }

    /// Create a new token with explicit byte offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new("world", 3);
        assert_eq!(token.text, "world");
        assert_eq!(token.position, 3);
        assert_eq!(token.start_offset, 0);
        assert_eq!(token.end_offset, 5);
    }

    #[test]
    fn test_token_with_offsets() {
        let token = Token::with_offsets("there", 1, 3, 8);
        assert_eq!(token.start_offset, 3);
        assert_eq!(token.end_offset, 8);
    }
}
