//! Template line parsing.
//!
//! A template line is plain text with three extensions:
//!
//! - `{slot}` — a named entity reference capturing a span of the utterance
//! - `*` — an anonymous wildcard span
//! - `(a | b)` — alternation, nestable, expanded into separate lines; an
//!   empty alternative makes the group optional
//!
//! Expansion happens before tokenization, so `(hi | hello) there` trains
//! as the two lines `hi there` and `hello there`.

use std::iter::Peekable;
use std::str::Chars;

use serde::{Deserialize, Serialize};

use crate::analysis::{Token, Tokenizer};
use crate::error::{ParlanceError, Result};

/// One token of a parsed template line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateToken {
    /// A literal word that must match an utterance token.
    Word(String),
    /// A named entity slot absorbing a span of the utterance.
    Entity(String),
    /// An anonymous wildcard absorbing a span of the utterance.
    Wildcard,
}

/// Expand the alternation groups of a line into plain lines.
///
/// `cap` bounds the number of expanded lines; exceeding it is a
/// malformed template, as is an unbalanced parenthesis.
pub fn expand_line(line: &str, cap: usize) -> Result<Vec<String>> {
    let mut chars = line.chars().peekable();
    let variants = expand_sequence(&mut chars, 0, cap)?;
    if chars.next().is_some() {
        // Only an unmatched ')' at depth 0 leaves input behind.
        return Err(ParlanceError::malformed(format!(
            "unbalanced ')' in template line '{line}'"
        )));
    }
    Ok(variants)
}

fn expand_sequence(chars: &mut Peekable<Chars>, depth: usize, cap: usize) -> Result<Vec<String>> {
    let mut variants = vec![String::new()];
    loop {
        match chars.peek() {
            None => break,
            Some(')') | Some('|') if depth > 0 => break,
            Some(')') => break, // reported by the caller at depth 0
            Some('(') => {
                chars.next();
                let alternatives = expand_group(chars, depth + 1, cap)?;
                if variants.len().saturating_mul(alternatives.len()) > cap {
                    return Err(ParlanceError::malformed(format!(
                        "template line expands to more than {cap} variants"
                    )));
                }
                let mut expanded = Vec::with_capacity(variants.len() * alternatives.len());
                for prefix in &variants {
                    for alternative in &alternatives {
                        expanded.push(format!("{prefix}{alternative}"));
                    }
                }
                variants = expanded;
            }
            Some(&c) => {
                chars.next();
                for variant in &mut variants {
                    variant.push(c);
                }
            }
        }
    }
    Ok(variants)
}

fn expand_group(chars: &mut Peekable<Chars>, depth: usize, cap: usize) -> Result<Vec<String>> {
    let mut alternatives = Vec::new();
    loop {
        let sequence = expand_sequence(chars, depth, cap)?;
        if alternatives.len() + sequence.len() > cap {
            return Err(ParlanceError::malformed(format!(
                "template line expands to more than {cap} variants"
            )));
        }
        alternatives.extend(sequence);
        match chars.next() {
            Some('|') => continue,
            Some(')') => break,
            _ => {
                return Err(ParlanceError::malformed(
                    "unbalanced '(' in template line",
                ));
            }
        }
    }
    Ok(alternatives)
}

/// Tokenize one expanded line into template tokens.
///
/// Whitespace-separated chunks are classified: `{name}` becomes an entity
/// reference (the name is lowercased so references resolve
/// case-insensitively), `*` a wildcard, and everything else is run
/// through the tokenizer and emitted as literal words. A chunk containing
/// a brace in any other shape is malformed.
pub fn tokenize_line(line: &str, tokenizer: &dyn Tokenizer) -> Result<Vec<TemplateToken>> {
    let mut tokens = Vec::new();
    for chunk in line.split_whitespace() {
        if chunk == "*" {
            tokens.push(TemplateToken::Wildcard);
        } else if let Some(inner) = chunk.strip_prefix('{').and_then(|c| c.strip_suffix('}')) {
            let name = inner.trim();
            if name.is_empty() || name.contains(['{', '}']) {
                return Err(ParlanceError::malformed(format!(
                    "invalid entity reference '{chunk}'"
                )));
            }
            tokens.push(TemplateToken::Entity(name.to_lowercase()));
        } else if chunk.contains(['{', '}']) {
            return Err(ParlanceError::malformed(format!(
                "entity reference must be a whole word, got '{chunk}'"
            )));
        } else {
            let words: Vec<Token> = tokenizer.tokenize(chunk)?;
            tokens.extend(words.into_iter().map(|t| TemplateToken::Word(t.text)));
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::WordTokenizer;

    #[test]
    fn test_plain_line_passes_through() {
        let lines = expand_line("book a flight", 1000).unwrap();
        assert_eq!(lines, vec!["book a flight".to_string()]);
    }

    #[test]
    fn test_alternation_expands() {
        let mut lines = expand_line("(hi | hello) there", 1000).unwrap();
        lines.iter_mut().for_each(|l| *l = l.split_whitespace().collect::<Vec<_>>().join(" "));
        assert_eq!(lines, vec!["hi there".to_string(), "hello there".to_string()]);
    }

    #[test]
    fn test_empty_alternative_makes_group_optional() {
        let lines = expand_line("turn (the |)light on", 1000).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"turn the light on".to_string()));
        assert!(lines.contains(&"turn light on".to_string()));
    }

    #[test]
    fn test_nested_groups() {
        let lines = expand_line("((a|b) c|d)", 1000).unwrap();
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_unbalanced_parens_rejected() {
        assert!(expand_line("hello (there", 1000).is_err());
        assert!(expand_line("hello there)", 1000).is_err());
    }

    #[test]
    fn test_expansion_cap() {
        let line = "(a|b) (c|d) (e|f)";
        assert_eq!(expand_line(line, 1000).unwrap().len(), 8);
        assert!(expand_line(line, 4).is_err());
    }

    #[test]
    fn test_tokenize_classifies_chunks() {
        let tokenizer = WordTokenizer::new();
        let tokens = tokenize_line("book a flight to {Destination} *", &tokenizer).unwrap();
        assert_eq!(
            tokens,
            vec![
                TemplateToken::Word("book".into()),
                TemplateToken::Word("a".into()),
                TemplateToken::Word("flight".into()),
                TemplateToken::Word("to".into()),
                TemplateToken::Entity("destination".into()),
                TemplateToken::Wildcard,
            ]
        );
    }

    #[test]
    fn test_tokenize_rejects_broken_braces() {
        let tokenizer = WordTokenizer::new();
        assert!(tokenize_line("hello {}", &tokenizer).is_err());
        assert!(tokenize_line("hello {a}b", &tokenizer).is_err());
        assert!(tokenize_line("hello {a", &tokenizer).is_err());
    }
}
