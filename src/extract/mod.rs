//! Slot extraction.
//!
//! After the classifier bank has picked the best intent, the extractor
//! aligns that intent's template lines against the utterance to recover
//! the text bound to each `{slot}` and wildcard, plus the remainder the
//! template did not consume.
//!
//! Alignment is a small dynamic program over (template position,
//! utterance position). Literal tokens must match (exactly, or within
//! edit distance 1 for longer words when fuzzy matching is on); slot
//! tokens absorb one or more utterance tokens. Among feasible alignments
//! the extractor maximizes literal matches first, then the similarity of
//! captured spans to the referenced entity's samples, then prefers the
//! shortest spans.

use std::collections::HashMap;

use crate::analysis::Token;
use crate::template::{IntentTemplate, TemplateToken};
use crate::util::similarity;

const LITERAL_MATCH: f64 = 2.0;
const FUZZY_MATCH: f64 = 1.5;
const SKIP_PENALTY: f64 = 0.5;
const SPAN_PENALTY: f64 = 0.05;

/// Result of aligning a template against an utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotAlignment {
    /// Captured text per slot name. Empty when no line aligned.
    pub slots: HashMap<String, String>,
    /// Utterance tokens consumed by neither a literal nor a slot span.
    pub remainder: Vec<String>,
    /// Whether any template line aligned at all.
    pub matched: bool,
}

/// Aligns intent templates against utterances to extract slot values.
#[derive(Debug, Clone)]
pub struct SlotExtractor {
    fuzzy: bool,
}

impl SlotExtractor {
    /// Create an extractor. `fuzzy` permits literal matches within edit
    /// distance 1 for words of five or more characters.
    pub fn new(fuzzy: bool) -> Self {
        SlotExtractor { fuzzy }
    }

    /// Extract slot values for `template` from the utterance tokens.
    ///
    /// `entity_samples` maps slot names to the referenced entity's sample
    /// strings; slots without registered entities capture freely. When no
    /// line of the template aligns, the result degrades to an empty slot
    /// map with the whole utterance as remainder — extraction never fails
    /// an already-selected match.
    pub fn extract(
        &self,
        template: &IntentTemplate,
        entity_samples: &HashMap<String, Vec<String>>,
        tokens: &[Token],
    ) -> SlotAlignment {
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();

        let mut best: Option<(f64, SlotAlignment)> = None;
        for line in &template.lines {
            if let Some((score, alignment)) = self.align_line(line, entity_samples, &words) {
                let better = match &best {
                    Some((best_score, _)) => score > *best_score,
                    None => true,
                };
                if better {
                    best = Some((score, alignment));
                }
            }
        }

        match best {
            Some((_, alignment)) => alignment,
            None => SlotAlignment {
                slots: HashMap::new(),
                remainder: words.iter().map(|w| w.to_string()).collect(),
                matched: false,
            },
        }
    }

    fn literal_score(&self, literal: &str, word: &str) -> Option<f64> {
        if literal == word {
            return Some(LITERAL_MATCH);
        }
        if self.fuzzy
            && literal.chars().count() >= 5
            && crate::util::levenshtein_distance(literal, word) <= 1
        {
            return Some(FUZZY_MATCH);
        }
        None
    }

    /// Align one template line. Returns the alignment score and the
    /// reconstructed capture, or `None` when the line cannot align.
    fn align_line(
        &self,
        line: &[TemplateToken],
        entity_samples: &HashMap<String, Vec<String>>,
        words: &[&str],
    ) -> Option<(f64, SlotAlignment)> {
        let n = line.len();
        let m = words.len();

        // score[i][j]: best score with line[..i] aligned to words[..j].
        // Back-pointers record how words[..j] was consumed.
        #[derive(Clone, Copy, PartialEq)]
        enum Step {
            Start,
            /// Literal line[i-1] matched words[j-1].
            Literal,
            /// Slot line[i-1] absorbed words[j-len..j].
            Slot { len: usize },
            /// words[j-1] skipped (remainder).
            Skip,
        }

        let mut score = vec![vec![f64::NEG_INFINITY; m + 1]; n + 1];
        let mut step = vec![vec![Step::Start; m + 1]; n + 1];
        score[0][0] = 0.0;

        for j in 1..=m {
            score[0][j] = score[0][j - 1] - SKIP_PENALTY;
            step[0][j] = Step::Skip;
        }

        for i in 1..=n {
            for j in 0..=m {
                // Skip an utterance token without consuming a template
                // token.
                if j > 0 && score[i][j - 1] - SKIP_PENALTY > score[i][j] {
                    score[i][j] = score[i][j - 1] - SKIP_PENALTY;
                    step[i][j] = Step::Skip;
                }
                match &line[i - 1] {
                    TemplateToken::Word(literal) => {
                        if j > 0
                            && let Some(gain) = self.literal_score(literal, words[j - 1])
                        {
                            let candidate = score[i - 1][j - 1] + gain;
                            if candidate > score[i][j] {
                                score[i][j] = candidate;
                                step[i][j] = Step::Literal;
                            }
                        }
                    }
                    TemplateToken::Entity(name) => {
                        for len in 1..=j {
                            let span = words[j - len..j].join(" ");
                            let bonus = entity_samples
                                .get(name)
                                .map(|samples| {
                                    samples
                                        .iter()
                                        .map(|s| similarity(s, &span))
                                        .fold(0.0, f64::max)
                                })
                                .unwrap_or(0.0);
                            let candidate =
                                score[i - 1][j - len] + bonus - SPAN_PENALTY * len as f64;
                            if candidate > score[i][j] {
                                score[i][j] = candidate;
                                step[i][j] = Step::Slot { len };
                            }
                        }
                    }
                    TemplateToken::Wildcard => {
                        for len in 1..=j {
                            let candidate = score[i - 1][j - len] - SPAN_PENALTY * len as f64;
                            if candidate > score[i][j] {
                                score[i][j] = candidate;
                                step[i][j] = Step::Slot { len };
                            }
                        }
                    }
                }
            }
        }

        if score[n][m] == f64::NEG_INFINITY {
            return None;
        }

        // Reconstruct captures and the remainder.
        let mut slots = HashMap::new();
        let mut remainder_positions = Vec::new();
        let (mut i, mut j) = (n, m);
        while i > 0 || j > 0 {
            match step[i][j] {
                Step::Literal => {
                    i -= 1;
                    j -= 1;
                }
                Step::Slot { len } => {
                    if let TemplateToken::Entity(name) = &line[i - 1] {
                        slots.insert(name.clone(), words[j - len..j].join(" "));
                    }
                    i -= 1;
                    j -= len;
                }
                Step::Skip => {
                    remainder_positions.push(j - 1);
                    j -= 1;
                }
                Step::Start => break,
            }
        }
        remainder_positions.reverse();
        let remainder = remainder_positions
            .into_iter()
            .map(|p| words[p].to_string())
            .collect();

        Some((
            score[n][m],
            SlotAlignment {
                slots,
                remainder,
                matched: true,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Tokenizer, WordTokenizer};
    use crate::template::TemplateKey;

    fn template(samples: &[&str]) -> IntentTemplate {
        IntentTemplate::parse(
            TemplateKey::named("test"),
            &samples.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &WordTokenizer::new(),
            1000,
        )
        .unwrap()
    }

    fn words(text: &str) -> Vec<Token> {
        WordTokenizer::new().tokenize(text).unwrap()
    }

    #[test]
    fn test_extracts_single_slot() {
        let extractor = SlotExtractor::new(true);
        let template = template(&["book a flight to {destination}"]);
        let samples = HashMap::from([(
            "destination".to_string(),
            vec!["paris".to_string(), "tokyo".to_string()],
        )]);

        let alignment = extractor.extract(&template, &samples, &words("book a flight to paris"));
        assert!(alignment.matched);
        assert_eq!(alignment.slots.get("destination").unwrap(), "paris");
        assert!(alignment.remainder.is_empty());
    }

    #[test]
    fn test_slot_without_entity_captures_span() {
        let extractor = SlotExtractor::new(true);
        let template = template(&["remind me to {task}"]);

        let alignment = extractor.extract(
            &template,
            &HashMap::new(),
            &words("remind me to feed the cat"),
        );
        assert!(alignment.matched);
        assert_eq!(alignment.slots.get("task").unwrap(), "feed the cat");
    }

    #[test]
    fn test_entity_similarity_resolves_adjacent_slots() {
        let extractor = SlotExtractor::new(true);
        let template = template(&["fly from {origin} {destination}"]);
        let samples = HashMap::from([
            ("origin".to_string(), vec!["new york".to_string()]),
            ("destination".to_string(), vec!["paris".to_string()]),
        ]);

        let alignment = extractor.extract(&template, &samples, &words("fly from new york paris"));
        assert!(alignment.matched);
        assert_eq!(alignment.slots.get("origin").unwrap(), "new york");
        assert_eq!(alignment.slots.get("destination").unwrap(), "paris");
    }

    #[test]
    fn test_unconsumed_tokens_become_remainder() {
        let extractor = SlotExtractor::new(true);
        let template = template(&["turn on the light"]);

        let alignment = extractor.extract(
            &template,
            &HashMap::new(),
            &words("please turn on the light"),
        );
        assert!(alignment.matched);
        assert_eq!(alignment.remainder, vec!["please".to_string()]);
    }

    #[test]
    fn test_infeasible_alignment_degrades_to_empty() {
        let extractor = SlotExtractor::new(false);
        let template = template(&["play some music"]);

        let alignment = extractor.extract(&template, &HashMap::new(), &words("what time is it"));
        assert!(!alignment.matched);
        assert!(alignment.slots.is_empty());
        assert_eq!(
            alignment.remainder,
            vec!["what", "time", "is", "it"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_fuzzy_literal_match() {
        let extractor = SlotExtractor::new(true);
        let template = template(&["weather forecast"]);

        // One dropped character in a long literal still aligns.
        let alignment = extractor.extract(&template, &HashMap::new(), &words("weather forcast"));
        assert!(alignment.matched);
        assert!(alignment.remainder.is_empty());

        let strict = SlotExtractor::new(false);
        let alignment = strict.extract(&template, &HashMap::new(), &words("weather forcast"));
        assert!(!alignment.matched);
    }

    #[test]
    fn test_best_line_wins() {
        let extractor = SlotExtractor::new(true);
        let template = template(&["play {song}", "play {song} by {artist}"]);

        let alignment = extractor.extract(
            &template,
            &HashMap::new(),
            &words("play yesterday by the beatles"),
        );
        assert!(alignment.matched);
        assert_eq!(alignment.slots.get("song").unwrap(), "yesterday");
        assert_eq!(alignment.slots.get("artist").unwrap(), "the beatles");
    }
}
