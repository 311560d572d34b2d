//! The feature compiler.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::analysis::Token;
use crate::features::vocab::Vocabulary;
use crate::template::{IntentTemplate, TemplateKey, TemplateToken};

/// Turn raw token counts into feature weights: binary presence for
/// vocabulary positions, counts capped at two and scaled to [0, 1] for
/// the wildcard and unknown positions.
fn finish_vector(mut counts: Vec<f64>, wildcard_index: usize) -> Vec<f64> {
    for (idx, weight) in counts.iter_mut().enumerate() {
        if idx < wildcard_index {
            *weight = weight.min(1.0);
        } else {
            *weight = weight.min(2.0) / 2.0;
        }
    }
    counts
}

/// Content hash over a template's raw definition.
///
/// Computed on the canonical joined sample lines, so any edit to the
/// definition changes the hash even without explicit invalidation.
pub fn content_hash(raw_lines: &[String]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for line in raw_lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}

/// The numeric representation of one intent's templates.
///
/// Each expanded sample line becomes one feature vector with the layout
/// `[vocabulary presence weights..., wildcard weight, unknown weight]`.
/// Vocabulary positions carry binary presence; the wildcard and unknown
/// positions carry counts capped at two and scaled to [0, 1], so one
/// stray word degrades a score gently while several sink it. Wildcards
/// and entity slots occupy the distinguished wildcard position rather
/// than a literal vocabulary slot, so a classifier trained on
/// `book a {flight_type} flight` generalizes over the slot's words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFeatures {
    /// Key of the intent these features were compiled from.
    pub key: TemplateKey,
    /// Content hash of the raw definition at compile time.
    pub content_hash: u32,
    /// Vocabulary of the intent's literal words.
    pub vocab: Vocabulary,
    /// One feature vector per expanded sample line.
    pub rows: Vec<Vec<f64>>,
    /// Whether any line contains a wildcard or entity slot.
    pub uses_wildcard: bool,
}

impl CompiledFeatures {
    /// Dimension of the feature vectors: vocabulary plus the wildcard and
    /// unknown positions.
    pub fn dimension(&self) -> usize {
        self.vocab.len() + 2
    }

    /// Index of the wildcard feature position.
    pub fn wildcard_index(&self) -> usize {
        self.vocab.len()
    }

    /// Index of the unknown-token feature position.
    pub fn unknown_index(&self) -> usize {
        self.vocab.len() + 1
    }

    /// Project an utterance into this intent's feature space.
    ///
    /// Known tokens set their vocabulary position. Unknown tokens count
    /// toward the wildcard position when the intent's templates use
    /// wildcards (an unknown word is what a slot expects to absorb), the
    /// unknown position otherwise.
    pub fn utterance_vector(&self, tokens: &[Token]) -> Vec<f64> {
        let mut counts = vec![0.0; self.dimension()];
        for token in tokens {
            match self.vocab.id(&token.text) {
                Some(idx) => counts[idx] += 1.0,
                None if self.uses_wildcard => counts[self.wildcard_index()] += 1.0,
                None => counts[self.unknown_index()] += 1.0,
            }
        }
        finish_vector(counts, self.wildcard_index())
    }
}

/// Compiles intent templates into [`CompiledFeatures`].
///
/// Compilation is a deterministic pure function of the template
/// definition. The compiler carries a monotone invocation counter so
/// hosts and tests can verify how often the expensive path actually ran.
#[derive(Debug, Default)]
pub struct FeatureCompiler {
    invocations: AtomicU64,
}

impl FeatureCompiler {
    /// Create a new feature compiler.
    pub fn new() -> Self {
        FeatureCompiler::default()
    }

    /// Number of compile invocations since construction.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Compile an intent template.
    pub fn compile(&self, template: &IntentTemplate) -> CompiledFeatures {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        let mut vocab = Vocabulary::new();
        for line in &template.lines {
            for token in line {
                if let TemplateToken::Word(word) = token {
                    vocab.get_or_insert(word);
                }
            }
        }

        let uses_wildcard = template.has_slots();
        let wildcard_index = vocab.len();
        let dimension = vocab.len() + 2;

        let rows = template
            .lines
            .iter()
            .map(|line| {
                let mut counts = vec![0.0; dimension];
                for token in line {
                    match token {
                        TemplateToken::Word(word) => {
                            // Vocabulary was built from these same lines.
                            let idx = vocab.id(word).unwrap_or(wildcard_index);
                            counts[idx] += 1.0;
                        }
                        TemplateToken::Entity(_) | TemplateToken::Wildcard => {
                            counts[wildcard_index] += 1.0;
                        }
                    }
                }
                finish_vector(counts, wildcard_index)
            })
            .collect();

        CompiledFeatures {
            key: template.key.clone(),
            content_hash: content_hash(&template.raw_lines),
            vocab,
            rows,
            uses_wildcard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Tokenizer, WordTokenizer};

    fn template(name: &str, samples: &[&str]) -> IntentTemplate {
        IntentTemplate::parse(
            TemplateKey::named(name),
            &samples.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &WordTokenizer::new(),
            1000,
        )
        .unwrap()
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = FeatureCompiler::new();
        let t = template("greet", &["hello", "hi there"]);
        let a = compiler.compile(&t);
        let b = compiler.compile(&t);
        assert_eq!(a, b);

        // Byte-identical, not just structurally equal.
        let bytes_a = bincode::serialize(&a).unwrap();
        let bytes_b = bincode::serialize(&b).unwrap();
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(compiler.invocations(), 2);
    }

    #[test]
    fn test_content_hash_tracks_edits() {
        let a = content_hash(&["hello".to_string(), "hi there".to_string()]);
        let b = content_hash(&["hello".to_string(), "hi here".to_string()]);
        assert_ne!(a, b);
        assert_eq!(a, content_hash(&["hello".to_string(), "hi there".to_string()]));
    }

    #[test]
    fn test_slot_occupies_wildcard_position() {
        let compiler = FeatureCompiler::new();
        let t = template("book_flight", &["book a flight to {destination}"]);
        let features = compiler.compile(&t);

        // The slot is not in the vocabulary.
        assert_eq!(features.vocab.len(), 4);
        assert!(features.uses_wildcard);
        let row = &features.rows[0];
        assert_eq!(row.len(), 6);
        assert_eq!(row[features.vocab.id("book").unwrap()], 1.0);
        assert!((row[features.wildcard_index()] - 0.5).abs() < 1e-9);
        assert_eq!(row[features.unknown_index()], 0.0);
    }

    #[test]
    fn test_utterance_vector_routes_unknowns() {
        let compiler = FeatureCompiler::new();
        let tokenizer = WordTokenizer::new();

        let slotted = compiler.compile(&template("fly", &["fly to {city}"]));
        let v = slotted.utterance_vector(&tokenizer.tokenize("fly to paris").unwrap());
        assert_eq!(v[slotted.wildcard_index()], 0.5);
        assert_eq!(v[slotted.unknown_index()], 0.0);
        // An utterance shaped exactly like the sample line projects onto
        // the training row itself.
        assert_eq!(v, slotted.rows[0]);

        let plain = compiler.compile(&template("greet", &["hello there"]));
        let v = plain.utterance_vector(&tokenizer.tokenize("goodbye friend stranger").unwrap());
        // Three unknown words saturate the capped unknown position.
        assert_eq!(v[plain.unknown_index()], 1.0);
    }

    #[test]
    fn test_empty_utterance_is_zero_vector() {
        let compiler = FeatureCompiler::new();
        let features = compiler.compile(&template("greet", &["hello"]));
        let v = features.utterance_vector(&[]);
        assert!(v.iter().all(|&w| w == 0.0));
    }
}
