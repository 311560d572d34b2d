//! Logistic-regression classifier, the default strategy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::classifier::{Classifier, ClassifierWeights};
use crate::error::{ParlanceError, Result};
use crate::features::CompiledFeatures;

/// One-vs-rest logistic regression trained by batch gradient descent.
///
/// Positive examples are the intent's compiled sample rows. Negative
/// examples are synthesized from the intent's own data — an all-unknown
/// vector, token-dropout variants of each row, and noise rows drawn from
/// an rng seeded by the template content hash — so training is
/// reproducible and each trained classifier depends only on its own
/// template definition. That self-containment is what keeps hash-keyed
/// cache entries valid when unrelated intents change.
#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    /// Gradient-descent epochs.
    pub epochs: usize,
    /// Learning rate.
    pub learning_rate: f64,
    /// L2 regularization strength.
    pub l2: f64,
    /// Number of synthetic noise negatives.
    pub noise_negatives: usize,
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        LogisticClassifier {
            epochs: 400,
            learning_rate: 0.5,
            l2: 1e-4,
            noise_negatives: 4,
        }
    }
}

impl LogisticClassifier {
    /// Create a classifier with the default hyperparameters.
    pub fn new() -> Self {
        LogisticClassifier::default()
    }

    fn build_negatives(&self, features: &CompiledFeatures) -> Vec<Vec<f64>> {
        let dim = features.dimension();
        let wildcard = features.wildcard_index();
        let unknown = features.unknown_index();
        let mut negatives = Vec::new();

        // An utterance of entirely foreign words.
        let mut all_unknown = vec![0.0; dim];
        all_unknown[unknown] = 1.0;
        negatives.push(all_unknown);

        // An utterance that is nothing but slot material, unless some
        // sample line is itself pure slot (then the two would conflict).
        let literal_mass = |row: &[f64]| row[..wildcard].iter().sum::<f64>();
        if features.uses_wildcard && features.rows.iter().all(|row| literal_mass(row) > 0.0) {
            let mut all_wildcard = vec![0.0; dim];
            all_wildcard[wildcard] = 1.0;
            negatives.push(all_wildcard);
        }

        // Token dropout: each sample row with one literal replaced by an
        // unknown word. Positive rows never carry unknown weight, so
        // these cannot collide with them.
        for row in &features.rows {
            for idx in 0..wildcard {
                if row[idx] > 0.0 {
                    let mut dropped = row.clone();
                    dropped[idx] = 0.0;
                    dropped[unknown] = dropped[unknown].max(0.5);
                    negatives.push(dropped);
                }
            }
        }

        // Noise rows: a stray vocabulary word inside foreign text.
        if !features.vocab.is_empty() {
            let mut rng = StdRng::seed_from_u64(features.content_hash as u64);
            for _ in 0..self.noise_negatives {
                let mut noise = vec![0.0; dim];
                noise[rng.random_range(0..features.vocab.len())] = 1.0;
                noise[unknown] = 1.0;
                negatives.push(noise);
            }
        }

        negatives
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z.clamp(-30.0, 30.0)).exp())
}

impl Classifier for LogisticClassifier {
    fn name(&self) -> &'static str {
        "logistic"
    }

    fn train(&self, features: &CompiledFeatures) -> Result<ClassifierWeights> {
        let dim = features.dimension();
        let negatives = self.build_negatives(features);

        let mut dataset: Vec<(&[f64], f64)> = Vec::new();
        for row in &features.rows {
            dataset.push((row.as_slice(), 1.0));
        }
        for row in &negatives {
            dataset.push((row.as_slice(), 0.0));
        }

        // Balance the classes so a handful of sample lines is not drowned
        // out by the synthetic negatives.
        let positive_weight =
            (negatives.len() as f64 / features.rows.len().max(1) as f64).max(1.0);

        let mut weights = vec![0.0; dim];
        let mut bias = 0.0;

        for _ in 0..self.epochs {
            for &(x, y) in &dataset {
                let z = x
                    .iter()
                    .zip(weights.iter())
                    .map(|(xi, wi)| xi * wi)
                    .sum::<f64>()
                    + bias;
                let gradient = (sigmoid(z) - y) * if y > 0.5 { positive_weight } else { 1.0 };
                for (wi, xi) in weights.iter_mut().zip(x.iter()) {
                    *wi -= self.learning_rate * (gradient * xi + self.l2 * *wi);
                }
                bias -= self.learning_rate * gradient;
            }
        }

        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(ParlanceError::training(format!(
                "weights diverged for intent '{}'",
                features.key
            )));
        }

        Ok(ClassifierWeights { weights, bias })
    }

    fn score(&self, weights: &ClassifierWeights, input: &[f64]) -> f64 {
        if input.len() != weights.dimension() {
            return 0.0;
        }
        let z = input
            .iter()
            .zip(weights.weights.iter())
            .map(|(xi, wi)| xi * wi)
            .sum::<f64>()
            + weights.bias;
        sigmoid(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Tokenizer, WordTokenizer};
    use crate::features::FeatureCompiler;
    use crate::template::{IntentTemplate, TemplateKey};

    fn compiled(name: &str, samples: &[&str]) -> CompiledFeatures {
        let template = IntentTemplate::parse(
            TemplateKey::named(name),
            &samples.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &WordTokenizer::new(),
            1000,
        )
        .unwrap();
        FeatureCompiler::new().compile(&template)
    }

    #[test]
    fn test_separates_samples_from_foreign_text() {
        let classifier = LogisticClassifier::new();
        let tokenizer = WordTokenizer::new();
        let features = compiled("greet", &["hello", "hi there"]);
        let weights = classifier.train(&features).unwrap();

        let positive = features.utterance_vector(&tokenizer.tokenize("hi there").unwrap());
        let negative = features.utterance_vector(&tokenizer.tokenize("goodbye").unwrap());

        let high = classifier.score(&weights, &positive);
        let low = classifier.score(&weights, &negative);
        assert!(high >= 0.8, "expected confident match, got {high}");
        assert!(low <= 0.2, "expected confident rejection, got {low}");
    }

    #[test]
    fn test_slotted_template_generalizes() {
        let classifier = LogisticClassifier::new();
        let tokenizer = WordTokenizer::new();
        let features = compiled("book_flight", &["book a flight to {destination}"]);
        let weights = classifier.train(&features).unwrap();

        // The slot word was never seen in training.
        let utterance = features.utterance_vector(&tokenizer.tokenize("book a flight to paris").unwrap());
        assert!(classifier.score(&weights, &utterance) >= 0.8);

        let foreign = features.utterance_vector(&tokenizer.tokenize("what time is it").unwrap());
        assert!(classifier.score(&weights, &foreign) <= 0.2);
    }

    #[test]
    fn test_training_is_reproducible() {
        let classifier = LogisticClassifier::new();
        let features = compiled("greet", &["hello", "hi there"]);
        let a = classifier.train(&features).unwrap();
        let b = classifier.train(&features).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_score_bounds() {
        let classifier = LogisticClassifier::new();
        let features = compiled("greet", &["hello"]);
        let weights = classifier.train(&features).unwrap();
        for input in [vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]] {
            let score = classifier.score(&weights, &input);
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let classifier = LogisticClassifier::new();
        let weights = ClassifierWeights {
            weights: vec![1.0, 2.0],
            bias: 0.0,
        };
        assert_eq!(classifier.score(&weights, &[1.0]), 0.0);
    }
}
