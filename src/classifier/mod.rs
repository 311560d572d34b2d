//! Intent classifiers.
//!
//! One binary classifier per registered intent distinguishes "this
//! utterance belongs to intent X" from "does not". The statistical method
//! is a pluggable strategy behind the [`Classifier`] trait; the crate
//! ships [`LogisticClassifier`] as the default. The [`ClassifierBank`]
//! owns the trained per-intent state and the incremental training pass.

pub mod bank;
pub mod logistic;

pub use bank::{ClassifierBank, TrainOptions, TrainReport, TrainStats, TrainedIntent};
pub use logistic::LogisticClassifier;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::CompiledFeatures;

/// Trained parameters of one intent's classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    /// One weight per feature position.
    pub weights: Vec<f64>,
    /// Bias term.
    pub bias: f64,
}

impl ClassifierWeights {
    /// Feature dimension these weights were trained for.
    pub fn dimension(&self) -> usize {
        self.weights.len()
    }
}

/// A pluggable classification strategy.
///
/// Implementations must be deterministic for a given input (training may
/// use randomness, but only seeded from the template content) and must
/// produce confidences in [0, 1]. Scores for different intents are
/// independent; they do not sum to 1.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Name of this strategy (for diagnostics and configuration).
    fn name(&self) -> &'static str;

    /// Fit weights to one intent's compiled features.
    fn train(&self, features: &CompiledFeatures) -> Result<ClassifierWeights>;

    /// Score an utterance vector against trained weights, in [0, 1].
    fn score(&self, weights: &ClassifierWeights, input: &[f64]) -> f64;
}
