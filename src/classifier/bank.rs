//! The classifier bank: per-intent trained state and the training pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::Token;
use crate::cache::{CacheEntry, TrainingCache};
use crate::classifier::{Classifier, ClassifierWeights};
use crate::features::{CompiledFeatures, FeatureCompiler, content_hash};
use crate::template::{TemplateKey, TemplateStore};

/// Options controlling a training pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    /// Train intents sequentially instead of on the worker pool.
    pub single_thread: bool,
    /// Wall-time bound for the whole pass. The deadline is cooperative:
    /// intents not yet started when it passes are skipped, intents
    /// already training run to completion and their results are kept.
    pub timeout: Duration,
    /// Retrain every intent even when its cache entry is fresh.
    pub force: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            single_thread: false,
            timeout: Duration::from_secs(120),
            force: false,
        }
    }
}

/// Counters describing the last training pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainStats {
    /// Intents trained from scratch in this pass.
    pub trained: usize,
    /// Intents restored from the cache in this pass.
    pub from_cache: usize,
    /// Intents whose classifier failed to fit.
    pub failed: usize,
    /// Intents skipped because the deadline passed.
    pub timed_out: usize,
    /// Cumulative feature-compiler invocations on the owning engine.
    pub compile_invocations: u64,
}

/// Result of a training pass.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// False when any intent failed or the deadline passed.
    pub success: bool,
    /// Counters for the pass.
    pub stats: TrainStats,
}

/// One intent's trained state.
#[derive(Debug, Clone)]
pub struct TrainedIntent {
    /// Compiled features the weights were fitted to.
    pub features: CompiledFeatures,
    /// Fitted weights.
    pub weights: ClassifierWeights,
}

enum Outcome {
    Ready {
        key: TemplateKey,
        entry: TrainedIntent,
        from_cache: bool,
    },
    Failed,
    TimedOut,
}

/// Owns one trained classifier per registered intent.
#[derive(Debug)]
pub struct ClassifierBank {
    classifier: Arc<dyn Classifier>,
    trained: HashMap<TemplateKey, TrainedIntent>,
}

impl ClassifierBank {
    /// Create a bank using the given classification strategy.
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        ClassifierBank {
            classifier,
            trained: HashMap::new(),
        }
    }

    /// Name of the classification strategy in use.
    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Whether no intent has a trained classifier.
    pub fn is_empty(&self) -> bool {
        self.trained.is_empty()
    }

    /// Number of trained classifiers.
    pub fn len(&self) -> usize {
        self.trained.len()
    }

    /// Whether `key` has a trained classifier.
    pub fn contains(&self, key: &TemplateKey) -> bool {
        self.trained.contains_key(key)
    }

    /// Drop the classifier for a detached intent. Idempotent.
    pub fn remove(&mut self, key: &TemplateKey) {
        self.trained.remove(key);
    }

    /// Run a training pass over every registered intent.
    ///
    /// Unchanged intents (matching cache entry) are restored rather than
    /// retrained unless `force` is set. Per-intent failures are isolated:
    /// the rest of the pass continues and previously trained classifiers
    /// stay usable. With zero registered intents the pass trivially
    /// succeeds.
    pub fn train(
        &mut self,
        store: &TemplateStore,
        compiler: &FeatureCompiler,
        cache: &TrainingCache,
        options: &TrainOptions,
    ) -> TrainReport {
        // Classifiers for intents that are no longer registered go away
        // even if the pass later times out.
        self.trained.retain(|key, _| store.intent(key).is_some());

        let deadline = Instant::now() + options.timeout;
        let classifier = Arc::clone(&self.classifier);
        let jobs: Vec<_> = store.intents_in_order().collect();

        let run = |template: &&crate::template::IntentTemplate| -> Outcome {
            if Instant::now() >= deadline {
                return Outcome::TimedOut;
            }
            let key = template.key.clone();
            let hash = content_hash(&template.raw_lines);

            if !options.force
                && let Some(cached) = cache.load(&key, hash)
            {
                debug!(intent = %key, "classifier restored from cache");
                return Outcome::Ready {
                    key,
                    entry: TrainedIntent {
                        features: cached.features,
                        weights: cached.weights,
                    },
                    from_cache: true,
                };
            }

            let features = compiler.compile(template);
            match classifier.train(&features) {
                Ok(weights) => {
                    let entry = CacheEntry {
                        key: key.clone(),
                        content_hash: hash,
                        features: features.clone(),
                        weights: weights.clone(),
                        trained_at: Utc::now(),
                    };
                    if let Err(e) = cache.store(&entry) {
                        // A write failure costs a future cache hit, not
                        // this training result.
                        warn!(intent = %key, error = %e, "failed to persist cache entry");
                    }
                    debug!(intent = %key, "classifier trained");
                    Outcome::Ready {
                        key,
                        entry: TrainedIntent { features, weights },
                        from_cache: false,
                    }
                }
                Err(e) => {
                    warn!(intent = %key, error = %e, "classifier failed to train");
                    Outcome::Failed
                }
            }
        };

        let outcomes: Vec<Outcome> = if options.single_thread {
            jobs.iter().map(run).collect()
        } else {
            jobs.par_iter().map(run).collect()
        };

        let mut stats = TrainStats::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Ready {
                    key,
                    entry,
                    from_cache,
                } => {
                    if from_cache {
                        stats.from_cache += 1;
                    } else {
                        stats.trained += 1;
                    }
                    self.trained.insert(key, entry);
                }
                Outcome::Failed => stats.failed += 1,
                Outcome::TimedOut => stats.timed_out += 1,
            }
        }
        stats.compile_invocations = compiler.invocations();

        let success = stats.failed == 0 && stats.timed_out == 0;
        if stats.timed_out > 0 {
            warn!(
                skipped = stats.timed_out,
                timeout = ?options.timeout,
                "training deadline passed before every intent was fitted"
            );
        }
        TrainReport { success, stats }
    }

    /// Score an utterance against every trained intent.
    ///
    /// Results come back in stable registration order; keeping the first
    /// of equal scores is the documented tie-break.
    pub fn score_all(&self, store: &TemplateStore, tokens: &[Token]) -> Vec<(TemplateKey, f64)> {
        store
            .intent_keys()
            .iter()
            .filter_map(|key| {
                let entry = self.trained.get(key)?;
                let input = entry.features.utterance_vector(tokens);
                let confidence = self.classifier.score(&entry.weights, &input);
                Some((key.clone(), confidence.clamp(0.0, 1.0)))
            })
            .collect()
    }

    /// Trained features for one intent, if present.
    pub fn trained_intent(&self, key: &TemplateKey) -> Option<&TrainedIntent> {
        self.trained.get(key)
    }
}
