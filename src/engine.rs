//! The engine façade.
//!
//! [`IntentEngine`] is the public surface of the crate: registration,
//! detachment, training and matching for one language scope, coordinated
//! under a single mutual-exclusion domain. Every operation acquires the
//! engine lock for its full duration, so a query never observes a
//! half-updated classifier set; training, the infrequent operation, pays
//! for that with matching latency under concurrent writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::{Tokenizer, WordTokenizer};
use crate::cache::{EntityCacheEntry, TrainingCache};
use crate::classifier::{Classifier, ClassifierBank, LogisticClassifier};
pub use crate::classifier::{TrainOptions, TrainStats};
use crate::error::Result;
use crate::extract::SlotExtractor;
use crate::features::{FeatureCompiler, content_hash};
use crate::template::{
    EntityTemplate, IntentTemplate, TemplateKey, TemplateStore, read_template_file,
};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Confidence threshold below which `calc_intent` reports no match.
    pub min_confidence: f64,
    /// Allow literal template words to match within edit distance 1
    /// during slot extraction (words of five or more characters).
    pub fuzzy_matching: bool,
    /// Maximum number of lines one template line may expand to.
    pub max_expansions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            min_confidence: 0.35,
            fuzzy_matching: true,
            max_expansions: 1000,
        }
    }
}

/// The best match for an utterance.
///
/// Ephemeral: produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Key of the winning intent.
    pub intent: TemplateKey,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    /// Captured text per entity slot.
    pub entities: HashMap<String, String>,
    /// The normalized utterance that was matched.
    pub utterance: String,
    /// The part of the utterance the template did not consume.
    pub remainder: String,
}

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    /// No templates registered.
    Empty,
    /// Templates registered; classifiers may be stale or absent.
    Populated,
    /// Every registered intent has a fresh classifier.
    Trained,
}

struct EngineInner {
    store: TemplateStore,
    bank: ClassifierBank,
    cache: TrainingCache,
    compiler: FeatureCompiler,
    state: EngineState,
    last_stats: TrainStats,
}

/// A trainable intent matcher for one language scope.
///
/// Designed for concurrent callers: request threads and a background
/// trainer may share one engine, with all operations serialized through
/// the engine lock. Engines for different languages are fully
/// independent; see [`crate::registry::EngineRegistry`].
pub struct IntentEngine {
    lang: String,
    config: EngineConfig,
    tokenizer: Arc<dyn Tokenizer>,
    extractor: SlotExtractor,
    inner: Mutex<EngineInner>,
}

impl std::fmt::Debug for IntentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentEngine")
            .field("lang", &self.lang)
            .field("config", &self.config)
            .finish()
    }
}

impl IntentEngine {
    /// Create an engine with default configuration and the default
    /// logistic classifier. `cache_dir` is where training results
    /// persist across restarts.
    pub fn new<P: AsRef<Path>>(cache_dir: P, lang: &str) -> Result<Self> {
        Self::with_config(cache_dir, lang, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config<P: AsRef<Path>>(
        cache_dir: P,
        lang: &str,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::with_classifier(cache_dir, lang, config, Arc::new(LogisticClassifier::new()))
    }

    /// Create an engine with an explicit classification strategy.
    pub fn with_classifier<P: AsRef<Path>>(
        cache_dir: P,
        lang: &str,
        config: EngineConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self> {
        let cache = TrainingCache::open(cache_dir)?;
        Ok(IntentEngine {
            lang: lang.to_string(),
            extractor: SlotExtractor::new(config.fuzzy_matching),
            config,
            tokenizer: Arc::new(WordTokenizer::new()),
            inner: Mutex::new(EngineInner {
                store: TemplateStore::new(),
                bank: ClassifierBank::new(classifier),
                cache,
                compiler: FeatureCompiler::new(),
                state: EngineState::Empty,
                last_stats: TrainStats::default(),
            }),
        })
    }

    /// The language tag this engine serves.
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register (or replace) an intent under an unscoped name.
    ///
    /// `reload_cache` invalidates the intent's cache entry so the next
    /// training pass refits it even if the definition is unchanged.
    pub fn register_intent(&self, name: &str, samples: &[String], reload_cache: bool) -> Result<()> {
        self.add_intent(TemplateKey::named(name), samples, reload_cache)
    }

    /// Register (or replace) an intent scoped to an owner (skill).
    pub fn register_intent_scoped(
        &self,
        owner: &str,
        name: &str,
        samples: &[String],
        reload_cache: bool,
    ) -> Result<()> {
        self.add_intent(TemplateKey::scoped(owner, name), samples, reload_cache)
    }

    /// Register an intent from a template file (one sample per line,
    /// blank lines and `#` comments skipped).
    pub fn register_intent_from_file<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        reload_cache: bool,
    ) -> Result<()> {
        let samples = read_template_file(path)?;
        self.add_intent(TemplateKey::named(name), &samples, reload_cache)
    }

    /// Register (or replace) an entity under an unscoped name.
    pub fn register_entity(&self, name: &str, samples: &[String], reload_cache: bool) -> Result<()> {
        self.add_entity(TemplateKey::named(name), samples, reload_cache)
    }

    /// Register (or replace) an entity scoped to an owner (skill).
    pub fn register_entity_scoped(
        &self,
        owner: &str,
        name: &str,
        samples: &[String],
        reload_cache: bool,
    ) -> Result<()> {
        self.add_entity(TemplateKey::scoped(owner, name), samples, reload_cache)
    }

    /// Register an entity from a template file.
    pub fn register_entity_from_file<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
        reload_cache: bool,
    ) -> Result<()> {
        let samples = read_template_file(path)?;
        self.add_entity(TemplateKey::named(name), &samples, reload_cache)
    }

    /// Remove an intent. Removing a never-registered name is a no-op.
    pub fn detach_intent(&self, name: &str) {
        self.remove_intent(&TemplateKey::named(name));
    }

    /// Remove an owner-scoped intent. Idempotent.
    pub fn detach_intent_scoped(&self, owner: &str, name: &str) {
        self.remove_intent(&TemplateKey::scoped(owner, name));
    }

    /// Remove an entity. Removing a never-registered name is a no-op.
    pub fn detach_entity(&self, name: &str) {
        let key = TemplateKey::named(name);
        self.remove_entity(&key);
    }

    /// Remove an owner-scoped entity. Idempotent.
    pub fn detach_entity_scoped(&self, owner: &str, name: &str) {
        self.remove_entity(&TemplateKey::scoped(owner, name));
    }

    /// Train classifiers for every registered intent.
    ///
    /// Returns true when every intent trained (or was restored from
    /// cache), false on timeout or any per-intent failure. Failures are
    /// isolated: the other intents still train, previously trained
    /// classifiers stay usable, and no error is raised.
    pub fn train(&self, options: &TrainOptions) -> bool {
        let mut inner = self.inner.lock();
        let EngineInner {
            store,
            bank,
            cache,
            compiler,
            ..
        } = &mut *inner;
        let report = bank.train(store, compiler, cache, options);
        inner.last_stats = report.stats;
        if report.success {
            inner.state = if inner.store.is_empty() {
                EngineState::Empty
            } else {
                EngineState::Trained
            };
        }
        report.success
    }

    /// Counters from the most recent training pass.
    pub fn last_train_stats(&self) -> TrainStats {
        self.inner.lock().last_stats.clone()
    }

    /// Match an utterance against the registered intents.
    ///
    /// The utterance is trimmed and lowercased before matching. Returns
    /// `None` when no classifier has ever been trained, or when the best
    /// confidence falls below `min_confidence` (defaulting to
    /// [`EngineConfig::min_confidence`]). Never returns an error for an
    /// expected condition.
    pub fn calc_intent(&self, utterance: &str, min_confidence: Option<f64>) -> Option<MatchResult> {
        let normalized = utterance.trim().to_lowercase();
        let tokens = match self.tokenizer.tokenize(&normalized) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "failed to tokenize utterance");
                return None;
            }
        };
        let threshold = min_confidence.unwrap_or(self.config.min_confidence);

        let inner = self.inner.lock();
        if inner.bank.is_empty() {
            // Nothing has ever been trained: no-match, never an error.
            return None;
        }

        let scores = inner.bank.score_all(&inner.store, &tokens);
        // Strict comparison keeps the earliest-registered of equal
        // scores.
        let (best_key, confidence) = scores.into_iter().fold(
            (None::<TemplateKey>, f64::NEG_INFINITY),
            |(best, best_score), (key, score)| {
                if score > best_score {
                    (Some(key), score)
                } else {
                    (best, best_score)
                }
            },
        );
        let best_key = best_key?;
        if confidence < threshold {
            return None;
        }

        let template = inner.store.intent(&best_key)?;
        let entity_samples: HashMap<String, Vec<String>> = template
            .slot_names()
            .into_iter()
            .filter_map(|name| {
                inner
                    .store
                    .resolve_entity(&best_key.owner, &name)
                    .map(|entity| (name, entity.sample_strings()))
            })
            .collect();
        let alignment = self.extractor.extract(template, &entity_samples, &tokens);

        Some(MatchResult {
            intent: best_key,
            confidence,
            entities: alignment.slots,
            utterance: normalized,
            remainder: alignment.remainder.join(" "),
        })
    }

    /// Keys of the currently registered intents, in registration order.
    pub fn registered_intents(&self) -> Vec<TemplateKey> {
        self.inner.lock().store.intent_keys().to_vec()
    }

    /// Cumulative feature-compiler invocations (diagnostics hook).
    pub fn compile_invocations(&self) -> u64 {
        self.inner.lock().compiler.invocations()
    }

    fn add_intent(&self, key: TemplateKey, samples: &[String], reload_cache: bool) -> Result<()> {
        // Parse and validate before taking the lock: a malformed
        // template never mutates the engine.
        let template =
            IntentTemplate::parse(key.clone(), samples, &*self.tokenizer, self.config.max_expansions)?;
        let mut inner = self.inner.lock();
        if reload_cache {
            inner.cache.invalidate(&key);
        }
        inner.store.add_intent(template);
        inner.state = EngineState::Populated;
        debug!(intent = %key, lang = %self.lang, "registered intent");
        Ok(())
    }

    fn add_entity(&self, key: TemplateKey, samples: &[String], reload_cache: bool) -> Result<()> {
        let template = EntityTemplate::parse(key.clone(), samples, &*self.tokenizer)?;
        let mut inner = self.inner.lock();
        if reload_cache {
            inner.cache.invalidate(&key);
        }
        let entry = EntityCacheEntry {
            key: key.clone(),
            content_hash: content_hash(&template.raw_lines),
            samples: template.samples.clone(),
            stored_at: Utc::now(),
        };
        if let Err(e) = inner.cache.store_entity(&entry) {
            warn!(entity = %key, error = %e, "failed to persist entity cache entry");
        }
        inner.store.add_entity(template);
        inner.state = EngineState::Populated;
        debug!(entity = %key, lang = %self.lang, "registered entity");
        Ok(())
    }

    fn remove_intent(&self, key: &TemplateKey) {
        let mut inner = self.inner.lock();
        let removed = inner.store.remove_intent(key);
        inner.bank.remove(key);
        inner.cache.invalidate(key);
        if removed {
            debug!(intent = %key, lang = %self.lang, "detached intent");
            inner.state = if inner.store.is_empty() {
                EngineState::Empty
            } else {
                EngineState::Populated
            };
        }
    }

    fn remove_entity(&self, key: &TemplateKey) {
        let mut inner = self.inner.lock();
        let removed = inner.store.remove_entity(key);
        inner.cache.invalidate(key);
        if removed {
            debug!(entity = %key, lang = %self.lang, "detached entity");
            if inner.state == EngineState::Trained {
                inner.state = EngineState::Populated;
            }
        }
    }
}

/// Where the cache directory for a language lives under a root.
pub(crate) fn language_cache_dir(root: &Path, lang: &str) -> PathBuf {
    let sanitized: String = lang
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    root.join(sanitized)
}
