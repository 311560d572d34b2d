//! Per-language engine registry.
//!
//! Each language gets its own isolated [`IntentEngine`] with its own
//! cache subdirectory and its own lock, so operations on different
//! languages never block each other. Engines are constructed lazily on
//! first use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::engine::{EngineConfig, IntentEngine, language_cache_dir};
use crate::error::Result;

/// Lazily-populated map from language tag to engine.
#[derive(Debug)]
pub struct EngineRegistry {
    root_dir: PathBuf,
    config: EngineConfig,
    engines: RwLock<HashMap<String, Arc<IntentEngine>>>,
}

impl EngineRegistry {
    /// Create a registry rooted at `root_dir`. Each language's cache
    /// lives in a subdirectory of it.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self::with_config(root_dir, EngineConfig::default())
    }

    /// Create a registry whose engines share an explicit configuration.
    pub fn with_config<P: AsRef<Path>>(root_dir: P, config: EngineConfig) -> Self {
        EngineRegistry {
            root_dir: root_dir.as_ref().to_path_buf(),
            config,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Get the engine for `lang`, constructing it on first use.
    pub fn engine(&self, lang: &str) -> Result<Arc<IntentEngine>> {
        if let Some(engine) = self.engines.read().get(lang) {
            return Ok(Arc::clone(engine));
        }

        let mut engines = self.engines.write();
        // Another caller may have raced us between the locks.
        if let Some(engine) = engines.get(lang) {
            return Ok(Arc::clone(engine));
        }
        let cache_dir = language_cache_dir(&self.root_dir, lang);
        let engine = Arc::new(IntentEngine::with_config(
            cache_dir,
            lang,
            self.config.clone(),
        )?);
        debug!(lang, "created language engine");
        engines.insert(lang.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Language tags with a constructed engine.
    pub fn languages(&self) -> Vec<String> {
        self.engines.read().keys().cloned().collect()
    }

    /// Drop the engine for `lang`. Its on-disk cache stays; a later
    /// [`EngineRegistry::engine`] call reconstructs against it. Returns
    /// whether an engine existed.
    pub fn remove(&self, lang: &str) -> bool {
        self.engines.write().remove(lang).is_some()
    }
}
