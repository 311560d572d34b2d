//! The on-disk training cache.
//!
//! Compiled features and trained weights are persisted per intent, keyed
//! by the template name plus a content hash of its raw definition. A
//! fresh engine pointed at the same directory can skip retraining every
//! intent whose definition is unchanged. Corrupt or unreadable entries
//! are cache misses, never fatal errors, and deleting the directory only
//! degrades the engine to untrained.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::ClassifierWeights;
use crate::error::{ParlanceError, Result};
use crate::features::CompiledFeatures;
use crate::template::TemplateKey;

const INTENT_EXT: &str = "intent";
const ENTITY_EXT: &str = "entity";

/// A persisted intent training result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key of the cached intent.
    pub key: TemplateKey,
    /// Content hash of the raw definition at training time.
    pub content_hash: u32,
    /// Compiled features.
    pub features: CompiledFeatures,
    /// Trained classifier weights.
    pub weights: ClassifierWeights,
    /// When training completed.
    pub trained_at: DateTime<Utc>,
}

/// A persisted entity definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCacheEntry {
    /// Key of the cached entity.
    pub key: TemplateKey,
    /// Content hash of the raw definition.
    pub content_hash: u32,
    /// Tokenized sample values.
    pub samples: Vec<Vec<String>>,
    /// When the entry was stored.
    pub stored_at: DateTime<Utc>,
}

/// File-backed cache of training results for one language scope.
#[derive(Debug)]
pub struct TrainingCache {
    directory: PathBuf,
}

impl TrainingCache {
    /// Open (creating if necessary) a cache rooted at `directory`.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.exists() {
            fs::create_dir_all(&directory)
                .map_err(|e| ParlanceError::cache(format!("failed to create directory: {e}")))?;
        }
        if !directory.is_dir() {
            return Err(ParlanceError::cache(format!(
                "path is not a directory: {}",
                directory.display()
            )));
        }
        Ok(TrainingCache { directory })
    }

    /// The cache's root directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Whether no entry matches `key` at `content_hash`.
    pub fn is_stale(&self, key: &TemplateKey, content_hash: u32) -> bool {
        !self.entry_path(key, content_hash, INTENT_EXT).exists()
    }

    /// Persist an intent training result.
    ///
    /// The entry is written to a temporary file and renamed into place,
    /// so concurrent readers never observe a half-written entry.
    pub fn store(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(&entry.key, entry.content_hash, INTENT_EXT);
        self.write_entry(&path, entry)?;
        debug!(intent = %entry.key, hash = entry.content_hash, "stored cache entry");
        Ok(())
    }

    /// Load the intent entry for `key` at `content_hash`, if present and
    /// readable. Corruption of any kind is a miss.
    pub fn load(&self, key: &TemplateKey, content_hash: u32) -> Option<CacheEntry> {
        let path = self.entry_path(key, content_hash, INTENT_EXT);
        let entry: CacheEntry = self.read_entry(&path)?;
        if entry.key != *key || entry.content_hash != content_hash {
            warn!(path = %path.display(), "cache entry does not match its address, ignoring");
            return None;
        }
        Some(entry)
    }

    /// Persist an entity definition.
    pub fn store_entity(&self, entry: &EntityCacheEntry) -> Result<()> {
        let path = self.entry_path(&entry.key, entry.content_hash, ENTITY_EXT);
        self.write_entry(&path, entry)
    }

    /// Load the entity entry for `key` at `content_hash`, if present and
    /// readable.
    pub fn load_entity(&self, key: &TemplateKey, content_hash: u32) -> Option<EntityCacheEntry> {
        let path = self.entry_path(key, content_hash, ENTITY_EXT);
        let entry: EntityCacheEntry = self.read_entry(&path)?;
        if entry.key != *key || entry.content_hash != content_hash {
            return None;
        }
        Some(entry)
    }

    /// Remove every entry for `key`, at any content hash. Idempotent.
    pub fn invalidate(&self, key: &TemplateKey) {
        let prefix = Self::file_stem_prefix(key);
        let Ok(dir) = fs::read_dir(&self.directory) else {
            return;
        };
        for dir_entry in dir.flatten() {
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if Self::addresses_key(name, &prefix) && fs::remove_file(dir_entry.path()).is_ok() {
                debug!(template = %key, file = name, "invalidated cache entry");
            }
        }
    }

    fn write_entry<T: Serialize>(&self, path: &Path, entry: &T) -> Result<()> {
        let bytes = bincode::serialize(entry)
            .map_err(|e| ParlanceError::cache(format!("failed to encode entry: {e}")))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_entry<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Option<T> {
        if !path.exists() {
            return None;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry, treating as miss");
                return None;
            }
        };
        match bincode::deserialize(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    fn entry_path(&self, key: &TemplateKey, content_hash: u32, ext: &str) -> PathBuf {
        self.directory.join(format!(
            "{}-{content_hash:08x}.{ext}",
            Self::file_stem_prefix(key)
        ))
    }

    /// Sanitized file-name prefix for a key. The content hash suffix
    /// keeps sanitized collisions from sharing an address.
    fn file_stem_prefix(key: &TemplateKey) -> String {
        let sanitize = |s: &str| -> String {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect()
        };
        match &key.owner {
            Some(owner) => format!("{}__{}", sanitize(owner), sanitize(&key.name)),
            None => sanitize(&key.name),
        }
    }

    /// Whether a cache file name addresses the given key prefix
    /// (`<prefix>-<8 hex digits>.<ext>`).
    fn addresses_key(file_name: &str, prefix: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(prefix) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix('-') else {
            return false;
        };
        let Some((hash, ext)) = rest.split_once('.') else {
            return false;
        };
        hash.len() == 8
            && hash.chars().all(|c| c.is_ascii_hexdigit())
            && (ext == INTENT_EXT || ext == ENTITY_EXT)
    }
}
