//! The template store.
//!
//! Holds the registered intent and entity definitions for one language
//! scope. Parsing and validation happen before any mutation, so a
//! malformed registration leaves the store untouched.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;
use crate::error::{ParlanceError, Result};
use crate::template::key::TemplateKey;
use crate::template::parse::{TemplateToken, expand_line, tokenize_line};

/// A registered intent: its raw sample lines and their expanded,
/// tokenized forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentTemplate {
    /// Composite key of this intent.
    pub key: TemplateKey,
    /// Raw sample lines as registered (content-hash input).
    pub raw_lines: Vec<String>,
    /// Expanded, tokenized sample lines.
    pub lines: Vec<Vec<TemplateToken>>,
}

impl IntentTemplate {
    /// Parse and validate an intent definition.
    pub fn parse(
        key: TemplateKey,
        samples: &[String],
        tokenizer: &dyn Tokenizer,
        max_expansions: usize,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(ParlanceError::malformed(format!(
                "intent '{key}' has no sample lines"
            )));
        }
        let mut lines = Vec::new();
        for raw in samples {
            for expanded in expand_line(raw, max_expansions)? {
                let tokens = tokenize_line(&expanded, tokenizer)?;
                if !tokens.is_empty() {
                    lines.push(tokens);
                }
            }
        }
        if lines.is_empty() {
            return Err(ParlanceError::malformed(format!(
                "intent '{key}' expands to no usable lines"
            )));
        }
        Ok(IntentTemplate {
            key,
            raw_lines: samples.to_vec(),
            lines,
        })
    }

    /// Names of the entity slots referenced by any line.
    pub fn slot_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for line in &self.lines {
            for token in line {
                if let TemplateToken::Entity(name) = token
                    && !names.contains(name)
                {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Whether any line contains a wildcard or an entity slot.
    pub fn has_slots(&self) -> bool {
        self.lines.iter().any(|line| {
            line.iter()
                .any(|t| matches!(t, TemplateToken::Entity(_) | TemplateToken::Wildcard))
        })
    }
}

/// A registered entity: its raw sample values and their tokenized forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    /// Composite key of this entity.
    pub key: TemplateKey,
    /// Raw sample values as registered (content-hash input).
    pub raw_lines: Vec<String>,
    /// Tokenized sample values, lowercased.
    pub samples: Vec<Vec<String>>,
}

impl EntityTemplate {
    /// Parse and validate an entity definition.
    pub fn parse(key: TemplateKey, samples: &[String], tokenizer: &dyn Tokenizer) -> Result<Self> {
        if samples.is_empty() {
            return Err(ParlanceError::malformed(format!(
                "entity '{key}' has no sample values"
            )));
        }
        let mut tokenized = Vec::new();
        for raw in samples {
            let words: Vec<String> = tokenizer
                .tokenize(raw)?
                .into_iter()
                .map(|t| t.text)
                .collect();
            if !words.is_empty() {
                tokenized.push(words);
            }
        }
        if tokenized.is_empty() {
            return Err(ParlanceError::malformed(format!(
                "entity '{key}' has only empty sample values"
            )));
        }
        Ok(EntityTemplate {
            key,
            raw_lines: samples.to_vec(),
            samples: tokenized,
        })
    }

    /// Sample values as joined lowercase strings, for similarity scoring.
    pub fn sample_strings(&self) -> Vec<String> {
        self.samples.iter().map(|words| words.join(" ")).collect()
    }
}

/// Read a template definition file: one sample per line, blank lines and
/// `#` comment lines skipped.
pub fn read_template_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())?;
    let samples = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();
    Ok(samples)
}

/// Holds the intent and entity definitions for one language scope.
///
/// Intents keep their registration order; the order is the documented
/// tie-break when two intents score equally.
#[derive(Debug, Default)]
pub struct TemplateStore {
    intents: HashMap<TemplateKey, IntentTemplate>,
    intent_order: Vec<TemplateKey>,
    entities: HashMap<TemplateKey, EntityTemplate>,
}

impl TemplateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        TemplateStore::default()
    }

    /// Insert or replace an intent definition.
    pub fn add_intent(&mut self, template: IntentTemplate) {
        let key = template.key.clone();
        if self.intents.insert(key.clone(), template).is_none() {
            self.intent_order.push(key);
        }
    }

    /// Insert or replace an entity definition.
    pub fn add_entity(&mut self, template: EntityTemplate) {
        self.entities.insert(template.key.clone(), template);
    }

    /// Remove an intent. Removing an absent key is a no-op.
    pub fn remove_intent(&mut self, key: &TemplateKey) -> bool {
        let removed = self.intents.remove(key).is_some();
        if removed {
            self.intent_order.retain(|k| k != key);
        }
        removed
    }

    /// Remove an entity. Removing an absent key is a no-op.
    pub fn remove_entity(&mut self, key: &TemplateKey) -> bool {
        self.entities.remove(key).is_some()
    }

    /// Look up an intent.
    pub fn intent(&self, key: &TemplateKey) -> Option<&IntentTemplate> {
        self.intents.get(key)
    }

    /// Look up an entity.
    pub fn entity(&self, key: &TemplateKey) -> Option<&EntityTemplate> {
        self.entities.get(key)
    }

    /// Resolve an entity reference from an intent.
    ///
    /// An entity registered by the same owner shadows a globally-named
    /// one; failing both, any owner's entity with the name matches.
    pub fn resolve_entity(&self, owner: &Option<String>, name: &str) -> Option<&EntityTemplate> {
        if owner.is_some() {
            let scoped = TemplateKey {
                owner: owner.clone(),
                name: name.to_string(),
            };
            if let Some(entity) = self.entities.get(&scoped) {
                return Some(entity);
            }
        }
        if let Some(entity) = self.entities.get(&TemplateKey::named(name)) {
            return Some(entity);
        }
        self.entities.values().find(|e| e.key.name == name)
    }

    /// Intents in registration order.
    pub fn intents_in_order(&self) -> impl Iterator<Item = &IntentTemplate> {
        self.intent_order
            .iter()
            .filter_map(|key| self.intents.get(key))
    }

    /// Registered intent keys in registration order.
    pub fn intent_keys(&self) -> &[TemplateKey] {
        &self.intent_order
    }

    /// Number of registered intents.
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// Whether the store holds no templates at all.
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::WordTokenizer;

    fn intent(name: &str, samples: &[&str]) -> IntentTemplate {
        IntentTemplate::parse(
            TemplateKey::named(name),
            &samples.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &WordTokenizer::new(),
            1000,
        )
        .unwrap()
    }

    #[test]
    fn test_add_and_overwrite_keeps_order() {
        let mut store = TemplateStore::new();
        store.add_intent(intent("a", &["alpha"]));
        store.add_intent(intent("b", &["beta"]));
        store.add_intent(intent("a", &["alpha two"]));

        let keys: Vec<String> = store.intent_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(
            store.intent(&TemplateKey::named("a")).unwrap().raw_lines,
            vec!["alpha two".to_string()]
        );
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = TemplateStore::new();
        assert!(!store.remove_intent(&TemplateKey::named("ghost")));
        assert!(!store.remove_entity(&TemplateKey::named("ghost")));
    }

    #[test]
    fn test_empty_definitions_rejected() {
        let tokenizer = WordTokenizer::new();
        assert!(IntentTemplate::parse(TemplateKey::named("x"), &[], &tokenizer, 1000).is_err());
        assert!(
            IntentTemplate::parse(
                TemplateKey::named("x"),
                &["...".to_string()],
                &tokenizer,
                1000
            )
            .is_err()
        );
        assert!(EntityTemplate::parse(TemplateKey::named("x"), &[], &tokenizer).is_err());
    }

    #[test]
    fn test_slot_names_deduplicated() {
        let template = intent(
            "book_flight",
            &["book a flight to {destination}", "fly me to {destination}"],
        );
        assert_eq!(template.slot_names(), vec!["destination".to_string()]);
        assert!(template.has_slots());
    }

    #[test]
    fn test_resolve_entity_prefers_owner_scope() {
        let tokenizer = WordTokenizer::new();
        let mut store = TemplateStore::new();
        store.add_entity(
            EntityTemplate::parse(
                TemplateKey::named("city"),
                &["london".to_string()],
                &tokenizer,
            )
            .unwrap(),
        );
        store.add_entity(
            EntityTemplate::parse(
                TemplateKey::scoped("travel", "city"),
                &["paris".to_string()],
                &tokenizer,
            )
            .unwrap(),
        );

        let owner = Some("travel".to_string());
        let scoped = store.resolve_entity(&owner, "city").unwrap();
        assert_eq!(scoped.raw_lines, vec!["paris".to_string()]);

        let global = store.resolve_entity(&None, "city").unwrap();
        assert_eq!(global.raw_lines, vec!["london".to_string()]);
    }
}
