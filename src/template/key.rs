//! Composite template keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies an intent or entity template within one language scope.
///
/// Independently-developed template sets (skills) may register intents
/// under the same short name, so the key carries an optional owner
/// identifier next to the name instead of munging both into one string.
/// Equality and hashing are field-wise; the `name:owner` display form is
/// for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateKey {
    /// Identifier of the registering owner (skill), if any.
    pub owner: Option<String>,
    /// Template name, unique within the owner's scope.
    pub name: String,
}

impl TemplateKey {
    /// Create a key without an owner scope.
    pub fn named<S: Into<String>>(name: S) -> Self {
        TemplateKey {
            owner: None,
            name: name.into(),
        }
    }

    /// Create a key scoped to an owner.
    pub fn scoped<O: Into<String>, S: Into<String>>(owner: O, name: S) -> Self {
        TemplateKey {
            owner: Some(owner.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}:{}", self.name, owner),
            None => write!(f, "{}", self.name),
        }
    }
}
