//! Feature compilation.
//!
//! Turns template definitions into the numeric representation the
//! classifiers train on. Compilation is a deterministic pure function of
//! the template content: the same definition always produces
//! byte-identical [`CompiledFeatures`], which is what makes hash-keyed
//! cache reuse sound.

pub mod compiler;
pub mod vocab;

pub use compiler::{CompiledFeatures, FeatureCompiler, content_hash};
pub use vocab::Vocabulary;
