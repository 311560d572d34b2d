//! # Parlance
//!
//! A trainable intent-matching engine for voice assistants.
//!
//! Callers register named intents (example utterance templates, possibly
//! containing `{entity}` slots and `*` wildcards) and named entities
//! (example slot values), train one classifier per intent, and then submit
//! utterances for matching. The best-scoring intent above a confidence
//! threshold is returned together with the slot values extracted from the
//! utterance.
//!
//! ## Features
//!
//! - Pure Rust implementation
//! - Incremental training with an on-disk cache keyed by template content
//! - Pluggable classifier strategy (logistic regression by default)
//! - Slot extraction guided by entity samples
//! - One isolated engine per language
//!
//! ## Example
//!
//! ```no_run
//! use parlance::engine::{IntentEngine, TrainOptions};
//!
//! let engine = IntentEngine::new("/tmp/parlance-cache", "en").unwrap();
//! engine
//!     .register_intent("hello", &["hello".into(), "hi there".into()], true)
//!     .unwrap();
//! assert!(engine.train(&TrainOptions::default()));
//!
//! if let Some(m) = engine.calc_intent("hi there", None) {
//!     println!("{} ({:.2})", m.intent, m.confidence);
//! }
//! ```

pub mod analysis;
pub mod cache;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod extract;
pub mod features;
pub mod registry;
pub mod template;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
