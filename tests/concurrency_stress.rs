//! Concurrent registration, training and matching on one engine.

use std::sync::Arc;
use std::thread;

use parlance::engine::{IntentEngine, TrainOptions};
use parlance::template::TemplateKey;

fn samples(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_concurrent_register_train_and_query() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(IntentEngine::new(dir.path(), "en").unwrap());

    // Seed one stable intent so queries can hit something real.
    engine
        .register_intent("greet", &samples(&["hello", "hi there"]), true)
        .unwrap();
    assert!(engine.train(&TrainOptions::default()));

    const WRITERS: usize = 4;
    const READERS: usize = 8;
    const ROUNDS: usize = 10;

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let name = format!("intent-{writer}-{round}");
                    engine
                        .register_intent(
                            &name,
                            &samples(&["totally unique sample", "another unique sample"]),
                            true,
                        )
                        .unwrap();
                    engine.train(&TrainOptions {
                        single_thread: round % 2 == 0,
                        ..TrainOptions::default()
                    });
                    engine.detach_intent(&name);
                }
            });
        }
        for _ in 0..READERS {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for _ in 0..ROUNDS * 4 {
                    if let Some(result) = engine.calc_intent("hi there", None) {
                        // Every result references an intent that was
                        // registered at the moment of the query.
                        assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
                        assert!(!result.intent.name.is_empty());
                    }
                }
            });
        }
    });

    // All transients detached; the stable intent still matches after a
    // final pass.
    assert!(engine.train(&TrainOptions::default()));
    let result = engine.calc_intent("hi there", None).unwrap();
    assert_eq!(result.intent, TemplateKey::named("greet"));
}

#[test]
fn test_queries_never_see_detached_intents() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(IntentEngine::new(dir.path(), "en").unwrap());

    engine
        .register_intent("stable", &samples(&["play some music"]), true)
        .unwrap();
    assert!(engine.train(&TrainOptions::default()));

    thread::scope(|scope| {
        {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for _ in 0..20 {
                    engine
                        .register_intent("flapping", &samples(&["open the garage door"]), true)
                        .unwrap();
                    engine.train(&TrainOptions::default());
                    engine.detach_intent("flapping");
                    // Detachment drops the classifier immediately: a
                    // query between here and the next registration must
                    // not return "flapping".
                }
            });
        }
        {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                for _ in 0..200 {
                    // The engine lock serializes queries against
                    // detachment, so every returned match referenced an
                    // intent registered at scoring time. Here it is
                    // either "flapping" (registered at that instant) or
                    // nothing at all.
                    if let Some(result) = engine.calc_intent("open the garage door", None) {
                        assert_eq!(result.intent, TemplateKey::named("flapping"));
                    }
                }
            });
        }
    });

    engine.detach_intent("flapping");
    assert!(engine.train(&TrainOptions::default()));
    assert!(engine.calc_intent("open the garage door", None).is_none());
}
