//! End-to-end tests for the context engine

use std::collections::BTreeMap;

use engram::config::EngramConfig;
use engram::engine::{ContextEngine, ContextFilters, Scope};
use engram::error::EngramError;
use serde_json::Value;

fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

#[test]
fn test_write_two_turns_read_back_in_order() {
    let engine = ContextEngine::new();
    engine
        .write_turn("user", "Hello", meta(&[("conv_id", "c1")]))
        .unwrap();
    engine
        .write_turn("assistant", "Hi", meta(&[("conv_id", "c1")]))
        .unwrap();

    let ctx =
        engine.get_context_for_scope(Scope::Task, Some("c1"), None, ContextFilters::default());
    assert_eq!(ctx.len(), 2);
    assert_eq!(ctx[0].content, "Hello");
    assert_eq!(ctx[1].content, "Hi");
}

#[test]
fn test_full_conversation_flow_across_tiers() {
    let config = EngramConfig::from_toml_str(
        "[buffer]\nmax_messages = 3\nmax_tokens = 100\n",
    )
    .unwrap();
    let engine = ContextEngine::from_config(&config).unwrap();

    engine
        .write_turn(
            "user",
            "Hello",
            meta(&[("conv_id", "chat1"), ("user_id", "alice")]),
        )
        .unwrap();
    engine
        .write_turn("assistant", "Hi, how can I help you?", meta(&[("conv_id", "chat1")]))
        .unwrap();
    engine
        .write_turn(
            "user",
            "I need assistance with my account.",
            meta(&[("conv_id", "chat1"), ("user_id", "alice")]),
        )
        .unwrap();
    engine
        .write_turn(
            "assistant",
            "Of course, let me pull up your account.",
            meta(&[("conv_id", "chat1")]),
        )
        .unwrap();

    // The buffer only holds the three most recent turns.
    let recent = engine.get_context_for_scope(Scope::Recent, None, None, ContextFilters::default());
    let recent_contents: Vec<&str> = recent.iter().map(|i| i.content.as_str()).collect();
    assert_eq!(recent.len(), 3);
    assert!(!recent_contents.contains(&"Hello"));
    assert!(recent_contents.contains(&"Of course, let me pull up your account."));

    // The session history still holds everything.
    let full =
        engine.get_context_for_scope(Scope::Task, Some("chat1"), None, ContextFilters::default());
    let full_contents: Vec<&str> = full.iter().map(|i| i.content.as_str()).collect();
    assert!(full_contents.contains(&"Hello"));
    assert_eq!(full.last().unwrap().content, "Of course, let me pull up your account.");

    // The long-term tier keeps the user's latest turn.
    let user_ctx =
        engine.get_context_for_scope(Scope::User, Some("alice"), None, ContextFilters::default());
    assert_eq!(user_ctx.len(), 1);
    assert_eq!(user_ctx[0].content, "I need assistance with my account.");
}

#[test]
fn test_status_annotation_and_filtering() {
    let engine = ContextEngine::new();
    engine
        .write_turn(
            "assistant",
            "I'm sorry, I cannot do that request.",
            meta(&[("conv_id", "chat2")]),
        )
        .unwrap();
    engine
        .write_turn(
            "assistant",
            "Exception: invalid input provided.",
            meta(&[("conv_id", "chat2")]),
        )
        .unwrap();
    engine
        .write_turn(
            "assistant",
            "Here is the information you requested.",
            meta(&[("conv_id", "chat2")]),
        )
        .unwrap();

    let unfiltered =
        engine.get_context_for_scope(Scope::Task, Some("chat2"), None, ContextFilters::default());
    assert_eq!(unfiltered.len(), 3);

    let filtered = engine.get_context_for_scope(
        Scope::Task,
        Some("chat2"),
        None,
        ContextFilters {
            exclude_warn: false,
            exclude_err: true,
        },
    );
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|i| !i.content.contains("Exception")));

    let dump = engine.dump_memory();
    let statuses: Vec<Option<&str>> = dump[0].turns.iter().map(|t| t.status.as_deref()).collect();
    assert_eq!(statuses, vec![Some("WARN"), Some("ERR"), Some("OK")]);
}

#[test]
fn test_lifecycle_promote_via_engine() {
    let engine = ContextEngine::new();
    engine
        .write_turn("user", "promote me", meta(&[("conv_id", "c9")]))
        .unwrap();

    let lifecycle = engine.lifecycle();
    assert!(lifecycle.promote("c9:1"));
    assert!(!lifecycle.promote("c9:999"), "absent key is a no-op");

    use engram::store::TierStore;
    let record = engine.vector_store().get("c9:1").expect("promoted entry");
    assert_eq!(record.payload().content, "promote me");
}

#[test]
fn test_oversize_turn_is_a_typed_error() {
    let config = EngramConfig::from_toml_str("[buffer]\nmax_tokens = 4\n").unwrap();
    let engine = ContextEngine::from_config(&config).unwrap();

    let err = engine
        .write_turn(
            "user",
            "this message has far too many tokens",
            meta(&[("conv_id", "c10")]),
        )
        .unwrap_err();
    assert!(matches!(err, EngramError::Oversize { .. }));

    // A following well-sized turn still works.
    engine
        .write_turn("user", "short one", meta(&[("conv_id", "c10")]))
        .unwrap();
    let ctx =
        engine.get_context_for_scope(Scope::Task, Some("c10"), None, ContextFilters::default());
    assert_eq!(ctx.len(), 1);
}

#[test]
fn test_disabling_session_tier_is_rejected() {
    let config = EngramConfig::from_toml_str("[session]\nenabled = false\n").unwrap();
    let err = ContextEngine::from_config(&config).unwrap_err();
    assert!(matches!(err, EngramError::Config(_)));
}

#[test]
fn test_disabled_buffer_skips_recent_scope() {
    let config = EngramConfig::from_toml_str("[buffer]\nenabled = false\n").unwrap();
    let engine = ContextEngine::from_config(&config).unwrap();
    engine
        .write_turn("user", "hello", meta(&[("conv_id", "c11")]))
        .unwrap();

    let recent = engine.get_context_for_scope(Scope::Recent, None, None, ContextFilters::default());
    assert!(recent.is_empty());
    // Session history is unaffected.
    let task =
        engine.get_context_for_scope(Scope::Task, Some("c11"), None, ContextFilters::default());
    assert_eq!(task.len(), 1);
}

#[test]
fn test_concurrent_writers_lose_no_turns() {
    use std::sync::Arc;

    let engine = Arc::new(ContextEngine::new());
    let mut handles = Vec::new();
    for t in 0..4 {
        let engine = engine.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                engine
                    .write_turn("user", &format!("t{t}-m{i}"), meta(&[("conv_id", "shared")]))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let dump = engine.dump_memory();
    let shared = dump.iter().find(|s| s.session_id == "shared").unwrap();
    assert_eq!(shared.turns.len(), 100);
}
