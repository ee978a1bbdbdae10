//! Conversation history integration tests
//!
//! Exercises the history store and context builder together, the way the
//! relay drives them.

use courier_gateway::{BackendRole, ContextBuilder, HistoryRepo, SEED_TEXT, StoredRole, db};

mod common;
use common::{setup_history, setup_test_db};

#[test]
fn window_returns_most_recent_turns_chronologically() {
    let history = setup_history();

    for i in 0..8 {
        let role = if i % 2 == 0 {
            StoredRole::User
        } else {
            StoredRole::Assistant
        };
        history.append(1, role, &format!("turn {i}")).unwrap();
    }

    let window = history.recent_window(1, 3).unwrap();
    assert_eq!(window.len(), 3);
    assert_eq!(window[0].content, "turn 5");
    assert_eq!(window[1].content, "turn 6");
    assert_eq!(window[2].content, "turn 7");
    assert!(window.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[test]
fn window_never_crosses_users() {
    let history = setup_history();

    history.append(1, StoredRole::User, "one's message").unwrap();
    history.append(2, StoredRole::User, "two's message").unwrap();
    history.append(1, StoredRole::Assistant, "one's reply").unwrap();

    let window = history.recent_window(2, 10).unwrap();
    assert_eq!(window.len(), 1);
    assert!(window.iter().all(|t| t.user_id == 2));
}

#[test]
fn fresh_conversation_gets_exactly_one_seed_turn() {
    let history = setup_history();
    let builder = ContextBuilder::new(history, 10);

    let context = builder.build_context(99).unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].role, BackendRole::Model);
    assert_eq!(context[0].text, SEED_TEXT);
}

#[test]
fn round_trip_matches_expected_shape() {
    let history = setup_history();
    let builder = ContextBuilder::new(history.clone(), 10);

    history.append(7, StoredRole::User, "hi").unwrap();
    history.append(7, StoredRole::Assistant, "hello").unwrap();

    let window = history.recent_window(7, 10).unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].role, StoredRole::User);
    assert_eq!(window[0].content, "hi");
    assert_eq!(window[1].role, StoredRole::Assistant);
    assert_eq!(window[1].content, "hello");

    let context = builder.build_context(7).unwrap();
    assert_eq!(context[0].role, BackendRole::User);
    assert_eq!(context[0].text, "hi");
    assert_eq!(context[1].role, BackendRole::Model);
    assert_eq!(context[1].text, "hello");
}

#[test]
fn context_follows_window_order() {
    let history = setup_history();
    let builder = ContextBuilder::new(history.clone(), 5);

    for i in 0..9 {
        history.append(3, StoredRole::User, &format!("m{i}")).unwrap();
    }

    let window = history.recent_window(3, 5).unwrap();
    let context = builder.build_context(3).unwrap();

    assert_eq!(window.len(), context.len());
    for (turn, ctx) in window.iter().zip(context.iter()) {
        assert_eq!(turn.content, ctx.text);
    }
}

#[test]
fn zero_limit_window_is_empty_but_context_is_seeded() {
    let history = setup_history();
    let builder = ContextBuilder::new(history.clone(), 0);

    history.append(1, StoredRole::User, "hi").unwrap();

    assert!(history.recent_window(1, 0).unwrap().is_empty());

    // A zero-width window still produces a well-formed context
    let context = builder.build_context(1).unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].text, SEED_TEXT);
}

#[test]
fn limit_beyond_history_returns_everything() {
    let history = setup_history();

    history
        .append_exchange(4, &[(StoredRole::User, "q"), (StoredRole::Assistant, "a")])
        .unwrap();

    let window = history.recent_window(4, 1000).unwrap();
    assert_eq!(window.len(), 2);
}

#[test]
fn concurrent_exchanges_for_one_user_never_interleave() {
    // File-backed store: one pool shared across writer threads
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init(dir.path().join("history.db")).unwrap();
    let history = HistoryRepo::new(pool);

    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = history.clone();
        handles.push(std::thread::spawn(move || {
            repo.append_exchange(
                1,
                &[
                    (StoredRole::User, format!("question {i}").as_str()),
                    (StoredRole::Assistant, format!("answer {i}").as_str()),
                ],
            )
            .unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let window = history.recent_window(1, 100).unwrap();
    assert_eq!(window.len(), 16);

    // Every user turn must be immediately followed by its own reply
    for pair in window.chunks(2) {
        assert_eq!(pair[0].role, StoredRole::User);
        assert_eq!(pair[1].role, StoredRole::Assistant);
        let question = pair[0].content.strip_prefix("question ").unwrap();
        let answer = pair[1].content.strip_prefix("answer ").unwrap();
        assert_eq!(question, answer);
    }
}

#[test]
fn history_survives_pool_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");

    {
        let repo = HistoryRepo::new(db::init(&path).unwrap());
        repo.append(5, StoredRole::User, "durable?").unwrap();
        repo.append(5, StoredRole::Assistant, "durable.").unwrap();
    }

    let repo = HistoryRepo::new(db::init(&path).unwrap());
    let window = repo.recent_window(5, 10).unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[1].content, "durable.");
}

#[test]
fn turns_are_immutable_by_construction() {
    // The repo exposes no update or delete; the only mutation is append.
    // Re-reading after more appends must leave earlier turns untouched.
    let pool = setup_test_db();
    let history = HistoryRepo::new(pool);

    let first = history.append(6, StoredRole::User, "original").unwrap();
    history.append(6, StoredRole::Assistant, "later").unwrap();

    let window = history.recent_window(6, 10).unwrap();
    assert_eq!(window[0].seq, first.seq);
    assert_eq!(window[0].content, "original");
}
