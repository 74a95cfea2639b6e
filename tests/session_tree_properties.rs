//! Properties of the session tree: append-only history, path determinism,
//! JSONL round-tripping, and branch/fork semantics.

use agent_runtime::Session;
use serde_json::Map;

fn new_session() -> (Session, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (Session::new(Some("test".to_string()), dir.path().to_path_buf(), false), dir)
}

#[test]
fn entries_already_present_survive_further_appends() {
    let (mut session, _dir) = new_session();
    session.add_message("user", "hi", None, Map::new()).unwrap();
    let after_first = session.current_conversation();

    session.add_message("assistant", "hello", None, Map::new()).unwrap();
    let after_second = session.current_conversation();

    assert_eq!(after_second[0].id, after_first[0].id);
    assert_eq!(after_second[0].content, after_first[0].content);
}

#[test]
fn path_to_is_deterministic_across_repeated_calls() {
    let (mut session, _dir) = new_session();
    session.add_message("user", "hi", None, Map::new()).unwrap();
    session.add_message("assistant", "hello", None, Map::new()).unwrap();
    let current = session.tree.current_id().unwrap().to_string();

    let first = session.tree.path_to(&current);
    let second = session.tree.path_to(&current);
    let ids_a: Vec<&str> = first.iter().map(|e| e.id.as_str()).collect();
    let ids_b: Vec<&str> = second.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids_a, ids_b);
}

#[test]
fn jsonl_round_trip_preserves_entries_and_restores_latest_current() {
    let (mut session, _dir) = new_session();
    session.add_message("system", "be concise", None, Map::new()).unwrap();
    session.add_message("user", "hi", None, Map::new()).unwrap();
    session.add_message("assistant", "hello", None, Map::new()).unwrap();

    let path = session.save(None).unwrap();
    let restored = Session::load(&path).unwrap();

    let mut original_ids: Vec<String> = session.tree.current_path().iter().map(|e| e.id.clone()).collect();
    let mut restored_ids: Vec<String> = restored.tree.current_path().iter().map(|e| e.id.clone()).collect();
    original_ids.sort();
    restored_ids.sort();
    assert_eq!(original_ids, restored_ids);

    assert_eq!(restored.tree.current_id(), session.tree.current_id());
}

/// Scenario 6: Branch and fork.
#[test]
fn switch_to_and_fork_produce_the_expected_linear_path() {
    let (mut session, _dir) = new_session();
    let r = session.add_message("system", "r", None, Map::new()).unwrap();
    let u1 = session.add_message("user", "u1", None, Map::new()).unwrap();
    session.add_message("assistant", "a1", None, Map::new()).unwrap();
    session.add_message("user", "u2", None, Map::new()).unwrap();
    session.add_message("assistant", "a2", None, Map::new()).unwrap();

    session.branch_to(&u1.id).unwrap();
    let u3 = session.add_message("user", "u3", None, Map::new()).unwrap();

    let path = session.current_conversation();
    let contents: Vec<&str> = path.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["r", "u1", "u3"]);

    let forked = session.fork(&u3.id, None).unwrap();
    let forked_contents: Vec<&str> = forked.current_conversation().iter().map(|e| e.content.as_str()).collect();
    assert_eq!(forked_contents, vec!["r", "u1", "u3"]);
    assert_eq!(forked.tree.len(), 3);

    // ids are fresh, not copied from the source tree
    assert_ne!(forked.current_conversation()[0].id, r.id);
}
