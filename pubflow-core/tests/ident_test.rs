use std::collections::HashSet;

use pubflow_core::ident::{canary_version, random_id, short_sha};

#[test]
fn test_ids_are_adjective_noun_pairs() {
    let id = random_id(&HashSet::new()).unwrap();
    let parts: Vec<&str> = id.split('-').collect();
    assert_eq!(parts.len(), 2);
    assert!(parts.iter().all(|p| !p.is_empty()));
}

#[test]
fn test_avoids_existing_ids() {
    let mut existing = HashSet::new();
    for _ in 0..500 {
        let id = random_id(&existing).unwrap();
        assert!(!existing.contains(&id));
        existing.insert(id);
    }
}

#[test]
fn test_short_sha_tolerates_short_input() {
    assert_eq!(short_sha("0123456789abcdef"), "0123456");
    assert_eq!(short_sha("abc"), "abc");
}

#[test]
fn test_canary_versions_differ_per_sequence() {
    let sha = "f00dfeed00000000";
    assert_eq!(canary_version(sha, 0), "0.0.0-canary.f00dfee.0");
    assert_ne!(canary_version(sha, 0), canary_version(sha, 1));
}
