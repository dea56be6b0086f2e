use pubflow_core::change::diff_snapshots;
use pubflow_core::snapshot::{PackageSnapshot, PackageStatus};

fn snapshot(entries: &[(&str, &str, &[&str])]) -> PackageSnapshot {
    entries
        .iter()
        .map(|(name, shasum, deps)| {
            (
                name.to_string(),
                PackageStatus {
                    shasum: shasum.to_string(),
                    local_dependencies: deps.iter().map(|d| d.to_string()).collect(),
                },
            )
        })
        .collect()
}

#[test]
fn test_identical_snapshots_need_nothing() {
    let head = snapshot(&[("pkg-a", "h0", &[]), ("pkg-b", "h1", &["pkg-a"])]);
    let diff = diff_snapshots(&head, &head.clone());

    assert!(diff.modified.is_empty());
    assert!(diff.needs_publishing.is_empty());
    assert!(diff.added.is_empty());
    assert!(diff.removed.is_empty());
}

#[test]
fn test_dependent_changed_alone() {
    let head = snapshot(&[("pkg-a", "h1", &[]), ("pkg-b", "h2", &["pkg-a"])]);
    let base = snapshot(&[("pkg-a", "h1", &[]), ("pkg-b", "h0", &["pkg-a"])]);
    let diff = diff_snapshots(&head, &base);

    assert_eq!(diff.modified.len(), 1);
    assert!(diff.modified.contains("pkg-b"));
    assert_eq!(diff.needs_publishing.len(), 1);
    assert!(diff.needs_publishing.contains("pkg-b"));
}

#[test]
fn test_dependency_change_propagates() {
    let head = snapshot(&[
        ("pkg-a", "h1", &[]),
        ("pkg-b", "h2", &["pkg-a"]),
        ("pkg-c", "h3", &["pkg-b"]),
    ]);
    let base = snapshot(&[
        ("pkg-a", "h0", &[]),
        ("pkg-b", "h2", &["pkg-a"]),
        ("pkg-c", "h3", &["pkg-b"]),
    ]);
    let diff = diff_snapshots(&head, &base);

    assert_eq!(diff.modified.len(), 1);
    assert!(diff.modified.contains("pkg-a"));
    assert_eq!(diff.needs_publishing.len(), 3);
}

#[test]
fn test_sibling_unaffected() {
    let head = snapshot(&[
        ("pkg-a", "h1", &[]),
        ("pkg-b", "h2", &["pkg-a"]),
        ("pkg-x", "h9", &[]),
    ]);
    let base = snapshot(&[
        ("pkg-a", "h0", &[]),
        ("pkg-b", "h2", &["pkg-a"]),
        ("pkg-x", "h9", &[]),
    ]);
    let diff = diff_snapshots(&head, &base);

    assert!(!diff.needs_publishing.contains("pkg-x"));
    assert!(diff.needs_publishing.contains("pkg-a"));
    assert!(diff.needs_publishing.contains("pkg-b"));
}

#[test]
fn test_cycle_publishes_together() {
    let head = snapshot(&[
        ("pkg-a", "h1", &["pkg-b"]),
        ("pkg-b", "h2", &["pkg-a"]),
    ]);
    let base = snapshot(&[
        ("pkg-a", "h0", &["pkg-b"]),
        ("pkg-b", "h2", &["pkg-a"]),
    ]);
    let diff = diff_snapshots(&head, &base);

    assert_eq!(diff.modified.len(), 1);
    assert_eq!(diff.needs_publishing.len(), 2);
}

#[test]
fn test_added_package_is_modified() {
    let head = snapshot(&[("pkg-a", "h0", &[]), ("pkg-new", "h1", &[])]);
    let base = snapshot(&[("pkg-a", "h0", &[])]);
    let diff = diff_snapshots(&head, &base);

    assert!(diff.modified.contains("pkg-new"));
    assert!(diff.needs_publishing.contains("pkg-new"));
    assert_eq!(diff.added.len(), 1);
    assert!(diff.added.contains("pkg-new"));
}

#[test]
fn test_removed_package_never_republishes() {
    let head = snapshot(&[("pkg-a", "h0", &[])]);
    let base = snapshot(&[("pkg-a", "h0", &[]), ("pkg-old", "h1", &[])]);
    let diff = diff_snapshots(&head, &base);

    assert!(diff.needs_publishing.is_empty());
    assert_eq!(diff.removed.len(), 1);
    assert!(diff.removed.contains("pkg-old"));
}

#[test]
fn test_empty_base_publishes_everything() {
    let head = snapshot(&[("pkg-a", "h0", &[]), ("pkg-b", "h1", &["pkg-a"])]);
    let diff = diff_snapshots(&head, &PackageSnapshot::new());

    assert_eq!(diff.needs_publishing.len(), 2);
    assert_eq!(diff.added.len(), 2);
}
