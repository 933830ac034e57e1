/// End-to-end traversal tests against a real temporary filesystem.
///
/// These exercise `FsLister` together with the full engine — thread
/// spawning, queue arbitration, termination — with zero mocking.
use ffind_core::{
    start_traversal, Discipline, FsLister, NameEquals, TraversalConfig, TraversalError,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// ```text
/// root/
///   target        (match)
///   d1/
///     target      (match)
///   f2
/// ```
fn build_scenario_tree(root: &Path) {
    fs::create_dir_all(root.join("d1")).unwrap();
    fs::write(root.join("target"), b"").unwrap();
    fs::write(root.join("d1").join("target"), b"").unwrap();
    fs::write(root.join("f2"), b"").unwrap();
}

fn find(root: &Path, name: &str, lister: FsLister, config: TraversalConfig) -> Vec<PathBuf> {
    let handle = start_traversal(root.to_path_buf(), lister, NameEquals::new(name), config)
        .expect("traversal should start");
    let mut found: Vec<PathBuf> = handle.iter().collect();
    handle.finish().expect("traversal should succeed");
    found.sort();
    found
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn finds_both_targets_and_closes() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    build_scenario_tree(tmp.path());

    for workers in [1, 4, 16] {
        let found = find(
            tmp.path(),
            "target",
            FsLister::new(),
            TraversalConfig::default().with_concurrency(workers),
        );
        assert_eq!(
            found,
            vec![tmp.path().join("d1").join("target"), tmp.path().join("target")]
        );
    }
}

#[test]
fn directories_named_like_the_target_are_expanded_not_reported() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let dir = tmp.path().join("target");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("target"), b"").unwrap();

    let found = find(tmp.path(), "target", FsLister::new(), TraversalConfig::default());
    assert_eq!(found, vec![dir.join("target")]);
}

#[test]
fn hidden_directories_skipped_unless_requested() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let hidden = tmp.path().join(".git").join("objects");
    fs::create_dir_all(&hidden).unwrap();
    fs::write(hidden.join("needle"), b"").unwrap();
    fs::write(tmp.path().join("needle"), b"").unwrap();

    let default = find(tmp.path(), "needle", FsLister::new(), TraversalConfig::default());
    assert_eq!(default, vec![tmp.path().join("needle")]);

    let all = find(
        tmp.path(),
        "needle",
        FsLister::new().include_hidden(true),
        TraversalConfig::default(),
    );
    assert_eq!(all, vec![hidden.join("needle"), tmp.path().join("needle")]);
}

#[test]
fn deep_tree_with_both_disciplines() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let mut expected = Vec::new();
    let mut dir = tmp.path().to_path_buf();
    for depth in 0..40 {
        dir = dir.join(format!("level{depth}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Cargo.toml"), b"").unwrap();
        fs::write(dir.join("other.rs"), b"").unwrap();
        expected.push(dir.join("Cargo.toml"));
    }
    expected.sort();

    for discipline in [Discipline::Fifo, Discipline::Lifo] {
        let found = find(
            tmp.path(),
            "Cargo.toml",
            FsLister::new(),
            TraversalConfig::default()
                .with_concurrency(3)
                .with_discipline(discipline),
        );
        assert_eq!(found, expected, "mismatch with {discipline:?}");
    }
}

#[test]
fn empty_root_yields_nothing() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let found = find(tmp.path(), "anything", FsLister::new(), TraversalConfig::default());
    assert!(found.is_empty());
}

#[test]
fn missing_root_is_a_listing_error() {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let missing = tmp.path().join("does-not-exist");

    let handle = start_traversal(
        missing,
        FsLister::new(),
        NameEquals::new("x"),
        TraversalConfig::default(),
    )
    .unwrap();
    assert_eq!(handle.iter().count(), 0);
    match handle.finish() {
        Err(TraversalError::Listing(err)) => {
            assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected listing error, got {other:?}"),
    }
}
