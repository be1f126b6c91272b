//! Property-based testing for mirrorguard
//!
//! Uses proptest to verify invariants across randomly generated trees and
//! paths.

use ::mirrorguard::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Generate random relative file paths
///
/// Directory components never contain a dot and file names always do, so a
/// generated file can never collide with a generated directory.
fn path_strategy() -> impl Strategy<Value = PathBuf> {
    let dir_strategy = prop::collection::vec(
        prop_oneof!["[a-z]{1,8}", "dir[0-9]{1,3}", "skip"],
        0..=4,
    );
    let filename_strategy = prop_oneof!["file[0-9]{1,3}\\.txt", "[a-z]{1,8}\\.(txt|rs|md)"];

    (dir_strategy, filename_strategy).prop_map(|(dirs, filename)| {
        let mut path: PathBuf = dirs.into_iter().collect();
        path.push(filename);
        path
    })
}

/// Generate a tree: relative path to content
fn tree_strategy() -> impl Strategy<Value = BTreeMap<PathBuf, Vec<u8>>> {
    prop::collection::btree_map(path_strategy(), prop::collection::vec(any::<u8>(), 0..256), 0..40)
}

fn materialize(root: &Path, tree: &BTreeMap<PathBuf, Vec<u8>>) {
    for (relative, content) in tree {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Copy a tree with mtimes preserved to the second
fn mirror(tree: &BTreeMap<PathBuf, Vec<u8>>, live: &Path, backup: &Path) {
    materialize(backup, tree);
    for relative in tree.keys() {
        let mtime = filetime::FileTime::from_last_modification_time(
            &fs::metadata(live.join(relative)).unwrap(),
        );
        filetime::set_file_mtime(backup.join(relative), mtime).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_inventory_is_complete(tree in tree_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        materialize(temp_dir.path(), &tree);

        let (inventory, notices) = TreeInventory::new(temp_dir.path()).scan();
        prop_assert!(notices.is_empty());
        prop_assert_eq!(inventory.file_count(), tree.len() as u64);
        prop_assert_eq!(
            inventory.byte_count(),
            tree.values().map(|c| c.len() as u64).sum::<u64>()
        );

        let collected: BTreeSet<PathBuf> = inventory.into_paths().into_iter().collect();
        let expected: BTreeSet<PathBuf> = tree.keys().cloned().collect();
        prop_assert_eq!(collected, expected);
    }

    #[test]
    fn prop_excluded_directories_are_pruned(tree in tree_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        materialize(temp_dir.path(), &tree);

        let (inventory, notices) = TreeInventory::new(temp_dir.path())
            .with_exclusions(ExclusionFilter::new(["**/skip"]).unwrap())
            .scan();

        let kept: Vec<&PathBuf> = tree
            .keys()
            .filter(|p| !p.components().any(|c| c.as_os_str() == "skip"))
            .collect();
        prop_assert_eq!(inventory.file_count(), kept.len() as u64);
        for path in inventory.paths() {
            prop_assert!(!path.components().any(|c| c.as_os_str() == "skip"));
        }
        for notice in &notices {
            prop_assert_eq!(notice.severity, Severity::Notice);
            prop_assert!(notice.path.ends_with("skip"));
        }
    }

    #[test]
    fn prop_faithful_mirror_is_silent(tree in tree_strategy(), hash in any::<bool>()) {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("live");
        let backup = temp_dir.path().join("backup");
        fs::create_dir_all(&live).unwrap();
        fs::create_dir_all(&backup).unwrap();
        materialize(&live, &tree);
        mirror(&tree, &live, &backup);

        let mode = if hash { CheckMode::Hash } else { CheckMode::Metadata };
        let engine = ComparisonEngine::new(PathMapper::new(&live, &backup)).with_mode(mode);
        for relative in tree.keys() {
            let alerts = engine.check(relative);
            prop_assert!(alerts.is_empty(), "{:?}: {:?}", relative, alerts);
        }
    }

    #[test]
    fn prop_path_mapping_round_trips(relative in path_strategy()) {
        let mapper = PathMapper::new("/live/root", "/backup/root");

        let live = mapper.to_live(&relative).unwrap();
        let backup = mapper.to_backup(&relative).unwrap();
        prop_assert!(live.starts_with("/live/root"));
        prop_assert!(backup.starts_with("/backup/root"));
        prop_assert_eq!(mapper.relativize_live(&live).unwrap(), relative.clone());
        prop_assert_eq!(mapper.relativize_backup(&backup).unwrap(), relative);
    }

    #[test]
    fn prop_parent_components_are_rejected(relative in path_strategy(), depth in 1usize..4) {
        let mapper = PathMapper::new("/live/root", "/backup/root");
        let mut escaping = PathBuf::new();
        for _ in 0..depth {
            escaping.push("..");
        }
        escaping.push(&relative);

        prop_assert!(mapper.to_live(&escaping).is_err());
        prop_assert!(mapper.to_backup(&escaping).is_err());
    }

    #[test]
    fn prop_exclusion_list_parsing_ignores_noise(
        patterns in prop::collection::vec("\\*\\*/[a-z]{1,8}", 0..10),
        comments in prop::collection::vec("# [a-z ]{0,20}", 0..5),
    ) {
        let mut text = String::new();
        for comment in &comments {
            text.push_str(comment);
            text.push_str("\n\n");
        }
        for pattern in &patterns {
            text.push_str(&format!("  {}  \n", pattern));
        }

        let filter = ExclusionFilter::parse(&text).unwrap();
        prop_assert_eq!(filter.patterns(), patterns.as_slice());
        info!("Parsed {} patterns", filter.len());
    }
}
