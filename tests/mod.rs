//! Main test module for mirrorguard
//!
//! This module includes all test suites:
//! - Integration tests for end-to-end scenarios
//! - Chaos tests for trees changing under a run
//! - Property-based tests for invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use crate::integration::{MirrorTestHarness, T};
    use ::mirrorguard::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[tokio::test]
    async fn test_empty_directory() {
        let harness = MirrorTestHarness::new();
        fs::create_dir_all(harness.live.join("a/b/c")).unwrap();

        let (summary, alerts) = harness.run(harness.builder()).await;
        assert_eq!(summary.total_files, 0);
        assert_eq!(summary.files_checked, 0);
        assert_eq!(summary.total_bytes, 0);
        assert!(alerts.is_empty());
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_special_filenames() {
        let harness = MirrorTestHarness::new();
        let names = [
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file_with_underscores.txt",
            "file.multiple.dots.txt",
            "UPPERCASE.TXT",
            "日本語.txt",
            "émoji 🎉.txt",
            ".hidden",
        ];
        for name in &names {
            harness.mirror_file(name, name.as_bytes(), T);
        }

        let (summary, alerts) = harness.run(harness.builder()).await;
        assert_eq!(summary.files_checked, names.len() as u64);
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_deep_nesting() {
        let harness = MirrorTestHarness::new();
        let deep: PathBuf = (0..40).map(|i| format!("level{}", i)).collect();
        let relative = deep.join("bottom.txt");
        let relative = relative.to_str().unwrap();
        harness.live_file(relative, b"deep", T);

        let (_summary, alerts) = harness.run(harness.builder()).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].path, Path::new(relative));
    }

    #[tokio::test]
    async fn test_zero_byte_files() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("empty.txt", b"", T);
        harness.live_file("was_empty.txt", b"now has content", T);
        harness.backup_file("was_empty.txt", b"", T);

        let (summary, alerts) = harness.run(harness.builder()).await;
        assert_eq!(summary.total_bytes, 15);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].path, PathBuf::from("was_empty.txt"));
        assert!(alerts[0].message.contains("15 vs 0 bytes"));
    }

    #[tokio::test]
    async fn test_pattern_never_excludes_files() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("cache", b"a file named like the pattern", T);
        harness.mirror_file("sub/cache", b"also a file", T);

        let (summary, alerts) = harness.run(harness.builder().exclude("**/cache")).await;
        assert_eq!(summary.files_checked, 2);
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_root_itself_is_never_excluded() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("a.txt", b"a", T);

        let builder = harness.builder().exclude(harness.live.display().to_string());
        let (summary, alerts) = harness.run(builder).await;
        assert_eq!(summary.files_checked, 1);
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_roots_are_startup_errors() {
        let harness = MirrorTestHarness::new();
        let gone = harness.temp_dir.path().join("gone");

        let err = harness.builder().build(&harness.live, &gone).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.user_message().contains("mounted"));

        let err = harness.builder().build(&gone, &harness.backup).unwrap_err();
        assert!(matches!(err, MirrorError::LiveRootMissing(_)));
    }

    #[tokio::test]
    async fn test_bad_exclusion_list_is_startup_error() {
        let harness = MirrorTestHarness::new();
        let list = harness.temp_dir.path().join("excludes.txt");
        fs::write(&list, "**/ok\n/data/[broken\n").unwrap();

        let err = harness.builder().exclude_file(&list).build(&harness.live, &harness.backup).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidPattern { ref pattern, .. } if pattern == "/data/[broken"));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_idempotent() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("a.txt", b"a", T);
        harness.live_file("b.txt", b"b", T);

        let (first, first_alerts) = harness.run(harness.builder()).await;
        let (second, second_alerts) = harness.run(harness.builder()).await;
        assert_eq!(first.alerts, second.alerts);
        assert_eq!(first_alerts, second_alerts);
    }
}
