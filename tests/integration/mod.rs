//! End-to-end pipeline scenarios
//!
//! Builds live and backup trees in a temporary directory, runs the whole
//! pipeline over them and checks the alerts a reporter receives.

use ::mirrorguard::*;
use filetime::{set_file_mtime, FileTime};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::info;

/// A fixed, whole-second modification time used by most scenarios
pub const T: i64 = 1_400_000_000;

/// Reporter that keeps every alert and the final summary
#[derive(Default)]
pub struct CollectingReporter {
    pub alerts: Mutex<Vec<Alert>>,
    pub summary: Mutex<Option<RunSummary>>,
}

impl Reporter for CollectingReporter {
    fn tick(&self, _info: &ProgressInfo, alerts: &[Alert]) {
        self.alerts.lock().extend_from_slice(alerts);
    }

    fn finished(&self, summary: &RunSummary) {
        *self.summary.lock() = Some(summary.clone());
    }
}

/// Test harness owning a live and a backup tree
pub struct MirrorTestHarness {
    pub temp_dir: TempDir,
    pub live: PathBuf,
    pub backup: PathBuf,
}

impl MirrorTestHarness {
    /// Create empty live and backup roots
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let live = root.join("live");
        let backup = root.join("backup");
        fs::create_dir_all(&live).unwrap();
        fs::create_dir_all(&backup).unwrap();

        Self {
            temp_dir,
            live,
            backup,
        }
    }

    /// Write a live file with a forged mtime
    pub fn live_file(&self, relative: &str, content: &[u8], mtime: i64) -> PathBuf {
        write_with_mtime(&self.live, relative, content, mtime)
    }

    /// Write a backup file with a forged mtime
    pub fn backup_file(&self, relative: &str, content: &[u8], mtime: i64) -> PathBuf {
        write_with_mtime(&self.backup, relative, content, mtime)
    }

    /// Write the same file on both sides
    pub fn mirror_file(&self, relative: &str, content: &[u8], mtime: i64) {
        self.live_file(relative, content, mtime);
        self.backup_file(relative, content, mtime);
    }

    /// Builder with a short tick so tests do not wait on the default second
    pub fn builder(&self) -> PipelineBuilder {
        PipelineBuilder::new().tick_interval(Duration::from_millis(20))
    }

    /// Run a pipeline built from `builder` over the two roots
    pub async fn run(&self, builder: PipelineBuilder) -> (RunSummary, Vec<Alert>) {
        let pipeline = builder.build(&self.live, &self.backup).unwrap();
        let reporter = CollectingReporter::default();
        let summary = pipeline.run(&reporter).await.unwrap();
        let alerts = reporter.alerts.into_inner();
        (summary, alerts)
    }

    /// Generate a mirrored tree of random files, returning their paths
    pub fn generate_mirrored_tree(&self, seed: u64, dirs: usize, files_per_dir: usize) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut created = Vec::new();

        for d in 0..dirs {
            let depth = rng.random_range(1..=3);
            let dir: Vec<String> = (0..depth).map(|level| format!("d{}_{}", d, level)).collect();
            let dir = dir.join("/");

            for f in 0..files_per_dir {
                let size = rng.random_range(0..512);
                let content: Vec<u8> = (0..size).map(|_| rng.random()).collect();
                let relative = format!("{}/file{}.bin", dir, f);
                self.mirror_file(&relative, &content, T - rng.random_range(0..100_000));
                created.push(relative);
            }
        }

        info!("Generated {} mirrored files", created.len());
        created
    }
}

impl Default for MirrorTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_with_mtime(root: &Path, relative: &str, content: &[u8], mtime: i64) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_missing_backup_file_is_the_only_alert() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("a.txt", b"0123456789", T);
        harness.live_file("b.txt", b"0123456789", T);

        let (summary, alerts) = harness.run(harness.builder()).await;

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.files_checked, 2);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].path, PathBuf::from("b.txt"));
        assert!(alerts[0].message.contains("missing from backup"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_excluded_subtree_is_never_enumerated() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("keep.txt", b"k", T);
        for i in 0..500 {
            harness.live_file(&format!("tmp_cache/{}/{}.dat", i % 10, i), b"scratch", T);
        }

        let builder = harness
            .builder()
            .exclude(format!("{}/tmp*", harness.live.display()));
        let (summary, alerts) = harness.run(builder).await;

        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.files_checked, 1);
        assert_eq!(summary.alerts.notice, 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Notice);
        assert_eq!(alerts[0].path, PathBuf::from("tmp_cache"));
    }

    #[cfg(unix)]
    #[tokio::test]
    #[traced_test]
    async fn test_exclusions_follow_a_symlinked_live_root() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("keep.txt", b"k", T);
        harness.live_file("tmp_cache/x.dat", b"scratch", T);
        let data = harness.temp_dir.path().join("data");
        std::os::unix::fs::symlink(&harness.live, &data).unwrap();

        let pipeline = harness
            .builder()
            .exclude(format!("{}/tmp*", data.display()))
            .build(&data, &harness.backup)
            .unwrap();
        let reporter = CollectingReporter::default();
        let summary = pipeline.run(&reporter).await.unwrap();
        let alerts = reporter.alerts.into_inner();

        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.alerts.notice, 1);
        assert_eq!(summary.alerts.critical, 0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].path, PathBuf::from("tmp_cache"));
    }

    #[tokio::test]
    async fn test_small_skew_is_tolerated() {
        let harness = MirrorTestHarness::new();
        harness.live_file("report.txt", b"0123456789", T + 2 * 3600);
        harness.backup_file("report.txt", b"0123456789", T);

        let (summary, alerts) = harness.run(harness.builder()).await;

        assert!(alerts.is_empty());
        assert_eq!(summary.files_checked, 1);
    }

    #[tokio::test]
    async fn test_stale_backup_warns() {
        let harness = MirrorTestHarness::new();
        harness.live_file("report.txt", b"new content", T + 25 * 3600);
        harness.backup_file("report.txt", b"old", T);

        let (summary, alerts) = harness.run(harness.builder()).await;

        assert_eq!(summary.alerts.warning, 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].message.contains("24 hours out of sync"));
    }

    #[tokio::test]
    async fn test_backup_newer_than_live_is_silent() {
        let harness = MirrorTestHarness::new();
        harness.live_file("restored.txt", b"abc", T);
        harness.backup_file("restored.txt", b"abcdef", T + 3 * 86_400);

        let (_summary, alerts) = harness.run(harness.builder()).await;
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_custom_tolerance() {
        let harness = MirrorTestHarness::new();
        harness.live_file("a.txt", b"abc", T + 2 * 3600);
        harness.backup_file("a.txt", b"abc", T);

        let builder = harness.builder().mtime_tolerance(Duration::from_secs(3600));
        let (_summary, alerts) = harness.run(builder).await;

        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("1 hour out of sync"));
    }

    #[tokio::test]
    async fn test_size_mismatch_behind_identical_mtime() {
        let harness = MirrorTestHarness::new();
        harness.live_file("c.txt", b"0123456789", T);
        harness.backup_file("c.txt", b"012", T);

        let (summary, alerts) = harness.run(harness.builder()).await;

        assert!(summary.has_critical());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("size differs"));
    }

    #[tokio::test]
    async fn test_hash_mode_finds_silent_corruption() {
        let harness = MirrorTestHarness::new();
        harness.live_file("photo.raw", b"AAAAAAAAAA", T);
        harness.backup_file("photo.raw", b"AAAAABAAAA", T);
        harness.mirror_file("fine.raw", b"same bytes", T);

        let (_summary, alerts) = harness.run(harness.builder()).await;
        assert!(alerts.is_empty(), "metadata mode cannot see a same-size flip");

        let (summary, alerts) = harness.run(harness.builder().mode(CheckMode::Hash)).await;
        assert_eq!(summary.mode, CheckMode::Hash);
        assert_eq!(summary.files_checked, 2);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].path, PathBuf::from("photo.raw"));
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert!(alerts[0].message.contains("content differs"));
    }

    #[tokio::test]
    async fn test_hash_mode_ignores_missing_and_skewed() {
        let harness = MirrorTestHarness::new();
        harness.live_file("only_live.txt", b"x", T);
        harness.live_file("edited.txt", b"new", T + 10);
        harness.backup_file("edited.txt", b"old", T);

        let (summary, alerts) = harness.run(harness.builder().mode(CheckMode::Hash)).await;
        assert_eq!(summary.files_checked, 2);
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_severity_downgrade() {
        let harness = MirrorTestHarness::new();
        harness.live_file("new.txt", b"x", T);

        let builder = harness.builder().missing_severity(Severity::Warning);
        let (summary, alerts) = harness.run(builder).await;

        assert!(!summary.has_critical());
        assert_eq!(summary.alerts.warning, 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_large_mirror_is_clean_then_flags_removals() {
        let harness = MirrorTestHarness::new();
        let files = harness.generate_mirrored_tree(42, 12, 15);

        let (summary, alerts) = harness.run(harness.builder()).await;
        assert_eq!(summary.files_checked, files.len() as u64);
        assert!(alerts.is_empty(), "unexpected alerts: {:?}", alerts);

        for relative in files.iter().step_by(60) {
            fs::remove_file(harness.backup.join(relative)).unwrap();
        }
        let removed = files.iter().step_by(60).count();

        let (summary, alerts) = harness.run(harness.builder().workers(4)).await;
        assert_eq!(summary.files_checked, files.len() as u64);
        assert_eq!(alerts.len(), removed);
        assert!(alerts.iter().all(|a| a.severity == Severity::Critical));
    }

    #[tokio::test]
    async fn test_extra_backup_files_are_ignored() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("a.txt", b"a", T);
        harness.backup_file("deleted_since.txt", b"gone from live", T);

        let (summary, alerts) = harness.run(harness.builder()).await;
        assert_eq!(summary.files_checked, 1);
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_volume_layout() {
        let harness = MirrorTestHarness::new();
        harness.live_file("docs/a.txt", b"a", T);
        harness.live_file("docs/b.txt", b"b", T);

        let volumes = harness.temp_dir.path().join("Volumes");
        let layout = SnapshotVolumeLayout::new("Backup Disk", "workstation", "Main")
            .with_volumes_dir(&volumes);
        let snapshot = layout.locate(&harness.live);
        write_with_mtime(&snapshot, "docs/a.txt", b"a", T);

        let pipeline = harness.builder().build(&harness.live, &snapshot).unwrap();
        let reporter = CollectingReporter::default();
        let summary = pipeline.run(&reporter).await.unwrap();

        assert!(summary.backup_root.ends_with(harness.live.strip_prefix("/").unwrap()));
        let alerts = reporter.alerts.lock();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].path, PathBuf::from("docs/b.txt"));
    }

    #[tokio::test]
    async fn test_json_reporter_end_to_end() {
        let harness = MirrorTestHarness::new();
        harness.mirror_file("a.txt", b"a", T);
        harness.live_file("b.txt", b"b", T);

        let pipeline = harness.builder().build(&harness.live, &harness.backup).unwrap();
        let reporter = JsonReporter::new(Vec::new());
        pipeline.run(&reporter).await.unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let events: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "alert");
        assert_eq!(events[0]["path"], "b.txt");
        assert_eq!(events[1]["type"], "summary");
        assert_eq!(events[1]["files_checked"], 2);
        assert_eq!(events[1]["mode"], "metadata");
    }
}
