//! The persisted fingerprint ledger: which files were documented, in what
//! state, and when. Loaded once at construction, mutated only by commit
//! and clear, written back atomically.

use saga_core::{now_rfc3339, sha256_file, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Observed state of one tracked file when it was last documented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileState {
    pub mtime: f64,
    pub size: u64,
    pub hash: String,
    pub last_documented: String,
}

/// The on-disk shape: `{"files": {...}, "last_run": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    #[serde(default)]
    files: BTreeMap<String, FileState>,
    #[serde(default)]
    last_run: Option<String>,
}

/// Read-only summary of the ledger contents.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_files: usize,
    pub last_run: Option<String>,
    pub oldest_documented: Option<String>,
    pub newest_documented: Option<String>,
}

pub struct Ledger {
    project_root: PathBuf,
    state_path: PathBuf,
    state: LedgerState,
}

impl Ledger {
    /// Load the ledger for `project_root` from `state_path`. A missing or
    /// corrupt file starts an empty ledger; loading never fails.
    pub fn load(project_root: &Path, state_path: &Path) -> Self {
        let state = match std::fs::read_to_string(state_path) {
            Ok(content) => match serde_json::from_str::<LedgerState>(&content) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        "ignoring corrupt ledger {}: {e}",
                        state_path.display()
                    );
                    LedgerState::default()
                }
            },
            Err(_) => LedgerState::default(),
        };
        Self {
            project_root: project_root.to_path_buf(),
            state_path: state_path.to_path_buf(),
            state,
        }
    }

    /// Whether a completed run has been recorded before. Decides full
    /// versus incremental mode.
    pub fn has_previous_run(&self) -> bool {
        self.state_path.exists() && !self.state.files.is_empty()
    }

    /// Timestamp of the most recent completed run, if any.
    pub fn last_run(&self) -> Option<&str> {
        self.state.last_run.as_deref()
    }

    /// The files that need (re)processing: new files, tracked files whose
    /// fingerprint is stale, and any paths reported by `extra` signals.
    /// Deleted files are recognized and logged but never returned. The
    /// result is sorted and deduplicated.
    pub fn changed_files(
        &self,
        current_files: &BTreeSet<PathBuf>,
        extra: &[PathBuf],
    ) -> Vec<PathBuf> {
        let mut changed: BTreeSet<PathBuf> = BTreeSet::new();

        for path in current_files {
            let key = self.relative_key(path);
            match self.state.files.get(&key) {
                None => {
                    tracing::info!("new file: {key}");
                    changed.insert(path.clone());
                }
                Some(previous) => {
                    if self.is_stale(path, previous) {
                        tracing::info!("modified file: {key}");
                        changed.insert(path.clone());
                    }
                }
            }
        }

        for key in self.deleted_files(current_files) {
            tracing::info!("deleted file: {key}");
        }

        for path in extra {
            if path.exists() && current_files.contains(path) {
                changed.insert(path.clone());
            }
        }

        changed.into_iter().collect()
    }

    /// Ledger entries whose files are gone from the current scan. They
    /// stay in the ledger; downstream cleanup may act on this list.
    pub fn deleted_files(&self, current_files: &BTreeSet<PathBuf>) -> Vec<String> {
        let current_keys: BTreeSet<String> = current_files
            .iter()
            .map(|p| self.relative_key(p))
            .collect();
        self.state
            .files
            .keys()
            .filter(|k| !current_keys.contains(*k))
            .cloned()
            .collect()
    }

    /// Record fresh fingerprints for `processed` files, stamp the run, and
    /// persist. Per-file failures leave the old entry in place; a failed
    /// persist costs only extra reprocessing next run. Never fails.
    pub fn commit(&mut self, processed: &[PathBuf]) {
        for path in processed {
            match self.fingerprint(path) {
                Ok((key, state)) => {
                    self.state.files.insert(key, state);
                }
                Err(e) => {
                    tracing::warn!("could not fingerprint {}: {e}", path.display());
                }
            }
        }
        self.state.last_run = Some(now_rfc3339());
        self.persist();
    }

    /// Drop all entries and persist immediately. Forces the next run to
    /// reprocess everything.
    pub fn clear(&mut self) {
        self.state = LedgerState::default();
        self.persist();
    }

    pub fn stats(&self) -> LedgerStats {
        let documented: Vec<&String> = self
            .state
            .files
            .values()
            .map(|f| &f.last_documented)
            .collect();
        LedgerStats {
            total_files: self.state.files.len(),
            last_run: self.state.last_run.clone(),
            // RFC-3339 strings order chronologically.
            oldest_documented: documented.iter().min().map(|s| s.to_string()),
            newest_documented: documented.iter().max().map(|s| s.to_string()),
        }
    }

    // ── Internals ──

    fn relative_key(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        relative.to_string_lossy().replace('\\', "/")
    }

    /// Three-tier staleness check: mtime, then size, then content hash.
    /// Any error resolves to "stale"; reprocessing is the safe outcome.
    fn is_stale(&self, path: &Path, previous: &FileState) -> bool {
        match check_stale(path, previous) {
            Ok(stale) => stale,
            Err(e) => {
                tracing::warn!(
                    "error checking {}: {e}; scheduling for reprocessing",
                    path.display()
                );
                true
            }
        }
    }

    fn fingerprint(&self, path: &Path) -> anyhow::Result<(String, FileState)> {
        let metadata = std::fs::metadata(path)?;
        let state = FileState {
            mtime: mtime_seconds(&metadata)?,
            size: metadata.len(),
            hash: sha256_file(path)?,
            last_documented: now_rfc3339(),
        };
        Ok((self.relative_key(path), state))
    }

    fn persist(&self) {
        let json = match serde_json::to_string_pretty(&self.state) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("could not serialize ledger: {e}");
                return;
            }
        };
        if let Err(e) = write_atomic(&self.state_path, json.as_bytes()) {
            tracing::error!(
                "could not persist ledger {}: {e}",
                self.state_path.display()
            );
        }
    }
}

fn check_stale(path: &Path, previous: &FileState) -> anyhow::Result<bool> {
    let metadata = std::fs::metadata(path)?;
    if mtime_seconds(&metadata)? > previous.mtime {
        return Ok(true);
    }
    if metadata.len() != previous.size {
        return Ok(true);
    }
    Ok(sha256_file(path)? != previous.hash)
}

fn mtime_seconds(metadata: &std::fs::Metadata) -> anyhow::Result<f64> {
    let modified = metadata.modified()?;
    Ok(modified.duration_since(UNIX_EPOCH)?.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, Vec<PathBuf>) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("file1.py"), "# File 1").unwrap();
        std::fs::write(root.join("file2.py"), "# File 2").unwrap();
        std::fs::create_dir(root.join("subdir")).unwrap();
        std::fs::write(root.join("subdir/file3.py"), "# File 3").unwrap();
        let files = vec![
            root.join("file1.py"),
            root.join("file2.py"),
            root.join("subdir/file3.py"),
        ];
        (tmp, files)
    }

    fn ledger_for(root: &Path) -> Ledger {
        Ledger::load(root, &root.join(".saga_state.json"))
    }

    fn file_set(files: &[PathBuf]) -> BTreeSet<PathBuf> {
        files.iter().cloned().collect()
    }

    #[test]
    fn no_previous_run_initially() {
        let (tmp, _) = project();
        assert!(!ledger_for(tmp.path()).has_previous_run());
    }

    #[test]
    fn first_run_reports_all_files_as_new() {
        let (tmp, files) = project();
        let ledger = ledger_for(tmp.path());
        let changed = ledger.changed_files(&file_set(&files), &[]);
        assert_eq!(changed.len(), 3);
    }

    #[test]
    fn state_persists_across_instances() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        let reloaded = ledger_for(tmp.path());
        assert!(reloaded.has_previous_run());
        assert_eq!(reloaded.state.files.len(), 3);
        assert!(reloaded.last_run().is_some());
    }

    #[test]
    fn idempotent_when_nothing_changed() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);
        let changed = ledger.changed_files(&file_set(&files), &[]);
        assert!(changed.is_empty());
    }

    #[test]
    fn new_file_is_detected() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        let new_path = tmp.path().join("new_file.py");
        std::fs::write(&new_path, "# New file").unwrap();
        let mut current = file_set(&files);
        current.insert(new_path.clone());

        let changed = ledger.changed_files(&current, &[]);
        assert_eq!(changed, vec![new_path]);
    }

    #[test]
    fn modified_content_is_detected() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(tmp.path().join("file1.py"), "# File 1 - modified content").unwrap();

        let changed = ledger.changed_files(&file_set(&files), &[]);
        assert_eq!(changed, vec![tmp.path().join("file1.py")]);
    }

    #[test]
    fn hash_catches_change_when_mtime_and_size_forged() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        // Same length, different bytes.
        std::fs::write(tmp.path().join("file1.py"), "# FILE 1").unwrap();
        // Forge the stored mtime into the future so only the hash tier can fire.
        let entry = ledger.state.files.get_mut("file1.py").unwrap();
        entry.mtime += 1_000_000.0;
        assert_eq!(entry.size, 8);

        let changed = ledger.changed_files(&file_set(&files), &[]);
        assert_eq!(changed, vec![tmp.path().join("file1.py")]);
    }

    #[test]
    fn deleted_files_never_appear_in_changed_set() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        std::fs::remove_file(tmp.path().join("file1.py")).unwrap();
        let current: BTreeSet<PathBuf> = files[1..].iter().cloned().collect();

        let changed = ledger.changed_files(&current, &[]);
        assert!(changed.is_empty());
        assert_eq!(ledger.deleted_files(&current), vec!["file1.py".to_string()]);
        // The entry is retained, not pruned.
        assert!(ledger.state.files.contains_key("file1.py"));
    }

    #[test]
    fn extra_signal_is_merged_and_deduplicated() {
        let (tmp, files) = project();
        let ledger = ledger_for(tmp.path());
        let current = file_set(&files);

        // file1 arrives both from the scan (new) and from the extra signal.
        let extra = vec![tmp.path().join("file1.py"), tmp.path().join("file1.py")];
        let changed = ledger.changed_files(&current, &extra);

        let ones = changed
            .iter()
            .filter(|p| p.ends_with("file1.py"))
            .count();
        assert_eq!(ones, 1);
        let mut sorted = changed.clone();
        sorted.sort();
        assert_eq!(changed, sorted);
    }

    #[test]
    fn stat_error_fails_open() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        // A tracked path that vanished from disk but is still claimed by
        // the scan must be treated as changed, not silently skipped.
        std::fs::remove_file(tmp.path().join("file2.py")).unwrap();
        let changed = ledger.changed_files(&file_set(&files), &[]);
        assert_eq!(changed, vec![tmp.path().join("file2.py")]);
    }

    #[test]
    fn clear_resets_everything() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);
        assert!(ledger.has_previous_run());

        ledger.clear();
        assert!(!ledger.has_previous_run());
        assert!(ledger.state.files.is_empty());

        let reloaded = ledger_for(tmp.path());
        assert!(!reloaded.has_previous_run());
    }

    #[test]
    fn stats_reflect_committed_files() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());

        let stats = ledger.stats();
        assert_eq!(stats.total_files, 0);
        assert!(stats.last_run.is_none());

        ledger.commit(&files);
        let stats = ledger.stats();
        assert_eq!(stats.total_files, 3);
        assert!(stats.last_run.is_some());
        assert!(stats.oldest_documented.is_some());
        assert!(stats.newest_documented.is_some());
        assert!(stats.oldest_documented <= stats.newest_documented);
    }

    #[test]
    fn corrupt_state_file_starts_fresh() {
        let (tmp, _) = project();
        std::fs::write(tmp.path().join(".saga_state.json"), "{ invalid json").unwrap();
        let ledger = ledger_for(tmp.path());
        assert!(!ledger.has_previous_run());
    }

    #[test]
    fn keys_are_relative_to_project_root() {
        let (tmp, files) = project();
        let mut ledger = ledger_for(tmp.path());
        ledger.commit(&files);

        for key in ledger.state.files.keys() {
            assert!(!Path::new(key).is_absolute());
            assert!(tmp.path().join(key).exists());
        }
        assert!(ledger.state.files.contains_key("subdir/file3.py"));
    }

    #[test]
    fn scan_then_diff_reports_only_the_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("b.py"), "# previously documented").unwrap();

        let config = saga_core::Config {
            project_root: root.to_path_buf(),
            ..saga_core::Config::default()
        };
        let scanner = crate::Scanner::new(&config).unwrap();
        let mut ledger = Ledger::load(root, &config.state_path());
        ledger.commit(&[root.join("b.py")]);

        std::fs::write(root.join("a.py"), "# brand new").unwrap();
        let changed = ledger.changed_files(&scanner.scan(), &[]);
        assert_eq!(changed, vec![root.join("a.py")]);
    }

    #[test]
    fn commit_skips_unreadable_file_but_keeps_the_rest() {
        let (tmp, mut files) = project();
        let mut ledger = ledger_for(tmp.path());
        files.push(tmp.path().join("ghost.py"));
        ledger.commit(&files);
        assert_eq!(ledger.state.files.len(), 3);
        assert!(ledger.last_run().is_some());
    }
}
