//! Best-effort change signal from version control. Everything here
//! degrades to "no signal": a missing git binary, a non-repository root,
//! or a failing subcommand all produce an empty list.

use globset::GlobSet;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Detect whether `root` is inside a git work tree.
pub fn is_repo(root: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(root)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Files touched by commits since `since` (RFC-3339 timestamp).
pub fn files_changed_since(root: &Path, since: &str) -> Vec<PathBuf> {
    run_for_paths(
        root,
        &["log", &format!("--since={since}"), "--name-only", "--format="],
    )
}

/// Files with uncommitted modifications against HEAD.
pub fn uncommitted_files(root: &Path) -> Vec<PathBuf> {
    run_for_paths(root, &["diff", "--name-only", "HEAD"])
}

/// Combined signal for the ledger: commits since the last run plus
/// uncommitted changes, filtered to existing files whose names match
/// `include`.
pub fn recent_changes(root: &Path, last_run: Option<&str>, include: &GlobSet) -> Vec<PathBuf> {
    if !is_repo(root) {
        tracing::debug!("git not available or not a repository");
        return Vec::new();
    }
    let mut paths = Vec::new();
    if let Some(since) = last_run {
        paths.extend(files_changed_since(root, since));
    }
    paths.extend(uncommitted_files(root));
    paths.retain(|p| {
        p.exists()
            && p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| include.is_match(n))
                .unwrap_or(false)
    });
    paths
}

fn run_for_paths(root: &Path, args: &[&str]) -> Vec<PathBuf> {
    let output = match Command::new("git").args(args).current_dir(root).output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!(
                "git {:?} failed: {}",
                args.first(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!("git unavailable: {e}");
            return Vec::new();
        }
    };
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| root.join(l.trim()))
        .collect()
}
