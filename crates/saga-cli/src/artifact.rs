//! The combined output artifact: structural record plus generated prose
//! per file, keyed by project-relative path. Written as one JSON document
//! that downstream renderers consume.

use saga_analyzer::Analysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const ARTIFACT_FILE: &str = "documentation.json";

/// One documented file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocEntry {
    pub path: String,
    pub analysis: Analysis,
    pub documentation: String,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct Artifact {
    entries: BTreeMap<String, DocEntry>,
}

impl Artifact {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the previously written artifact for incremental merging.
    /// Missing or unreadable artifacts start empty.
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(ARTIFACT_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, DocEntry>>(&content) {
                Ok(entries) => {
                    tracing::info!("loaded existing documentation for {} files", entries.len());
                    Self { entries }
                }
                Err(e) => {
                    tracing::warn!("ignoring unreadable artifact {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn insert(&mut self, key: String, entry: DocEntry) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the artifact. Failure is logged, not raised: the generated
    /// prose for this run is lost but the next run can regenerate it.
    pub fn save(&self, output_dir: &Path) {
        let path = output_dir.join(ARTIFACT_FILE);
        let json = match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("could not serialize documentation: {e}");
                return;
            }
        };
        if let Err(e) = saga_core::write_atomic(&path, json.as_bytes()) {
            tracing::error!("could not write {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> DocEntry {
        DocEntry {
            path: path.to_string(),
            analysis: saga_analyzer::analyze(path, "x = 1\n"),
            documentation: "# Docs".to_string(),
            timestamp: saga_core::now_rfc3339(),
        }
    }

    #[test]
    fn save_and_reload_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut artifact = Artifact::empty();
        artifact.insert("a.py".to_string(), entry("a.py"));
        artifact.save(tmp.path());

        let reloaded = Artifact::load(tmp.path());
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.entries.contains_key("a.py"));
    }

    #[test]
    fn incremental_merge_keeps_existing_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let mut artifact = Artifact::empty();
        artifact.insert("a.py".to_string(), entry("a.py"));
        artifact.save(tmp.path());

        let mut merged = Artifact::load(tmp.path());
        merged.insert("b.py".to_string(), entry("b.py"));
        merged.save(tmp.path());

        let reloaded = Artifact::load(tmp.path());
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn corrupt_artifact_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(ARTIFACT_FILE), "not json").unwrap();
        assert!(Artifact::load(tmp.path()).is_empty());
    }

    #[test]
    fn missing_artifact_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Artifact::load(tmp.path()).is_empty());
    }
}
