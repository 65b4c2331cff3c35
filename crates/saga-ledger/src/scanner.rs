//! Recursive project walk producing the authoritative set of files to
//! document. Exclusion happens before descent, so excluded subtrees are
//! never visited.

use globset::{Glob, GlobSet, GlobSetBuilder};
use saga_core::Config;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct Scanner {
    root: PathBuf,
    include: GlobSet,
    exclude_dirs: GlobSet,
    exclude_files: GlobSet,
    max_file_size: u64,
    include_tests: bool,
}

impl Scanner {
    /// Compile the configured glob patterns once up front.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            root: config.project_root.clone(),
            include: build_glob_set(&config.include_patterns)?,
            exclude_dirs: build_glob_set(&config.exclude_dirs)?,
            exclude_files: build_glob_set(&config.exclude_files)?,
            max_file_size: config.max_file_size,
            include_tests: config.include_tests,
        })
    }

    /// The compiled include patterns, for callers filtering other signals
    /// (e.g. version-control reports) to documentable files.
    pub fn include_globs(&self) -> &GlobSet {
        &self.include
    }

    /// Walk the project root and collect every matching file.
    pub fn scan(&self) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        self.walk(&self.root, &mut files);
        tracing::info!("found {} files matching patterns", files.len());
        files
    }

    fn walk(&self, dir: &Path, files: &mut BTreeSet<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("cannot read {}: {e}", dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.is_dir() {
                if self.exclude_dirs.is_match(name) {
                    tracing::debug!("excluding directory: {}", path.display());
                    continue;
                }
                if !self.include_tests && is_test_directory(name) {
                    tracing::debug!("excluding test directory: {}", path.display());
                    continue;
                }
                self.walk(&path, files);
            } else if self.include.is_match(name) && self.should_include(&path, name) {
                files.insert(path);
            }
        }
    }

    fn should_include(&self, path: &Path, name: &str) -> bool {
        let size = match std::fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(_) => return false,
        };
        if size > self.max_file_size {
            tracing::debug!("excluding large file: {}", path.display());
            return false;
        }

        if self.exclude_files.is_match(name) {
            // A package initializer with real content is not a stub; keep it.
            if name == "__init__.py" {
                if let Ok(content) = std::fs::read_to_string(path) {
                    let content = content.trim();
                    if content.len() > 100 || content.contains("class") || content.contains("def ")
                    {
                        return true;
                    }
                }
            }
            tracing::debug!("excluding file: {}", path.display());
            return false;
        }

        if !self.include_tests && is_test_file(name) {
            tracing::debug!("excluding test file: {}", path.display());
            return false;
        }
        true
    }

    /// Nested directory/file tree of the scan result.
    pub fn project_structure(&self) -> serde_json::Value {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.to_string_lossy().to_string());
        let mut root = json!({"name": name, "type": "directory", "children": {}});

        for path in self.scan() {
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            let Some((file_name, dirs)) = parts.split_last() else {
                continue;
            };

            let mut cursor = &mut root["children"];
            for part in dirs {
                if cursor.get(part.as_str()).is_none() {
                    cursor[part.as_str()] =
                        json!({"name": part, "type": "directory", "children": {}});
                }
                cursor = &mut cursor[part.as_str()]["children"];
            }
            cursor[file_name.as_str()] = json!({
                "name": file_name,
                "type": "file",
                "path": path.to_string_lossy(),
            });
        }
        root
    }
}

fn build_glob_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn is_test_directory(name: &str) -> bool {
    let name = name.to_lowercase();
    matches!(name.as_str(), "tests" | "test" | "testing") || name.starts_with("test_")
}

fn is_test_file(name: &str) -> bool {
    let name = name.to_lowercase();
    name.starts_with("test_")
        || name.ends_with("_test.py")
        || matches!(name.as_str(), "test.py" | "tests.py")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for dir in ["src", "src/models", "tests", "__pycache__", ".git", "docs"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::write(root.join("main.py"), "# Main file").unwrap();
        std::fs::write(root.join("setup.py"), "# Setup file").unwrap();
        std::fs::write(root.join("src/app.py"), "# App file").unwrap();
        std::fs::write(root.join("src/__init__.py"), "").unwrap();
        std::fs::write(root.join("src/models/user.py"), "class User: pass").unwrap();
        std::fs::write(root.join("src/models/__init__.py"), "from .user import User").unwrap();
        std::fs::write(root.join("tests/test_app.py"), "# Test file").unwrap();
        std::fs::write(root.join("tests/__init__.py"), "").unwrap();
        std::fs::write(root.join("README.md"), "# README").unwrap();
        std::fs::write(root.join("__pycache__/app.pyc"), "").unwrap();
        std::fs::write(root.join(".git/config"), "").unwrap();
        tmp
    }

    fn config_for(root: &Path) -> Config {
        Config {
            project_root: root.to_path_buf(),
            ..Config::default()
        }
    }

    fn names(files: &BTreeSet<PathBuf>) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn default_scan_includes_sources_and_skips_noise() {
        let tmp = project();
        let scanner = Scanner::new(&config_for(tmp.path())).unwrap();
        let files = scanner.scan();
        let names = names(&files);

        assert!(names.contains(&"main.py".to_string()));
        assert!(names.contains(&"app.py".to_string()));
        assert!(names.contains(&"user.py".to_string()));

        assert!(!names.contains(&"setup.py".to_string()));
        assert!(!names.contains(&"test_app.py".to_string()));
        assert!(!names.contains(&"README.md".to_string()));
        assert!(!names.contains(&"app.pyc".to_string()));
    }

    #[test]
    fn include_tests_flag_admits_test_files() {
        let tmp = project();
        let mut config = config_for(tmp.path());
        config.include_tests = true;
        let files = Scanner::new(&config).unwrap().scan();
        assert!(names(&files).contains(&"test_app.py".to_string()));
    }

    #[test]
    fn custom_include_patterns() {
        let tmp = project();
        std::fs::write(tmp.path().join("src/extension.pyx"), "# Cython file").unwrap();
        let mut config = config_for(tmp.path());
        config.include_patterns = vec!["*.py".to_string(), "*.pyx".to_string()];
        let files = Scanner::new(&config).unwrap().scan();
        assert!(names(&files).contains(&"extension.pyx".to_string()));
    }

    #[test]
    fn excluded_directories_are_never_visited() {
        let tmp = project();
        std::fs::create_dir(tmp.path().join("build")).unwrap();
        std::fs::write(tmp.path().join("build/generated.py"), "# Generated").unwrap();
        let files = Scanner::new(&config_for(tmp.path())).unwrap().scan();
        for file in &files {
            let text = file.to_string_lossy();
            assert!(!text.contains("__pycache__"));
            assert!(!text.contains(".git"));
            assert!(!text.contains("build"));
        }
    }

    #[test]
    fn oversized_files_are_skipped() {
        let tmp = project();
        std::fs::write(tmp.path().join("large_file.py"), "x".repeat(200_000)).unwrap();
        let files = Scanner::new(&config_for(tmp.path())).unwrap().scan();
        assert!(!names(&files).contains(&"large_file.py".to_string()));
    }

    #[test]
    fn trivial_init_excluded_but_substantial_init_kept() {
        let tmp = project();
        let init_content = "\n'''Package initialization.'''\n\nfrom .app import Application\n\n__all__ = ['Application']\n\ndef initialize():\n    '''Initialize the package.'''\n    pass\n";
        std::fs::write(tmp.path().join("src/__init__.py"), init_content).unwrap();

        let files = Scanner::new(&config_for(tmp.path())).unwrap().scan();
        let inits: Vec<_> = files
            .iter()
            .filter(|f| f.file_name().unwrap() == "__init__.py")
            .collect();
        assert_eq!(inits.len(), 1);
        assert!(inits[0].to_string_lossy().contains("src"));
    }

    #[test]
    fn test_named_files_excluded_by_default() {
        let tmp = project();
        for name in ["test_something.py", "something_test.py", "test.py", "tests.py"] {
            std::fs::write(tmp.path().join(name), "# Test").unwrap();
        }
        let files = Scanner::new(&config_for(tmp.path())).unwrap().scan();
        let names = names(&files);
        for name in ["test_something.py", "something_test.py", "test.py", "tests.py"] {
            assert!(!names.contains(&name.to_string()), "{name} should be excluded");
        }
    }

    #[test]
    fn empty_directory_scans_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let files = Scanner::new(&config_for(tmp.path())).unwrap().scan();
        assert!(files.is_empty());
    }

    #[test]
    fn deeply_nested_files_are_found() {
        let tmp = project();
        let deep = tmp.path().join("a/b/c/d");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("deep_module.py"), "# Deep module").unwrap();
        let files = Scanner::new(&config_for(tmp.path())).unwrap().scan();
        assert!(names(&files).contains(&"deep_module.py".to_string()));
    }

    #[test]
    fn project_structure_nests_directories() {
        let tmp = project();
        let scanner = Scanner::new(&config_for(tmp.path())).unwrap();
        let structure = scanner.project_structure();

        assert_eq!(structure["type"], "directory");
        assert_eq!(structure["children"]["src"]["type"], "directory");
        assert_eq!(structure["children"]["main.py"]["type"], "file");
        assert_eq!(
            structure["children"]["src"]["children"]["models"]["children"]["user.py"]["type"],
            "file"
        );
    }
}
