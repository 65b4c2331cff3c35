use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model for documentation generation.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// System prompt handed to the text-generation service.
const SYSTEM_PROMPT: &str = "You are an expert technical documentation writer specializing in Python projects. \
Your task is to create clear, comprehensive, and well-structured documentation that helps developers \
understand and use the code effectively. Focus on:
- Clear explanations of purpose and functionality
- Detailed parameter and return value descriptions
- Usage examples where helpful
- Important notes about design decisions or limitations
- Relationships between components
Format everything in clean, readable Markdown.";

/// Settings for a documentation run.
///
/// Loaded from a JSON file and/or overridden from the command line. The API
/// key only ever comes from the environment and is never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,

    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,

    pub include_patterns: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,

    pub max_file_size: u64,
    pub include_tests: bool,

    pub system_prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2000,
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            output_dir: PathBuf::from("docs/generated"),
            state_file: PathBuf::from(".saga_state.json"),
            include_patterns: vec!["*.py".to_string()],
            exclude_dirs: [
                "__pycache__",
                ".git",
                ".venv",
                "venv",
                "env",
                ".env",
                "node_modules",
                ".pytest_cache",
                ".mypy_cache",
                "build",
                "dist",
                "*.egg-info",
                ".tox",
                "htmlcov",
                ".coverage",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_files: ["setup.py", "conftest.py", "__init__.py"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 100_000,
            include_tests: false,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing keys keep their defaults;
    /// the API key is re-read from the environment.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Save configuration as pretty JSON. The API key is skipped.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        crate::fsutil::write_atomic(path, json.as_bytes())?;
        Ok(())
    }

    /// Absolute path of the persisted ledger file.
    pub fn state_path(&self) -> PathBuf {
        self.project_root.join(&self.state_file)
    }

    /// Validate the configuration, returning every problem found.
    ///
    /// Checked eagerly by the CLI before any scanning begins.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.api_key.as_deref().map_or(true, |k| k.is_empty()) {
            errors.push("Anthropic API key is required (set ANTHROPIC_API_KEY)".to_string());
        }
        if !self.project_root.exists() {
            errors.push(format!(
                "project root does not exist: {}",
                self.project_root.display()
            ));
        }
        errors
    }
}
