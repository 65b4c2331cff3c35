use saga_core::Config;
use saga_ledger::Scanner;
use std::path::Path;

pub fn execute(
    path: &Path,
    config_file: Option<&Path>,
    include_tests: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = crate::load_config(path, config_file)?;
    if include_tests {
        config.include_tests = true;
    }
    if !config.project_root.exists() {
        anyhow::bail!(
            "project root does not exist: {}",
            config.project_root.display()
        );
    }
    print_scan(&config, json)
}

/// Shared with `generate --dry-run`.
pub fn print_scan(config: &Config, json: bool) -> anyhow::Result<()> {
    let scanner = Scanner::new(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scanner.project_structure())?);
        return Ok(());
    }

    let files = scanner.scan();
    println!("Project: {}", config.project_root.display());
    println!("Would document {} files:", files.len());
    for file in files.iter().take(20) {
        let relative = file.strip_prefix(&config.project_root).unwrap_or(file);
        println!("  - {}", relative.display());
    }
    if files.len() > 20 {
        println!("  ... and {} more files", files.len() - 20);
    }
    Ok(())
}
