//! The run orchestrator: scan, diff against the ledger, analyze and
//! document each changed file, assemble the artifact, commit fingerprints.
//! Files are processed one at a time; a bad file is skipped, never fatal.

use crate::artifact::{Artifact, DocEntry};
use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompt;
use saga_core::Config;
use saga_ledger::{git, Ledger, Scanner};
use std::path::{Path, PathBuf};

pub async fn run(
    config: &Config,
    generator: &dyn TextGenerator,
    force_full: bool,
) -> anyhow::Result<()> {
    // One generation run at a time per project.
    let _lock = saga_core::lock_file(&config.project_root.join(".saga.lock"))?;

    tracing::info!("starting documentation generation");
    let scanner = Scanner::new(config)?;
    let mut ledger = Ledger::load(&config.project_root, &config.state_path());
    let current = scanner.scan();

    let (files, full_run) = if force_full || !ledger.has_previous_run() {
        tracing::info!("performing full documentation generation");
        (current.iter().cloned().collect::<Vec<_>>(), true)
    } else {
        tracing::info!("checking for changes since last run");
        let extra = git::recent_changes(
            &config.project_root,
            ledger.last_run(),
            scanner.include_globs(),
        );
        (ledger.changed_files(&current, &extra), false)
    };

    if files.is_empty() {
        tracing::info!("no files need documentation");
        return Ok(());
    }
    tracing::info!("found {} files to document", files.len());

    let out_dir = output_dir(config);
    let mut artifact = if full_run {
        Artifact::empty()
    } else {
        Artifact::load(&out_dir)
    };

    let mut documented: Vec<PathBuf> = Vec::new();
    for (index, path) in files.iter().enumerate() {
        tracing::info!("[{}/{}] {}", index + 1, files.len(), path.display());
        match document_file(config, generator, path).await {
            Ok(entry) => {
                artifact.insert(entry.path.clone(), entry);
                documented.push(path.clone());
            }
            Err(e) => {
                tracing::error!("error documenting {}: {e}", path.display());
            }
        }
    }

    artifact.save(&out_dir);
    ledger.commit(&documented);

    tracing::info!(
        "documentation generation complete: {} of {} files documented",
        documented.len(),
        files.len()
    );
    Ok(())
}

async fn document_file(
    config: &Config,
    generator: &dyn TextGenerator,
    path: &Path,
) -> anyhow::Result<DocEntry> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.display()))?;
    let relative = path
        .strip_prefix(&config.project_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");

    let analysis = saga_analyzer::analyze(&relative, &content);
    let request = GenerationRequest {
        system: config.system_prompt.clone(),
        prompt: prompt::documentation_prompt(Path::new(&relative), &content, &analysis),
    };
    let documentation = generator.generate(&request).await?;

    Ok(DocEntry {
        path: relative,
        analysis,
        documentation,
        timestamp: saga_core::now_rfc3339(),
    })
}

fn output_dir(config: &Config) -> PathBuf {
    if config.output_dir.is_absolute() {
        config.output_dir.clone()
    } else {
        config.project_root.join(&config.output_dir)
    }
}
