use crate::{generate, llm::AnthropicClient};
use std::path::PathBuf;

pub struct GenerateArgs {
    pub path: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub full: bool,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub include_tests: bool,
    pub exclude: Vec<String>,
    pub dry_run: bool,
}

pub fn execute(args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = crate::load_config(&args.path, args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(api_key) = args.api_key {
        config.api_key = Some(api_key);
    }
    if args.include_tests {
        config.include_tests = true;
    }
    config.exclude_dirs.extend(args.exclude);

    // Fatal configuration problems surface before any scanning.
    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("configuration error: {error}");
        }
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }

    if args.dry_run {
        return crate::cmd_scan::print_scan(&config, false);
    }

    let client = AnthropicClient::new(
        config.api_key.clone().unwrap_or_default(),
        config.model.clone(),
        config.max_tokens,
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(generate::run(&config, &client, args.full))?;

    println!(
        "Documentation generated in {}",
        config.project_root.join(&config.output_dir).display()
    );
    Ok(())
}
