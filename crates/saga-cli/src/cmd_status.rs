use saga_ledger::Ledger;
use std::path::Path;

pub fn execute(path: &Path, config_file: Option<&Path>) -> anyhow::Result<()> {
    let config = crate::load_config(path, config_file)?;
    let ledger = Ledger::load(&config.project_root, &config.state_path());
    let stats = ledger.stats();

    println!("Project: {}", config.project_root.display());
    println!("Tracked files: {}", stats.total_files);
    match stats.last_run {
        Some(ts) => println!("Last run: {ts}"),
        None => println!("Last run: (never)"),
    }
    if let Some(oldest) = stats.oldest_documented {
        println!("Oldest documentation: {oldest}");
    }
    if let Some(newest) = stats.newest_documented {
        println!("Newest documentation: {newest}");
    }
    Ok(())
}
