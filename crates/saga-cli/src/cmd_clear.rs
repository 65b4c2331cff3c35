use saga_ledger::Ledger;
use std::path::Path;

pub fn execute(path: &Path, config_file: Option<&Path>) -> anyhow::Result<()> {
    let config = crate::load_config(path, config_file)?;
    let mut ledger = Ledger::load(&config.project_root, &config.state_path());
    ledger.clear();
    println!("Change ledger cleared; the next run will regenerate everything.");
    Ok(())
}
