use std::path::Path;

pub fn execute(file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
    let analysis = saga_analyzer::analyze(&file.to_string_lossy(), &content);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
