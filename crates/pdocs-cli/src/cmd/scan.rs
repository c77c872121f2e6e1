use crate::output::print_json;
use crate::root::user_path;
use anyhow::Context;
use pdocs_core::engine::Engine;
use std::path::Path;

pub fn scan(root: &Path, dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let dir = dir.map(user_path).unwrap_or_else(|| root.to_path_buf());
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }
    let report = engine
        .scan(&dir)
        .with_context(|| format!("failed to scan {}", dir.display()))?;

    if json {
        return print_json(&report);
    }
    for path in &report.registered {
        println!("  registered {path}");
    }
    println!(
        "Registered {} new document(s); {} already registered, {} of unknown type.",
        report.registered.len(),
        report.already_registered,
        report.unclassified.len()
    );
    Ok(())
}

pub fn prune(root: &Path, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let removed = engine.prune().context("failed to prune registry")?;

    if json {
        return print_json(&serde_json::json!({ "removed": removed }));
    }
    if removed.is_empty() {
        println!("Nothing to prune.");
        return Ok(());
    }
    for path in &removed {
        println!("  removed {path}");
    }
    println!("Pruned {} record(s).", removed.len());
    Ok(())
}
