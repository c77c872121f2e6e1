use crate::output::print_json;
use anyhow::Context;
use pdocs_core::engine::Engine;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let report = Engine::init(root)
        .with_context(|| format!("failed to initialize {}", root.display()))?;

    if json {
        return print_json(&report);
    }

    if report.created.is_empty() {
        println!("Already initialized: {}", report.root);
        return Ok(());
    }
    println!("Initialized pdocs in {}", report.root);
    for path in &report.created {
        println!("  created {path}");
    }
    println!();
    println!("Next: pdocs scan    # register existing documents");
    Ok(())
}
