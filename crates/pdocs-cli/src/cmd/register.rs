use crate::output::print_json;
use crate::root::user_path;
use anyhow::Context;
use pdocs_core::engine::Engine;
use std::path::Path;

pub fn register(
    root: &Path,
    path: &Path,
    doc_type: Option<&str>,
    skill: Option<&str>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let record = engine
        .register(&user_path(path), doc_type, skill, force)
        .with_context(|| format!("failed to register {}", path.display()))?;

    if json {
        return print_json(&record);
    }
    match &record.skill {
        Some(skill) => println!(
            "Registered {} as {} (skill: {skill})",
            record.path, record.doc_type
        ),
        None => println!("Registered {} as {}", record.path, record.doc_type),
    }
    Ok(())
}

pub fn unregister(root: &Path, path: &Path, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let record = engine
        .unregister(&user_path(path))
        .with_context(|| format!("failed to unregister {}", path.display()))?;

    if json {
        return print_json(&record);
    }
    println!("Unregistered {}", record.path);
    Ok(())
}
