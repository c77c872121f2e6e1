use crate::root::user_path;
use anyhow::Context;
use pdocs_core::engine::{Engine, WatchOutcome};
use std::path::{Path, PathBuf};

pub fn run(root: &Path, paths: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let targets: Vec<PathBuf> = if paths.is_empty() {
        vec![root.to_path_buf()]
    } else {
        paths.iter().map(|p| user_path(p)).collect()
    };
    for t in &targets {
        if !t.exists() {
            anyhow::bail!("cannot watch {}: no such file or directory", t.display());
        }
    }

    if !json {
        eprintln!("Watching {} path(s); Ctrl-C to stop.", targets.len());
    }
    pdocs_core::watch::run(
        &engine,
        &targets,
        |outcome| print_outcome(outcome, json),
        || true,
    )
    .context("watch failed")?;
    Ok(())
}

fn print_outcome(outcome: &WatchOutcome, json: bool) {
    if json {
        // One object per line so consumers can stream.
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode watch event"),
        }
        return;
    }
    match outcome {
        WatchOutcome::Validated(doc) => {
            let mark = if doc.result.valid { "PASS" } else { "FAIL" };
            println!(
                "{mark}  {} ({} error(s), {} warning(s))",
                doc.path,
                doc.result.errors.len(),
                doc.result.warnings.len()
            );
            for issue in &doc.result.errors {
                println!("  error [{}] {}", issue.rule, issue.message);
            }
        }
        WatchOutcome::Removed { path } => println!("GONE  {path} (unregistered)"),
        WatchOutcome::Ignored { .. } => {}
    }
}
