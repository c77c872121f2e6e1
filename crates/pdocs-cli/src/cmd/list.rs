use crate::output::{or_dash, print_json, print_table};
use crate::root::user_path;
use anyhow::Context;
use pdocs_core::engine::Engine;
use pdocs_core::registry::ListFilter;
use pdocs_core::types::DocStatus;
use std::path::Path;

pub fn list(
    root: &Path,
    doc_type: Option<&str>,
    status: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let filter = ListFilter {
        doc_type: doc_type.map(|t| engine.parse_type(t)).transpose()?,
        status: status.map(str::parse::<DocStatus>).transpose()?,
    };
    let records = engine.list(&filter).context("failed to read registry")?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No documents registered.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.path.clone(),
                r.doc_type.to_string(),
                r.status.to_string(),
                or_dash(r.skill.as_deref()),
                or_dash(
                    r.last_validated_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
                ),
            ]
        })
        .collect();
    print_table(&["PATH", "TYPE", "STATUS", "SKILL", "VALIDATED"], rows);
    Ok(())
}

pub fn info(root: &Path, path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;

    let Some(path) = path else {
        let stats = engine.stats().context("failed to read registry")?;
        if json {
            return print_json(&stats);
        }
        println!("Root:      {}", engine.root().display());
        println!("Registry:  {}", engine.store().path().display());
        println!(
            "Documents: {} ({} valid, {} invalid, {} pending)",
            stats.total, stats.valid, stats.invalid, stats.pending
        );
        for (doc_type, count) in &stats.by_type {
            println!("  {doc_type:<16} {count}");
        }
        return Ok(());
    };

    let info = engine
        .info(&user_path(path))
        .with_context(|| format!("failed to inspect {}", path.display()))?;
    if json {
        return print_json(&info);
    }

    println!("Path:       {}", info.path);
    println!("Exists:     {}", if info.exists { "yes" } else { "no" });
    println!("Type:       {}", or_dash(info.doc_type));
    println!("Rule:       {}", or_dash(info.matched_rule));
    match &info.record {
        Some(r) => {
            println!("Registered: yes ({})", r.registered_at.format("%Y-%m-%d %H:%M"));
            println!("Status:     {}", r.status);
            println!("Skill:      {}", or_dash(r.skill.as_deref()));
            if let Some(t) = r.last_validated_at {
                println!(
                    "Validated:  {} ({} error(s), {} warning(s))",
                    t.format("%Y-%m-%d %H:%M"),
                    r.errors,
                    r.warnings
                );
            }
        }
        None => println!("Registered: no"),
    }
    if let Some(rules) = &info.rules {
        if !rules.required_sections.is_empty() {
            println!("Sections:   {}", rules.required_sections.join(", "));
        }
        if !rules.required_fields.is_empty() {
            println!("Fields:     {}", rules.required_fields.join(", "));
        }
        if let Some(pattern) = &rules.id_pattern {
            println!("Id pattern: {pattern}");
        }
    }
    Ok(())
}
