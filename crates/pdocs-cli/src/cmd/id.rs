use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use pdocs_core::engine::Engine;
use pdocs_core::rules::RuleSet;
use pdocs_core::types::DocType;
use std::path::Path;

pub fn next(root: &Path, doc_type: &str, peek: bool, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let doc_type = engine.parse_type(doc_type)?;
    let id = engine
        .next_id(doc_type, peek)
        .with_context(|| format!("failed to issue id for '{doc_type}'"))?;

    if json {
        return print_json(&serde_json::json!({
            "type": doc_type,
            "id": id,
            "peek": peek,
        }));
    }
    println!("{id}");
    Ok(())
}

pub fn types(root: &Path, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let rules: Vec<RuleSet> = DocType::all()
        .iter()
        .map(|t| RuleSet::for_type(*t, engine.config()))
        .collect();

    if json {
        let out: Vec<_> = rules
            .iter()
            .map(|r| {
                serde_json::json!({
                    "type": r.doc_type,
                    "aliases": r.doc_type.aliases(),
                    "skill": r.skill,
                    "id_pattern": r.id_pattern,
                    "required_sections": r.required_sections,
                    "required_fields": r.required_fields,
                })
            })
            .collect();
        return print_json(&out);
    }

    let rows = rules
        .iter()
        .map(|r| {
            vec![
                r.doc_type.to_string(),
                r.doc_type.aliases().join(","),
                or_dash(r.skill.as_deref()),
                or_dash(r.id_pattern.as_deref()),
            ]
        })
        .collect();
    print_table(&["TYPE", "ALIASES", "SKILL", "ID PATTERN"], rows);
    Ok(())
}
