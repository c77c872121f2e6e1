use crate::output::print_json;
use crate::root::user_path;
use anyhow::Context;
use pdocs_core::engine::{CreateRequest, Engine};
use pdocs_core::template;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub struct TemplateArgs {
    /// Document type or alias
    pub doc_type: String,

    /// Write to this file instead of stdout (never overwrites)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Placeholder value, KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Fetch the template from a URL or gh:owner/repo/path instead
    #[arg(long)]
    pub remote: Option<String>,
}

#[derive(clap::Args)]
pub struct CreateArgs {
    /// Document type or alias
    pub doc_type: String,

    /// Target file, or a directory to create it in
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Placeholder value, KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Assign the next id from the type's sequence
    #[arg(long)]
    pub auto_id: bool,

    /// Document title (also used for the file name)
    #[arg(long)]
    pub title: Option<String>,
}

pub fn template(root: &Path, args: TemplateArgs, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let doc_type = engine.parse_type(&args.doc_type)?;
    let vars = template::parse_vars(&args.vars)?;
    let rendered = engine
        .render_template(doc_type, &vars, args.remote.as_deref())
        .with_context(|| format!("failed to render template for '{}'", args.doc_type))?;

    if !rendered.unresolved.is_empty() {
        eprintln!(
            "warning: unresolved placeholders: {}",
            rendered.unresolved.join(", ")
        );
    }

    if let Some(out) = &args.output {
        let target = user_path(out);
        if target.exists() {
            anyhow::bail!("refusing to overwrite existing file: {}", out.display());
        }
        pdocs_core::io::replace_file(&target, rendered.content.as_bytes())?;
        if json {
            return print_json(&serde_json::json!({
                "path": target.display().to_string(),
                "type": rendered.doc_type,
                "source": rendered.source,
                "origin": rendered.origin,
                "unresolved": rendered.unresolved,
            }));
        }
        println!("Wrote {} ({} template)", out.display(), rendered.source);
        return Ok(());
    }

    if json {
        return print_json(&rendered);
    }
    print!("{}", rendered.content);
    Ok(())
}

pub fn create(root: &Path, args: CreateArgs, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let req = CreateRequest {
        doc_type: args.doc_type.clone(),
        output: args.output.as_deref().map(user_path),
        vars: template::parse_vars(&args.vars)?,
        auto_id: args.auto_id,
        title: args.title,
    };
    let report = engine
        .create(&req)
        .with_context(|| format!("failed to create {} document", args.doc_type))?;

    if json {
        return print_json(&report);
    }
    match &report.id {
        Some(id) => println!("Created {} ({}, id {id})", report.path, report.doc_type),
        None => println!("Created {} ({})", report.path, report.doc_type),
    }
    println!("  template: {}", report.template_source);
    if !report.unresolved.is_empty() {
        println!("  unresolved placeholders: {}", report.unresolved.join(", "));
    }
    Ok(())
}
