use crate::output::print_json;
use crate::root::user_path;
use anyhow::Context;
use pdocs_core::engine::{BatchReport, DocReport, Engine, ValidateRun};
use pdocs_core::validate::ValidationIssue;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// File or directory (default: every registered document)
    pub path: Option<PathBuf>,

    /// Document type or alias (default: registered type, then path rules)
    #[arg(long = "type")]
    pub doc_type: Option<String>,

    /// Treat warnings as failures
    #[arg(long)]
    pub strict: bool,

    /// Apply automatic repairs, then validate again
    #[arg(long)]
    pub fix: bool,

    /// With --fix: report repairs without writing them
    #[arg(long, requires = "fix")]
    pub dry_run: bool,

    /// Skip link checking
    #[arg(long)]
    pub no_links: bool,
}

pub fn run(root: &Path, args: ValidateArgs, json: bool) -> anyhow::Result<()> {
    let engine = Engine::open(root).context("failed to open project")?;
    let run = ValidateRun {
        fix: args.fix,
        dry_run: args.dry_run,
        check_links: args.no_links.then_some(false),
    };

    let batch = match &args.path {
        None => engine
            .validate_registered(&run)
            .context("failed to validate registered documents")?,
        Some(p) => {
            let abs = user_path(p);
            if abs.is_dir() {
                engine
                    .validate_dir(&abs, args.doc_type.as_deref(), &run)
                    .with_context(|| format!("failed to validate {}", p.display()))?
            } else {
                let report = engine
                    .validate_path(&abs, args.doc_type.as_deref(), &run)
                    .with_context(|| format!("failed to validate {}", p.display()))?;
                BatchReport {
                    documents: vec![report],
                    ..Default::default()
                }
            }
        }
    };

    if json {
        print_json(&batch)?;
    } else {
        print_batch(&batch, args.strict);
    }

    if !batch.passes(args.strict) {
        let failed = batch
            .documents
            .iter()
            .filter(|d| !d.result.passes(args.strict))
            .count()
            + batch.failures.len();
        let total = batch.documents.len() + batch.failures.len();
        anyhow::bail!("{failed} of {total} document(s) failed validation");
    }
    Ok(())
}

fn print_batch(batch: &BatchReport, strict: bool) {
    if batch.documents.is_empty() && batch.failures.is_empty() {
        println!("No documents to validate.");
    }
    for doc in &batch.documents {
        print_doc(doc, strict);
    }
    for failure in &batch.failures {
        println!("FAIL  {}", failure.path);
        println!("  error: {}", failure.error);
    }
    if !batch.skipped.is_empty() {
        println!(
            "Skipped {} file(s) of unknown type (pass --type to include them).",
            batch.skipped.len()
        );
    }
    if batch.documents.len() + batch.failures.len() > 1 {
        let passed = batch
            .documents
            .iter()
            .filter(|d| d.result.passes(strict))
            .count();
        println!();
        println!(
            "{passed}/{} passed",
            batch.documents.len() + batch.failures.len()
        );
    }
}

fn print_doc(doc: &DocReport, strict: bool) {
    let mark = if doc.result.passes(strict) { "PASS" } else { "FAIL" };
    let note = if doc.registered { "" } else { ", unregistered" };
    println!("{mark}  {} ({}{note})", doc.path, doc.doc_type);

    for issue in &doc.result.errors {
        print_issue("error", issue);
    }
    for issue in &doc.result.warnings {
        print_issue("warning", issue);
    }

    if let Some(repair) = &doc.repair {
        let verb = if repair.dry_run { "would apply" } else { "applied" };
        for change in &repair.outcome.changes {
            println!("  {verb} [{}] {}", change.rule, change.description);
        }
        for item in &repair.outcome.unfixable {
            println!("  unfixable [{}] {}: {}", item.rule, item.message, item.reason);
        }
    }
}

fn print_issue(level: &str, issue: &ValidationIssue) {
    let location = issue
        .line
        .map(|l| format!(" line {l}:"))
        .unwrap_or_else(|| ":".to_string());
    println!("  {level} [{}]{location} {}", issue.rule, issue.message);
    if let Some(s) = &issue.suggestion {
        println!("      suggestion: {s}");
    }
}
