//! Repair Engine.
//!
//! Fixable rules are a closed set: `required-section` gets a stub section and
//! `broken-link` gets relinked when exactly one candidate file exists. Two
//! clean-ups always run afterwards. Everything else is reported as unfixable.
//! Repair never re-validates; that is the caller's job.

use crate::config::Config;
use crate::error::{PdocsError, Result};
use crate::links::{Link, RULE_BROKEN_LINK};
use crate::markdown;
use crate::paths;
use crate::validate::{
    missing_sections, placeholder_line, section_level, ValidationIssue, RULE_REQUIRED_SECTION,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const CHANGE_TRAILING_WHITESPACE: &str = "trailing-whitespace";
pub const CHANGE_FINAL_NEWLINE: &str = "final-newline";

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairChange {
    pub rule: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unfixable {
    pub rule: String,
    pub message: String,
    pub reason: String,
}

/// Result of repairing one document in memory.
#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    pub changes: Vec<RepairChange>,
    pub unfixable: Vec<Unfixable>,
    #[serde(skip)]
    pub content: String,
}

impl RepairOutcome {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A repair pass over a file on disk.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub path: String,
    pub dry_run: bool,
    pub written: bool,
    #[serde(flatten)]
    pub outcome: RepairOutcome,
}

// ---------------------------------------------------------------------------
// Repairer
// ---------------------------------------------------------------------------

pub struct Repairer<'a> {
    root: &'a Path,
    search_depth: usize,
}

impl<'a> Repairer<'a> {
    pub fn new(root: &'a Path, config: &Config) -> Self {
        Self {
            root,
            search_depth: config.repair.search_depth,
        }
    }

    /// Compute fixes for `errors` against `content`. Pure apart from the
    /// directory walk used to find link candidates.
    pub fn repair(&self, doc_path: &Path, content: &str, errors: &[ValidationIssue]) -> RepairOutcome {
        let mut outcome = RepairOutcome {
            changes: Vec::new(),
            unfixable: Vec::new(),
            content: content.to_string(),
        };

        for err in errors.iter().filter(|e| e.rule == RULE_BROKEN_LINK) {
            self.fix_link(doc_path, err, &mut outcome);
        }

        for err in errors.iter().filter(|e| e.rule == RULE_REQUIRED_SECTION) {
            fix_section(err, &mut outcome);
        }

        for err in errors {
            if err.rule != RULE_BROKEN_LINK && err.rule != RULE_REQUIRED_SECTION {
                outcome
                    .unfixable
                    .push(unfixable(err, format!("no automatic fix for '{}'", err.rule)));
            }
        }

        cleanup(&mut outcome);
        outcome
    }

    /// Repair the file at `doc_path`. `dry_run` computes the same outcome
    /// but skips the write.
    pub fn repair_file(
        &self,
        doc_path: &Path,
        errors: &[ValidationIssue],
        dry_run: bool,
    ) -> Result<RepairReport> {
        let abs = paths::absolute(self.root, doc_path);
        if !abs.is_file() {
            return Err(PdocsError::FileNotFound(doc_path.display().to_string()));
        }
        let content = std::fs::read_to_string(&abs)?;
        let outcome = self.repair(&abs, &content, errors);
        let written = !dry_run && outcome.content != content;
        if written {
            crate::io::replace_file(&abs, outcome.content.as_bytes())?;
            tracing::debug!(path = %abs.display(), changes = outcome.changes.len(), "repaired");
        }
        Ok(RepairReport {
            path: paths::registry_key(self.root, &abs),
            dry_run,
            written,
            outcome,
        })
    }

    // -----------------------------------------------------------------------
    // broken-link
    // -----------------------------------------------------------------------

    fn fix_link(&self, doc_path: &Path, err: &ValidationIssue, outcome: &mut RepairOutcome) {
        let Some(target) = err.reference.as_deref() else {
            outcome.unfixable.push(unfixable(err, "error carries no link target"));
            return;
        };
        let link = Link::new("", target, err.line.unwrap_or(0));
        let path_part = link.path_part();
        let Some(wanted) = Path::new(&path_part).file_name().and_then(|n| n.to_str()) else {
            outcome.unfixable.push(unfixable(err, "link target has no file name"));
            return;
        };

        let doc_dir = doc_path.parent().unwrap_or(self.root);
        let candidates = self.link_candidates(doc_dir, doc_path, wanted);
        if candidates.len() != 1 {
            outcome.unfixable.push(unfixable(
                err,
                format!(
                    "found {} candidate files for '{wanted}'; fix by hand",
                    candidates.len()
                ),
            ));
            return;
        }

        let Some(rel) = pathdiff::diff_paths(&candidates[0], doc_dir) else {
            outcome.unfixable.push(unfixable(err, "cannot express candidate relative to document"));
            return;
        };
        let suffix = &target[target
            .find(|c| c == '#' || c == '?')
            .unwrap_or(target.len())..];
        let new_target = format!("{}{suffix}", paths::to_slash(&rel));

        match rewrite_target(&outcome.content, err.line, target, &new_target) {
            Some(updated) => {
                outcome.content = updated;
                outcome.changes.push(RepairChange {
                    rule: RULE_BROKEN_LINK.to_string(),
                    description: format!("relinked '{target}' -> '{new_target}'"),
                    line: err.line,
                });
            }
            None => outcome
                .unfixable
                .push(unfixable(err, format!("could not locate link '{target}' in the text"))),
        }
    }

    /// Files under `doc_dir` (bounded depth) whose name matches `wanted`
    /// exactly; failing that, whose stem contains or is contained in the
    /// wanted stem, case-insensitively.
    fn link_candidates(&self, doc_dir: &Path, doc_path: &Path, wanted: &str) -> Vec<PathBuf> {
        let wanted_lower = wanted.to_lowercase();
        let wanted_stem = stem_lower(Path::new(wanted));
        let wanted_ext = ext_lower(Path::new(wanted));

        let files: Vec<PathBuf> = WalkDir::new(doc_dir)
            .max_depth(self.search_depth.max(1))
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.path() != doc_path)
            .map(|e| e.into_path())
            .collect();

        let exact: Vec<PathBuf> = files
            .iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase() == wanted_lower)
            })
            .cloned()
            .collect();
        if !exact.is_empty() || wanted_stem.len() < 3 {
            return exact;
        }

        files
            .into_iter()
            .filter(|p| ext_lower(p) == wanted_ext)
            .filter(|p| {
                let stem = stem_lower(p);
                stem.len() >= 3 && (stem.contains(&wanted_stem) || wanted_stem.contains(&stem))
            })
            .collect()
    }
}

fn unfixable(err: &ValidationIssue, reason: impl Into<String>) -> Unfixable {
    Unfixable {
        rule: err.rule.clone(),
        message: err.message.clone(),
        reason: reason.into(),
    }
}

fn stem_lower(p: &Path) -> String {
    p.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn ext_lower(p: &Path) -> String {
    p.extension()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Replace `old` with `new` where it is a whole link destination on
/// `line` (or anywhere when the line is unknown).
fn rewrite_target(content: &str, line: Option<usize>, old: &str, new: &str) -> Option<String> {
    // (opener, closer) pairs; an empty closer means a bare destination.
    let forms = [("](", ""), ("](<", ">"), ("]: ", ""), ("]: <", ">")];
    let mut hit = false;
    let rewritten: Vec<String> = content
        .split('\n')
        .enumerate()
        .map(|(i, text)| {
            if line.is_some_and(|l| l != i + 1) {
                return text.to_string();
            }
            let mut t = text.to_string();
            for (open, close) in forms {
                let from = format!("{open}{old}{close}");
                let to = format!("{open}{new}{close}");
                if let Some(updated) = replace_destination(&t, &from, &to, close.is_empty()) {
                    t = updated;
                    hit = true;
                }
            }
            t
        })
        .collect();
    hit.then(|| rewritten.join("\n"))
}

/// Replace each `from` in `text`. A bare destination only counts when it
/// ends at `)`, whitespace or the end of the line.
fn replace_destination(text: &str, from: &str, to: &str, bare: bool) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut hit = false;
    for (at, _) in text.match_indices(from) {
        let end = at + from.len();
        let whole = !bare
            || text[end..]
                .chars()
                .next()
                .map_or(true, |c| c == ')' || c.is_whitespace());
        if !whole {
            continue;
        }
        out.push_str(&text[last..at]);
        out.push_str(to);
        last = end;
        hit = true;
    }
    if !hit {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

// ---------------------------------------------------------------------------
// required-section
// ---------------------------------------------------------------------------

fn fix_section(err: &ValidationIssue, outcome: &mut RepairOutcome) {
    let Some(section) = err.reference.clone() else {
        outcome
            .unfixable
            .push(unfixable(err, "error does not name the section"));
        return;
    };
    // An earlier fix in this pass may already have added it.
    if missing_sections(&outcome.content, std::slice::from_ref(&section)).is_empty() {
        return;
    }

    let level = section_level(&markdown::headings(&outcome.content));
    let content = &mut outcome.content;
    let body = content.trim_end().len();
    content.truncate(body);
    if !content.is_empty() {
        content.push_str("\n\n");
    }
    let line = content.lines().count() + 1;
    content.push_str(&format!(
        "{} {section}\n\n{}\n",
        "#".repeat(level as usize),
        placeholder_line()
    ));
    outcome.changes.push(RepairChange {
        rule: RULE_REQUIRED_SECTION.to_string(),
        description: format!("added section '{section}'"),
        line: Some(line),
    });
}

// ---------------------------------------------------------------------------
// Clean-ups
// ---------------------------------------------------------------------------

fn cleanup(outcome: &mut RepairOutcome) {
    if outcome.content.is_empty() {
        return;
    }

    let mut trimmed_lines = 0;
    let lines: Vec<&str> = outcome
        .content
        .split('\n')
        .map(|l| {
            let t = l.trim_end();
            if t.len() != l.len() {
                trimmed_lines += 1;
            }
            t
        })
        .collect();
    let mut text = lines.join("\n");
    if trimmed_lines > 0 {
        outcome.changes.push(RepairChange {
            rule: CHANGE_TRAILING_WHITESPACE.to_string(),
            description: format!("trimmed trailing whitespace on {trimmed_lines} line(s)"),
            line: None,
        });
    }

    let body = text.trim_end_matches('\n').len();
    let needs_newline_fix = text.len() != body + 1;
    text.truncate(body);
    text.push('\n');
    if needs_newline_fix {
        outcome.changes.push(RepairChange {
            rule: CHANGE_FINAL_NEWLINE.to_string(),
            description: "ensured exactly one trailing newline".to_string(),
            line: None,
        });
    }
    outcome.content = text;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
