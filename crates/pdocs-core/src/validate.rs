//! Validation Engine: one verdict per document.
//!
//! Phases run in a fixed order and their issues are concatenated:
//!
//! 1. structure: required sections and frontmatter fields
//! 2. pattern rules and leftover placeholders
//! 3. links (skippable per run)
//! 4. external scripts attached to the type's skill
//!
//! Structural problems are data, never `Err`.

use crate::config::Config;
use crate::error::{PdocsError, Result};
use crate::links::LinkChecker;
use crate::markdown::{self, Heading};
use crate::paths;
use crate::rules::RuleSet;
use crate::script::{load_scripts, NoScript, ScriptInput, ValidationScript};
use crate::types::DocType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const RULE_REQUIRED_SECTION: &str = "required-section";
pub const RULE_REQUIRED_FIELD: &str = "required-field";
pub const RULE_INVALID_FRONTMATTER: &str = "invalid-frontmatter";
pub const RULE_NAME_MISMATCH: &str = "name-mismatch";
pub const RULE_PLACEHOLDER: &str = "placeholder-content";

/// Inserted by the repairer into stub sections and by skeleton templates.
pub const PLACEHOLDER_MARKER: &str = "TODO(pdocs)";

pub fn placeholder_line() -> String {
    format!("<!-- {PLACEHOLDER_MARKER}: fill in this section -->")
}

// ---------------------------------------------------------------------------
// Issues and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable taxonomy key; drives display and repair eligibility.
    pub rule: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ValidationIssue {
    pub fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
            suggestion: None,
            line: None,
            reference: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// `valid` is derived from `errors`, never set independently.
    pub fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Whether this result passes; strict mode also fails on warnings.
    pub fn passes(&self, strict: bool) -> bool {
        self.valid && (!strict || self.warnings.is_empty())
    }

    pub fn has_error(&self, rule: &str) -> bool {
        self.errors.iter().any(|e| e.rule == rule)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    pub check_links: bool,
    pub cross_document_anchors: bool,
    pub run_scripts: bool,
}

impl ValidateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            check_links: config.validation.check_links,
            cross_document_anchors: config.validation.cross_document_anchors,
            run_scripts: config.validation.scripts_enabled,
        }
    }
}

// ---------------------------------------------------------------------------
// Section helpers (shared with the repairer)
// ---------------------------------------------------------------------------

fn section_matches(heading: &str, required: &str) -> bool {
    let h = markdown::normalize_section(heading);
    let r = markdown::normalize_section(required);
    if r.is_empty() {
        return true;
    }
    format!(" {h} ").contains(&format!(" {r} "))
}

/// Required sections with no matching heading, in rule order.
pub fn missing_sections(content: &str, required: &[String]) -> Vec<String> {
    let headings = markdown::headings(content);
    required
        .iter()
        .filter(|req| !headings.iter().any(|h| section_matches(&h.text, req)))
        .cloned()
        .collect()
}

/// Level for a newly added section: 2 under a single H1 title, otherwise
/// the shallowest level already in use.
pub fn section_level(headings: &[Heading]) -> u8 {
    let h1s = headings.iter().filter(|h| h.level == 1).count();
    if h1s == 1 {
        return 2;
    }
    headings.iter().map(|h| h.level).min().unwrap_or(2)
}

/// Name the frontmatter `name` field is expected to carry: the skill
/// directory for `SKILL.md`, else the file stem.
fn expected_name(doc_path: &Path) -> Option<String> {
    let file = doc_path.file_name()?.to_str()?;
    if file.eq_ignore_ascii_case("skill.md") {
        return doc_path
            .parent()?
            .file_name()?
            .to_str()
            .map(str::to_string);
    }
    doc_path.file_stem()?.to_str().map(str::to_string)
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct Validator<'a> {
    root: &'a Path,
    config: &'a Config,
    options: ValidateOptions,
}

impl<'a> Validator<'a> {
    pub fn new(root: &'a Path, config: &'a Config) -> Self {
        Self {
            root,
            config,
            options: ValidateOptions::from_config(config),
        }
    }

    pub fn with_options(mut self, options: ValidateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ValidateOptions {
        self.options
    }

    /// Read `doc_path` and validate it. A missing file is an input error.
    pub fn validate_file(&self, doc_path: &Path, doc_type: DocType) -> Result<ValidationResult> {
        let abs = paths::absolute(self.root, doc_path);
        if !abs.is_file() {
            return Err(PdocsError::FileNotFound(doc_path.display().to_string()));
        }
        let content = std::fs::read_to_string(&abs)?;
        Ok(self.validate(&abs, doc_type, &content))
    }

    pub fn validate(&self, doc_path: &Path, doc_type: DocType, content: &str) -> ValidationResult {
        let rules = RuleSet::for_type(doc_type, self.config);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_structure(doc_path, &rules, content, &mut errors, &mut warnings);
        check_patterns(&rules, content, &mut errors, &mut warnings);

        if self.options.check_links {
            let mut checker = LinkChecker::new(self.root, self.options.cross_document_anchors);
            let report = checker.check(doc_path, content);
            errors.extend(report.errors);
            warnings.extend(report.warnings);
        }

        if self.options.run_scripts {
            let input = ScriptInput {
                content,
                doc_path,
                doc_type: doc_type.as_str(),
                root: self.root,
            };
            for script in self.scripts_for(&rules) {
                tracing::debug!(script = %script.name(), "running validation script");
                let outcome = script.run(&input);
                errors.extend(outcome.errors);
                warnings.extend(outcome.warnings);
            }
        }

        tracing::debug!(
            path = %doc_path.display(),
            doc_type = %doc_type,
            errors = errors.len(),
            warnings = warnings.len(),
            "validated"
        );
        ValidationResult::from_issues(errors, warnings)
    }

    fn scripts_for(&self, rules: &RuleSet) -> Vec<Box<dyn ValidationScript>> {
        let Some(skill) = &rules.skill else {
            return vec![Box::new(NoScript)];
        };
        let dir = paths::skill_dir(self.root, skill);
        if rules.scripts.is_empty() || !dir.is_dir() {
            return vec![Box::new(NoScript)];
        }
        load_scripts(&dir, &rules.scripts, self.config.validation.script_timeout())
    }

    fn check_structure(
        &self,
        doc_path: &Path,
        rules: &RuleSet,
        content: &str,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        if !rules.required_sections.is_empty() {
            let level = section_level(&markdown::headings(content));
            let hashes = "#".repeat(level as usize);
            for section in missing_sections(content, &rules.required_sections) {
                errors.push(
                    ValidationIssue::new(
                        RULE_REQUIRED_SECTION,
                        format!("Missing required section '{section}'"),
                    )
                    .with_reference(section.as_str())
                    .with_suggestion(format!("Add a '{hashes} {section}' section")),
                );
            }
        }

        if rules.required_fields.is_empty() && !rules.name_matches_file {
            return;
        }
        let fm = match markdown::frontmatter(content) {
            Ok(fm) => fm,
            Err(e) => {
                errors.push(
                    ValidationIssue::new(
                        RULE_INVALID_FRONTMATTER,
                        format!("Frontmatter is not valid YAML: {e}"),
                    )
                    .at_line(1),
                );
                return;
            }
        };
        let fm = fm.unwrap_or_default();

        for field in &rules.required_fields {
            let present = markdown::frontmatter_str(&fm, field).is_some_and(|v| !v.trim().is_empty());
            if !present {
                errors.push(
                    ValidationIssue::new(
                        RULE_REQUIRED_FIELD,
                        format!("Missing required frontmatter field '{field}'"),
                    )
                    .with_reference(field.as_str())
                    .with_suggestion(format!("Add '{field}: ...' to the frontmatter block")),
                );
            }
        }

        if rules.name_matches_file {
            if let (Some(name), Some(expected)) =
                (markdown::frontmatter_str(&fm, "name"), expected_name(doc_path))
            {
                if !name.trim().is_empty() && name.trim() != expected {
                    warnings.push(
                        ValidationIssue::new(
                            RULE_NAME_MISMATCH,
                            format!("Frontmatter name '{}' does not match '{expected}'", name.trim()),
                        )
                        .with_suggestion(format!("Rename to '{expected}' or move the file")),
                    );
                }
            }
        }
    }
}

fn check_patterns(
    rules: &RuleSet,
    content: &str,
    errors: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for rule in &rules.patterns {
        let re = match Regex::new(&rule.pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(rule = %rule.id, error = %e, "skipping malformed pattern rule");
                continue;
            }
        };
        if !re.is_match(content) {
            errors.push(ValidationIssue::new(&rule.id, rule.message.as_str()));
        }
    }

    for line in markdown::lines(content) {
        if line.text.contains(PLACEHOLDER_MARKER) {
            warnings.push(
                ValidationIssue::new(RULE_PLACEHOLDER, "Section still contains placeholder text")
                    .at_line(line.number),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeOverride;
    use crate::links::{RULE_BROKEN_ANCHOR, RULE_BROKEN_LINK};
    use crate::rules::PatternRule;
    use tempfile::TempDir;

    const PLAN: &str = "# Auth rollout\n\n## Overview\n\nText.\n\n## Goals\n\n- ship\n\n## Tasks\n\n- [ ] do it\n\n## Risks\n\nNone.\n";

    fn write(root: &Path, rel: &str, content: &str) -> std::path::PathBuf {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn complete_plan_is_valid() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let p = write(dir.path(), "docs/plans/P-01-auth.md", PLAN);
        let res = Validator::new(dir.path(), &cfg).validate_file(&p, DocType::Plan).unwrap();
        assert!(res.valid, "{:?}", res.errors);
        assert!(res.errors.is_empty());
    }

    #[test]
    fn removed_section_yields_one_error() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let content = PLAN.replace("## Risks\n\nNone.\n", "");
        let p = dir.path().join("plan.md");
        let res = Validator::new(dir.path(), &cfg).validate(&p, DocType::Plan, &content);
        assert!(!res.valid);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].rule, RULE_REQUIRED_SECTION);
        assert_eq!(res.errors[0].reference.as_deref(), Some("Risks"));
        assert_eq!(
            res.errors[0].suggestion.as_deref(),
            Some("Add a '## Risks' section")
        );
    }

    #[test]
    fn section_match_is_partial_and_case_insensitive() {
        let content = "# T\n## 1. overview of the system\n## GOALS & non-goals\n";
        let missing = missing_sections(
            content,
            &["Overview".to_string(), "Goals".to_string(), "Tasks".to_string()],
        );
        assert_eq!(missing, vec!["Tasks".to_string()]);
    }

    #[test]
    fn section_match_respects_word_boundaries() {
        let content = "# T\n## Roadmap\n";
        assert_eq!(
            missing_sections(content, &["Map".to_string()]),
            vec!["Map".to_string()]
        );
    }

    #[test]
    fn headings_in_code_do_not_count() {
        let content = "# T\n```\n## Risks\n```\n";
        assert_eq!(
            missing_sections(content, &["Risks".to_string()]),
            vec!["Risks".to_string()]
        );
    }

    #[test]
    fn section_level_rules() {
        let h = markdown::headings("# Title\n## A\n");
        assert_eq!(section_level(&h), 2);
        let h = markdown::headings("# A\n# B\n");
        assert_eq!(section_level(&h), 1);
        let h = markdown::headings("### deep\n");
        assert_eq!(section_level(&h), 3);
        assert_eq!(section_level(&[]), 2);
    }

    #[test]
    fn pattern_failure_uses_rule_id() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let content = PLAN.replace("# Auth rollout\n", "");
        let res = Validator::new(dir.path(), &cfg).validate(
            &dir.path().join("p.md"),
            DocType::Plan,
            &content,
        );
        assert!(res.has_error("title"));
    }

    #[test]
    fn malformed_pattern_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.types.insert(
            "plan".into(),
            TypeOverride {
                patterns: Some(vec![
                    PatternRule::new("broken", "([unclosed", "never"),
                    PatternRule::new("owner", r"(?m)^Owner:", "Plan needs an Owner: line"),
                ]),
                ..Default::default()
            },
        );
        let res = Validator::new(dir.path(), &cfg).validate(
            &dir.path().join("p.md"),
            DocType::Plan,
            PLAN,
        );
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].rule, "owner");
    }

    #[test]
    fn placeholder_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let content = format!("{PLAN}\n## Notes\n\n{}\n", placeholder_line());
        let res = Validator::new(dir.path(), &cfg).validate(
            &dir.path().join("p.md"),
            DocType::Plan,
            &content,
        );
        assert!(res.valid);
        assert_eq!(res.warnings.len(), 1);
        assert_eq!(res.warnings[0].rule, RULE_PLACEHOLDER);
        assert!(!res.passes(true));
        assert!(res.passes(false));
    }

    #[test]
    fn broken_link_then_fixed_by_creating_target() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let content = format!("{PLAN}\nSee [x](missing-file.md).\n");
        let p = write(dir.path(), "docs/a/b.md", &content);
        let v = Validator::new(dir.path(), &cfg);

        let res = v.validate_file(&p, DocType::Plan).unwrap();
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].rule, RULE_BROKEN_LINK);
        assert_eq!(res.errors[0].line, Some(19));

        write(dir.path(), "docs/a/missing-file.md", "# Here\n");
        assert!(v.validate_file(&p, DocType::Plan).unwrap().valid);
    }

    #[test]
    fn broken_anchor_then_fixed() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let v = Validator::new(dir.path(), &cfg);
        let p = dir.path().join("README.md");
        let bad = "# Intro\n\n## Usage\n\n## Setup\n\n[x](#not-a-heading)\n";
        let res = v.validate(&p, DocType::Readme, bad);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].rule, RULE_BROKEN_ANCHOR);

        let good = bad.replace("#not-a-heading", "#setup");
        assert!(v.validate(&p, DocType::Readme, &good).valid);
    }

    #[test]
    fn links_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let opts = ValidateOptions {
            check_links: false,
            ..ValidateOptions::from_config(&cfg)
        };
        let v = Validator::new(dir.path(), &cfg).with_options(opts);
        let content = format!("{PLAN}\n[x](nope.md)\n");
        assert!(v.validate(&dir.path().join("p.md"), DocType::Plan, &content).valid);
    }

    #[test]
    fn agent_frontmatter_fields_and_name() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let v = Validator::new(dir.path(), &cfg);
        let p = dir.path().join(".claude/agents/reviewer.md");

        let res = v.validate(&p, DocType::Agent, "---\nname: reviewer\n---\nBody\n");
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].rule, RULE_REQUIRED_FIELD);
        assert_eq!(res.errors[0].reference.as_deref(), Some("description"));

        let res = v.validate(
            &p,
            DocType::Agent,
            "---\nname: critic\ndescription: Reviews code\n---\nBody\n",
        );
        assert!(res.valid);
        assert_eq!(res.warnings[0].rule, RULE_NAME_MISMATCH);
    }

    #[test]
    fn skill_name_compares_with_directory() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let v = Validator::new(dir.path(), &cfg);
        let p = dir.path().join(".claude/skills/writing-plans/SKILL.md");
        let res = v.validate(
            &p,
            DocType::Skill,
            "---\nname: writing-plans\ndescription: Plans\n---\n# Writing plans\n",
        );
        assert!(res.valid);
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn invalid_frontmatter_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let res = Validator::new(dir.path(), &cfg).validate(
            &dir.path().join("c.md"),
            DocType::Command,
            "---\ndescription: [unclosed\n---\n",
        );
        assert!(res.has_error(RULE_INVALID_FRONTMATTER));
    }

    #[test]
    fn missing_file_is_input_error() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let err = Validator::new(dir.path(), &cfg)
            .validate_file(Path::new("nope.md"), DocType::Plan)
            .unwrap_err();
        assert!(matches!(err, PdocsError::FileNotFound(_)));
    }

    #[test]
    fn missing_script_warns_when_skill_dir_exists() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        std::fs::create_dir_all(dir.path().join(".claude/skills/managing-memory")).unwrap();
        let res = Validator::new(dir.path(), &cfg).validate(
            &dir.path().join("CLAUDE.md"),
            DocType::MemoryFile,
            "# Project memory\n",
        );
        assert!(res.valid);
        assert_eq!(res.warnings.len(), 1);
        assert_eq!(res.warnings[0].rule, crate::script::RULE_SCRIPT_MISSING);
    }

    #[test]
    fn no_skill_dir_means_no_scripts() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::default();
        let res = Validator::new(dir.path(), &cfg).validate(
            &dir.path().join("CLAUDE.md"),
            DocType::MemoryFile,
            "# Project memory\n",
        );
        assert!(res.valid && res.warnings.is_empty());
    }
}
