//! Template Resolver.
//!
//! Candidate locations for a type, searched in tier order:
//!
//! | Tier      | Locations                                                    |
//! |-----------|--------------------------------------------------------------|
//! | `skill`   | `.claude/skills/<skill>/templates/<type>.md`, `<skill>/<type>-template.md` |
//! | `project` | `.pdocs/templates/<type>.md`, `templates/<type>.md`          |
//! | `shared`  | `.claude/templates/<type>.md`, `docs/templates/<type>.md`, `templates.dirs` |
//!
//! Not finding a template is `None`, not an error; callers choose severity.

use crate::config::Config;
use crate::error::{PdocsError, Result};
use crate::paths;
use crate::rules::RuleSet;
use crate::types::DocType;
use crate::validate::placeholder_line;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    Skill,
    Project,
    Shared,
    Remote,
    Skeleton,
}

impl TemplateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateSource::Skill => "skill",
            TemplateSource::Project => "project",
            TemplateSource::Shared => "shared",
            TemplateSource::Remote => "remote",
            TemplateSource::Skeleton => "skeleton",
        }
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub content: String,
    pub source: TemplateSource,
    /// File or URL the content came from; `None` for skeletons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

pub struct TemplateResolver<'a> {
    root: &'a Path,
    config: &'a Config,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(root: &'a Path, config: &'a Config) -> Self {
        Self { root, config }
    }

    /// Every location searched for `doc_type`, highest priority first.
    pub fn candidates(&self, doc_type: DocType) -> Vec<(TemplateSource, PathBuf)> {
        let name = format!("{}.md", doc_type.as_str());
        let rules = RuleSet::for_type(doc_type, self.config);
        let mut out = Vec::new();

        if let Some(skill) = &rules.skill {
            let dir = paths::skill_dir(self.root, skill);
            out.push((TemplateSource::Skill, dir.join("templates").join(&name)));
            out.push((
                TemplateSource::Skill,
                dir.join(format!("{}-template.md", doc_type.as_str())),
            ));
        }

        out.push((TemplateSource::Project, paths::templates_dir(self.root).join(&name)));
        out.push((
            TemplateSource::Project,
            self.root.join(paths::ROOT_TEMPLATES_DIR).join(&name),
        ));

        out.push((
            TemplateSource::Shared,
            self.root.join(paths::SHARED_TEMPLATES_DIR).join(&name),
        ));
        out.push((
            TemplateSource::Shared,
            self.root.join(paths::DOCS_TEMPLATES_DIR).join(&name),
        ));
        for dir in &self.config.templates.dirs {
            out.push((
                TemplateSource::Shared,
                paths::absolute(self.root, Path::new(dir)).join(&name),
            ));
        }
        out
    }

    /// First existing candidate, or `None`.
    pub fn resolve(&self, doc_type: DocType) -> Result<Option<Template>> {
        for (source, path) in self.candidates(doc_type) {
            if !path.is_file() {
                tracing::debug!(tier = %source, path = %path.display(), "template candidate absent");
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            tracing::debug!(tier = %source, path = %path.display(), "template resolved");
            return Ok(Some(Template {
                content,
                source,
                origin: Some(paths::registry_key(self.root, &path)),
            }));
        }
        Ok(None)
    }

    /// [`resolve`](Self::resolve), falling back to a skeleton built from the
    /// type's required sections.
    pub fn resolve_or_skeleton(&self, doc_type: DocType) -> Result<Template> {
        if let Some(t) = self.resolve(doc_type)? {
            return Ok(t);
        }
        Ok(Template {
            content: skeleton(&RuleSet::for_type(doc_type, self.config)),
            source: TemplateSource::Skeleton,
            origin: None,
        })
    }

    pub fn fetch_remote(&self, reference: &str) -> Result<Template> {
        let url = expand_remote(reference);
        let content = fetch_remote(&url, Duration::from_secs(self.config.remote.timeout_secs))?;
        Ok(Template {
            content,
            source: TemplateSource::Remote,
            origin: Some(url),
        })
    }
}

// ---------------------------------------------------------------------------
// Skeleton
// ---------------------------------------------------------------------------

/// Minimal document for a type with no template: frontmatter for required
/// fields, a title, and each required section holding a placeholder.
pub fn skeleton(rules: &RuleSet) -> String {
    let mut out = String::new();
    if !rules.required_fields.is_empty() {
        out.push_str("---\n");
        for field in &rules.required_fields {
            out.push_str(&format!("{field}: {{{{{field}}}}}\n"));
        }
        out.push_str("---\n\n");
    }
    out.push_str("# {{title}}\n");
    for section in &rules.required_sections {
        out.push_str(&format!("\n## {section}\n\n{}\n", placeholder_line()));
    }
    out
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub content: String,
    /// Placeholder keys still present, deduplicated, in first-seen order.
    pub unresolved: Vec<String>,
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| {
        let key = r"([A-Za-z_][A-Za-z0-9_.\-]*)";
        Regex::new(&format!(
            r"\{{\{{\s*{key}\s*\}}\}}|\$\{{{key}\}}|\{{{key}\}}|\[{key}\]"
        ))
        .unwrap()
    })
}

/// A `[word]` that is really markdown: link text, a reference definition,
/// or a task-list checkbox.
fn is_markdown_bracket(content: &str, caps: &Captures<'_>, key: &str) -> bool {
    let m = caps.get(0).map_or(0..0, |m| m.range());
    let next = content[m.end..].chars().next();
    if matches!(next, Some('(') | Some('[') | Some(':')) {
        return true;
    }
    let prev = content[..m.start].chars().next_back();
    if prev == Some(']') {
        return true;
    }
    key.eq_ignore_ascii_case("x")
}

/// Replace `{{key}}`, `${key}`, `{key}` and `[key]` with `vars[key]` in one
/// pass. Anything left untouched is reported, never an error.
pub fn substitute(content: &str, vars: &BTreeMap<String, String>) -> Substitution {
    let mut unresolved: Vec<String> = Vec::new();
    let mut out = String::with_capacity(content.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(content) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let bracket = caps.get(4);
        let Some(key) = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .or(bracket)
            .map(|m| m.as_str())
        else {
            continue;
        };

        out.push_str(&content[last..whole.start()]);
        last = whole.end();

        match vars.get(key) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str(whole.as_str());
                if bracket.is_some() && is_markdown_bracket(content, &caps, key) {
                    continue;
                }
                if !unresolved.iter().any(|k| k == key) {
                    unresolved.push(key.to_string());
                }
            }
        }
    }
    out.push_str(&content[last..]);

    Substitution {
        content: out,
        unresolved,
    }
}

/// Parse `key=value` pairs; the first `=` splits.
pub fn parse_vars<S: AsRef<str>>(pairs: &[S]) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (k, v) = pair
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| PdocsError::InvalidConfig(format!("expected key=value, got '{pair}'")))?;
        vars.insert(k.trim().to_string(), v.to_string());
    }
    Ok(vars)
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Expand short forms to a fetchable URL:
///
/// - `gh:owner/repo/path/to/file.md[@ref]` → raw.githubusercontent.com
/// - `https://github.com/o/r/blob/<ref>/<path>` → raw.githubusercontent.com
///
/// Anything else is returned unchanged.
pub fn expand_remote(reference: &str) -> String {
    let reference = reference.trim();
    if let Some(rest) = reference.strip_prefix("gh:") {
        let (spec, git_ref) = match rest.rsplit_once('@') {
            Some((s, r)) if !r.is_empty() => (s, r),
            _ => (rest, "HEAD"),
        };
        let mut parts = spec.splitn(3, '/');
        if let (Some(owner), Some(repo), Some(path)) = (parts.next(), parts.next(), parts.next()) {
            return format!("https://raw.githubusercontent.com/{owner}/{repo}/{git_ref}/{path}");
        }
        return reference.to_string();
    }
    if let Some(rest) = reference.strip_prefix("https://github.com/") {
        let parts: Vec<&str> = rest.splitn(4, '/').collect();
        if parts.len() == 4 && parts[2] == "blob" {
            if let Some((git_ref, path)) = parts[3].split_once('/') {
                return format!(
                    "https://raw.githubusercontent.com/{}/{}/{git_ref}/{path}",
                    parts[0], parts[1]
                );
            }
        }
    }
    reference.to_string()
}

/// GET `url` and return the body. Non-2xx responses keep their status.
pub fn fetch_remote(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pdocs/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PdocsError::Http(e.to_string()))?;
    let resp = client
        .get(url)
        .send()
        .map_err(|e| PdocsError::Http(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PdocsError::RemoteFetch {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().map_err(|e| PdocsError::Http(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
