//! Link extraction and verification.
//!
//! Links are classified purely from the target string: a leading `#` is an
//! anchor, a URL scheme is external, anything else is internal (a path
//! relative to the containing document, or to the project root when it
//! starts with `/`).

use crate::markdown;
use crate::types::LinkKind;
use crate::validate::ValidationIssue;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const RULE_BROKEN_LINK: &str = "broken-link";
pub const RULE_BROKEN_ANCHOR: &str = "broken-anchor";
pub const RULE_CROSS_ANCHOR: &str = "cross-document-anchor";
pub const RULE_LOCALHOST: &str = "localhost-link";

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub target: String,
    /// 1-indexed line where the link's opening bracket sits.
    pub line: usize,
    pub kind: LinkKind,
}

impl Link {
    pub(crate) fn new(text: &str, target: &str, line: usize) -> Self {
        Self {
            text: text.to_string(),
            target: target.to_string(),
            line,
            kind: classify_target(target),
        }
    }

    /// Path part of an internal target (before `#` / `?`), percent-decoded.
    pub fn path_part(&self) -> String {
        let end = self
            .target
            .find(|c| c == '#' || c == '?')
            .unwrap_or(self.target.len());
        percent_decode(&self.target[..end])
    }

    /// Fragment after `#`, if any.
    pub fn fragment(&self) -> Option<String> {
        let (_, frag) = self.target.split_once('#')?;
        Some(percent_decode(frag))
    }
}

static SCHEME_RE: OnceLock<Regex> = OnceLock::new();

fn scheme_re() -> &'static Regex {
    SCHEME_RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap())
}

pub fn classify_target(target: &str) -> LinkKind {
    if target.starts_with('#') {
        LinkKind::Anchor
    } else if target.starts_with("//") || scheme_re().is_match(target) {
        LinkKind::External
    } else {
        LinkKind::Internal
    }
}

/// Percent-decode a target component; undecodable text is kept as written.
fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| s.to_string())
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

static INLINE_RE: OnceLock<Regex> = OnceLock::new();

fn inline_re() -> &'static Regex {
    INLINE_RE.get_or_init(|| {
        Regex::new(
            r#"!?\[((?:[^\[\]]|\[[^\]]*\])*)\]\(\s*(?:<([^>]*)>|([^\s)]*))(?:\s+(?:"[^"]*"|'[^']*'|\([^)]*\)))?\s*\)"#,
        )
        .unwrap()
    })
}

static REFERENCE_RE: OnceLock<Regex> = OnceLock::new();

fn reference_re() -> &'static Regex {
    REFERENCE_RE.get_or_init(|| {
        Regex::new(r#"^ {0,3}\[([^\]^][^\]]*)\]:\s*(?:<([^>]*)>|(\S+))"#).unwrap()
    })
}

static AUTOLINK_RE: OnceLock<Regex> = OnceLock::new();

fn autolink_re() -> &'static Regex {
    AUTOLINK_RE.get_or_init(|| Regex::new(r"<([A-Za-z][A-Za-z0-9+.\-]*://[^>\s]+)>").unwrap())
}

/// Blank out inline code spans so their contents never look like links.
/// Byte offsets are preserved.
fn mask_code_spans(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let run = bytes[i..].iter().take_while(|b| **b == b'`').count();
        let open_end = i + run;
        let mut j = open_end;
        let mut closed = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let r = bytes[j..].iter().take_while(|b| **b == b'`').count();
                if r == run {
                    closed = Some(j);
                    break;
                }
                j += r;
            } else {
                j += 1;
            }
        }
        match closed {
            Some(close) => {
                for b in &mut out[open_end..close] {
                    *b = b' ';
                }
                i = close + run;
            }
            None => i = open_end,
        }
    }
    // Whole spans between ASCII backticks are blanked, so this stays UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| line.to_string())
}

/// Every link in `content`, in document order. Links inside fenced code,
/// inline code spans and frontmatter are ignored.
pub fn extract_links(content: &str) -> Vec<Link> {
    let mut links = Vec::new();
    for line in markdown::lines(content).into_iter().filter(|l| l.is_prose()) {
        let masked = mask_code_spans(line.text);

        if let Some(caps) = reference_re().captures(&masked) {
            let target = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            links.push(Link::new(&caps[1], target, line.number));
            continue;
        }

        for caps in inline_re().captures_iter(&masked) {
            let target = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            if target.is_empty() {
                continue;
            }
            links.push(Link::new(&caps[1], target, line.number));
        }

        for caps in autolink_re().captures_iter(&masked) {
            links.push(Link::new(&caps[1], &caps[1], line.number));
        }
    }
    links
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LinkReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Verifies links against the filesystem. External links are never fetched.
pub struct LinkChecker<'a> {
    root: &'a Path,
    cross_document_anchors: bool,
    anchor_cache: HashMap<PathBuf, Option<HashSet<String>>>,
}

impl<'a> LinkChecker<'a> {
    pub fn new(root: &'a Path, cross_document_anchors: bool) -> Self {
        Self {
            root,
            cross_document_anchors,
            anchor_cache: HashMap::new(),
        }
    }

    /// Resolve an internal link's path part for a document at `doc_path`.
    pub fn resolve(&self, doc_path: &Path, link: &Link) -> PathBuf {
        let part = link.path_part();
        let resolved = match part.strip_prefix('/') {
            Some(rooted) => self.root.join(rooted),
            None => doc_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&part),
        };
        crate::paths::normalize(&resolved)
    }

    pub fn check(&mut self, doc_path: &Path, content: &str) -> LinkReport {
        let own_anchors = markdown::anchors(content);
        let mut report = LinkReport::default();
        for link in extract_links(content) {
            match link.kind {
                LinkKind::Internal => self.check_internal(doc_path, &link, &mut report),
                LinkKind::Anchor => check_anchor(&own_anchors, &link, &mut report),
                LinkKind::External => check_external(&link, &mut report),
            }
        }
        report
    }

    fn check_internal(&mut self, doc_path: &Path, link: &Link, report: &mut LinkReport) {
        let resolved = self.resolve(doc_path, link);
        if !resolved.exists() {
            let shown = crate::paths::registry_key(self.root, &resolved);
            report.errors.push(
                ValidationIssue::new(
                    RULE_BROKEN_LINK,
                    format!("Link target '{}' does not exist ({shown})", link.target),
                )
                .at_line(link.line)
                .with_reference(&link.target)
                .with_suggestion(format!("Create {shown} or correct the link target")),
            );
            return;
        }

        if !self.cross_document_anchors || !resolved.is_file() {
            return;
        }
        let Some(fragment) = link.fragment().filter(|f| !f.is_empty()) else {
            return;
        };
        let Some(anchors) = self.anchors_of(&resolved) else {
            return;
        };
        if !anchors.contains(&fragment) {
            report.warnings.push(
                ValidationIssue::new(
                    RULE_CROSS_ANCHOR,
                    format!(
                        "Anchor '#{fragment}' not found in '{}'",
                        link.path_part()
                    ),
                )
                .at_line(link.line)
                .with_reference(&link.target),
            );
        }
    }

    /// Anchors defined by a markdown file, cached per run. Non-markdown or
    /// unreadable targets are skipped.
    fn anchors_of(&mut self, path: &Path) -> Option<&HashSet<String>> {
        self.anchor_cache
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                let ext = path.extension()?.to_str()?.to_lowercase();
                if !matches!(ext.as_str(), "md" | "markdown" | "mdx") {
                    return None;
                }
                match std::fs::read_to_string(path) {
                    Ok(text) => Some(markdown::anchors(&text)),
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "cannot read link target");
                        None
                    }
                }
            })
            .as_ref()
    }
}

fn check_anchor(anchors: &HashSet<String>, link: &Link, report: &mut LinkReport) {
    let fragment = link.fragment().unwrap_or_default();
    if fragment.is_empty() || anchors.contains(&fragment) {
        return;
    }
    let mut issue = ValidationIssue::new(
        RULE_BROKEN_ANCHOR,
        format!("No heading in this document produces anchor '#{fragment}'"),
    )
    .at_line(link.line)
    .with_reference(&link.target);
    let guess = markdown::slugify(&fragment);
    if anchors.contains(&guess) {
        issue = issue.with_suggestion(format!("Use '#{guess}'"));
    } else {
        issue = issue.with_suggestion("Add the heading or point the link at an existing one");
    }
    report.errors.push(issue);
}

fn check_external(link: &Link, report: &mut LinkReport) {
    let Ok(url) = reqwest::Url::parse(&link.target) else {
        return;
    };
    let Some(host) = url.host_str() else {
        return;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let loopback = host.eq_ignore_ascii_case("localhost")
        || host.to_ascii_lowercase().ends_with(".localhost")
        || host
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified());
    if loopback {
        report.warnings.push(
            ValidationIssue::new(
                RULE_LOCALHOST,
                format!("Link points at a local address: {}", link.target),
            )
            .at_line(link.line)
            .with_reference(&link.target),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
