//! Markdown structure shared by the link analyzer, validator and repairer.
//!
//! Only the structure pdocs cares about is parsed: YAML frontmatter, ATX
//! headings and fenced code blocks. Everything else is opaque text.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

/// One source line with its 1-indexed number and whether it sits inside
/// frontmatter or a fenced code block.
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    pub number: usize,
    pub text: &'a str,
    pub in_frontmatter: bool,
    pub in_code: bool,
}

impl Line<'_> {
    pub fn is_prose(&self) -> bool {
        !self.in_frontmatter && !self.in_code
    }
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let run = rest.chars().take_while(|c| *c == ch).count();
    (run >= 3).then_some((ch, run))
}

/// Classify every line of `content`. Fence delimiters count as code.
pub fn lines(content: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let fm_end = frontmatter_end(content);
    let mut fence: Option<(char, usize)> = None;

    for (i, text) in content.lines().enumerate() {
        let number = i + 1;
        let in_frontmatter = fm_end.is_some_and(|end| number <= end);
        let mut in_code = false;
        if !in_frontmatter {
            match (fence, fence_marker(text)) {
                (None, Some(open)) => {
                    fence = Some(open);
                    in_code = true;
                }
                (Some((ch, len)), Some((c, l))) if c == ch && l >= len => {
                    fence = None;
                    in_code = true;
                }
                (Some(_), _) => in_code = true,
                (None, None) => {}
            }
        }
        out.push(Line {
            number,
            text,
            in_frontmatter,
            in_code,
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Line number of the closing `---` when the document opens with a
/// frontmatter block.
pub fn frontmatter_end(content: &str) -> Option<usize> {
    let mut iter = content.lines();
    if iter.next()?.trim_end() != "---" {
        return None;
    }
    iter.position(|l| {
        let t = l.trim_end();
        t == "---" || t == "..."
    })
    .map(|idx| idx + 2)
}

/// Raw YAML between the frontmatter delimiters.
pub fn frontmatter_source(content: &str) -> Option<String> {
    let end = frontmatter_end(content)?;
    Some(
        content
            .lines()
            .skip(1)
            .take(end - 2)
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Parse frontmatter into a YAML mapping. `Ok(None)` when there is none.
pub fn frontmatter(content: &str) -> Result<Option<serde_yaml::Mapping>, serde_yaml::Error> {
    let Some(src) = frontmatter_source(content) else {
        return Ok(None);
    };
    if src.trim().is_empty() {
        return Ok(Some(serde_yaml::Mapping::new()));
    }
    let value: serde_yaml::Value = serde_yaml::from_str(&src)?;
    match value {
        serde_yaml::Value::Mapping(m) => Ok(Some(m)),
        _ => Ok(Some(serde_yaml::Mapping::new())),
    }
}

/// A frontmatter field rendered as a string, if present and scalar.
pub fn frontmatter_str(map: &serde_yaml::Mapping, key: &str) -> Option<String> {
    match map.get(serde_yaml::Value::String(key.to_string()))? {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => None,
        _ => Some(String::new()),
    }
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    pub line: usize,
}

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").unwrap())
}

static CLOSING_HASHES_RE: OnceLock<Regex> = OnceLock::new();

fn closing_hashes_re() -> &'static Regex {
    CLOSING_HASHES_RE.get_or_init(|| Regex::new(r"[ \t]+#+$").unwrap())
}

/// ATX headings outside frontmatter and code fences, in document order.
pub fn headings(content: &str) -> Vec<Heading> {
    lines(content)
        .into_iter()
        .filter(|l| l.is_prose())
        .filter_map(|l| {
            let caps = heading_re().captures(l.text)?;
            let level = caps[1].len() as u8;
            let raw = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let text = closing_hashes_re().replace(raw, "").trim().to_string();
            Some(Heading {
                level,
                text,
                line: l.number,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

static INLINE_LINK_RE: OnceLock<Regex> = OnceLock::new();

fn inline_link_re() -> &'static Regex {
    INLINE_LINK_RE.get_or_init(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap())
}

static NON_WORD_RE: OnceLock<Regex> = OnceLock::new();

fn non_word_re() -> &'static Regex {
    NON_WORD_RE.get_or_init(|| Regex::new(r"[^\w\s-]").unwrap())
}

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Heading text → anchor: lowercase, drop every character that is not a word
/// character, whitespace or hyphen, then collapse whitespace runs to one `-`.
/// Link markup inside the heading contributes only its visible text.
pub fn slugify(heading: &str) -> String {
    let visible = inline_link_re().replace_all(heading, "$1");
    let lowered = visible.trim().to_lowercase();
    let stripped = non_word_re().replace_all(&lowered, "");
    whitespace_re()
        .replace_all(stripped.trim(), "-")
        .into_owned()
}

static HTML_ANCHOR_RE: OnceLock<Regex> = OnceLock::new();

fn html_anchor_re() -> &'static Regex {
    HTML_ANCHOR_RE.get_or_init(|| {
        Regex::new(r#"<[A-Za-z][^>]*?\s(?:name|id)\s*=\s*["']([^"']+)["']"#).unwrap()
    })
}

/// Every anchor the document defines: heading slugs (repeats get `-1`, `-2`
/// suffixes) plus explicit `name=` / `id=` attributes on HTML tags.
pub fn anchors(content: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for h in headings(content) {
        let slug = slugify(&h.text);
        let n = counts.entry(slug.clone()).or_insert(0);
        if *n == 0 {
            out.insert(slug);
        } else {
            out.insert(format!("{slug}-{n}"));
        }
        *n += 1;
    }
    for l in lines(content).into_iter().filter(|l| l.is_prose()) {
        for caps in html_anchor_re().captures_iter(l.text) {
            out.insert(caps[1].to_string());
        }
    }
    out
}

/// Loose form used for section matching: lowercase alphanumerics separated
/// by single spaces.
pub fn normalize_section(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
