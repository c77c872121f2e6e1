use crate::config::Config;
use crate::error::{PdocsError, Result};
use crate::registry::{Registry, RegistryStore};
use crate::rules::RuleSet;
use crate::types::DocType;

const DEFAULT_WIDTH: usize = 2;
const MAX_WIDTH: usize = 12;

// ---------------------------------------------------------------------------
// IdPattern
// ---------------------------------------------------------------------------

/// `<prefix>{num}<suffix>` or `<prefix>{num:N}<suffix>`; N is the zero-pad
/// width (default 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPattern {
    prefix: String,
    suffix: String,
    width: usize,
}

impl IdPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = || PdocsError::InvalidIdPattern(pattern.to_string());

        let start = pattern.find("{num").ok_or_else(invalid)?;
        let close = pattern[start..].find('}').ok_or_else(invalid)? + start;
        let inner = &pattern[start + "{num".len()..close];
        let width = match inner {
            "" => DEFAULT_WIDTH,
            spec => {
                let digits = spec.strip_prefix(':').ok_or_else(invalid)?;
                let w: usize = digits.parse().map_err(|_| invalid())?;
                if w == 0 || w > MAX_WIDTH {
                    return Err(invalid());
                }
                w
            }
        };

        let prefix = &pattern[..start];
        let suffix = &pattern[close + 1..];
        // Exactly one placeholder, and no stray braces that look like one.
        if prefix.contains('{') || suffix.contains("{num") {
            return Err(invalid());
        }
        // A digit right after the number would make parsing ambiguous.
        if suffix.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            width,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn format(&self, n: u64) -> String {
        format!("{}{:0width$}{}", self.prefix, n, self.suffix, width = self.width)
    }

    /// Exact inverse of [`IdPattern::format`]: `None` unless `id` is precisely
    /// what `format` would have produced for some number.
    pub fn parse_id(&self, id: &str) -> Option<u64> {
        let digits = id
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() < self.width {
            return None;
        }
        // Wider than the pad width only when the number needs it.
        if digits.len() > self.width && digits.starts_with('0') {
            return None;
        }
        let n: u64 = digits.parse().ok()?;
        (self.format(n) == id).then_some(n)
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Sequence definition for one document type.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub key: String,
    pub pattern: IdPattern,
}

impl Sequence {
    pub fn for_type(doc_type: DocType, config: &Config) -> Result<Self> {
        let rules = RuleSet::for_type(doc_type, config);
        let raw = rules
            .id_pattern
            .ok_or_else(|| PdocsError::NoSequence(doc_type.to_string()))?;
        Ok(Self {
            key: rules.sequence_key,
            pattern: IdPattern::parse(&raw)?,
        })
    }

    /// The id `generate` would issue next. Never mutates.
    pub fn peek(&self, registry: &Registry) -> String {
        self.pattern.format(registry.sequence(&self.key) + 1)
    }

    /// Increment the counter in `store`, persist, then return the new id.
    pub fn generate(&self, store: &RegistryStore) -> Result<String> {
        let n = store.update(|r| r.bump_sequence(&self.key))?;
        tracing::debug!(key = %self.key, value = n, "issued sequence id");
        Ok(self.pattern.format(n))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
