use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// DocType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    Plan,
    Investigation,
    Requirements,
    FeatureSpec,
    ApiContract,
    UserStory,
    UserFlow,
    Agent,
    Skill,
    MemoryFile,
    Rule,
    Command,
    Readme,
    Changelog,
}

/// Alias table: free-form input → canonical type. Consulted only when
/// classifying user input, never persisted. Canonical names are included.
const ALIASES: &[(&str, DocType)] = &[
    ("plan", DocType::Plan),
    ("plans", DocType::Plan),
    ("implementation-plan", DocType::Plan),
    ("impl-plan", DocType::Plan),
    ("investigation", DocType::Investigation),
    ("investigate", DocType::Investigation),
    ("inv", DocType::Investigation),
    ("research", DocType::Investigation),
    ("requirements", DocType::Requirements),
    ("requirement", DocType::Requirements),
    ("req", DocType::Requirements),
    ("reqs", DocType::Requirements),
    ("prd", DocType::Requirements),
    ("feature-spec", DocType::FeatureSpec),
    ("feature_spec", DocType::FeatureSpec),
    ("spec", DocType::FeatureSpec),
    ("feature", DocType::FeatureSpec),
    ("api-contract", DocType::ApiContract),
    ("api_contract", DocType::ApiContract),
    ("api", DocType::ApiContract),
    ("contract", DocType::ApiContract),
    ("user-story", DocType::UserStory),
    ("user_story", DocType::UserStory),
    ("story", DocType::UserStory),
    ("us", DocType::UserStory),
    ("user-flow", DocType::UserFlow),
    ("user_flow", DocType::UserFlow),
    ("flow", DocType::UserFlow),
    ("agent", DocType::Agent),
    ("subagent", DocType::Agent),
    ("skill", DocType::Skill),
    ("memory-file", DocType::MemoryFile),
    ("memory_file", DocType::MemoryFile),
    ("memory", DocType::MemoryFile),
    ("claude-md", DocType::MemoryFile),
    ("claude.md", DocType::MemoryFile),
    ("rule", DocType::Rule),
    ("rules", DocType::Rule),
    ("command", DocType::Command),
    ("cmd", DocType::Command),
    ("slash-command", DocType::Command),
    ("readme", DocType::Readme),
    ("changelog", DocType::Changelog),
    ("changes", DocType::Changelog),
];

impl DocType {
    pub fn all() -> &'static [DocType] {
        &[
            DocType::Plan,
            DocType::Investigation,
            DocType::Requirements,
            DocType::FeatureSpec,
            DocType::ApiContract,
            DocType::UserStory,
            DocType::UserFlow,
            DocType::Agent,
            DocType::Skill,
            DocType::MemoryFile,
            DocType::Rule,
            DocType::Command,
            DocType::Readme,
            DocType::Changelog,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Plan => "plan",
            DocType::Investigation => "investigation",
            DocType::Requirements => "requirements",
            DocType::FeatureSpec => "feature-spec",
            DocType::ApiContract => "api-contract",
            DocType::UserStory => "user-story",
            DocType::UserFlow => "user-flow",
            DocType::Agent => "agent",
            DocType::Skill => "skill",
            DocType::MemoryFile => "memory-file",
            DocType::Rule => "rule",
            DocType::Command => "command",
            DocType::Readme => "readme",
            DocType::Changelog => "changelog",
        }
    }

    /// Every alias registered for this type, canonical name included.
    pub fn aliases(self) -> Vec<&'static str> {
        ALIASES
            .iter()
            .filter(|(_, t)| *t == self)
            .map(|(a, _)| *a)
            .collect()
    }

    /// Normalize (trim, lowercase) and look up in the alias table.
    /// First registered alias wins; unknown input is `None`, never a guess.
    pub fn from_alias(input: &str) -> Option<DocType> {
        let key = input.trim().to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, t)| *t)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = crate::error::PdocsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocType::from_alias(s).ok_or_else(|| crate::error::PdocsError::UnknownType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DocStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    Pending,
    Valid,
    Invalid,
}

impl DocStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocStatus::Pending => "pending",
            DocStatus::Valid => "valid",
            DocStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocStatus {
    type Err = crate::error::PdocsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(DocStatus::Pending),
            "valid" => Ok(DocStatus::Valid),
            "invalid" => Ok(DocStatus::Invalid),
            _ => Err(crate::error::PdocsError::InvalidConfig(format!(
                "unknown status '{s}': expected pending, valid or invalid"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// LinkKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Internal,
    External,
    Anchor,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkKind::Internal => "internal",
            LinkKind::External => "external",
            LinkKind::Anchor => "anchor",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn every_alias_classifies_to_its_type() {
        for t in DocType::all() {
            let aliases = t.aliases();
            assert!(!aliases.is_empty(), "{t} has no aliases");
            for alias in aliases {
                assert_eq!(DocType::from_alias(alias), Some(*t), "alias {alias}");
            }
        }
    }

    #[test]
    fn canonical_name_is_an_alias() {
        for t in DocType::all() {
            assert_eq!(DocType::from_str(t.as_str()).unwrap(), *t);
        }
    }

    #[test]
    fn alias_lookup_normalizes() {
        assert_eq!(DocType::from_alias("  PRD "), Some(DocType::Requirements));
        assert_eq!(DocType::from_alias("Feature-Spec"), Some(DocType::FeatureSpec));
    }

    #[test]
    fn unknown_alias_is_explicit_failure() {
        assert_eq!(DocType::from_alias("novel"), None);
        assert!(matches!(
            DocType::from_str("novel"),
            Err(crate::error::PdocsError::UnknownType(_))
        ));
    }

    #[test]
    fn aliases_are_unambiguous() {
        let mut seen = std::collections::HashSet::new();
        for (alias, _) in ALIASES {
            assert!(seen.insert(*alias), "duplicate alias {alias}");
        }
    }

    #[test]
    fn doc_type_serde_uses_kebab_case() {
        let json = serde_json::to_string(&DocType::FeatureSpec).unwrap();
        assert_eq!(json, "\"feature-spec\"");
        let back: DocType = serde_json::from_str("\"memory-file\"").unwrap();
        assert_eq!(back, DocType::MemoryFile);
    }

    #[test]
    fn status_parse() {
        assert_eq!(DocStatus::from_str("Valid").unwrap(), DocStatus::Valid);
        assert!(DocStatus::from_str("done").is_err());
    }
}
