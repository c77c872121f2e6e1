use crate::error::{PdocsError, Result};
use crate::types::DocType;
use std::path::Path;

// ---------------------------------------------------------------------------
// PathShape (rule input)
// ---------------------------------------------------------------------------

/// Lowercased view of a path that rules match against.
pub struct PathShape {
    /// Directory components, outermost first (file name excluded).
    pub dirs: Vec<String>,
    pub file_name: String,
    pub stem: String,
    pub extension: String,
}

impl PathShape {
    pub fn new(path: &Path) -> Self {
        let lower = |s: &std::ffi::OsStr| s.to_string_lossy().to_lowercase();
        let dirs = path
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| lower(c.as_os_str()))
                    .filter(|c| c != "/" && c != "." && !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            dirs,
            file_name: path.file_name().map(lower).unwrap_or_default(),
            stem: path.file_stem().map(lower).unwrap_or_default(),
            extension: path.extension().map(lower).unwrap_or_default(),
        }
    }

    fn in_dir(&self, name: &str) -> bool {
        self.dirs.iter().any(|d| d == name)
    }

    /// True when `first` is immediately followed by `second` in the directory chain.
    fn in_dir_pair(&self, first: &str, second: &str) -> bool {
        self.dirs.windows(2).any(|w| w[0] == first && w[1] == second)
    }

    fn parent_is(&self, name: &str) -> bool {
        self.dirs.last().is_some_and(|d| d == name)
    }

    fn is_markdown(&self) -> bool {
        matches!(self.extension.as_str(), "md" | "markdown" | "mdx")
    }

    fn stem_has(&self, prefix: &str, suffix: &str) -> bool {
        self.stem.starts_with(prefix) || self.stem.ends_with(suffix)
    }
}

// ---------------------------------------------------------------------------
// PathRule
// ---------------------------------------------------------------------------

/// A fn-pointer classification rule. Rules are evaluated in order and the
/// first match wins, so more specific shapes come first.
pub struct PathRule {
    pub id: &'static str,
    pub doc_type: DocType,
    pub matches: fn(&PathShape) -> bool,
}

pub fn default_path_rules() -> Vec<PathRule> {
    vec![
        // Claude assets: fixed locations, checked before any name heuristics.
        PathRule {
            id: "skill_manifest",
            doc_type: DocType::Skill,
            matches: |p| p.file_name == "skill.md",
        },
        PathRule {
            id: "claude_agent",
            doc_type: DocType::Agent,
            matches: |p| p.is_markdown() && p.in_dir_pair(".claude", "agents"),
        },
        PathRule {
            id: "claude_command",
            doc_type: DocType::Command,
            matches: |p| p.is_markdown() && p.in_dir_pair(".claude", "commands"),
        },
        PathRule {
            id: "claude_rule",
            doc_type: DocType::Rule,
            matches: |p| p.is_markdown() && p.in_dir_pair(".claude", "rules"),
        },
        PathRule {
            id: "memory_file",
            doc_type: DocType::MemoryFile,
            matches: |p| matches!(p.file_name.as_str(), "claude.md" | "claude.local.md"),
        },
        // Well-known root files.
        PathRule {
            id: "readme",
            doc_type: DocType::Readme,
            matches: |p| p.stem == "readme" && (p.is_markdown() || p.extension.is_empty()),
        },
        PathRule {
            id: "changelog",
            doc_type: DocType::Changelog,
            matches: |p| {
                matches!(p.stem.as_str(), "changelog" | "changes" | "history")
                    && (p.is_markdown() || p.extension.is_empty())
            },
        },
        // Project documents: directory conventions before file-name conventions.
        PathRule {
            id: "api_contract_dir",
            doc_type: DocType::ApiContract,
            matches: |p| {
                p.is_markdown()
                    && (p.in_dir("api-contracts") || p.in_dir("contracts") || p.in_dir("api"))
            },
        },
        PathRule {
            id: "user_story_dir",
            doc_type: DocType::UserStory,
            matches: |p| p.is_markdown() && (p.in_dir("user-stories") || p.in_dir("stories")),
        },
        PathRule {
            id: "user_flow_dir",
            doc_type: DocType::UserFlow,
            matches: |p| p.is_markdown() && (p.in_dir("user-flows") || p.in_dir("flows")),
        },
        PathRule {
            id: "requirements_dir",
            doc_type: DocType::Requirements,
            matches: |p| p.is_markdown() && p.in_dir("requirements"),
        },
        PathRule {
            id: "investigation_dir",
            doc_type: DocType::Investigation,
            matches: |p| p.is_markdown() && p.in_dir("investigations"),
        },
        PathRule {
            id: "feature_spec_dir",
            doc_type: DocType::FeatureSpec,
            matches: |p| p.is_markdown() && (p.in_dir("specs") || p.in_dir("features")),
        },
        PathRule {
            id: "plan_dir",
            doc_type: DocType::Plan,
            matches: |p| p.is_markdown() && p.in_dir("plans"),
        },
        PathRule {
            id: "api_contract_name",
            doc_type: DocType::ApiContract,
            matches: |p| p.is_markdown() && p.stem_has("api-contract", "-api-contract"),
        },
        PathRule {
            id: "user_story_name",
            doc_type: DocType::UserStory,
            matches: |p| p.is_markdown() && p.stem_has("user-story", "-story"),
        },
        PathRule {
            id: "user_flow_name",
            doc_type: DocType::UserFlow,
            matches: |p| p.is_markdown() && p.stem_has("user-flow", "-flow"),
        },
        PathRule {
            id: "requirements_name",
            doc_type: DocType::Requirements,
            matches: |p| {
                p.is_markdown()
                    && (p.stem == "prd" || p.stem_has("requirements", "-requirements"))
            },
        },
        PathRule {
            id: "investigation_name",
            doc_type: DocType::Investigation,
            matches: |p| p.is_markdown() && p.stem_has("investigation", "-investigation"),
        },
        PathRule {
            id: "feature_spec_name",
            doc_type: DocType::FeatureSpec,
            matches: |p| p.is_markdown() && (p.stem == "spec" || p.stem_has("spec-", "-spec")),
        },
        PathRule {
            id: "plan_name",
            doc_type: DocType::Plan,
            matches: |p| p.is_markdown() && (p.stem == "plan" || p.stem_has("plan-", "-plan")),
        },
        // Any markdown file sitting directly in a rules/ directory.
        PathRule {
            id: "rules_dir",
            doc_type: DocType::Rule,
            matches: |p| p.is_markdown() && p.parent_is("rules"),
        },
    ]
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Outcome of path classification. `rule` names the winning rule so the
/// precedence decision stays auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub doc_type: DocType,
    pub rule: &'static str,
}

pub struct Classifier {
    rules: Vec<PathRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_path_rules())
    }
}

impl Classifier {
    pub fn new(rules: Vec<PathRule>) -> Self {
        Self { rules }
    }

    /// First matching rule wins; `None` means the path is of unknown type.
    pub fn classify_path(&self, path: &Path) -> Option<Classification> {
        let shape = PathShape::new(path);
        let hit = self.rules.iter().find(|r| (r.matches)(&shape))?;
        tracing::debug!(path = %path.display(), rule = hit.id, doc_type = %hit.doc_type, "classified");
        Some(Classification {
            doc_type: hit.doc_type,
            rule: hit.id,
        })
    }

    pub fn classify_alias(&self, alias: &str) -> Result<DocType> {
        DocType::from_alias(alias).ok_or_else(|| PdocsError::UnknownType(alias.to_string()))
    }

    /// Explicit override (alias) if given, else the path rules.
    pub fn resolve(&self, path: &Path, override_type: Option<&str>) -> Result<DocType> {
        if let Some(alias) = override_type {
            return self.classify_alias(alias);
        }
        self.classify_path(path)
            .map(|c| c.doc_type)
            .ok_or_else(|| PdocsError::UnclassifiedPath(path.display().to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(path: &str) -> Option<DocType> {
        Classifier::default()
            .classify_path(Path::new(path))
            .map(|c| c.doc_type)
    }

    #[test]
    fn claude_assets() {
        assert_eq!(classify(".claude/agents/api-reviewer.md"), Some(DocType::Agent));
        assert_eq!(
            classify(".claude/skills/writing-plans/SKILL.md"),
            Some(DocType::Skill)
        );
        assert_eq!(classify(".claude/commands/ship.md"), Some(DocType::Command));
        assert_eq!(classify(".claude/rules/rust.md"), Some(DocType::Rule));
        assert_eq!(classify("CLAUDE.md"), Some(DocType::MemoryFile));
        assert_eq!(classify("sub/CLAUDE.local.md"), Some(DocType::MemoryFile));
    }

    #[test]
    fn project_documents() {
        assert_eq!(classify("docs/plans/P-01-auth.md"), Some(DocType::Plan));
        assert_eq!(classify("docs/auth-plan.md"), Some(DocType::Plan));
        assert_eq!(
            classify("docs/investigations/slow-build.md"),
            Some(DocType::Investigation)
        );
        assert_eq!(classify("docs/requirements/login.md"), Some(DocType::Requirements));
        assert_eq!(classify("docs/prd.md"), Some(DocType::Requirements));
        assert_eq!(classify("docs/specs/login.md"), Some(DocType::FeatureSpec));
        assert_eq!(classify("docs/login-spec.md"), Some(DocType::FeatureSpec));
        assert_eq!(classify("docs/api/users.md"), Some(DocType::ApiContract));
        assert_eq!(classify("docs/user-stories/US-001.md"), Some(DocType::UserStory));
        assert_eq!(classify("docs/flows/checkout.md"), Some(DocType::UserFlow));
        assert_eq!(classify("README.md"), Some(DocType::Readme));
        assert_eq!(classify("CHANGELOG.md"), Some(DocType::Changelog));
    }

    #[test]
    fn skill_manifest_beats_directory_rules() {
        // SKILL.md inside a plans/ directory is still a skill.
        assert_eq!(classify("plans/SKILL.md"), Some(DocType::Skill));
    }

    #[test]
    fn directory_beats_file_name() {
        // A "-plan" file living under specs/ is a feature spec.
        assert_eq!(classify("docs/specs/rollout-plan.md"), Some(DocType::FeatureSpec));
    }

    #[test]
    fn unknown_paths() {
        assert_eq!(classify("src/main.rs"), None);
        assert_eq!(classify("notes/random.md"), None);
        assert_eq!(classify("docs/plans/diagram.png"), None);
    }

    #[test]
    fn rule_id_is_reported() {
        let c = Classifier::default()
            .classify_path(Path::new(".claude/agents/x.md"))
            .unwrap();
        assert_eq!(c.rule, "claude_agent");
    }

    #[test]
    fn resolve_prefers_override() {
        let c = Classifier::default();
        assert_eq!(
            c.resolve(Path::new("README.md"), Some("plan")).unwrap(),
            DocType::Plan
        );
        assert!(matches!(
            c.resolve(Path::new("README.md"), Some("bogus")),
            Err(PdocsError::UnknownType(_))
        ));
        assert!(matches!(
            c.resolve(Path::new("notes.md"), None),
            Err(PdocsError::UnclassifiedPath(_))
        ));
    }

    #[test]
    fn every_alias_round_trips_through_classifier() {
        let c = Classifier::default();
        for t in DocType::all() {
            for alias in t.aliases() {
                assert_eq!(c.classify_alias(alias).unwrap(), *t);
            }
        }
    }
}
