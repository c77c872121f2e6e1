use crate::config::Config;
use crate::types::DocType;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PatternRule
// ---------------------------------------------------------------------------

/// A named regular expression that must match somewhere in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub id: String,
    pub pattern: String,
    pub message: String,
}

impl PatternRule {
    pub fn new(id: &str, pattern: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// FileLayout
// ---------------------------------------------------------------------------

/// How `create` names a new document inside the type's output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileLayout {
    /// `<id>-<slug>.md`, or `<slug>.md` without an id.
    Named,
    /// Always this file name (README.md, CHANGELOG.md, ...).
    Fixed(&'static str),
    /// `<slug>/<name>`, one directory per document (skills).
    Nested(&'static str),
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Everything pdocs knows about one document type after config overrides.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    pub doc_type: DocType,
    pub skill: Option<String>,
    pub required_sections: Vec<String>,
    pub required_fields: Vec<String>,
    /// Compare frontmatter `name` with the file stem (or skill directory).
    pub name_matches_file: bool,
    pub patterns: Vec<PatternRule>,
    pub id_pattern: Option<String>,
    pub sequence_key: String,
    /// Validation scripts, relative to the skill directory.
    pub scripts: Vec<String>,
    pub output_dir: String,
    pub layout: FileLayout,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn title_rule() -> PatternRule {
    PatternRule::new(
        "title",
        r"(?m)^# \S",
        "Document must start with a top-level '# Title' heading",
    )
}

impl RuleSet {
    fn base(doc_type: DocType) -> Self {
        Self {
            doc_type,
            skill: None,
            required_sections: Vec::new(),
            required_fields: Vec::new(),
            name_matches_file: false,
            patterns: Vec::new(),
            id_pattern: None,
            sequence_key: doc_type.as_str().to_string(),
            scripts: Vec::new(),
            output_dir: "docs".to_string(),
            layout: FileLayout::Named,
        }
    }

    /// Builtin rules for `doc_type`, before config overrides.
    pub fn builtin(doc_type: DocType) -> Self {
        let base = Self::base(doc_type);
        match doc_type {
            DocType::Plan => Self {
                skill: Some("writing-plans".into()),
                required_sections: strings(&["Overview", "Goals", "Tasks", "Risks"]),
                patterns: vec![title_rule()],
                id_pattern: Some("P-{num:2}".into()),
                output_dir: "docs/plans".into(),
                ..base
            },
            DocType::Investigation => Self {
                skill: Some("investigating".into()),
                required_sections: strings(&["Summary", "Findings", "Recommendations"]),
                patterns: vec![title_rule()],
                id_pattern: Some("INV-{num:3}".into()),
                output_dir: "docs/investigations".into(),
                ..base
            },
            DocType::Requirements => Self {
                skill: Some("writing-requirements".into()),
                required_sections: strings(&[
                    "Overview",
                    "Functional Requirements",
                    "Non-Functional Requirements",
                    "Acceptance Criteria",
                ]),
                patterns: vec![title_rule()],
                id_pattern: Some("REQ-{num:3}".into()),
                output_dir: "docs/requirements".into(),
                ..base
            },
            DocType::FeatureSpec => Self {
                skill: Some("writing-specs".into()),
                required_sections: strings(&[
                    "Overview",
                    "Requirements",
                    "Design",
                    "Acceptance Criteria",
                ]),
                patterns: vec![title_rule()],
                id_pattern: Some("FS-{num:3}".into()),
                output_dir: "docs/specs".into(),
                ..base
            },
            DocType::ApiContract => Self {
                skill: Some("writing-specs".into()),
                required_sections: strings(&["Overview", "Endpoints", "Errors"]),
                patterns: vec![
                    title_rule(),
                    PatternRule::new(
                        "endpoint",
                        r"(?m)\b(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+/",
                        "API contract must document at least one endpoint (e.g. 'GET /users')",
                    ),
                ],
                id_pattern: Some("API-{num:3}".into()),
                output_dir: "docs/api".into(),
                ..base
            },
            DocType::UserStory => Self {
                skill: Some("writing-specs".into()),
                required_sections: strings(&["Story", "Acceptance Criteria"]),
                patterns: vec![
                    title_rule(),
                    PatternRule::new(
                        "story-format",
                        r"(?is)\bas an?\b.+?\bi want\b",
                        "User story must use the 'As a <role>, I want <goal>' form",
                    ),
                ],
                id_pattern: Some("US-{num:3}".into()),
                output_dir: "docs/user-stories".into(),
                ..base
            },
            DocType::UserFlow => Self {
                skill: Some("writing-specs".into()),
                required_sections: strings(&["Overview", "Steps"]),
                patterns: vec![title_rule()],
                id_pattern: Some("UF-{num:2}".into()),
                output_dir: "docs/user-flows".into(),
                ..base
            },
            DocType::Agent => Self {
                skill: Some("writing-subagents".into()),
                required_fields: strings(&["name", "description"]),
                name_matches_file: true,
                scripts: strings(&["scripts/validate-agent.py"]),
                output_dir: ".claude/agents".into(),
                ..base
            },
            DocType::Skill => Self {
                skill: Some("writing-skills".into()),
                required_fields: strings(&["name", "description"]),
                name_matches_file: true,
                output_dir: ".claude/skills".into(),
                layout: FileLayout::Nested("SKILL.md"),
                ..base
            },
            DocType::MemoryFile => Self {
                skill: Some("managing-memory".into()),
                scripts: strings(&["scripts/validate.py"]),
                output_dir: ".".into(),
                layout: FileLayout::Fixed("CLAUDE.md"),
                ..base
            },
            DocType::Rule => Self {
                skill: Some("managing-memory".into()),
                scripts: strings(&["scripts/validate.py"]),
                output_dir: ".claude/rules".into(),
                ..base
            },
            DocType::Command => Self {
                required_fields: strings(&["description"]),
                output_dir: ".claude/commands".into(),
                ..base
            },
            DocType::Readme => Self {
                required_sections: strings(&["Usage"]),
                patterns: vec![title_rule()],
                output_dir: ".".into(),
                layout: FileLayout::Fixed("README.md"),
                ..base
            },
            DocType::Changelog => Self {
                patterns: vec![
                    title_rule(),
                    PatternRule::new(
                        "version-section",
                        r"(?m)^##\s+\[?(Unreleased|v?\d+\.\d+)",
                        "Changelog needs an '## [Unreleased]' or '## [x.y.z]' section",
                    ),
                ],
                output_dir: ".".into(),
                layout: FileLayout::Fixed("CHANGELOG.md"),
                ..base
            },
        }
    }

    /// Builtin rules with the project's `types.<name>` override applied.
    pub fn for_type(doc_type: DocType, config: &Config) -> Self {
        let mut rules = Self::builtin(doc_type);
        let Some(ov) = config.type_override(doc_type) else {
            return rules;
        };
        if let Some(skill) = &ov.skill {
            rules.skill = Some(skill.clone());
        }
        if let Some(sections) = &ov.required_sections {
            rules.required_sections = sections.clone();
        }
        if let Some(patterns) = &ov.patterns {
            rules.patterns = patterns.clone();
        }
        if let Some(pattern) = &ov.id_pattern {
            rules.id_pattern = Some(pattern.clone());
        }
        if let Some(key) = &ov.sequence_key {
            rules.sequence_key = key.clone();
        }
        if let Some(scripts) = &ov.scripts {
            rules.scripts = scripts.clone();
        }
        if let Some(dir) = &ov.output_dir {
            rules.output_dir = dir.clone();
        }
        rules
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
