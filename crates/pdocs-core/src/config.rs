use crate::error::Result;
use crate::paths;
use crate::rules::PatternRule;
use crate::sequence::IdPattern;
use crate::types::DocType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ValidationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub check_links: bool,
    /// Verify `file.md#section` against the target's headings (warnings only).
    #[serde(default = "default_true")]
    pub cross_document_anchors: bool,
    #[serde(default = "default_true")]
    pub scripts_enabled: bool,
    #[serde(default = "default_script_timeout")]
    pub script_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_script_timeout() -> u64 {
    30
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_links: true,
            cross_document_anchors: true,
            scripts_enabled: true,
            script_timeout_secs: default_script_timeout(),
        }
    }
}

impl ValidationConfig {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// RepairConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Directory levels below the document searched for relink candidates.
    #[serde(default = "default_search_depth")]
    pub search_depth: usize,
}

fn default_search_depth() -> usize {
    3
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            search_depth: default_search_depth(),
        }
    }
}

// ---------------------------------------------------------------------------
// WatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            extensions: default_extensions(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// TemplatesConfig / RemoteConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Extra shared template directories, searched after the builtin
    /// generic locations. Relative entries resolve against the project root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_timeout() -> u64 {
    20
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_remote_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// TypeOverride
// ---------------------------------------------------------------------------

/// Per-type replacement of builtin rule-set fields. Each `Some` field
/// replaces the builtin value wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_sections: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_key: Option<String>,
    /// Script paths relative to the skill directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Keyed by type name or alias.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, TypeOverride>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            validation: ValidationConfig::default(),
            repair: RepairConfig::default(),
            watch: WatchConfig::default(),
            templates: TemplatesConfig::default(),
            remote: RemoteConfig::default(),
            types: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Missing config is not an error: defaults apply.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn type_override(&self, doc_type: DocType) -> Option<&TypeOverride> {
        self.types
            .iter()
            .find(|(key, _)| DocType::from_alias(key) == Some(doc_type))
            .map(|(_, v)| v)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (key, ov) in &self.types {
            if DocType::from_alias(key).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown document type '{key}' in types"),
                });
            }

            if let Some(pattern) = &ov.id_pattern {
                if IdPattern::parse(pattern).is_err() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("types.{key}.id_pattern '{pattern}' is malformed"),
                    });
                }
            }

            for rule in ov.patterns.iter().flatten() {
                if let Err(e) = regex::Regex::new(&rule.pattern) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "types.{key} pattern '{}' does not compile and will be skipped: {e}",
                            rule.id
                        ),
                    });
                }
            }
        }

        if self.watch.debounce_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "watch.debounce_ms is 0; every event triggers a validation".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
