use crate::error::Result;
use crate::paths;
use crate::types::{DocStatus, DocType};
use crate::validate::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const REGISTRY_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RegistryRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub path: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    pub status: DocStatus,
    pub registered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<DateTime<Utc>>,
    /// Issue counts from the most recent validation.
    #[serde(default)]
    pub errors: usize,
    #[serde(default)]
    pub warnings: usize,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Derived counts. Recomputed on load and save, never read back as truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub pending: usize,
    pub valid: usize,
    pub invalid: usize,
    #[serde(default)]
    pub by_type: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// ListFilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub doc_type: Option<DocType>,
    pub status: Option<DocStatus>,
}

impl ListFilter {
    fn matches(&self, r: &RegistryRecord) -> bool {
        self.doc_type.map_or(true, |t| r.doc_type == t)
            && self.status.map_or(true, |s| r.status == s)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default = "default_version")]
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub documents: BTreeMap<String, RegistryRecord>,
    #[serde(default)]
    pub id_sequences: BTreeMap<String, u64>,
    #[serde(default)]
    pub stats: RegistryStats,
}

fn default_version() -> u32 {
    REGISTRY_VERSION
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            version: REGISTRY_VERSION,
            updated_at: Utc::now(),
            documents: BTreeMap::new(),
            id_sequences: BTreeMap::new(),
            stats: RegistryStats::default(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&RegistryRecord> {
        self.documents.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.documents.contains_key(path)
    }

    /// Create or overwrite the record for `path`.
    pub fn upsert(
        &mut self,
        path: &str,
        doc_type: DocType,
        skill: Option<String>,
        status: DocStatus,
    ) -> &RegistryRecord {
        let record = RegistryRecord {
            path: path.to_string(),
            doc_type,
            skill,
            status,
            registered_at: Utc::now(),
            last_validated_at: None,
            errors: 0,
            warnings: 0,
        };
        self.documents.insert(path.to_string(), record);
        self.touch();
        &self.documents[path]
    }

    /// Set the status of a registered document. Unregistered paths are a
    /// no-op, so validating an unknown document has no side effects.
    pub fn update_status(&mut self, path: &str, status: DocStatus) -> bool {
        let Some(record) = self.documents.get_mut(path) else {
            return false;
        };
        record.status = status;
        record.last_validated_at = Some(Utc::now());
        self.touch();
        true
    }

    /// Record the outcome of a validation pass for `path`.
    pub fn record_result(&mut self, path: &str, result: &ValidationResult) -> bool {
        let status = if result.valid {
            DocStatus::Valid
        } else {
            DocStatus::Invalid
        };
        if !self.update_status(path, status) {
            return false;
        }
        if let Some(record) = self.documents.get_mut(path) {
            record.errors = result.errors.len();
            record.warnings = result.warnings.len();
        }
        true
    }

    pub fn remove(&mut self, path: &str) -> Option<RegistryRecord> {
        let removed = self.documents.remove(path);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Records matching `filter`, ordered by path.
    pub fn list(&self, filter: &ListFilter) -> Vec<&RegistryRecord> {
        self.documents
            .values()
            .filter(|r| filter.matches(r))
            .collect()
    }

    pub fn compute_stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total: self.documents.len(),
            ..Default::default()
        };
        for r in self.documents.values() {
            match r.status {
                DocStatus::Pending => stats.pending += 1,
                DocStatus::Valid => stats.valid += 1,
                DocStatus::Invalid => stats.invalid += 1,
            }
            *stats.by_type.entry(r.doc_type.to_string()).or_insert(0) += 1;
        }
        stats
    }

    /// Last issued value for `key`; 0 when nothing has been issued.
    pub fn sequence(&self, key: &str) -> u64 {
        self.id_sequences.get(key).copied().unwrap_or(0)
    }

    /// Increment `key` and return the new value.
    pub fn bump_sequence(&mut self, key: &str) -> u64 {
        let next = self.sequence(key) + 1;
        self.id_sequences.insert(key.to_string(), next);
        self.touch();
        next
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// RegistryStore
// ---------------------------------------------------------------------------

/// The on-disk home of the registry. Every mutation is a whole-file
/// read-modify-write, so one process at a time.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_root(root: &Path) -> Self {
        Self::new(paths::registry_path(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means a fresh, empty registry.
    pub fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            return Ok(Registry::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Registry::new());
        }
        let mut registry: Registry = serde_yaml::from_str(&data)?;
        registry.stats = registry.compute_stats();
        Ok(registry)
    }

    pub fn save(&self, registry: &mut Registry) -> Result<()> {
        registry.stats = registry.compute_stats();
        let data = serde_yaml::to_string(registry)?;
        crate::io::replace_file(&self.path, data.as_bytes())
    }

    /// Load, apply `f`, save, then hand back `f`'s result. The save completes
    /// before the caller sees the value.
    pub fn update<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> Result<T> {
        let mut registry = self.load()?;
        let out = f(&mut registry);
        self.save(&mut registry)?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{ValidationIssue, ValidationResult};
    use tempfile::TempDir;

    #[test]
    fn load_missing_is_fresh() {
        let dir = TempDir::new().unwrap();
        let reg = RegistryStore::for_root(dir.path()).load().unwrap();
        assert!(reg.documents.is_empty());
        assert_eq!(reg.version, REGISTRY_VERSION);
    }

    #[test]
    fn registry_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::for_root(dir.path());
        let mut reg = Registry::new();
        reg.upsert(
            "docs/plans/P-01-auth.md",
            DocType::Plan,
            Some("writing-plans".into()),
            DocStatus::Pending,
        );
        reg.bump_sequence("plan");
        store.save(&mut reg).unwrap();

        let loaded = store.load().unwrap();
        let rec = loaded.get("docs/plans/P-01-auth.md").unwrap();
        assert_eq!(rec.doc_type, DocType::Plan);
        assert_eq!(rec.status, DocStatus::Pending);
        assert_eq!(loaded.sequence("plan"), 1);
        assert_eq!(loaded.stats.total, 1);
        assert_eq!(loaded.stats.pending, 1);
    }

    #[test]
    fn stats_recomputed_on_load() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::for_root(dir.path());
        let mut reg = Registry::new();
        reg.upsert("a.md", DocType::Readme, None, DocStatus::Valid);
        store.save(&mut reg).unwrap();

        // Tamper with the persisted stats; load must ignore them.
        let path = store.path().to_path_buf();
        let data = std::fs::read_to_string(&path)
            .unwrap()
            .replace("total: 1", "total: 99");
        std::fs::write(&path, data).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.stats.total, 1);
        assert_eq!(loaded.stats.valid, 1);
    }

    #[test]
    fn update_status_unregistered_is_noop() {
        let mut reg = Registry::new();
        assert!(!reg.update_status("nope.md", DocStatus::Valid));
        assert!(reg.documents.is_empty());
    }

    #[test]
    fn record_result_sets_status_and_counts() {
        let mut reg = Registry::new();
        reg.upsert("p.md", DocType::Plan, None, DocStatus::Pending);
        let result = ValidationResult::from_issues(
            vec![ValidationIssue::new("required-section", "missing Goals")],
            vec![ValidationIssue::new("localhost-link", "points at localhost")],
        );
        assert!(reg.record_result("p.md", &result));
        let rec = reg.get("p.md").unwrap();
        assert_eq!(rec.status, DocStatus::Invalid);
        assert_eq!(rec.errors, 1);
        assert_eq!(rec.warnings, 1);
        assert!(rec.last_validated_at.is_some());
    }

    #[test]
    fn upsert_overwrites_single_record() {
        let mut reg = Registry::new();
        reg.upsert("p.md", DocType::Plan, None, DocStatus::Valid);
        reg.upsert("p.md", DocType::FeatureSpec, None, DocStatus::Pending);
        assert_eq!(reg.documents.len(), 1);
        assert_eq!(reg.get("p.md").unwrap().doc_type, DocType::FeatureSpec);
    }

    #[test]
    fn list_filters_by_type_and_status() {
        let mut reg = Registry::new();
        reg.upsert("b.md", DocType::Plan, None, DocStatus::Valid);
        reg.upsert("a.md", DocType::Plan, None, DocStatus::Invalid);
        reg.upsert("c.md", DocType::Readme, None, DocStatus::Valid);

        let plans = reg.list(&ListFilter {
            doc_type: Some(DocType::Plan),
            status: None,
        });
        assert_eq!(
            plans.iter().map(|r| r.path.as_str()).collect::<Vec<_>>(),
            vec!["a.md", "b.md"]
        );

        let valid = reg.list(&ListFilter {
            doc_type: None,
            status: Some(DocStatus::Valid),
        });
        assert_eq!(valid.len(), 2);

        assert_eq!(reg.list(&ListFilter::default()).len(), 3);
    }

    #[test]
    fn update_persists_before_returning() {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::for_root(dir.path());
        let n = store.update(|r| r.bump_sequence("plan")).unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.load().unwrap().sequence("plan"), 1);
    }
}
