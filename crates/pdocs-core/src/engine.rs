//! Orchestration over the components: every CLI operation is one method
//! here. Registry status is persisted after each validation pass.

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::{PdocsError, Result};
use crate::markdown;
use crate::paths;
use crate::registry::{ListFilter, Registry, RegistryRecord, RegistryStats, RegistryStore};
use crate::repair::{RepairReport, Repairer};
use crate::rules::{FileLayout, RuleSet};
use crate::sequence::Sequence;
use crate::template::{self, TemplateResolver, TemplateSource};
use crate::types::{DocStatus, DocType};
use crate::validate::{ValidateOptions, ValidationResult, Validator};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories never descended into when walking a project. Template
/// directories hold templates, not documents.
const SKIP_DIRS: &[&str] = &[".git", ".pdocs", "node_modules", "target", "templates"];

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DocReport {
    pub path: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub registered: bool,
    #[serde(flatten)]
    pub result: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of validating many documents. One failure never stops the rest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BatchFailure>,
    /// Markdown files whose type could not be determined.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn passes(&self, strict: bool) -> bool {
        self.failures.is_empty() && self.documents.iter().all(|d| d.result.passes(strict))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateRun {
    pub fix: bool,
    pub dry_run: bool,
    /// `Some(false)` forces link checks off for this run.
    pub check_links: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub root: String,
    pub created: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub registered: Vec<String>,
    pub already_registered: usize,
    pub unclassified: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub doc_type: String,
    /// Directory, or full file path when it ends in `.md`.
    pub output: Option<PathBuf>,
    pub vars: BTreeMap<String, String>,
    pub auto_id: bool,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    pub path: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub template_source: TemplateSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_origin: Option<String>,
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedTemplate {
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub source: TemplateSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub content: String,
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub doc_type: Option<DocType>,
    /// Path rule that classified the file, when classification was by path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<&'static str>,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RegistryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleSet>,
}

/// What a watch cycle did for one path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchOutcome {
    Validated(DocReport),
    Removed { path: String },
    Ignored { path: String },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    root: PathBuf,
    config: Config,
    classifier: Classifier,
    store: RegistryStore,
}

impl Engine {
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        for w in config.validate() {
            tracing::warn!(level = ?w.level, "{}", w.message);
        }
        Ok(Self::with_config(root, config))
    }

    pub fn with_config(root: &Path, config: Config) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            classifier: Classifier::default(),
            store: RegistryStore::for_root(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    /// Create the `.pdocs/` layout. Existing files are left alone.
    pub fn init(root: &Path) -> Result<InitReport> {
        let mut created = Vec::new();
        let templates = paths::templates_dir(root);
        if !templates.is_dir() {
            std::fs::create_dir_all(&templates)?;
            created.push(paths::TEMPLATES_DIR.to_string());
        }
        let config = serde_yaml::to_string(&Config::default())?;
        if crate::io::seed_file(&paths::config_path(root), config.as_bytes())? {
            created.push(paths::CONFIG_FILE.to_string());
        }
        let store = RegistryStore::for_root(root);
        if !store.path().exists() {
            store.save(&mut Registry::new())?;
            created.push(paths::REGISTRY_FILE.to_string());
        }
        Ok(InitReport {
            root: root.display().to_string(),
            created,
        })
    }

    fn key(&self, path: &Path) -> String {
        paths::registry_key(&self.root, path)
    }

    /// Explicit override, then the registered type, then path rules.
    pub fn resolve_type(
        &self,
        path: &Path,
        override_type: Option<&str>,
        registry: &Registry,
    ) -> Result<DocType> {
        if let Some(alias) = override_type {
            return self.classifier.classify_alias(alias);
        }
        let key = self.key(path);
        if let Some(record) = registry.get(&key) {
            return Ok(record.doc_type);
        }
        self.classifier.resolve(Path::new(&key), None)
    }

    pub fn parse_type(&self, alias: &str) -> Result<DocType> {
        self.classifier.classify_alias(alias)
    }

    fn validator(&self, run: &ValidateRun) -> Validator<'_> {
        let mut opts = ValidateOptions::from_config(&self.config);
        if let Some(check) = run.check_links {
            opts.check_links = check;
        }
        Validator::new(&self.root, &self.config).with_options(opts)
    }

    // -----------------------------------------------------------------------
    // Validate
    // -----------------------------------------------------------------------

    /// Validate one file, optionally repair it, and persist its status when
    /// it is registered. After a written repair the file is validated again
    /// so the reported result reflects what is on disk.
    pub fn validate_path(
        &self,
        path: &Path,
        override_type: Option<&str>,
        run: &ValidateRun,
    ) -> Result<DocReport> {
        let abs = paths::absolute(&self.root, path);
        if !abs.is_file() {
            return Err(PdocsError::FileNotFound(path.display().to_string()));
        }
        let registry = self.store.load()?;
        let doc_type = self.resolve_type(&abs, override_type, &registry)?;
        self.validate_resolved(&abs, doc_type, run)
    }

    fn validate_resolved(&self, abs: &Path, doc_type: DocType, run: &ValidateRun) -> Result<DocReport> {
        let mut report = self.check_document(abs, doc_type, run)?;
        self.record_status(&mut report)?;
        Ok(report)
    }

    /// Validate and optionally repair one file without touching the
    /// registry. Errors here belong to the document alone.
    fn check_document(&self, abs: &Path, doc_type: DocType, run: &ValidateRun) -> Result<DocReport> {
        let validator = self.validator(run);
        let mut result = validator.validate_file(abs, doc_type)?;

        let repair = if run.fix {
            let report =
                Repairer::new(&self.root, &self.config).repair_file(abs, &result.errors, run.dry_run)?;
            if report.written {
                result = validator.validate_file(abs, doc_type)?;
            }
            Some(report)
        } else {
            None
        };

        Ok(DocReport {
            path: self.key(abs),
            doc_type,
            registered: false,
            result,
            repair,
        })
    }

    /// Store the report's status on its registry record. Unregistered
    /// documents leave the registry file untouched.
    fn record_status(&self, report: &mut DocReport) -> Result<()> {
        let mut registry = self.store.load()?;
        report.registered = registry.record_result(&report.path, &report.result);
        if report.registered {
            self.store.save(&mut registry)?;
        }
        Ok(())
    }

    /// Validate every registered document. Per-document problems are
    /// collected; a registry that cannot be read or written aborts the batch.
    pub fn validate_registered(&self, run: &ValidateRun) -> Result<BatchReport> {
        let registry = self.store.load()?;
        let mut batch = BatchReport::default();
        for record in registry.list(&ListFilter::default()) {
            let abs = paths::absolute(&self.root, Path::new(&record.path));
            if !abs.is_file() {
                batch.failures.push(BatchFailure {
                    path: record.path.clone(),
                    error: PdocsError::FileNotFound(record.path.clone()).to_string(),
                });
                continue;
            }
            match self.check_document(&abs, record.doc_type, run) {
                Ok(mut report) => {
                    self.record_status(&mut report)?;
                    batch.documents.push(report);
                }
                Err(e) => batch.failures.push(BatchFailure {
                    path: record.path.clone(),
                    error: e.to_string(),
                }),
            }
        }
        Ok(batch)
    }

    /// Validate every markdown file under `dir`. Files of unknown type are
    /// skipped unless `override_type` is given.
    pub fn validate_dir(
        &self,
        dir: &Path,
        override_type: Option<&str>,
        run: &ValidateRun,
    ) -> Result<BatchReport> {
        let registry = self.store.load()?;
        let mut batch = BatchReport::default();
        for abs in self.markdown_files(dir) {
            let key = self.key(&abs);
            let doc_type = match self.resolve_type(&abs, override_type, &registry) {
                Ok(t) => t,
                Err(PdocsError::UnclassifiedPath(_)) => {
                    batch.skipped.push(key);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.check_document(&abs, doc_type, run) {
                Ok(mut report) => {
                    self.record_status(&mut report)?;
                    batch.documents.push(report);
                }
                Err(e) => batch.failures.push(BatchFailure {
                    path: key,
                    error: e.to_string(),
                }),
            }
        }
        Ok(batch)
    }

    fn markdown_files(&self, dir: &Path) -> Vec<PathBuf> {
        let dir = paths::absolute(&self.root, dir);
        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !skip_entry(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_markdown(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    // -----------------------------------------------------------------------
    // Registry operations
    // -----------------------------------------------------------------------

    pub fn register(
        &self,
        path: &Path,
        override_type: Option<&str>,
        skill: Option<&str>,
        force: bool,
    ) -> Result<RegistryRecord> {
        let abs = paths::absolute(&self.root, path);
        if !abs.is_file() {
            return Err(PdocsError::FileNotFound(path.display().to_string()));
        }
        let key = self.key(&abs);
        let doc_type = match override_type {
            Some(alias) => self.classifier.classify_alias(alias)?,
            None => self.classifier.resolve(Path::new(&key), None)?,
        };
        let skill = skill
            .map(str::to_string)
            .or_else(|| RuleSet::for_type(doc_type, &self.config).skill);

        let record = self.store.update(|r| {
            if r.contains(&key) && !force {
                return Err(PdocsError::AlreadyRegistered(key.clone()));
            }
            Ok(r.upsert(&key, doc_type, skill, DocStatus::Pending).clone())
        })??;
        tracing::debug!(path = %record.path, doc_type = %record.doc_type, "registered");
        Ok(record)
    }

    pub fn unregister(&self, path: &Path) -> Result<RegistryRecord> {
        let key = self.key(path);
        self.store
            .update(|r| r.remove(&key))?
            .ok_or(PdocsError::NotRegistered(key))
    }

    /// Register every classifiable markdown file under `dir` that is not
    /// registered yet.
    pub fn scan(&self, dir: &Path) -> Result<ScanReport> {
        let files = self.markdown_files(dir);
        let mut report = ScanReport::default();
        let mut registry = self.store.load()?;
        for abs in files {
            let key = self.key(&abs);
            if registry.contains(&key) {
                report.already_registered += 1;
                continue;
            }
            let Some(c) = self.classifier.classify_path(Path::new(&key)) else {
                report.unclassified.push(key);
                continue;
            };
            let skill = RuleSet::for_type(c.doc_type, &self.config).skill;
            registry.upsert(&key, c.doc_type, skill, DocStatus::Pending);
            report.registered.push(key);
        }
        if !report.registered.is_empty() {
            self.store.save(&mut registry)?;
        }
        Ok(report)
    }

    /// Drop records whose file no longer exists.
    pub fn prune(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        self.store.update(|r| {
            let gone: Vec<String> = r
                .documents
                .keys()
                .filter(|k| !paths::absolute(&root, Path::new(k.as_str())).exists())
                .cloned()
                .collect();
            for k in &gone {
                r.remove(k);
            }
            gone
        })
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<RegistryRecord>> {
        let registry = self.store.load()?;
        Ok(registry.list(filter).into_iter().cloned().collect())
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        Ok(self.store.load()?.stats)
    }

    pub fn info(&self, path: &Path) -> Result<DocInfo> {
        let abs = paths::absolute(&self.root, path);
        let key = self.key(&abs);
        let registry = self.store.load()?;
        let record = registry.get(&key).cloned();
        let classification = self.classifier.classify_path(Path::new(&key));
        let doc_type = record
            .as_ref()
            .map(|r| r.doc_type)
            .or(classification.map(|c| c.doc_type));
        Ok(DocInfo {
            path: key,
            doc_type,
            matched_rule: classification.map(|c| c.rule),
            exists: abs.is_file(),
            record,
            rules: doc_type.map(|t| RuleSet::for_type(t, &self.config)),
        })
    }

    // -----------------------------------------------------------------------
    // Ids
    // -----------------------------------------------------------------------

    pub fn next_id(&self, doc_type: DocType, peek: bool) -> Result<String> {
        let seq = Sequence::for_type(doc_type, &self.config)?;
        if peek {
            Ok(seq.peek(&self.store.load()?))
        } else {
            seq.generate(&self.store)
        }
    }

    // -----------------------------------------------------------------------
    // Templates and creation
    // -----------------------------------------------------------------------

    pub fn render_template(
        &self,
        doc_type: DocType,
        vars: &BTreeMap<String, String>,
        remote: Option<&str>,
    ) -> Result<RenderedTemplate> {
        let resolver = TemplateResolver::new(&self.root, &self.config);
        let tpl = match remote {
            Some(reference) => resolver.fetch_remote(reference)?,
            None => resolver
                .resolve(doc_type)?
                .ok_or_else(|| PdocsError::TemplateNotFound(doc_type.to_string()))?,
        };
        let sub = template::substitute(&tpl.content, vars);
        Ok(RenderedTemplate {
            doc_type,
            source: tpl.source,
            origin: tpl.origin,
            content: sub.content,
            unresolved: sub.unresolved,
        })
    }

    /// Resolve a template (or skeleton), optionally mint an id, write the new
    /// file and register it as pending. Never overwrites.
    pub fn create(&self, req: &CreateRequest) -> Result<CreateReport> {
        let doc_type = self.classifier.classify_alias(&req.doc_type)?;
        let rules = RuleSet::for_type(doc_type, &self.config);

        let title = req
            .title
            .clone()
            .or_else(|| req.vars.get("title").cloned())
            .unwrap_or_else(|| format!("New {}", doc_type.as_str().replace('-', " ")));
        let slug = markdown::slugify(&title);

        let sequence = if req.auto_id {
            Some(Sequence::for_type(doc_type, &self.config)?)
        } else {
            None
        };
        let peeked = match &sequence {
            Some(seq) => Some(seq.peek(&self.store.load()?)),
            None => None,
        };

        let target = self.target_path(&rules, req.output.as_deref(), peeked.as_deref(), &slug);
        if target.exists() {
            return Err(PdocsError::AlreadyExists(self.key(&target)));
        }

        let id = match &sequence {
            Some(seq) => Some(seq.generate(&self.store)?),
            None => None,
        };

        let mut vars = BTreeMap::new();
        vars.insert("title".to_string(), title.clone());
        vars.insert("slug".to_string(), slug.clone());
        vars.insert("name".to_string(), slug.clone());
        vars.insert("type".to_string(), doc_type.as_str().to_string());
        vars.insert(
            "date".to_string(),
            chrono::Local::now().format("%Y-%m-%d").to_string(),
        );
        if let Some(id) = &id {
            vars.insert("id".to_string(), id.clone());
        }
        vars.extend(req.vars.iter().map(|(k, v)| (k.clone(), v.clone())));

        let resolver = TemplateResolver::new(&self.root, &self.config);
        let tpl = resolver.resolve_or_skeleton(doc_type)?;
        if tpl.source == TemplateSource::Skeleton {
            tracing::warn!(doc_type = %doc_type, "no template found; writing a skeleton");
        }
        let sub = template::substitute(&tpl.content, &vars);
        crate::io::replace_file(&target, sub.content.as_bytes())?;

        let key = self.key(&target);
        self.store
            .update(|r| r.upsert(&key, doc_type, rules.skill.clone(), DocStatus::Pending).clone())?;

        Ok(CreateReport {
            path: key,
            doc_type,
            id,
            template_source: tpl.source,
            template_origin: tpl.origin,
            unresolved: sub.unresolved,
        })
    }

    fn target_path(
        &self,
        rules: &RuleSet,
        output: Option<&Path>,
        id: Option<&str>,
        slug: &str,
    ) -> PathBuf {
        if let Some(out) = output {
            if is_markdown(out) {
                return paths::absolute(&self.root, out);
            }
        }
        let dir = match output {
            Some(out) => paths::absolute(&self.root, out),
            None => self.root.join(&rules.output_dir),
        };
        let stem = match (id, slug.is_empty()) {
            (Some(id), false) => format!("{id}-{slug}"),
            (Some(id), true) => id.to_string(),
            (None, _) => slug.to_string(),
        };
        let path = match rules.layout {
            FileLayout::Named => dir.join(format!("{stem}.md")),
            FileLayout::Fixed(name) => dir.join(name),
            FileLayout::Nested(name) => dir.join(&stem).join(name),
        };
        paths::normalize(&path)
    }

    // -----------------------------------------------------------------------
    // Watch cycles
    // -----------------------------------------------------------------------

    /// One watch cycle for a created or modified file.
    pub fn on_changed(&self, path: &Path) -> Result<WatchOutcome> {
        let key = self.key(path);
        if !path.is_file() || !self.watches(path) {
            return Ok(WatchOutcome::Ignored { path: key });
        }
        let registry = self.store.load()?;
        let doc_type = match self.resolve_type(path, None, &registry) {
            Ok(t) => t,
            Err(PdocsError::UnclassifiedPath(_)) => return Ok(WatchOutcome::Ignored { path: key }),
            Err(e) => return Err(e),
        };
        let report = self.validate_resolved(path, doc_type, &ValidateRun::default())?;
        Ok(WatchOutcome::Validated(report))
    }

    /// One watch cycle for a removed file: the record goes with it.
    pub fn on_removed(&self, path: &Path) -> Result<WatchOutcome> {
        let key = self.key(path);
        let mut registry = self.store.load()?;
        if registry.remove(&key).is_none() {
            return Ok(WatchOutcome::Ignored { path: key });
        }
        self.store.save(&mut registry)?;
        Ok(WatchOutcome::Removed { path: key })
    }

    /// Whether the watcher should act on `path`, by extension and location.
    pub fn watches(&self, path: &Path) -> bool {
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                self.config
                    .watch
                    .extensions
                    .iter()
                    .any(|w| w.trim_start_matches('.').eq_ignore_ascii_case(e))
            });
        let rel = self.key(path);
        ext_ok && !rel.split('/').any(|c| SKIP_DIRS.contains(&c))
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "md" | "markdown" | "mdx"))
}

fn skip_entry(e: &DirEntry) -> bool {
    let name = e.file_name().to_string_lossy();
    e.file_type().is_dir()
        && (SKIP_DIRS.contains(&name.as_ref())
            || (name.starts_with('.') && name != paths::CLAUDE_DIR))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
