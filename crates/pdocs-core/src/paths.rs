use std::path::{Component, Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PDOCS_DIR: &str = ".pdocs";
pub const CONFIG_FILE: &str = ".pdocs/config.yaml";
pub const REGISTRY_FILE: &str = ".pdocs/registry.yaml";
pub const TEMPLATES_DIR: &str = ".pdocs/templates";

pub const CLAUDE_DIR: &str = ".claude";
pub const SKILLS_DIR: &str = ".claude/skills";
pub const SHARED_TEMPLATES_DIR: &str = ".claude/templates";
pub const DOCS_TEMPLATES_DIR: &str = "docs/templates";
pub const ROOT_TEMPLATES_DIR: &str = "templates";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn registry_path(root: &Path) -> PathBuf {
    root.join(REGISTRY_FILE)
}

pub fn templates_dir(root: &Path) -> PathBuf {
    root.join(TEMPLATES_DIR)
}

pub fn skill_dir(root: &Path, skill: &str) -> PathBuf {
    root.join(SKILLS_DIR).join(skill)
}

/// Resolve `path` against `root` when it is relative.
pub fn absolute(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Registry key for a document: project-relative, forward slashes.
/// Paths outside the project keep their normalized absolute form.
pub fn registry_key(root: &Path, path: &Path) -> String {
    let abs = normalize(&absolute(root, path));
    let root = normalize(root);
    let rel = abs.strip_prefix(&root).unwrap_or(&abs);
    to_slash(rel)
}

pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
