//! File writes for pdocs state: the registry, seeded config, repaired
//! documents and rendered templates. Every write lands through a sibling
//! temp file so a crash mid-write leaves the previous content in place.

use crate::error::{PdocsError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `data`, creating missing parent directories.
pub fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let failed = |source: std::io::Error| PdocsError::Write {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(failed)?;
    let mut staged = NamedTempFile::new_in(dir).map_err(failed)?;
    staged.write_all(data).map_err(failed)?;
    staged.as_file().sync_all().map_err(failed)?;
    staged.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}

/// Seed `path` with `data` unless something is already there, as `init`
/// does for the default config. Returns whether the file was written.
pub fn seed_file(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    replace_file(path, data)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn registry_write_creates_pdocs_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pdocs/registry.yaml");
        replace_file(&path, b"version: 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "version: 1\n");
    }

    #[test]
    fn repaired_document_replaces_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs/plans/P-01.md");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# Draft\n").unwrap();
        replace_file(&path, b"# Plan\n\n## Overview\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Plan\n\n## Overview\n");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn write_onto_directory_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pdocs/registry.yaml");
        std::fs::create_dir_all(&path).unwrap();
        let err = replace_file(&path, b"version: 1\n").unwrap_err();
        assert!(matches!(err, PdocsError::Write { .. }));
        assert!(err.to_string().contains("registry.yaml"));
    }

    #[test]
    fn seeded_config_keeps_user_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pdocs/config.yaml");
        assert!(seed_file(&path, b"version: 1\n").unwrap());
        std::fs::write(&path, "version: 1\nwatch:\n  debounce_ms: 50\n").unwrap();
        assert!(!seed_file(&path, b"version: 1\n").unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("debounce_ms: 50"));
    }
}
