use pdocs_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `PDOCS_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.pdocs/`, then `.claude/`, then `.git/`
/// 3. Fall back to `cwd`
///
/// The result is canonicalized so watcher event paths and user paths share
/// one prefix.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let root = match explicit {
        Some(p) => cwd.join(p),
        None => find_marker(&cwd, &[paths::PDOCS_DIR, paths::CLAUDE_DIR, ".git"]).unwrap_or(cwd),
    };
    std::fs::canonicalize(&root).unwrap_or(root)
}

/// First ancestor of `start` (inclusive) holding one of `markers`, trying the
/// markers in order.
fn find_marker(start: &Path, markers: &[&str]) -> Option<PathBuf> {
    markers.iter().find_map(|marker| {
        start
            .ancestors()
            .find(|dir| dir.join(marker).is_dir())
            .map(Path::to_path_buf)
    })
}

/// Make a path typed by the user absolute against the current directory.
/// Existing paths are canonicalized; for a missing file the parent is.
pub fn user_path(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let abs = cwd.join(path);
    if let Ok(p) = std::fs::canonicalize(&abs) {
        return p;
    }
    match (abs.parent(), abs.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(abs),
        _ => abs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn pdocs_marker_beats_git() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("sub/.pdocs")).unwrap();
        let deep = dir.path().join("sub/docs/plans");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_marker(&deep, &[".pdocs", ".claude", ".git"]).unwrap();
        assert_eq!(found, dir.path().join("sub"));
    }

    #[test]
    fn falls_through_markers_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".claude")).unwrap();
        let deep = dir.path().join("a/b");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(
            find_marker(&deep, &[".pdocs", ".claude"]),
            Some(dir.path().to_path_buf())
        );
        assert_eq!(find_marker(&deep, &[".pdocs"]), None);
    }

    #[test]
    fn user_path_keeps_missing_file_name() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.md");
        let p = user_path(&missing);
        assert_eq!(p, std::fs::canonicalize(dir.path()).unwrap().join("gone.md"));
    }
}
