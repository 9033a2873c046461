use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Discover batch-request files under `root`.
///
/// A file path is returned as is. A directory is walked recursively for
/// `*.json` files; hidden entries (names starting with '.') are skipped,
/// together with everything below a hidden directory. Results are sorted
/// so runs over the same tree are reproducible.
pub fn scan_requests(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut results: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name().to_str().unwrap_or("")))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();

    results.sort();
    results
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(scan_requests(&path), vec![path]);
    }

    #[test]
    fn test_scan_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("2024/march")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        std::fs::write(root.join("b.json"), "{}").unwrap();
        std::fs::write(root.join("a.json"), "{}").unwrap();
        std::fs::write(root.join("notes.txt"), "").unwrap();
        std::fs::write(root.join("2024/march/c.json"), "{}").unwrap();
        std::fs::write(root.join(".cache/d.json"), "{}").unwrap();
        std::fs::write(root.join(".e.json"), "{}").unwrap();

        let found = scan_requests(root);
        assert_eq!(
            found,
            vec![
                root.join("2024/march/c.json"),
                root.join("a.json"),
                root.join("b.json"),
            ]
        );
    }

    #[test]
    fn test_scan_missing_root() {
        assert!(scan_requests(Path::new("/nonexistent/requests")).is_empty());
    }
}
