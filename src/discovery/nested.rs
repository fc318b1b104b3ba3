//! Nested suite layout: `<root>/<suite>/<n>/<file>_test.go`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Immediate subdirectories of `root`, sorted by name
pub fn find_suites(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut suites = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            suites.push(entry.path());
        }
    }
    suites.sort();
    Ok(suites)
}

/// Subdirectories whose name is made only of digits, ascending by value
pub fn numeric_variants(suite: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut variants = Vec::new();

    for entry in fs::read_dir(suite)? {
        let path = entry?.path();
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Unable to access {}: {}. Skipping.", path.display(), e);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }

        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_variant_id);
        if let Some(id) = id {
            variants.push((id, path));
        }
    }

    variants.sort();
    Ok(variants)
}

fn parse_variant_id(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// First file (by name) in `dir` whose name ends with `suffix`
pub fn find_test_file(dir: &Path, suffix: &str) -> io::Result<Option<PathBuf>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(suffix) {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names.into_iter().next().map(|name| dir.join(name)))
}
