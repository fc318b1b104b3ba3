//! Flat project layout: every test file under a directory tree

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All files below `dir` (recursively) whose name ends with `suffix`, in
/// directory-walk order with entries sorted by name
pub fn find_test_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix));
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
