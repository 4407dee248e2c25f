//! Ordered discovery of per-volume file sets.
//!
//! Per-volume data and warp files are addressed by an explicit
//! lexicographically-sorted list; nothing downstream depends on filesystem
//! enumeration order.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// List files in `dir` whose names end with `suffix`, sorted by file name.
///
/// Returns an empty list when the directory does not exist; a present but
/// unreadable directory is an error.
pub fn sorted_files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(suffix))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn files_come_back_sorted_and_filtered() -> Result<()> {
        let dir = tempdir()?;
        for name in ["vol0002.nii", "vol0000.nii", "vol0001.nii", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"")?;
        }
        let files = sorted_files_with_suffix(dir.path(), ".nii")?;
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["vol0000.nii", "vol0001.nii", "vol0002.nii"]);
        Ok(())
    }

    #[test]
    fn missing_directory_yields_empty_list() -> Result<()> {
        let dir = tempdir()?;
        let files = sorted_files_with_suffix(&dir.path().join("absent"), ".nii")?;
        assert!(files.is_empty());
        Ok(())
    }
}
