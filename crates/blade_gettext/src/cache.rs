//! The compiled-template cache that brackets every run.

use std::fs;
use std::path::Path;

use crate::error::{GettextError, Result};
use crate::util::ensure_dir;

/// Creates `dir` or empties it so no artifact from an earlier run is extracted.
pub fn prepare(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        clear(dir)?;
    } else {
        ensure_dir(dir)?;
    }
    tracing::debug!(dir = %dir.display(), "cache prepared");
    Ok(())
}

/// Removes everything inside `dir`, keeping the directory itself.
pub fn cleanup(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    clear(dir)?;
    tracing::debug!(dir = %dir.display(), "cache purged");
    Ok(())
}

fn clear(dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(GettextError::filesystem("list directory", dir))?;
    for entry in entries {
        let path = entry
            .map_err(GettextError::filesystem("list directory", dir))?
            .path();
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(GettextError::filesystem("delete", &path))?;
        } else {
            fs::remove_file(&path).map_err(GettextError::filesystem("delete", &path))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{cleanup, prepare};

    #[test]
    fn prepare_creates_missing_directory() {
        let temp = tempdir().expect("tempdir");
        let cache = temp.path().join("storage/gettext");
        prepare(&cache).expect("prepare");
        assert!(cache.is_dir());
    }

    #[test]
    fn prepare_empties_existing_directory_and_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let cache = temp.path().join("cache");
        fs::create_dir_all(cache.join("nested")).expect("nested");
        fs::write(cache.join("stale.php"), "<?php").expect("stale");
        fs::write(cache.join("nested/old.php"), "<?php").expect("old");
        fs::write(cache.join(".keep"), "").expect("dotfile");

        prepare(&cache).expect("prepare");
        prepare(&cache).expect("prepare again");

        assert!(cache.is_dir());
        assert_eq!(fs::read_dir(&cache).expect("read").count(), 0);
    }

    #[test]
    fn cleanup_tolerates_missing_directory() {
        let temp = tempdir().expect("tempdir");
        cleanup(&temp.path().join("missing")).expect("cleanup");
    }

    #[test]
    fn cleanup_removes_artifacts() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.php"), "<?php").expect("artifact");
        cleanup(temp.path()).expect("cleanup");
        assert_eq!(fs::read_dir(temp.path()).expect("read").count(), 0);
    }
}
