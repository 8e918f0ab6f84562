//! Filesystem helpers shared by the cache and the reconciliation engine.
//!
//! All errors carry the offending path.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use filetime::FileTime;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Directory name of git's bookkeeping data.
pub const GIT_DIR: &str = ".git";

/// Recursively copy the contents of `src` into `dst`.
///
/// `dst` is created if needed. Symbolic links are recreated as links on Unix
/// and copied as their target elsewhere. Anything named `.git` is skipped.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| Error::fs(dst, e))?;

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != GIT_DIR);

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            Error::fs(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::InvalidPath {
                path: entry.path().display().to_string(),
                message: e.to_string(),
            })?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::fs(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::fs(&target, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| Error::fs(src, e))?;
    std::os::unix::fs::symlink(&link, dst).map_err(|e| Error::fs(dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir_all(src, dst)
    } else {
        fs::copy(src, dst).map(|_| ()).map_err(|e| Error::fs(dst, e))
    }
}

/// Remove whatever is at `path`: a directory tree, a file or a link.
///
/// A missing path is not an error.
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::fs(path, e)),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::fs(path, e))
}

/// Make `dst` an exact copy of `src`.
///
/// Whatever was at `dst` before is removed first, so files that no longer
/// exist in `src` do not survive.
pub fn replace_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_path(dst)?;
    copy_dir_all(src, dst)
}

/// Set the modification time of `path` to `time`.
pub fn set_modified(path: &Path, time: SystemTime) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::from_system_time(time)).map_err(|e| Error::fs(path, e))
}

/// Size in bytes of all regular files below `path`.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_all_copies_tree_and_skips_git() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("nested/deep")).unwrap();
        fs::create_dir_all(src.join(".git")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/deep/b.txt"), "b").unwrap();
        fs::write(src.join(".git/HEAD"), "ref").unwrap();

        let dst = temp_dir.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("nested/deep/b.txt")).unwrap(), "b");
        assert!(!dst.join(".git").exists());
    }

    #[test]
    fn test_replace_dir_drops_stale_files() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("fresh.txt"), "new").unwrap();

        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.txt"), "old").unwrap();

        replace_dir(&src, &dst).unwrap();

        assert!(dst.join("fresh.txt").exists());
        assert!(!dst.join("stale.txt").exists());
    }

    #[test]
    fn test_replace_dir_over_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("x"), "x").unwrap();

        let dst = temp_dir.path().join("dst");
        fs::write(&dst, "i was a file").unwrap();

        replace_dir(&src, &dst).unwrap();
        assert!(dst.is_dir());
        assert!(dst.join("x").exists());
    }

    #[test]
    fn test_remove_path_handles_missing_file_and_dir() {
        let temp_dir = TempDir::new().unwrap();
        remove_path(&temp_dir.path().join("missing")).unwrap();

        let file = temp_dir.path().join("file");
        fs::write(&file, "x").unwrap();
        remove_path(&file).unwrap();
        assert!(!file.exists());

        let dir = temp_dir.path().join("dir/sub");
        fs::create_dir_all(&dir).unwrap();
        remove_path(&temp_dir.path().join("dir")).unwrap();
        assert!(!temp_dir.path().join("dir").exists());
    }

    #[test]
    fn test_set_modified() {
        let temp_dir = TempDir::new().unwrap();
        let past = SystemTime::now() - Duration::from_secs(3600);

        set_modified(temp_dir.path(), past).unwrap();

        let modified = fs::metadata(temp_dir.path()).unwrap().modified().unwrap();
        let drift = modified
            .duration_since(past)
            .unwrap_or_else(|e| e.duration());
        assert!(drift < Duration::from_secs(1));
    }

    #[test]
    fn test_dir_size() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a"), "12345").unwrap();
        fs::create_dir_all(temp_dir.path().join("b")).unwrap();
        fs::write(temp_dir.path().join("b/c"), "123").unwrap();
        assert_eq!(dir_size(temp_dir.path()), 8);
    }
}
