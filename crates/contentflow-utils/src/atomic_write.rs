//! Durable file replacement for run records.
//!
//! A write goes to a temporary file in the target directory, is fsynced and
//! renamed over the target, and then the directory itself is fsynced so the
//! rename (and, for a new record, the directory entry) survives a crash.
//! Readers observe either the previous record or the new one, never a torn
//! write.

use camino::Utf8Path;
use std::io::{self, Write};

use tempfile::NamedTempFile;

use crate::paths::ensure_dir_all;

#[cfg(test)]
thread_local! {
    static DIR_SYNCS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Replace `path` with `content`; once this returns `Ok` the new content is
/// on stable storage.
///
/// The parent directory is created if needed. The temporary file lives next
/// to the target, so the rename never crosses filesystems.
///
/// # Errors
/// Any I/O failure while creating, writing, syncing or renaming.
pub fn write_file_atomic(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    ensure_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    sync_dir(dir)
}

/// Flush directory metadata (new entries, renames) to disk.
#[cfg(unix)]
fn sync_dir(dir: &Utf8Path) -> io::Result<()> {
    #[cfg(test)]
    DIR_SYNCS.with(|count| count.set(count.get() + 1));
    std::fs::File::open(dir)?.sync_all()
}

/// Windows cannot open a directory for fsync through std; NTFS journals the
/// rename itself.
#[cfg(not(unix))]
fn sync_dir(_dir: &Utf8Path) -> io::Result<()> {
    #[cfg(test)]
    DIR_SYNCS.with(|count| count.set(count.get() + 1));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn target(temp_dir: &TempDir, name: &str) -> camino::Utf8PathBuf {
        camino::Utf8PathBuf::from_path_buf(temp_dir.path().join(name)).unwrap()
    }

    fn dir_syncs() -> usize {
        DIR_SYNCS.with(std::cell::Cell::get)
    }

    #[test]
    fn test_atomic_write_basic() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = target(&temp_dir, "run.json");

        write_file_atomic(&file_path, b"{\"id\":\"a\"}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"id\":\"a\"}");
    }

    #[test]
    fn test_every_write_syncs_the_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = target(&temp_dir, "run.json");

        let before = dir_syncs();
        write_file_atomic(&file_path, b"created").unwrap();
        write_file_atomic(&file_path, b"replaced").unwrap();
        assert_eq!(dir_syncs() - before, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_dir_reports_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = target(&temp_dir, "gone");
        let err = sync_dir(&missing).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_atomic_write_replaces_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = target(&temp_dir, "run.json");

        write_file_atomic(&file_path, b"first version, quite a bit longer").unwrap();
        write_file_atomic(&file_path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "second");
    }

    #[test]
    fn test_atomic_write_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = target(&temp_dir, "runs/nested/run.json");

        write_file_atomic(&nested_path, b"content").unwrap();
        assert!(nested_path.exists());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = target(&temp_dir, "run.json");

        for i in 0..5 {
            write_file_atomic(&file_path, format!("v{i}").as_bytes()).unwrap();
        }

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
