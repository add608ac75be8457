use crate::error::{PlaysError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Readers see either the previous content or the new content, never a mix.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PlaysError::filesystem(dir, e))?;
    tmp.write_all(data)
        .map_err(|e| PlaysError::filesystem(path, e))?;
    tmp.persist(path)
        .map_err(|e| PlaysError::filesystem(path, e.error))?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| PlaysError::filesystem(path, e))
}

/// Write a file only if it does not already exist. Returns true if written.
///
/// The final rename refuses to clobber, so two concurrent callers can never
/// overwrite each other or an operator-edited file.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PlaysError::filesystem(dir, e))?;
    tmp.write_all(data)
        .map_err(|e| PlaysError::filesystem(path, e))?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(PlaysError::filesystem(path, e.error)),
    }
}

/// Remove a file, treating "already gone" as success. Returns true if removed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PlaysError::filesystem(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.yaml");
        atomic_write(&path, b"hello: world").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello: world");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/test.yaml");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.yml");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, b"original").unwrap();
        let written = write_if_missing(&path, b"new").unwrap();
        assert!(!written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn write_if_missing_creates_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/inventory.ini");
        assert!(write_if_missing(&path, b"one").unwrap());
        assert!(!write_if_missing(&path, b"two").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");
    }

    #[test]
    fn remove_if_exists_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.yml");
        assert!(!remove_if_exists(&path).unwrap());
        std::fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
