//! Log persistence used by `@save`.
//!
//! Filename validation happens in the controller; a [`Persister`] trusts
//! the name it is given.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Writes text content under a name.
pub trait Persister: Send + Sync {
    /// Persists `content` as `filename`, returning where it was written.
    fn persist(&self, content: &str, filename: &str) -> io::Result<PathBuf>;
}

/// Writes files into a fixed directory.
#[derive(Debug, Clone)]
pub struct FilePersister {
    dir: PathBuf,
}

impl FilePersister {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl Persister for FilePersister {
    fn persist(&self, content: &str, filename: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, content)?;
        // Report an absolute path when the directory is relative
        Ok(fs::canonicalize(&path).unwrap_or(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let persister = FilePersister::new(dir.path());
        let path = persister.persist("line one\n", "server.log").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "line one\n");
        assert!(path.ends_with("server.log"));
    }

    #[test]
    fn test_persist_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("today");
        let persister = FilePersister::new(&nested);
        persister.persist("x", "a.txt").unwrap();
        assert!(nested.join("a.txt").exists());
    }
}
