//! Durable string key-value backends

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error type for backend reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A durable string key-value store.
pub trait KeyValueBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError>;
}

/// In-process backend, lost at exit.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    values: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with a single value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut backend = Self::new();
        backend.values.insert(key.to_string(), value.to_string());
        backend
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Backend storing each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_roundtrip() {
        let mut backend = MemoryBackend::new();
        assert!(backend.get("k").unwrap().is_none());
        backend.set("k", "v").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(backend.raw("k"), Some("v"));
    }

    #[test]
    fn test_file_backend_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        assert!(backend.get("habrFilterData").unwrap().is_none());
    }

    #[test]
    fn test_file_backend_creates_dir_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("nested"));
        backend.set("habrFilterData", "{}").unwrap();
        backend.set("habrFilterData", "{\"tags\":{}}").unwrap();

        assert_eq!(backend.get("habrFilterData").unwrap().as_deref(), Some("{\"tags\":{}}"));
        assert!(backend.path_for("habrFilterData").exists());
        assert!(!backend.path_for("habrFilterData").with_extension("json.tmp").exists());
    }
}
