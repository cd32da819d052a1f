//! Baseline storage.
//!
//! Baselines are approved reference images addressed by name. The comparison
//! engine only ever sees decoded buffers; stores deal in encoded bytes.

use crate::result::{ShotError, ShotResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Named storage of encoded baseline images
pub trait BaselineStore: Send + Sync {
    /// Read a baseline
    ///
    /// # Errors
    ///
    /// Returns [`ShotError::BaselineMissing`] if no baseline has that name.
    fn load(&self, name: &str) -> ShotResult<Vec<u8>>;

    /// Create or replace a baseline
    fn save(&self, name: &str, bytes: &[u8]) -> ShotResult<()>;

    /// Whether a baseline with that name exists
    fn exists(&self, name: &str) -> ShotResult<bool>;
}

/// Reject names that cannot be used as a single path component
fn validate_name(name: &str) -> ShotResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(ShotError::InvalidBaselineName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Directory of `<name>.png` files
#[derive(Debug, Clone)]
pub struct FsBaselineStore {
    dir: PathBuf,
}

impl FsBaselineStore {
    /// Store rooted at `dir`; the directory is created on first save
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path a baseline name maps to
    pub fn path_for(&self, name: &str) -> ShotResult<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.png")))
    }
}

impl BaselineStore for FsBaselineStore {
    fn load(&self, name: &str) -> ShotResult<Vec<u8>> {
        let path = self.path_for(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ShotError::BaselineMissing {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, bytes: &[u8]) -> ShotResult<()> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, bytes)?;
        debug!(name, path = %path.display(), bytes = bytes.len(), "baseline written");
        Ok(())
    }

    fn exists(&self, name: &str) -> ShotResult<bool> {
        Ok(self.path_for(name)?.is_file())
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBaselineStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a baseline
    #[must_use]
    pub fn with_baseline(self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.write().insert(name.into(), bytes);
        self
    }

    /// Number of stored baselines
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every write is a single insert, so a poisoned map is still consistent
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn load(&self, name: &str) -> ShotResult<Vec<u8>> {
        validate_name(name)?;
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| ShotError::BaselineMissing {
                name: name.to_string(),
            })
    }

    fn save(&self, name: &str, bytes: &[u8]) -> ShotResult<()> {
        validate_name(name)?;
        self.write().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, name: &str) -> ShotResult<bool> {
        validate_name(name)?;
        Ok(self.read().contains_key(name))
    }
}
