use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("failed to access usage counter {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a store found at its location, before any policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCount {
    Absent,
    Value(u32),
    Corrupt(String),
}

impl StoredCount {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(value) => Self::Value(value.clamp(0, i64::from(u32::MAX)) as u32),
            Err(_) => Self::Corrupt(raw.to_string()),
        }
    }
}

/// Persistence for a single remaining-request counter.
///
/// Implementations assume a single writer; nothing here locks across
/// processes.
pub trait QuotaStore: Send + Sync + Debug {
    fn load(&self) -> Result<StoredCount, QuotaError>;

    fn save(&self, remaining: u32) -> Result<(), QuotaError>;

    fn clear(&self) -> Result<(), QuotaError>;

    /// A sibling store holding an independent counter for `client`.
    fn scoped(&self, client: &str) -> Arc<dyn QuotaStore>;
}

#[derive(Debug, Clone)]
pub struct FileQuotaStore {
    path: PathBuf,
}

impl FileQuotaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> QuotaError {
        QuotaError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl QuotaStore for FileQuotaStore {
    fn load(&self) -> Result<StoredCount, QuotaError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(StoredCount::parse(&raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(StoredCount::Absent),
            // Non-UTF-8 bytes are corruption, not an access failure.
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                Ok(StoredCount::Corrupt("<non-utf8>".to_string()))
            }
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn save(&self, remaining: u32) -> Result<(), QuotaError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        fs::write(&self.path, remaining.to_string()).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), QuotaError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn scoped(&self, client: &str) -> Arc<dyn QuotaStore> {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let scoped_name = format!("{file_name}.{}", sanitize_client(client));
        Arc::new(Self::new(self.path.with_file_name(scoped_name)))
    }
}

/// In-process store; all scoped siblings share one map.
#[derive(Debug, Clone)]
pub struct MemoryQuotaStore {
    cells: Arc<Mutex<HashMap<String, String>>>,
    key: String,
}

impl Default for MemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self {
            cells: Arc::new(Mutex::new(HashMap::new())),
            key: String::new(),
        }
    }

    pub fn with_remaining(remaining: u32) -> Self {
        Self::with_raw(&remaining.to_string())
    }

    pub fn with_raw(raw: &str) -> Self {
        let store = Self::new();
        store.cells().insert(String::new(), raw.to_string());
        store
    }

    /// Raw text currently persisted for this store's key.
    pub fn raw(&self) -> Option<String> {
        self.cells().get(&self.key).cloned()
    }

    fn cells(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.cells
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn load(&self) -> Result<StoredCount, QuotaError> {
        Ok(self
            .raw()
            .map_or(StoredCount::Absent, |raw| StoredCount::parse(&raw)))
    }

    fn save(&self, remaining: u32) -> Result<(), QuotaError> {
        self.cells().insert(self.key.clone(), remaining.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), QuotaError> {
        self.cells().remove(&self.key);
        Ok(())
    }

    fn scoped(&self, client: &str) -> Arc<dyn QuotaStore> {
        Arc::new(Self {
            cells: Arc::clone(&self.cells),
            key: sanitize_client(client),
        })
    }
}

fn sanitize_client(client: &str) -> String {
    client
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
