use async_trait::async_trait;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Fallback stored name when sanitization leaves nothing usable.
const FALLBACK_FILENAME: &str = "upload";

#[derive(Debug, Error)]
pub enum StorageError {
    /// The recorded path no longer resolves to a stored file.
    #[error("stored file is missing: {0}")]
    Missing(String),
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for persisting accepted submission files. Handlers only see
/// this trait, so the on-disk implementation (LocalDiskStorage) can be swapped for
/// the in-memory MockStorageService during testing.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the storage root if it does not exist. Called once at startup.
    async fn ensure_root(&self) -> Result<(), StorageError>;

    /// Writes `content` under the challenge's directory using a sanitized form of
    /// `filename`, returning the absolute location recorded on the submission.
    /// An existing file with the same sanitized name is overwritten.
    async fn store(&self, challenge_id: &str, filename: &str, content: &[u8]) -> Result<String, StorageError>;

    /// Reads back a previously stored file. A missing file is `StorageError::Missing`.
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StorageError>;
}

// 2. The Real Implementation (local filesystem)
/// LocalDiskStorage
///
/// Stores files as `<root>/<challenge_id>/<sanitized_filename>`. Challenge
/// directories are created on demand.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn store(&self, challenge_id: &str, filename: &str, content: &[u8]) -> Result<String, StorageError> {
        let challenge_dir = self.root.join(sanitize_filename(challenge_id));
        tokio::fs::create_dir_all(&challenge_dir).await?;

        let path = challenge_dir.join(sanitize_filename(filename));
        tokio::fs::write(&path, content).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        tracing::debug!(path = %absolute.display(), bytes = content.len(), "stored submission file");
        Ok(absolute.to_string_lossy().into_owned())
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        if location.is_empty() {
            return Err(StorageError::Missing(location.to_string()));
        }
        match tokio::fs::read(location).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::Missing(location.to_string())),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// sanitize_filename
///
/// Reduces a client-supplied name to a single safe path segment: NFKD-normalized
/// ASCII, separators turned into spaces, whitespace runs collapsed to `_`, only
/// `[A-Za-z0-9_.-]` kept, and leading/trailing `.`/`_` stripped. Path traversal
/// components (`..`, `/`, `\`) can never survive.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory implementation of `StorageService`. Locations are synthetic
/// `mock://` URIs; `remove` simulates a file vanishing from storage.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Drops a stored file, as if it had been deleted behind the portal's back.
    pub fn remove(&self, location: &str) -> bool {
        self.lock().remove(location).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map only means another test thread panicked mid-insert.
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail_if_requested(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend("Mock Storage Error: Simulation requested".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_root(&self) -> Result<(), StorageError> {
        self.fail_if_requested()
    }

    async fn store(&self, challenge_id: &str, filename: &str, content: &[u8]) -> Result<String, StorageError> {
        self.fail_if_requested()?;
        let location = format!(
            "mock://{}/{}",
            sanitize_filename(challenge_id),
            sanitize_filename(filename)
        );
        self.lock().insert(location.clone(), content.to_vec());
        Ok(location)
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        self.fail_if_requested()?;
        self.lock()
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::Missing(location.to_string()))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
