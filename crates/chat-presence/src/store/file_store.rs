//! File-backed snapshot store.
//!
//! One JSON file per key inside a directory. Writes go to a temporary file
//! first and are renamed into place, so a crash never leaves a torn snapshot.

use async_trait::async_trait;
use chat_core::{DomainError, PortResult, SnapshotStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Snapshot store writing `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(DomainError::ValidationError(format!(
                "invalid snapshot key: {key}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DomainError::Storage(format!("{}: {e}", path.display()))),
        }
    }

    async fn save(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DomainError::Storage(format!("{}: {e}", self.dir.display())))?;
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| DomainError::Storage(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| DomainError::Storage(format!("{}: {e}", path.display())))?;

        trace!(path = %path.display(), bytes = value.len(), "Snapshot written");
        Ok(())
    }
}
