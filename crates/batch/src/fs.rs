use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Supplies the text of a named artifact.
pub trait ArtifactSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<String, ArtifactError>;
}

/// Stores a finished artifact, replacing any previous content.
pub trait ArtifactSink: Send + Sync {
    fn write(&self, path: &Path, text: &str) -> Result<(), ArtifactError>;
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact '{path}' does not exist")]
    NotFound { path: String },
    #[error("I/O error on '{path}'")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ArtifactError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Default)]
pub struct StdArtifactFs;

impl ArtifactSource for StdArtifactFs {
    fn read(&self, path: &Path) -> Result<String, ArtifactError> {
        std::fs::read_to_string(path).map_err(|source| {
            let path = path.display().to_string();
            if source.kind() == io::ErrorKind::NotFound {
                ArtifactError::NotFound { path }
            } else {
                ArtifactError::Io { path, source }
            }
        })
    }
}

impl ArtifactSink for StdArtifactFs {
    fn write(&self, path: &Path, text: &str) -> Result<(), ArtifactError> {
        std::fs::write(path, text).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// In-memory artifact store, keyed by path.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryArtifacts {
    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.lock().insert(path.into(), text.into());
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        self.lock().get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, String>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ArtifactSource for MemoryArtifacts {
    fn read(&self, path: &Path) -> Result<String, ArtifactError> {
        self.get(path).ok_or_else(|| ArtifactError::NotFound {
            path: path.display().to_string(),
        })
    }
}

impl ArtifactSink for MemoryArtifacts {
    fn write(&self, path: &Path, text: &str) -> Result<(), ArtifactError> {
        self.insert(path, text);
        Ok(())
    }
}
