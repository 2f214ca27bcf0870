use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Logout URL file name in the data directory
pub const LOGOUT_URL_FILE: &str = "logout_url";

/// Last confirmed attribute UUID file name in the data directory
pub const ATTRIBUTE_UUID_FILE: &str = "attribute_uuid";

/// A single durable text value whose presence carries meaning on its own.
///
/// Writes replace the whole value. Implementations trim surrounding
/// whitespace on read.
pub trait Artifact: Send + Sync {
    fn exists(&self) -> bool;
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, value: &str) -> Result<()>;
    /// Returns whether anything was removed
    fn delete(&self) -> Result<bool>;
}

/// One-line text file artifact
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
}

impl FileArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Artifact for FileArtifact {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", value))
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn delete(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

/// In-memory artifact. Clones share the same value, so a test can hold one
/// handle and remove the value out-of-band.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifact {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryArtifact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(value.into()))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.value
            .lock()
            .map_err(|_| anyhow::anyhow!("artifact lock poisoned"))
    }
}

impl Artifact for MemoryArtifact {
    fn exists(&self) -> bool {
        self.lock().map(|v| v.is_some()).unwrap_or(false)
    }

    fn read(&self) -> Result<Option<String>> {
        Ok(self.lock()?.as_deref().map(|v| v.trim().to_string()))
    }

    fn write(&self, value: &str) -> Result<()> {
        *self.lock()? = Some(value.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<bool> {
        Ok(self.lock()?.take().is_some())
    }
}
