use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use branchmap_shared::{ColorTags, MarkerColor};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug)]
pub enum StoreError {
    Serialize(serde_json::Error),
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "failed to encode color tags: {e}"),
            Self::Write { path, source } => {
                write!(f, "failed to write color tags to {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Live branch colors, optionally mirrored to a JSON file after every change.
#[derive(Debug, Clone)]
pub struct ColorTagStore {
    tags: Arc<RwLock<ColorTags>>,
    revision: Arc<AtomicU64>,
    path: Option<PathBuf>,
}

impl ColorTagStore {
    pub fn in_memory() -> Self {
        Self::with_tags(ColorTags::new(), None)
    }

    fn with_tags(tags: ColorTags, path: Option<PathBuf>) -> Self {
        Self {
            tags: Arc::new(RwLock::new(tags)),
            revision: Arc::new(AtomicU64::new(0)),
            path,
        }
    }

    /// Reads the persisted mapping once at startup. A missing or unreadable
    /// file starts the store empty.
    pub async fn load(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            info!("color tags kept in memory only");
            return Self::in_memory();
        };

        let tags = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<ColorTags>(&bytes) {
                Ok(tags) => {
                    info!(path = %path.display(), count = tags.len(), "loaded color tags");
                    tags
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable color tag file");
                    ColorTags::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no color tag file yet, starting empty");
                ColorTags::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read color tag file");
                ColorTags::new()
            }
        };

        Self::with_tags(tags, Some(path))
    }

    pub fn persistent(&self) -> bool {
        self.path.is_some()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> (ColorTags, u64) {
        let tags = self.tags.read().await;
        (tags.clone(), self.revision())
    }

    /// Colors every listed branch and returns the new mapping with its
    /// revision. The in-memory change stands even when writing the file fails.
    pub async fn assign(
        &self,
        branches: Vec<String>,
        color: MarkerColor,
    ) -> Result<(ColorTags, u64), StoreError> {
        let mut tags = self.tags.write().await;
        let written = tags.assign(branches, color);
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        info!(branches = written, %color, revision, "assigned marker color");
        self.persist(&tags).await?;
        Ok((tags.clone(), revision))
    }

    pub async fn reset(&self) -> Result<(ColorTags, u64), StoreError> {
        let mut tags = self.tags.write().await;
        let cleared = tags.len();
        tags.reset();
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        info!(cleared, revision, "reset marker colors");
        self.persist(&tags).await?;
        Ok((tags.clone(), revision))
    }

    async fn persist(&self, tags: &ColorTags) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(tags).map_err(StoreError::Serialize)?;
        write_atomically(path, &json)
            .await
            .map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

async fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}
