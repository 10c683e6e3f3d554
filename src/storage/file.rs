//! JSON file store: one `<key>.json` file per key in a directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::PersistenceGateway;
use crate::config::AppConfig;

/// Default directory for persisted state.
const DEFAULT_STORAGE_DIR: &str = "calmbet_state";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: Option<&str>) -> Self {
        Self {
            dir: PathBuf::from(dir.unwrap_or(DEFAULT_STORAGE_DIR)),
        }
    }

    /// Store under `[app] storage_dir`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Some(&config.app.storage_dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Delete the value for `key` (for testing or reset).
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete {}", path.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);

        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No saved value");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn save(&self, key: &str, json: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        // Write to a sibling file and rename so a crash never leaves half a document.
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        debug!(path = %path.display(), bytes = json.len(), "Value saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
