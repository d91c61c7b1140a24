//! Local backup of the last applied snapshot of each namespace.

use crate::error::{ConfigError, Result};
use crate::sync::ConfigSnapshot;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persists snapshots so they can be served when the config service is
/// unreachable.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Load the backup of `namespace`. A missing backup is `Ok(None)`.
    async fn load(
        &self,
        dir: &Path,
        app_id: &str,
        namespace: &str,
    ) -> Result<Option<ConfigSnapshot>>;

    /// Persist `snapshot` under `dir`.
    async fn write(&self, snapshot: &ConfigSnapshot, dir: &Path) -> Result<()>;
}

/// Stores each snapshot as JSON in `{dir}/{appId}-{namespace}.json`.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::sources::{BackupStore, FileBackup};
/// use std::path::Path;
///
/// # async fn example() -> apollo_client::error::Result<()> {
/// let backup = FileBackup;
/// if let Some(snapshot) = backup.load(Path::new("/var/lib/app"), "svc", "application").await? {
///     println!("release {}", snapshot.release_key);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBackup;

impl FileBackup {
    /// Path of the backup file for `namespace`.
    pub fn file_path(dir: &Path, app_id: &str, namespace: &str) -> PathBuf {
        dir.join(format!("{}-{}.json", app_id, namespace))
    }
}

#[async_trait]
impl BackupStore for FileBackup {
    async fn load(
        &self,
        dir: &Path,
        app_id: &str,
        namespace: &str,
    ) -> Result<Option<ConfigSnapshot>> {
        let path = Self::file_path(dir, app_id, namespace);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no backup file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            ConfigError::Decode(format!("Failed to parse backup {}: {}", path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    async fn write(&self, snapshot: &ConfigSnapshot, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let path = Self::file_path(dir, &snapshot.app_id, &snapshot.namespace_name);
        let staging = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(snapshot)?;

        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!(path = %path.display(), "backup written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            app_id: "svc".to_string(),
            cluster: "default".to_string(),
            namespace_name: "application".to_string(),
            release_key: "rk-7".to_string(),
            configurations: HashMap::from([("timeout".to_string(), json!("30"))]),
        }
    }

    #[test]
    fn test_file_path() {
        let path = FileBackup::file_path(Path::new("/tmp/backup"), "svc", "db.yaml");
        assert_eq!(path, PathBuf::from("/tmp/backup/svc-db.yaml.json"));
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        FileBackup.write(&snapshot(), dir.path()).await.unwrap();

        let loaded = FileBackup
            .load(dir.path(), "svc", "application")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, snapshot());
        assert!(!dir.path().join("svc-application.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_backup() {
        let dir = TempDir::new().unwrap();
        let loaded = FileBackup.load(dir.path(), "svc", "application").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_backup() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("svc-application.json"), "{not json").unwrap();

        let err = FileBackup
            .load(dir.path(), "svc", "application")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        FileBackup.write(&snapshot(), &nested).await.unwrap();
        assert!(nested.join("svc-application.json").exists());
    }
}
