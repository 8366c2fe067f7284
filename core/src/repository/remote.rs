use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::error::{Result, TrackerError};
use crate::model::record::UsageRecord;

pub const SYNC_TABLE_FILE_NAME: &str = "inventory_sync.json";

/// One row of the remote table: the whole record set for one sync id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteRow {
    pub sync_id: String,
    pub records: Vec<UsageRecord>,
    pub updated_at: DateTime<Utc>,
}

/// A remote table keyed by sync id. Both operations replace or return the
/// whole record set.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Upsert the row for `sync_id`.
    async fn push(&self, sync_id: &str, records: &[UsageRecord]) -> Result<()>;
    /// `Ok(None)` when no row exists yet.
    async fn pull(&self, sync_id: &str) -> Result<Option<Vec<UsageRecord>>>;
}

/// Treat the values a broken environment tends to produce as absent.
pub fn is_unset(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None => true,
        Some(v) => v.is_empty() || v == "undefined" || v == "null",
    }
}

/// Build the directory mirror from a configured location, or log once and
/// fall back to local-only mode.
pub fn detect_directory_mirror(location: Option<&str>) -> Option<DirectoryMirror> {
    if is_unset(location) {
        warn!("Remote mirror not configured. App will operate in local storage mode.");
        return None;
    }
    location.map(|l| DirectoryMirror::new(l.trim()))
}

/// The remote table stored as a JSON file inside a shared directory
/// (network share, synced folder). The directory must already exist; a
/// missing directory counts as an unreachable remote.
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    dir: PathBuf,
}

impl DirectoryMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn location(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self) -> PathBuf {
        self.dir.join(SYNC_TABLE_FILE_NAME)
    }

    async fn read_table(&self) -> Result<Vec<RemoteRow>> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Err(TrackerError::Remote(format!(
                "mirror directory {} is unreachable",
                self.dir.display()
            )));
        }
        match tokio::fs::read(self.table_path()).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_table(&self, rows: &[RemoteRow]) -> Result<()> {
        let content = serde_json::to_vec_pretty(rows)?;
        tokio::fs::write(self.table_path(), content).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteMirror for DirectoryMirror {
    async fn push(&self, sync_id: &str, records: &[UsageRecord]) -> Result<()> {
        let mut rows = self.read_table().await?;
        let row = RemoteRow {
            sync_id: sync_id.to_string(),
            records: records.to_vec(),
            updated_at: Utc::now(),
        };
        if let Some(pos) = rows.iter().position(|r| r.sync_id == sync_id) {
            rows[pos] = row;
        } else {
            rows.push(row);
        }
        self.write_table(&rows).await?;
        debug!(sync_id, "pushed records to mirror");
        Ok(())
    }

    async fn pull(&self, sync_id: &str) -> Result<Option<Vec<UsageRecord>>> {
        let rows = self.read_table().await?;
        Ok(rows
            .into_iter()
            .find(|r| r.sync_id == sync_id)
            .map(|r| r.records))
    }
}

/// In-process mirror. Can be switched offline to simulate an unreachable
/// remote, and counts pushes.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    rows: Mutex<HashMap<String, RemoteRow>>,
    offline: AtomicBool,
    pushes: AtomicUsize,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn row(&self, sync_id: &str) -> Option<RemoteRow> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sync_id)
            .cloned()
    }

    pub fn insert_row(&self, sync_id: &str, records: Vec<UsageRecord>) {
        let row = RemoteRow {
            sync_id: sync_id.to_string(),
            records,
            updated_at: Utc::now(),
        };
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sync_id.to_string(), row);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TrackerError::Remote("mirror unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteMirror for MemoryMirror {
    async fn push(&self, sync_id: &str, records: &[UsageRecord]) -> Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.insert_row(sync_id, records.to_vec());
        Ok(())
    }

    async fn pull(&self, sync_id: &str) -> Result<Option<Vec<UsageRecord>>> {
        self.check_online()?;
        Ok(self.row(sync_id).map(|r| r.records))
    }
}

#[async_trait]
impl<M: RemoteMirror + ?Sized> RemoteMirror for std::sync::Arc<M> {
    async fn push(&self, sync_id: &str, records: &[UsageRecord]) -> Result<()> {
        (**self).push(sync_id, records).await
    }

    async fn pull(&self, sync_id: &str) -> Result<Option<Vec<UsageRecord>>> {
        (**self).pull(sync_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;

    #[test]
    fn test_is_unset() {
        assert!(is_unset(None));
        assert!(is_unset(Some("")));
        assert!(is_unset(Some("  ")));
        assert!(is_unset(Some("undefined")));
        assert!(is_unset(Some("null")));
        assert!(!is_unset(Some("/mnt/share")));
        assert!(detect_directory_mirror(Some("undefined")).is_none());
        assert!(detect_directory_mirror(Some("/mnt/share")).is_some());
    }

    #[tokio::test]
    async fn test_directory_mirror_upsert_and_pull() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = DirectoryMirror::new(dir.path());
        let records = RecordStore::initial().to_vec();

        assert!(mirror.pull("TR-A").await.unwrap().is_none());

        mirror.push("TR-A", &records).await.unwrap();
        mirror.push("TR-B", &records[..1]).await.unwrap();
        mirror.push("TR-A", &records[..2]).await.unwrap();

        assert_eq!(mirror.pull("TR-A").await.unwrap().unwrap().len(), 2);
        assert_eq!(mirror.pull("TR-B").await.unwrap().unwrap().len(), 1);

        let table: Vec<RemoteRow> =
            serde_json::from_slice(&std::fs::read(dir.path().join(SYNC_TABLE_FILE_NAME)).unwrap()).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_directory_mirror_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = DirectoryMirror::new(dir.path().join("offline-share"));
        assert!(mirror.pull("TR-A").await.is_err());
        assert!(mirror.push("TR-A", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_mirror_offline() {
        let mirror = MemoryMirror::new();
        mirror.set_offline(true);
        assert!(mirror.push("TR-A", &[]).await.is_err());
        assert_eq!(mirror.push_count(), 1);
        mirror.set_offline(false);
        mirror.push("TR-A", &[]).await.unwrap();
        assert_eq!(mirror.pull("TR-A").await.unwrap(), Some(Vec::new()));
    }
}
