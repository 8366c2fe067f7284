use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::model::record::UsageRecord;
use crate::repository::{LocalStore, RemoteMirror};
use crate::sync::scheduler::{ScheduledTask, Scheduler};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2500);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No remote configured, or nothing has happened yet.
    Idle,
    /// A push is scheduled or a push/pull is in flight.
    Syncing,
    Synced,
    /// The last remote operation failed.
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// `TR-` followed by seven uppercase alphanumerics.
pub fn generate_sync_id() -> String {
    let token: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(7)
        .collect();
    format!("TR-{}", token.to_uppercase())
}

pub fn normalize_sync_id(input: &str) -> Result<String> {
    let id = input.trim().to_uppercase();
    if id.is_empty() {
        return Err(TrackerError::InvalidSyncId(input.to_string()));
    }
    Ok(id)
}

/// Status shared with in-flight push tasks. Each operation takes a new
/// generation; only the latest generation may report its outcome, so a
/// slow push cannot overwrite the status of a newer one.
#[derive(Debug)]
struct StatusCell {
    tx: watch::Sender<SyncStatus>,
    generation: AtomicU64,
}

impl StatusCell {
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(SyncStatus::Syncing);
        generation
    }

    fn finish(&self, generation: u64, status: SyncStatus) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.tx.send_replace(status);
        } else {
            debug!(generation, %status, "ignoring stale sync outcome");
        }
    }

    fn set(&self, status: SyncStatus) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(status);
    }
}

async fn push_records<M: RemoteMirror>(
    remote: &M,
    cell: &StatusCell,
    generation: u64,
    sync_id: &str,
    records: &[UsageRecord],
) -> SyncStatus {
    let status = match remote.push(sync_id, records).await {
        Ok(()) => {
            info!(sync_id, "pushed records to remote");
            SyncStatus::Synced
        }
        Err(err) => {
            warn!(sync_id, "remote push failed: {}", err);
            SyncStatus::Error
        }
    };
    cell.finish(generation, status);
    status
}

/// Keeps the local slot and the remote mirror in step with the record set.
///
/// Local persistence happens synchronously on every change. Remote pushes
/// are debounced; a change cancels any push that has not started yet.
pub struct SyncCoordinator<L, M> {
    local: L,
    remote: Option<Arc<M>>,
    cell: Arc<StatusCell>,
    pending: Mutex<Option<ScheduledTask>>,
    sync_id: Mutex<String>,
    scheduler: Scheduler,
    debounce: Duration,
}

impl<L, M> SyncCoordinator<L, M>
where
    L: LocalStore,
    M: RemoteMirror + 'static,
{
    /// Loads the sync id from the local slot, generating and saving one on
    /// first run.
    pub fn new(local: L, remote: Option<M>) -> Result<Self> {
        let sync_id = match local.load_sync_id()? {
            Some(id) => id,
            None => {
                let id = generate_sync_id();
                local.save_sync_id(&id)?;
                info!(sync_id = %id, "generated sync id");
                id
            }
        };
        let (tx, _rx) = watch::channel(SyncStatus::Idle);

        Ok(Self {
            local,
            remote: remote.map(Arc::new),
            cell: Arc::new(StatusCell {
                tx,
                generation: AtomicU64::new(0),
            }),
            pending: Mutex::new(None),
            sync_id: Mutex::new(sync_id),
            scheduler: Scheduler::new(),
            debounce: DEFAULT_DEBOUNCE,
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn is_remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn status(&self) -> SyncStatus {
        *self.cell.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.cell.tx.subscribe()
    }

    pub fn sync_id(&self) -> String {
        self.sync_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_pending_push(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn take_pending(&self) -> Option<ScheduledTask> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// One pull on startup. Returns the remote record set when one exists;
    /// the caller replaces its store with it.
    pub async fn startup(&self) -> Option<Vec<UsageRecord>> {
        if self.remote.is_none() {
            debug!("no remote configured, staying local");
            self.cell.set(SyncStatus::Idle);
            return None;
        }
        self.pull().await
    }

    async fn pull(&self) -> Option<Vec<UsageRecord>> {
        let remote = self.remote.as_ref()?;
        let sync_id = self.sync_id();
        let generation = self.cell.begin();

        match remote.pull(&sync_id).await {
            Ok(Some(records)) => {
                info!(sync_id = %sync_id, records = records.len(), "pulled records from remote");
                self.cell.finish(generation, SyncStatus::Synced);
                Some(records)
            }
            Ok(None) => {
                info!(sync_id = %sync_id, "no remote data yet, keeping local records");
                self.cell.finish(generation, SyncStatus::Synced);
                None
            }
            Err(err) => {
                warn!(sync_id = %sync_id, "remote pull failed: {}", err);
                self.cell.finish(generation, SyncStatus::Error);
                None
            }
        }
    }

    /// Persist a record set that came from the remote without echoing it back.
    pub fn persist(&self, records: &[UsageRecord]) -> Result<()> {
        self.local.save_records(records)
    }

    /// Handle a record-store change: save locally right away, then
    /// (re)schedule the debounced push. Must be called within a tokio runtime
    /// when a remote is configured.
    pub fn record_changed(&self, records: Vec<UsageRecord>) -> Result<()> {
        self.local.save_records(&records)?;

        let Some(remote) = self.remote.clone() else {
            return Ok(());
        };

        if let Some(previous) = self.take_pending() {
            debug!("replacing pending push");
            previous.cancel();
        }

        let cell = self.cell.clone();
        let generation = cell.begin();
        let sync_id = self.sync_id();
        let task = self.scheduler.schedule(self.debounce, async move {
            push_records(remote.as_ref(), &cell, generation, &sync_id, &records).await;
        });

        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    /// Push `records` now if a push is pending, instead of waiting out the
    /// quiet period. Returns the resulting status.
    pub async fn flush(&self, records: &[UsageRecord]) -> SyncStatus {
        let (Some(remote), Some(pending)) = (self.remote.as_ref(), self.take_pending()) else {
            return self.status();
        };
        if pending.is_finished() {
            return self.status();
        }
        pending.cancel();

        let generation = self.cell.begin();
        let sync_id = self.sync_id();
        push_records(remote.as_ref(), &self.cell, generation, &sync_id, records).await
    }

    /// Unconditional push, replacing any pending one. `Idle` without a remote.
    pub async fn push_now(&self, records: &[UsageRecord]) -> SyncStatus {
        if let Some(pending) = self.take_pending() {
            pending.cancel();
        }
        let Some(remote) = self.remote.as_ref() else {
            return self.status();
        };
        let generation = self.cell.begin();
        let sync_id = self.sync_id();
        push_records(remote.as_ref(), &self.cell, generation, &sync_id, records).await
    }

    /// Switch to another sync id. The id is saved locally; with a remote
    /// configured, any pending push is dropped and the new row is pulled.
    pub async fn reconnect(&self, input: &str) -> Result<Option<Vec<UsageRecord>>> {
        let id = normalize_sync_id(input)?;
        self.local.save_sync_id(&id)?;
        *self.sync_id.lock().unwrap_or_else(PoisonError::into_inner) = id.clone();
        info!(sync_id = %id, "sync id updated");

        if let Some(pending) = self.take_pending() {
            pending.cancel();
        }

        if self.remote.is_none() {
            self.cell.set(SyncStatus::Idle);
            return Ok(None);
        }
        Ok(self.pull().await)
    }
}
