use chrono::NaiveDate;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::floor::ToiletType;
use crate::model::report::{DaySheet, MonthlyReport};
use crate::repository::{load_or_initial, LocalStore, RemoteMirror};
use crate::service::aggregator;
use crate::service::export::{self, ExportOutcome};
use crate::service::extraction::{self, Extractor, MergeReport};
use crate::store::RecordStore;
use crate::sync::{SyncCoordinator, SyncStatus};

/// The running application state: the current record store plus the
/// coordinator that persists and mirrors it. Every change goes through
/// `commit`, so local persistence and push scheduling never get skipped.
pub struct Inventory<L, M> {
    store: RecordStore,
    sync: SyncCoordinator<L, M>,
}

impl<L, M> Inventory<L, M>
where
    L: LocalStore,
    M: RemoteMirror + 'static,
{
    pub fn open(local: L, remote: Option<M>) -> Result<Self> {
        let store = load_or_initial(&local);
        let sync = SyncCoordinator::new(local, remote)?;
        Ok(Self { store, sync })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.sync = self.sync.with_debounce(debounce);
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn sync(&self) -> &SyncCoordinator<L, M> {
        &self.sync
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    /// Startup pull. Remote data, when present, replaces the local store.
    pub async fn start(&mut self) -> Result<SyncStatus> {
        if let Some(records) = self.sync.startup().await {
            self.adopt_remote(records)?;
        }
        Ok(self.sync.status())
    }

    fn adopt_remote(&mut self, records: Vec<crate::model::record::UsageRecord>) -> Result<()> {
        self.store = RecordStore::from_records(records);
        self.sync.persist(&self.store.to_vec())
    }

    fn commit(&mut self, next: RecordStore) -> Result<()> {
        self.store = next;
        self.sync.record_changed(self.store.to_vec())
    }

    /// Manual entry. Returns `false` (and changes nothing) for an unknown
    /// (floor, type) pair.
    pub fn set_usage(&mut self, floor: &str, kind: ToiletType, date: NaiveDate, value: f64) -> Result<bool> {
        match self.store.with_usage(floor, kind, date, value) {
            Some(next) => {
                self.commit(next)?;
                Ok(true)
            }
            None => {
                debug!(floor, %kind, "ignoring update for unknown floor/type");
                Ok(false)
            }
        }
    }

    /// Merge extractor output for the selected month through the same
    /// update path as manual entry.
    pub fn merge_extracted(&mut self, entries: &[Value], year: i32, month: u32) -> Result<MergeReport> {
        let (next, report) = extraction::merge_extracted(&self.store, entries, year, month);
        if report.applied > 0 {
            self.commit(next)?;
        }
        Ok(report)
    }

    pub async fn scan<E: Extractor + ?Sized>(
        &mut self,
        extractor: &E,
        image: &[u8],
        year: i32,
        month: u32,
    ) -> Result<MergeReport> {
        let entries = extractor.extract(image).await;
        info!(entries = entries.len(), "extraction finished");
        self.merge_extracted(&entries, year, month)
    }

    /// Back to the initial configuration with every count cleared.
    pub fn reset(&mut self) -> Result<()> {
        info!("resetting all usage data");
        self.commit(RecordStore::initial())
    }

    /// Switch sync id. An existing remote row replaces the local store; when
    /// the remote has no row for the id yet, the local set is pushed so other
    /// devices connecting to it find data right away.
    pub async fn reconnect(&mut self, sync_id: &str) -> Result<SyncStatus> {
        match self.sync.reconnect(sync_id).await? {
            Some(records) => self.adopt_remote(records)?,
            None if self.sync.status() == SyncStatus::Synced => {
                info!("no remote row for this sync id, seeding it with local records");
                return Ok(self.push_now().await);
            }
            None => {}
        }
        Ok(self.sync.status())
    }

    /// Push any pending change immediately.
    pub async fn flush(&self) -> SyncStatus {
        self.sync.flush(&self.store.to_vec()).await
    }

    /// Mirror the current store even when nothing is pending.
    pub async fn push_now(&self) -> SyncStatus {
        self.sync.push_now(&self.store.to_vec()).await
    }

    /// Pull the row for the current sync id again.
    pub async fn pull(&mut self) -> Result<SyncStatus> {
        let sync_id = self.sync.sync_id();
        self.reconnect(&sync_id).await
    }

    pub fn report(&self, year: i32, month: u32) -> Result<MonthlyReport> {
        aggregator::monthly_report(&self.store, year, month)
    }

    pub fn day_sheet(&self, date: NaiveDate) -> DaySheet {
        aggregator::day_sheet(&self.store, date)
    }

    pub fn export(&self, year: i32, month: u32, dir: &Path) -> Result<ExportOutcome> {
        export::export_csv(&self.store, year, month, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::model::record::UsageRecord;
    use crate::repository::MemoryMirror;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockLocal {
        records: Mutex<Option<Vec<UsageRecord>>>,
        sync_id: Mutex<Option<String>>,
        saves: Mutex<usize>,
    }

    impl LocalStore for Arc<MockLocal> {
        fn load_records(&self) -> Result<Option<Vec<UsageRecord>>> {
            Ok(self.records.lock().unwrap().clone())
        }
        fn save_records(&self, records: &[UsageRecord]) -> Result<()> {
            *self.records.lock().unwrap() = Some(records.to_vec());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
        fn load_sync_id(&self) -> Result<Option<String>> {
            Ok(self.sync_id.lock().unwrap().clone())
        }
        fn save_sync_id(&self, id: &str) -> Result<()> {
            *self.sync_id.lock().unwrap() = Some(id.to_string());
            Ok(())
        }
    }

    struct CannedExtractor(Vec<Value>);

    #[async_trait]
    impl Extractor for CannedExtractor {
        async fn extract(&self, _image: &[u8]) -> Vec<Value> {
            self.0.clone()
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn local_only(local: &Arc<MockLocal>) -> Inventory<Arc<MockLocal>, MemoryMirror> {
        Inventory::open(local.clone(), None).unwrap()
    }

    #[tokio::test]
    async fn test_local_only_persists_every_change() {
        let local = Arc::new(MockLocal::default());
        let mut inventory = local_only(&local);
        assert_eq!(inventory.start().await.unwrap(), SyncStatus::Idle);

        assert!(inventory.set_usage("2", ToiletType::MalePublic, date(5), 7.0).unwrap());
        assert!(!inventory.set_usage("86", ToiletType::MaleStaff, date(5), 7.0).unwrap());
        assert_eq!(*local.saves.lock().unwrap(), 1);

        let saved = RecordStore::from_records(local.records.lock().unwrap().clone().unwrap());
        assert_eq!(saved.value("2", ToiletType::MalePublic, date(5)), 7);
        assert_eq!(inventory.sync_status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_scan_merges_through_update_path() {
        let local = Arc::new(MockLocal::default());
        let mut inventory = local_only(&local);
        let extractor = CannedExtractor(vec![
            serde_json::json!({"floor": "2", "type": "MALE PUBLIC", "day": 5, "value": 7}),
            serde_json::json!({"floor": "9", "type": "MALE PUBLIC", "day": 5, "value": 7}),
        ]);
        let report = inventory.scan(&extractor, b"jpeg", 2026, 1).await.unwrap();
        assert_eq!(report, MergeReport { applied: 1, dropped: 1 });
        assert_eq!(inventory.report(2026, 1).unwrap().total, 7);
        assert_eq!(*local.saves.lock().unwrap(), 1);

        let empty = CannedExtractor(Vec::new());
        inventory.scan(&empty, b"jpeg", 2026, 1).await.unwrap();
        assert_eq!(*local.saves.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_restores_initial() {
        let local = Arc::new(MockLocal::default());
        let mut inventory = local_only(&local);
        inventory.set_usage("100", ToiletType::FemaleStaff, date(2), 3.0).unwrap();
        inventory.reset().unwrap();
        assert_eq!(inventory.store(), &RecordStore::initial());
        assert_eq!(
            RecordStore::from_records(local.records.lock().unwrap().clone().unwrap()),
            RecordStore::initial()
        );
    }

    #[tokio::test]
    async fn test_sync_id_generated_once() {
        let local = Arc::new(MockLocal::default());
        let first = local_only(&local).sync().sync_id();
        let second = local_only(&local).sync().sync_id();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reconnect_without_remote_rejects_blank_id() {
        let local = Arc::new(MockLocal::default());
        let mut inventory = local_only(&local);
        let err = inventory.reconnect("  ").await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidSyncId(_)));

        assert_eq!(inventory.reconnect("tr-shared1").await.unwrap(), SyncStatus::Idle);
        assert_eq!(local.sync_id.lock().unwrap().as_deref(), Some("TR-SHARED1"));
    }

    #[tokio::test]
    async fn test_export_nothing() {
        let local = Arc::new(MockLocal::default());
        let inventory = local_only(&local);
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(inventory.export(2026, 1, dir.path()).unwrap(), ExportOutcome::NothingToExport);
    }

    type Mirrored = Inventory<Arc<MockLocal>, Arc<MemoryMirror>>;

    fn mirrored(local: &Arc<MockLocal>, mirror: &Arc<MemoryMirror>) -> Mirrored {
        Inventory::open(local.clone(), Some(mirror.clone())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_remote_keeps_local_data() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);
        assert_eq!(inventory.start().await.unwrap(), SyncStatus::Synced);

        mirror.set_offline(true);
        inventory.set_usage("87", ToiletType::MalePublic, date(5), 6.0).unwrap();
        assert_eq!(inventory.sync_status(), SyncStatus::Syncing);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(inventory.sync_status(), SyncStatus::Error);
        assert_eq!(mirror.push_count(), 1);
        assert_eq!(inventory.store().value("87", ToiletType::MalePublic, date(5)), 6);

        let saved = RecordStore::from_records(local.records.lock().unwrap().clone().unwrap());
        assert_eq!(saved.value("87", ToiletType::MalePublic, date(5)), 6);

        mirror.set_offline(false);
        inventory.set_usage("87", ToiletType::MalePublic, date(6), 2.0).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(inventory.sync_status(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_push_once() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);

        for value in [1.0, 2.0, 3.0] {
            inventory.set_usage("2", ToiletType::FemalePublic, date(9), value).unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(mirror.push_count(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mirror.push_count(), 1);
        assert_eq!(inventory.sync_status(), SyncStatus::Synced);

        let row = mirror.row(&inventory.sync().sync_id()).unwrap();
        let pushed = RecordStore::from_records(row.records);
        assert_eq!(pushed.value("2", ToiletType::FemalePublic, date(9)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_pull_replaces_local() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);
        inventory.set_usage("99", ToiletType::MaleStaff, date(1), 9.0).unwrap();
        inventory.flush().await;

        let remote = RecordStore::initial()
            .with_usage("105", ToiletType::PowderRoom, date(3), 4.0)
            .unwrap();
        mirror.insert_row(&inventory.sync().sync_id(), remote.to_vec());
        let pushes = mirror.push_count();

        let mut reopened = mirrored(&local, &mirror);
        assert_eq!(reopened.start().await.unwrap(), SyncStatus::Synced);
        assert_eq!(reopened.store(), &remote);
        assert_eq!(
            RecordStore::from_records(local.records.lock().unwrap().clone().unwrap()),
            remote
        );
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mirror.push_count(), pushes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_pull_failure_keeps_local() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);
        inventory.set_usage("100", ToiletType::PowderRoom, date(4), 2.0).unwrap();

        mirror.set_offline(true);
        let mut reopened = mirrored(&local, &mirror);
        assert_eq!(reopened.start().await.unwrap(), SyncStatus::Error);
        assert_eq!(reopened.report(2026, 1).unwrap().total, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pushes_pending_change_now() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);
        assert_eq!(inventory.flush().await, SyncStatus::Idle);

        inventory.set_usage("85", ToiletType::MalePublic, date(12), 5.0).unwrap();
        assert!(inventory.sync().has_pending_push());
        assert_eq!(inventory.flush().await, SyncStatus::Synced);
        assert_eq!(mirror.push_count(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mirror.push_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_now_without_pending_change() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let inventory = mirrored(&local, &mirror);
        assert_eq!(inventory.push_now().await, SyncStatus::Synced);
        assert_eq!(mirror.push_count(), 1);
        assert!(mirror.row(&inventory.sync().sync_id()).is_some());

        let offline_local = Arc::new(MockLocal::default());
        assert_eq!(local_only(&offline_local).push_now().await, SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_to_empty_id_seeds_remote_row() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);
        inventory.set_usage("99", ToiletType::FemaleStaff, date(8), 6.0).unwrap();

        assert_eq!(inventory.reconnect("tr-fresh01").await.unwrap(), SyncStatus::Synced);
        assert_eq!(mirror.push_count(), 1);
        let row = mirror.row("TR-FRESH01").unwrap();
        assert_eq!(RecordStore::from_records(row.records), *inventory.store());

        // A second device connecting now pulls the seeded data.
        let other_local = Arc::new(MockLocal::default());
        let mut other = mirrored(&other_local, &mirror);
        other.reconnect("TR-FRESH01").await.unwrap();
        assert_eq!(other.store().value("99", ToiletType::FemaleStaff, date(8)), 6);
        assert_eq!(mirror.push_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_with_unreachable_remote_does_not_push() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let mut inventory = mirrored(&local, &mirror);
        mirror.set_offline(true);
        assert_eq!(inventory.reconnect("TR-FRESH02").await.unwrap(), SyncStatus::Error);
        assert_eq!(mirror.push_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_pulls_other_device_row() {
        let local = Arc::new(MockLocal::default());
        let mirror = Arc::new(MemoryMirror::new());
        let shared = RecordStore::initial()
            .with_usage("107", ToiletType::PowderRoom, date(20), 8.0)
            .unwrap();
        mirror.insert_row("TR-SHARED1", shared.to_vec());

        let mut inventory = mirrored(&local, &mirror);
        inventory.set_usage("2", ToiletType::MaleStaff, date(20), 1.0).unwrap();

        assert_eq!(inventory.reconnect(" tr-shared1 ").await.unwrap(), SyncStatus::Synced);
        assert_eq!(inventory.sync().sync_id(), "TR-SHARED1");
        assert_eq!(inventory.store(), &shared);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mirror.push_count(), 0);
    }
}
