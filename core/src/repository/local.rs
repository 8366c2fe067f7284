use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TrackerError};
use crate::model::record::UsageRecord;
use crate::store::RecordStore;

pub const RECORDS_FILE_NAME: &str = "tissue_inventory_v2.json";
pub const SYNC_ID_FILE_NAME: &str = "tissue_roll_sync_id";
const DEFAULT_DIR_NAME: &str = ".tissue-tracker";

/// Two key-value slots on the device: the serialized record set and the
/// sync identifier.
pub trait LocalStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load_records(&self) -> Result<Option<Vec<UsageRecord>>>;
    fn save_records(&self, records: &[UsageRecord]) -> Result<()>;
    fn load_sync_id(&self) -> Result<Option<String>>;
    fn save_sync_id(&self, id: &str) -> Result<()>;
}

/// Load the persisted store, falling back to the initial configuration when
/// the slot is empty or unreadable.
pub fn load_or_initial<L: LocalStore + ?Sized>(local: &L) -> RecordStore {
    match local.load_records() {
        Ok(Some(records)) => RecordStore::from_records(records),
        Ok(None) => RecordStore::initial(),
        Err(err) => {
            warn!("Local data corrupted, resetting to defaults: {}", err);
            RecordStore::initial()
        }
    }
}

pub fn default_data_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        TrackerError::Io(std::io::Error::new(
            ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;
    Ok(home_dir.join(DEFAULT_DIR_NAME))
}

#[derive(Debug, Clone)]
pub struct FileLocalStore {
    base_dir: PathBuf,
}

impl FileLocalStore {
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = match base_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn records_path(&self) -> PathBuf {
        self.base_dir.join(RECORDS_FILE_NAME)
    }

    fn sync_id_path(&self) -> PathBuf {
        self.base_dir.join(SYNC_ID_FILE_NAME)
    }
}

impl LocalStore for FileLocalStore {
    fn load_records(&self) -> Result<Option<Vec<UsageRecord>>> {
        let file = match File::open(self.records_path()) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let reader = BufReader::new(file);
        let records: Vec<UsageRecord> = serde_json::from_reader(reader)?;
        Ok(Some(records))
    }

    fn save_records(&self, records: &[UsageRecord]) -> Result<()> {
        let file = File::create(self.records_path())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, records)?;
        writer.flush()?;
        debug!(records = records.len(), "saved records locally");
        Ok(())
    }

    fn load_sync_id(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.sync_id_path()) {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save_sync_id(&self, id: &str) -> Result<()> {
        fs::write(self.sync_id_path(), id)?;
        Ok(())
    }
}
