pub mod error;
pub mod model;
pub mod store;
pub mod repository;
pub mod input;
pub mod time;
pub mod service;
pub mod sync;
pub mod usecase;

pub use error::{Result, TrackerError};
pub use model::floor::{FloorConfig, ToiletType, FLOORS_CONFIG};
pub use model::record::UsageRecord;
pub use model::report::{DailyTotal, DaySheet, MonthlyReport, UsageIntensity, WeeklyBucket};
pub use store::RecordStore;
pub use repository::{detect_directory_mirror, DirectoryMirror, FileLocalStore, LocalStore, RemoteMirror};
pub use input::{expand_key, parse_toilet_type};
pub use service::export::ExportOutcome;
pub use service::extraction::{CommandExtractor, Extractor, MergeReport};
pub use sync::SyncStatus;
pub use usecase::inventory::Inventory;
