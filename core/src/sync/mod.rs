pub mod coordinator;
pub mod scheduler;

pub use coordinator::{generate_sync_id, normalize_sync_id, SyncCoordinator, SyncStatus, DEFAULT_DEBOUNCE};
pub use scheduler::{ScheduledTask, Scheduler};
