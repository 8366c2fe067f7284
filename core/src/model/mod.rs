pub mod floor;
pub mod record;
pub mod report;
