pub mod aggregator;
pub mod export;
pub mod extraction;
