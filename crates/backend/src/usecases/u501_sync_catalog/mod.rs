pub mod currency;
pub mod diff;
pub mod errors;
pub mod executor;
pub mod formula;
pub mod index;
pub mod key_matcher;
pub mod pricing;
pub mod progress_tracker;
pub mod run_repository;
pub mod unas_api_client;
pub mod unas_xml;

pub use errors::{SyncError, SyncResult};
pub use executor::SyncExecutor;
pub use progress_tracker::ProgressTracker;
