pub mod feed_record;
pub mod progress;
pub mod request;
pub mod response;
pub mod stats;

pub use feed_record::FeedRecord;
pub use progress::{SyncProgress, SyncStatus};
pub use request::{CatalogFieldsRequest, SyncRequest};
pub use response::{CatalogField, SyncResponse, SyncStartStatus};
pub use stats::{ChangeSet, FieldChange, RecordOutcome, RecordStatus, RunStats};
