//! ServiceNow connectors.

pub mod mock;
pub mod table;

pub use mock::{MockRecordClient, RecordCall};
pub use table::TableApiClient;
