//! Core of crxaudit: turns CRXcavator reports into flat records, fans bulk
//! lookups out over a worker pool and writes resumable CSV dumps.

pub mod batch;
pub mod catalog;
pub mod error;
pub mod export;
pub mod extension;
pub mod normalize;
pub mod record;

pub use batch::{BatchCoordinator, ProgressCallback, ScanSummary};
pub use error::{CoreError, Result};
pub use extension::Extension;
pub use normalize::normalize;
pub use record::{CSV_COLUMNS, NO_DATA_NAME, NormalizedRecord, RECORD_FIELDS};
