pub mod client;
pub mod credentials;
pub mod error;
pub mod failure_log;
pub mod report;
pub mod retry;

pub use client::{DEFAULT_BASE_URL, ReportClient, ReportService};
pub use credentials::ApiKey;
pub use error::{ClientError, Result};
pub use failure_log::{FailureLog, FileFailureLog, MemoryFailureLog, NullFailureLog, SharedFailureLog};
pub use report::{RawReport, ReportDocument};
pub use retry::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
