use crate::normalize::normalize;
use crate::record::NormalizedRecord;
use crxaudit_client::{CancellationToken, ClientError, FailureLog, RawReport, ReportService};
use tracing::{debug, warn};

/// One catalog entry plus the last report fetched for it this session.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    id: String,
    report: Option<RawReport>,
}

impl Extension {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            report: None,
        }
    }

    pub fn with_report(id: impl Into<String>, report: RawReport) -> Self {
        Self {
            id: id.into(),
            report: Some(report),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `None` until a lookup has succeeded.
    pub fn report(&self) -> Option<&RawReport> {
        self.report.as_ref()
    }

    /// Fetch the latest report and keep it, replacing whatever was there.
    pub async fn lookup<S: ReportService>(
        &mut self,
        service: &S,
        cancel: &CancellationToken,
    ) -> Result<&RawReport, ClientError> {
        let report = service.fetch_report(&self.id, cancel).await?;
        Ok(self.report.insert(report))
    }

    /// Normalize whatever was fetched, without touching the network.
    /// `None` while the slot is empty; an unscanned report is recorded as a
    /// failure.
    pub fn normalized(&self, failures: &dyn FailureLog) -> Option<NormalizedRecord> {
        let report = self.report.as_ref()?;
        if !report.is_scanned() {
            failures.record(&format!("No data for extension {}", self.id));
        }
        Some(normalize(&self.id, report))
    }

    /// Normalized view of this extension, fetching only if nothing has been
    /// fetched yet. With `submit_missing`, an extension without a report is
    /// also (re)submitted for scanning.
    pub async fn risk_info<S: ReportService>(
        &mut self,
        service: &S,
        failures: &dyn FailureLog,
        cancel: &CancellationToken,
        submit_missing: bool,
    ) -> NormalizedRecord {
        if self.report.is_none()
            && let Err(e) = self.lookup(service, cancel).await.map(|_| ())
        {
            warn!("Lookup failed for {}: {}", self.id, e);
            failures.record(&format!("Lookup failed for extension {}: {}", self.id, e));
            return NormalizedRecord::no_data(&self.id);
        }

        let Some(record) = self.normalized(failures) else {
            return NormalizedRecord::no_data(&self.id);
        };
        if submit_missing && self.report.as_ref().is_some_and(|r| !r.is_scanned()) {
            match service.request_scan(&self.id, cancel).await {
                Ok(accepted) => debug!("Resubmitted {} (accepted: {})", self.id, accepted),
                Err(e) => warn!("Resubmitting {} failed: {}", self.id, e),
            }
        }
        record
    }
}
