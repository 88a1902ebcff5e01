// In-memory report service shared by the integration tests

#![allow(dead_code)]

use crxaudit_client::{CancellationToken, ClientError, RawReport, ReportService, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakeService {
    reports: HashMap<String, Value>,
    delays: HashMap<String, Duration>,
    rejected: HashSet<String>,
    unreachable: HashSet<String>,
    scans: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, id: &str, report: Value) -> Self {
        self.reports.insert(id.to_string(), report);
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn rejecting(mut self, id: &str) -> Self {
        self.rejected.insert(id.to_string());
        self
    }

    pub fn unreachable(mut self, id: &str) -> Self {
        self.unreachable.insert(id.to_string());
        self
    }

    pub fn scans(&self) -> Vec<String> {
        self.scans.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn unreachable_error(&self, id: &str) -> ClientError {
        ClientError::Unreachable {
            extension_id: id.to_string(),
            attempts: 3,
        }
    }
}

impl ReportService for FakeService {
    async fn request_scan(&self, extension_id: &str, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled(extension_id.to_string()));
        }
        self.scans.lock().unwrap().push(extension_id.to_string());
        if self.unreachable.contains(extension_id) {
            return Err(self.unreachable_error(extension_id));
        }
        Ok(!self.rejected.contains(extension_id))
    }

    async fn fetch_report(&self, extension_id: &str, cancel: &CancellationToken) -> Result<RawReport> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled(extension_id.to_string()));
        }
        self.fetches.lock().unwrap().push(extension_id.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .delays
            .get(extension_id)
            .copied()
            .unwrap_or(Duration::from_millis(1));
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unreachable.contains(extension_id) {
            return Err(self.unreachable_error(extension_id));
        }
        match self.reports.get(extension_id) {
            Some(report) => Ok(RawReport::from_json(report.clone()).expect("valid test report")),
            None => {
                // same fallback as the real client: a miss queues a scan
                self.scans.lock().unwrap().push(extension_id.to_string());
                Ok(RawReport::NotScanned)
            }
        }
    }
}

/// A complete report as the service would return it.
pub fn full_report(name: &str) -> Value {
    serde_json::json!({
        "extension_id": name,
        "version": "1.0.0",
        "data": {
            "risk": {
                "total": 377,
                "csp": {"total": 100},
                "permissions": {"total": 210},
                "webstore": {"total": 67}
            },
            "extcalls": ["https://api.example.com/track"],
            "dangerousfunctions": {"eval": ["background.js:12"], "setTimeout": ["popup.js:3"]},
            "entrypoints": ["background.js", "popup.html"],
            "manifest": {"manifest_version": 2, "name": name},
            "webstore": {
                "name": name,
                "short_description": "Does things",
                "version": "1.0.1",
                "last_updated": "March 4, 2020",
                "offered_by": "Example Corp",
                "rating": 4.5,
                "rating_users": 120,
                "users": 50000,
                "size": "1.2MiB",
                "type": "Extension",
                "permission_warnings": ["Read and change all your data on the websites you visit"],
                "email": "dev@example.com",
                "address": "1 Example Way",
                "privacy_policy": "https://example.com/privacy"
            }
        }
    })
}
