use crate::credentials::{API_KEY_HEADER, ApiKey};
use crate::error::{ClientError, Result};
use crate::failure_log::{NullFailureLog, SharedFailureLog};
use crate::report::RawReport;
use crate::retry::{RetryError, RetryPolicy, retry};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.crxcavator.io/v1/";

/// The two operations the batch layer needs from the report service.
pub trait ReportService: Send + Sync + 'static {
    /// Ask the service to scan an extension. `Ok(false)` means the service
    /// answered but refused.
    fn request_scan(
        &self,
        extension_id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Most recent report for an extension. A missing report comes back as
    /// `RawReport::NotScanned` after a scan has been requested.
    fn fetch_report(
        &self,
        extension_id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<RawReport>> + Send;
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    extension_id: &'a str,
}

pub struct ReportClient {
    client: Client,
    base_url: Url,
    api_key: ApiKey,
    retry_policy: RetryPolicy,
    failures: SharedFailureLog,
}

impl ReportClient {
    pub fn new(api_key: ApiKey) -> Result<Self> {
        Self::with_timeout(api_key, 30)
    }

    pub fn with_timeout(api_key: ApiKey, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("crxaudit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", DEFAULT_BASE_URL, e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            retry_policy: RetryPolicy::default(),
            failures: Arc::new(NullFailureLog),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let mut url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = url;
        Ok(self)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_failure_log(mut self, failures: SharedFailureLog) -> Self {
        self.failures = failures;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn give_up(&self, extension_id: &str, action: &str, err: RetryError<reqwest::Error>) -> ClientError {
        match err {
            RetryError::Exhausted { attempts, last } => {
                self.failures.record(&format!(
                    "Giving up {} {} after {} attempt(s): {}",
                    action, extension_id, attempts, last
                ));
                ClientError::Unreachable {
                    extension_id: extension_id.to_string(),
                    attempts,
                }
            }
            RetryError::Failed(e) => {
                self.failures.record(&format!(
                    "ERROR: Request failed while {} {}: {}",
                    action, extension_id, e
                ));
                ClientError::HttpError(e)
            }
            RetryError::Cancelled => ClientError::Cancelled(extension_id.to_string()),
        }
    }

    pub async fn request_scan(&self, extension_id: &str, cancel: &CancellationToken) -> Result<bool> {
        let url = self.endpoint(&["submit"])?;
        let api_key = self.api_key.header_value()?;
        let body = SubmitRequest { extension_id };

        let response = retry(
            &self.retry_policy,
            cancel,
            |_| {
                self.client
                    .post(url.clone())
                    .header(API_KEY_HEADER, api_key.clone())
                    .json(&body)
                    .send()
            },
            |attempt, e| {
                warn!("Connection error submitting {} (attempt {}): {}", extension_id, attempt, e);
                self.failures.record(&format!(
                    "Connection error received when submitting {} to be scanned, trying again.",
                    extension_id
                ));
            },
        )
        .await
        .map_err(|e| self.give_up(extension_id, "submitting", e))?;

        let status = response.status();
        if status == StatusCode::OK {
            debug!("Submitted {} for scanning", extension_id);
            return Ok(true);
        }

        let text = response.text().await.unwrap_or_default();
        self.failures.record(&format!(
            "ERROR: Status code [{}] while submitting extension: {}\r\n\t\tResponse:{}",
            status.as_u16(),
            extension_id,
            text
        ));
        Ok(false)
    }

    pub async fn fetch_report(&self, extension_id: &str, cancel: &CancellationToken) -> Result<RawReport> {
        let url = self.endpoint(&["report", extension_id])?;
        let api_key = self.api_key.header_value()?;

        let response = retry(
            &self.retry_policy,
            cancel,
            |_| {
                self.client
                    .get(url.clone())
                    .header(API_KEY_HEADER, api_key.clone())
                    .send()
            },
            |attempt, e| {
                warn!("Connection error querying {} (attempt {}): {}", extension_id, attempt, e);
                self.failures.record(&format!(
                    "Connection error received when querying {}, trying again.",
                    extension_id
                ));
            },
        )
        .await
        .map_err(|e| self.give_up(extension_id, "querying", e))?;

        let status = response.status();
        if status == StatusCode::OK {
            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    self.failures.record(&format!(
                        "ERROR: Unreadable report body for {}: {}",
                        extension_id, e
                    ));
                    return Ok(RawReport::NotScanned);
                }
            };
            match RawReport::latest_from_response(body) {
                Ok(RawReport::NotScanned) => {}
                Ok(report) => return Ok(report),
                Err(e) => {
                    self.failures.record(&format!(
                        "ERROR: Malformed report for {}: {}",
                        extension_id, e
                    ));
                    return Ok(RawReport::NotScanned);
                }
            }
        } else {
            self.failures.record(&format!(
                "ERROR: Status code [{}] while querying extension: {}",
                status.as_u16(),
                extension_id
            ));
        }

        // No report yet: get one queued so the next run finds it
        match self.request_scan(extension_id, cancel).await {
            Ok(_) => {}
            Err(e) => debug!("Scan request for {} did not go through: {}", extension_id, e),
        }
        Ok(RawReport::NotScanned)
    }
}

impl ReportService for ReportClient {
    async fn request_scan(&self, extension_id: &str, cancel: &CancellationToken) -> Result<bool> {
        ReportClient::request_scan(self, extension_id, cancel).await
    }

    async fn fetch_report(&self, extension_id: &str, cancel: &CancellationToken) -> Result<RawReport> {
        ReportClient::fetch_report(self, extension_id, cancel).await
    }
}
