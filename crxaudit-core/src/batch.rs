use crate::error::Result;
use crate::extension::Extension;
use crate::record::NormalizedRecord;
use crxaudit_client::{
    CancellationToken, NullFailureLog, ReportService, SharedFailureLog,
};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

/// Called with `(completed, total)` each time an item finishes.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Outcome counts of a bulk scan submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub unreachable: usize,
}

impl ScanSummary {
    pub fn failures(&self) -> usize {
        self.rejected + self.unreachable
    }

    pub fn total(&self) -> usize {
        self.accepted + self.failures()
    }
}

/// Fans bulk operations out over a fixed pool of workers. Results always come
/// back in input order.
pub struct BatchCoordinator<S> {
    service: Arc<S>,
    pool_size: usize,
    failures: SharedFailureLog,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    submit_missing: bool,
}

impl<S: ReportService> BatchCoordinator<S> {
    pub fn new(service: Arc<S>, pool_size: usize) -> Self {
        Self {
            service,
            pool_size: pool_size.max(1),
            failures: Arc::new(NullFailureLog),
            cancel: CancellationToken::new(),
            progress: None,
            submit_missing: false,
        }
    }

    pub fn with_failure_log(mut self, failures: SharedFailureLog) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Also submit a scan while normalizing extensions that have no report.
    pub fn with_submit_missing(mut self, submit_missing: bool) -> Self {
        self.submit_missing = submit_missing;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Submit every item for scanning.
    pub async fn scan_all(&self, items: Vec<String>) -> Result<ScanSummary> {
        let service = self.service.clone();
        let outcomes = self
            .run(items, move |id, cancel| {
                let service = service.clone();
                async move { service.request_scan(&id, &cancel).await }
            })
            .await?;

        let mut summary = ScanSummary::default();
        for outcome in outcomes {
            match outcome {
                Ok(true) => summary.accepted += 1,
                Ok(false) => summary.rejected += 1,
                Err(e) if e.is_unreachable() => summary.unreachable += 1,
                Err(_) => summary.rejected += 1,
            }
        }
        info!(
            "Scan submission finished: {} accepted, {} failed",
            summary.accepted,
            summary.failures()
        );
        Ok(summary)
    }

    /// Fetch and normalize every item.
    pub async fn fetch_all(&self, items: Vec<String>) -> Result<Vec<NormalizedRecord>> {
        let service = self.service.clone();
        let failures = self.failures.clone();
        let submit_missing = self.submit_missing;
        self.run(items, move |id, cancel| {
            let service = service.clone();
            let failures = failures.clone();
            async move {
                let mut extension = Extension::new(id);
                extension
                    .risk_info(service.as_ref(), failures.as_ref(), &cancel, submit_missing)
                    .await
            }
        })
        .await
    }

    /// Fetch every item's latest report without normalizing it. Extensions
    /// whose lookup failed come back with an empty report slot.
    pub async fn fetch_raw_all(&self, items: Vec<String>) -> Result<Vec<Extension>> {
        let service = self.service.clone();
        let failures = self.failures.clone();
        self.run(items, move |id, cancel| {
            let service = service.clone();
            let failures = failures.clone();
            async move {
                let mut extension = Extension::new(id);
                if let Err(e) = extension.lookup(service.as_ref(), &cancel).await.map(|_| ()) {
                    warn!("Lookup failed for {}: {}", extension.id(), e);
                    failures.record(&format!(
                        "Lookup failed for extension {}: {}",
                        extension.id(),
                        e
                    ));
                }
                extension
            }
        })
        .await
    }

    /// Normalize extensions fetched earlier; only those with an empty slot
    /// are looked up again.
    pub async fn normalize_all(&self, extensions: Vec<Extension>) -> Result<Vec<NormalizedRecord>> {
        if !self.submit_missing && extensions.iter().all(|e| e.report().is_some()) {
            return Ok(extensions
                .iter()
                .filter_map(|e| e.normalized(self.failures.as_ref()))
                .collect());
        }

        let service = self.service.clone();
        let failures = self.failures.clone();
        let submit_missing = self.submit_missing;
        self.run(extensions, move |mut extension: Extension, cancel| {
            let service = service.clone();
            let failures = failures.clone();
            async move {
                extension
                    .risk_info(service.as_ref(), failures.as_ref(), &cancel, submit_missing)
                    .await
            }
        })
        .await
    }

    /// Run `work` over `items` on `pool_size` workers. Jobs go out over a
    /// shared queue, results come back tagged with their input index.
    async fn run<I, T, F, Fut>(&self, items: Vec<I>, work: F) -> Result<Vec<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.pool_size.min(total);
        debug!("Dispatching {} items to {} workers", total, workers);

        let (job_tx, job_rx) = mpsc::unbounded_channel::<(usize, I)>();
        for job in items.into_iter().enumerate() {
            // receiver is alive until the workers are spawned below
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, T)>();
        let work = Arc::new(work);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let work = work.clone();
            let cancel = self.cancel.clone();

            handles.push(tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                loop {
                    let job = job_rx.lock().await.recv().await;
                    let Some((index, item)) = job else { break };

                    let output = work(item, cancel.clone()).await;
                    if result_tx.send((index, output)).is_err() {
                        break;
                    }
                }
                debug!("Worker {} finished", worker_id);
            }));
        }
        drop(result_tx);

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        while let Some((index, output)) = result_rx.recv().await {
            slots[index] = Some(output);
            completed += 1;
            if let Some(ref callback) = self.progress {
                callback(completed, total);
            }
        }

        for joined in join_all(handles).await {
            joined?;
        }

        // every worker exited cleanly, so every job produced a result
        Ok(slots.into_iter().flatten().collect())
    }
}
