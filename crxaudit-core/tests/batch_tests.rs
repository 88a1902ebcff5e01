// Tests for the batch coordinator

mod common;

use common::{FakeService, full_report};
use crxaudit_client::{CancellationToken, MemoryFailureLog, RawReport};
use crxaudit_core::{BatchCoordinator, Extension, NO_DATA_NAME, NormalizedRecord, ScanSummary};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("ext{:02}", i)).collect()
}

/// Every id gets a report; earlier ids take longer, so completion order is
/// the reverse of input order.
fn reversed_delay_service(items: &[String]) -> FakeService {
    let total = items.len() as u64;
    items
        .iter()
        .enumerate()
        .fold(FakeService::new(), |service, (i, id)| {
            service
                .with_report(id, full_report(id))
                .with_delay(id, Duration::from_millis((total - i as u64) * 10))
        })
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_all_preserves_input_order() {
    let items = ids(20);
    let service = Arc::new(reversed_delay_service(&items));
    let coordinator = BatchCoordinator::new(service, 4);

    let records = coordinator.fetch_all(items.clone()).await.unwrap();

    assert_eq!(records.len(), items.len());
    for (record, id) in records.iter().zip(&items) {
        assert_eq!(&record.extension_id, id);
        assert_eq!(record.name.as_deref(), Some(id.as_str()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_raw_all_preserves_input_order() {
    let items = ids(12);
    let service = Arc::new(reversed_delay_service(&items));
    let coordinator = BatchCoordinator::new(service, 3);

    let extensions = coordinator.fetch_raw_all(items.clone()).await.unwrap();

    let fetched: Vec<&str> = extensions.iter().map(Extension::id).collect();
    assert_eq!(fetched, items.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(extensions.iter().all(|e| e.report().is_some_and(RawReport::is_scanned)));
}

#[tokio::test(start_paused = true)]
async fn test_single_worker_matches_pool() {
    let items = ids(8);
    let service = Arc::new(reversed_delay_service(&items));

    let serial = BatchCoordinator::new(service.clone(), 1)
        .fetch_all(items.clone())
        .await
        .unwrap();
    let pooled = BatchCoordinator::new(service, 8)
        .fetch_all(items)
        .await
        .unwrap();

    assert_eq!(serial, pooled);
}

// ============================================================================
// Pool Size
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pool_bounds_concurrency() {
    let items = ids(30);
    let service = Arc::new(reversed_delay_service(&items));
    let coordinator = BatchCoordinator::new(service.clone(), 5);

    coordinator.fetch_all(items).await.unwrap();

    assert!(service.max_in_flight() <= 5);
    assert!(service.max_in_flight() > 1);
}

#[tokio::test]
async fn test_zero_pool_size_clamps_to_one() {
    let service = Arc::new(FakeService::new());
    let coordinator = BatchCoordinator::new(service, 0);

    assert_eq!(coordinator.pool_size(), 1);
    let records = coordinator.fetch_all(ids(3)).await.unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_empty_input() {
    let service = Arc::new(FakeService::new());
    let coordinator = BatchCoordinator::new(service.clone(), 4);

    assert!(coordinator.fetch_all(Vec::new()).await.unwrap().is_empty());
    assert!(coordinator.fetch_raw_all(Vec::new()).await.unwrap().is_empty());
    assert_eq!(
        coordinator.scan_all(Vec::new()).await.unwrap(),
        ScanSummary::default()
    );
    assert!(service.fetches().is_empty());
}

// ============================================================================
// Scan Submission
// ============================================================================

#[tokio::test]
async fn test_scan_all_counts_outcomes() {
    let service = Arc::new(
        FakeService::new()
            .rejecting("bad1")
            .rejecting("bad2")
            .unreachable("gone"),
    );
    let coordinator = BatchCoordinator::new(service.clone(), 3);
    let items = vec!["ok1", "bad1", "ok2", "gone", "bad2", "ok3"]
        .into_iter()
        .map(String::from)
        .collect();

    let summary = coordinator.scan_all(items).await.unwrap();

    assert_eq!(summary.accepted, 3);
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.unreachable, 1);
    assert_eq!(summary.failures(), 3);
    assert_eq!(summary.total(), 6);
    assert_eq!(service.scans().len(), 6);
}

// ============================================================================
// Missing Reports
// ============================================================================

#[tokio::test]
async fn test_fetch_all_missing_report_is_no_data() {
    let service = Arc::new(FakeService::new().with_report("known", full_report("Known")));
    let failures = Arc::new(MemoryFailureLog::new());
    let coordinator = BatchCoordinator::new(service.clone(), 2).with_failure_log(failures.clone());

    let records = coordinator
        .fetch_all(vec!["known".to_string(), "unknown".to_string()])
        .await
        .unwrap();

    assert_eq!(records[0].name.as_deref(), Some("Known"));
    assert_eq!(records[1], NormalizedRecord::no_data("unknown"));
    // the miss queued a scan inside the service
    assert_eq!(service.scans(), vec!["unknown".to_string()]);
    assert_eq!(failures.messages(), vec!["No data for extension unknown".to_string()]);
}

#[tokio::test]
async fn test_submit_missing_resubmits() {
    let service = Arc::new(FakeService::new());
    let coordinator = BatchCoordinator::new(service.clone(), 1).with_submit_missing(true);

    coordinator.fetch_all(vec!["unknown".to_string()]).await.unwrap();

    assert_eq!(
        service.scans(),
        vec!["unknown".to_string(), "unknown".to_string()]
    );
}

#[tokio::test]
async fn test_unreachable_lookup_is_recorded() {
    let service = Arc::new(FakeService::new().unreachable("gone"));
    let failures = Arc::new(MemoryFailureLog::new());
    let coordinator = BatchCoordinator::new(service, 1).with_failure_log(failures.clone());

    let records = coordinator.fetch_all(vec!["gone".to_string()]).await.unwrap();
    assert_eq!(records, vec![NormalizedRecord::no_data("gone")]);

    let extensions = coordinator.fetch_raw_all(vec!["gone".to_string()]).await.unwrap();
    assert!(extensions[0].report().is_none());

    let messages = failures.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.starts_with("Lookup failed for extension gone")));
}

// ============================================================================
// Two-Phase Fetch
// ============================================================================

#[tokio::test]
async fn test_normalize_all_reuses_fetched_reports() {
    let items = ids(6);
    let service = Arc::new(reversed_delay_service(&items));
    let coordinator = BatchCoordinator::new(service.clone(), 3);

    let extensions = coordinator.fetch_raw_all(items.clone()).await.unwrap();
    let records = coordinator.normalize_all(extensions).await.unwrap();

    assert_eq!(service.fetches().len(), items.len());
    assert_eq!(records.len(), items.len());
    for (record, id) in records.iter().zip(&items) {
        assert_eq!(&record.extension_id, id);
        assert!(record.has_data());
    }
}

#[tokio::test]
async fn test_normalize_all_fetches_empty_slots_only() {
    let service = Arc::new(FakeService::new().with_report("b", full_report("B")));
    let coordinator = BatchCoordinator::new(service.clone(), 2);
    let extensions = vec![
        Extension::with_report("a", RawReport::NotScanned),
        Extension::new("b"),
    ];

    let records = coordinator.normalize_all(extensions).await.unwrap();

    assert_eq!(service.fetches(), vec!["b".to_string()]);
    assert_eq!(records[0].name.as_deref(), Some(NO_DATA_NAME));
    assert_eq!(records[1].name.as_deref(), Some("B"));
}

#[tokio::test]
async fn test_normalize_all_logs_unscanned_when_nothing_to_fetch() {
    let service = Arc::new(FakeService::new());
    let failures = Arc::new(MemoryFailureLog::new());
    let coordinator = BatchCoordinator::new(service.clone(), 2).with_failure_log(failures.clone());
    let extensions = vec![
        Extension::with_report("a", RawReport::NotScanned),
        Extension::with_report("b", RawReport::from_json(full_report("B")).unwrap()),
    ];

    let records = coordinator.normalize_all(extensions).await.unwrap();

    assert!(service.fetches().is_empty());
    assert_eq!(records[0], NormalizedRecord::no_data("a"));
    assert_eq!(records[1].name.as_deref(), Some("B"));
    assert_eq!(failures.messages(), vec!["No data for extension a".to_string()]);
}

#[test]
fn test_normalized_leaves_empty_slot_alone() {
    let failures = MemoryFailureLog::new();

    assert!(Extension::new("a").normalized(&failures).is_none());
    assert!(failures.messages().is_empty());

    let record = Extension::with_report("b", RawReport::NotScanned)
        .normalized(&failures)
        .unwrap();
    assert!(!record.has_data());
    assert_eq!(failures.messages(), vec!["No data for extension b".to_string()]);
}

// ============================================================================
// Progress & Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_progress_reaches_total() {
    let items = ids(10);
    let service = Arc::new(reversed_delay_service(&items));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let coordinator = BatchCoordinator::new(service, 4).with_progress_callback(Arc::new(
        move |completed: usize, total: usize| sink.lock().unwrap().push((completed, total)),
    ));

    coordinator.fetch_all(items).await.unwrap();

    let seen = seen.lock().unwrap();
    let expected: Vec<(usize, usize)> = (1..=10).map(|i| (i, 10)).collect();
    assert_eq!(*seen, expected);
}

#[tokio::test]
async fn test_cancelled_run_still_returns_every_item() {
    let service = Arc::new(FakeService::new().with_report("a", full_report("A")));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let coordinator = BatchCoordinator::new(service.clone(), 2).with_cancellation(cancel);

    let records = coordinator
        .fetch_all(vec!["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(
        records,
        vec![NormalizedRecord::no_data("a"), NormalizedRecord::no_data("b")]
    );

    let summary = coordinator.scan_all(vec!["a".to_string()]).await.unwrap();
    assert_eq!(summary.rejected, 1);
    assert!(service.fetches().is_empty());
}
