use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use daysync::days_api::{DayStore, RemoteDay};
use daysync::error::{ScanError, StoreError};
use daysync::presence::{reconcile, DayKey, PresenceRecord, ScanSource, ScanSummary, AUTO_UPDATE_NOTE};
use daysync::sync_service::SyncService;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Days API double: a map of days plus days on which requests fail
#[derive(Default)]
struct FakeDaysApi {
    days: Mutex<BTreeMap<DayKey, RemoteDay>>,
    failing_gets: HashSet<DayKey>,
    failing_upserts: HashSet<DayKey>,
    upserts: Mutex<usize>,
}

impl FakeDaysApi {
    fn with(days: Vec<RemoteDay>) -> Self {
        FakeDaysApi {
            days: Mutex::new(days.into_iter().map(|d| (d.day, d)).collect()),
            ..Default::default()
        }
    }

    fn day(&self, day: DayKey) -> Option<RemoteDay> {
        self.days.lock().unwrap().get(&day).cloned()
    }

    fn upserts(&self) -> usize {
        *self.upserts.lock().unwrap()
    }
}

#[async_trait]
impl DayStore for FakeDaysApi {
    async fn get_day(&self, day: DayKey) -> Result<Option<RemoteDay>, StoreError> {
        if self.failing_gets.contains(&day) {
            return Err(StoreError::Status { status: 502, body: "bad gateway".to_string() });
        }
        Ok(self.day(day))
    }

    async fn upsert_day(&self, day: &RemoteDay) -> Result<(), StoreError> {
        if self.failing_upserts.contains(&day.day) {
            return Err(StoreError::Status { status: 500, body: "boom".to_string() });
        }
        *self.upserts.lock().unwrap() += 1;
        self.days.lock().unwrap().insert(day.day, day.clone());
        Ok(())
    }
}

fn countries() -> Vec<String> {
    vec!["Andorra".to_string(), "Spain".to_string()]
}

fn day(d: u32) -> DayKey {
    DayKey(NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
}

fn summary(records: &[(u32, &[&str])]) -> ScanSummary {
    let mut summary = ScanSummary::new(&countries());
    for (d, present) in records {
        let mut record = PresenceRecord::new(day(*d), &countries());
        for country in present.iter() {
            record.countries.insert(country.to_string(), true);
        }
        summary.records.insert(day(*d), record);
    }
    summary
}

fn remote(json: &str) -> RemoteDay {
    serde_json::from_str(json).unwrap()
}

#[tokio::test]
async fn test_missing_day_is_created() {
    let api = FakeDaysApi::default();

    let report = reconcile(&summary(&[(1, &["Spain"])]), &api, &CancellationToken::new()).await;

    assert_eq!(report.created, 1);
    assert_eq!(report.applied(), 1);
    let created = api.day(day(1)).expect("day should exist");
    assert!(created.flag("Spain"));
    assert!(!created.flag("Andorra"));
    assert_eq!(created.note, AUTO_UPDATE_NOTE);
}

#[tokio::test]
async fn test_merge_keeps_remote_presence() {
    let api = FakeDaysApi::with(vec![remote(r#"{"day":"2024-03-01","andorra":1,"spain":0,"world":1,"note":"manual"}"#)]);

    let report = reconcile(&summary(&[(1, &["Spain"])]), &api, &CancellationToken::new()).await;

    assert_eq!(report.merged, 1);
    let merged = api.day(day(1)).unwrap();
    assert!(merged.flag("Andorra"));
    assert!(merged.flag("Spain"));
    assert_eq!(merged.fields["world"], 1);
    assert_eq!(merged.note, "[auto-updated from email] manual");
}

#[tokio::test]
async fn test_local_absence_is_a_noop() {
    let api = FakeDaysApi::with(vec![remote(r#"{"day":"2024-03-02","andorra":1,"spain":1}"#)]);

    let report = reconcile(&summary(&[(2, &["Andorra"])]), &api, &CancellationToken::new()).await;

    assert_eq!(report.unchanged, 1);
    assert_eq!(api.upserts(), 0);
    assert!(api.day(day(2)).unwrap().flag("Spain"));
}

#[tokio::test]
async fn test_second_run_applies_nothing() {
    let api = FakeDaysApi::with(vec![remote(r#"{"day":"2024-03-02","andorra":0,"spain":0}"#)]);
    let scan = summary(&[(1, &["Spain"]), (2, &["Andorra", "Spain"]), (3, &["Andorra"])]);

    let first = reconcile(&scan, &api, &CancellationToken::new()).await;
    let second = reconcile(&scan, &api, &CancellationToken::new()).await;

    assert_eq!(first.applied(), 3);
    assert_eq!(second.applied(), 0);
    assert_eq!(second.unchanged, 3);
    assert_eq!(api.upserts(), 3);
}

#[tokio::test]
async fn test_failing_day_does_not_stop_others() {
    let mut api = FakeDaysApi::default();
    api.failing_gets.insert(day(1));
    api.failing_upserts.insert(day(2));

    let report = reconcile(
        &summary(&[(1, &["Spain"]), (2, &["Spain"]), (3, &["Spain"])]),
        &api,
        &CancellationToken::new(),
    ).await;

    assert_eq!(report.applied(), 1);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].0, day(1));
    assert!(matches!(report.failures[0].1, StoreError::Status { status: 502, .. }));
    assert_eq!(report.failures[1].0, day(2));
    assert!(api.day(day(3)).is_some());
}

#[tokio::test]
async fn test_cancelled_reconciliation_applies_nothing() {
    let api = FakeDaysApi::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = reconcile(&summary(&[(1, &["Spain"])]), &api, &cancel).await;

    assert_eq!(report.applied(), 0);
    assert!(report.failures.is_empty());
    assert_eq!(api.upserts(), 0);
}

/// Scan source recording when each scan started. Scans last the queued durations, then zero.
#[derive(Default)]
struct FakeScans {
    started: Mutex<Vec<Instant>>,
    durations: Mutex<VecDeque<Duration>>,
}

impl FakeScans {
    fn lasting(durations: &[u64]) -> Arc<Self> {
        Arc::new(FakeScans {
            durations: Mutex::new(durations.iter().map(|s| Duration::from_secs(*s)).collect()),
            ..Default::default()
        })
    }

    /// Start times in whole seconds since `origin`
    fn started_at(&self, origin: Instant) -> Vec<u64> {
        self.started.lock().unwrap().iter().map(|t| (*t - origin).as_secs()).collect()
    }
}

#[async_trait]
impl ScanSource for FakeScans {
    async fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary, ScanError> {
        self.started.lock().unwrap().push(Instant::now());
        let duration = self.durations.lock().unwrap().pop_front().unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(summary(&[(1, &["Spain"])])),
        }
    }
}

fn spawn_service(scans: Arc<FakeScans>, interval: u64, cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let service = SyncService::new(scans, FakeDaysApi::default(), Duration::from_secs(interval));
    let cancel = cancel.clone();
    tokio::spawn(async move { service.run(cancel).await })
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_runs_immediately() {
    let origin = Instant::now();
    let scans = FakeScans::lasting(&[]);
    let cancel = CancellationToken::new();
    let handle = spawn_service(scans.clone(), 60, &cancel);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scans.started_at(origin), vec![0]);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(scans.started_at(origin), vec![0, 60]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_cycle_does_not_stack_ticks() {
    let origin = Instant::now();
    // First cycle runs over three periods, later ones are instant
    let scans = FakeScans::lasting(&[35]);
    let cancel = CancellationToken::new();
    let handle = spawn_service(scans.clone(), 10, &cancel);

    tokio::time::sleep(Duration::from_secs(45)).await;

    // One catch-up cycle when the long one ends, then back on the 10s grid
    assert_eq!(scans.started_at(origin), vec![0, 35, 40]);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_returns_after_cancel() {
    let scans = FakeScans::lasting(&[3600]);
    let cancel = CancellationToken::new();
    let handle = spawn_service(scans.clone(), 60, &cancel);

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sync service should stop once cancelled")
        .unwrap();
    assert_eq!(scans.started.lock().unwrap().len(), 1);
}
