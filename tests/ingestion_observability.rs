use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use affluence_import::ingestion::{
    BatchStats, CompositeObserver, FileObserver, ImportContext, ImportObserver, ImportOptions, ImportSeverity,
    ImportStats, ingest, ingest_from_path,
};
use affluence_import::store::{AttendanceStore, MemoryStore};
use affluence_import::types::{AttendanceRecord, Restaurant, RestaurantId, RowError, SkipReason};
use affluence_import::{ImportError, StorageError};

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<ImportStats>>,
    skipped: Mutex<Vec<(u64, SkipReason)>>,
    batches: Mutex<Vec<BatchStats>>,
    failures: Mutex<Vec<ImportSeverity>>,
    alerts: Mutex<Vec<ImportSeverity>>,
    sources: Mutex<Vec<String>>,
}

impl ImportObserver for RecordingObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        self.sources.lock().unwrap().push(ctx.source.clone());
        self.successes.lock().unwrap().push(stats);
    }

    fn on_row_skipped(&self, _ctx: &ImportContext, error: &RowError) {
        self.skipped.lock().unwrap().push((error.row_number, error.reason));
    }

    fn on_batch_flushed(&self, _ctx: &ImportContext, stats: BatchStats) {
        self.batches.lock().unwrap().push(stats);
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, _error: &ImportError) {
        self.sources.lock().unwrap().push(ctx.source.clone());
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &ImportContext, severity: ImportSeverity, _error: &ImportError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

struct RejectingStore;

impl AttendanceStore for RejectingStore {
    fn append_batch(&mut self, _records: &[AttendanceRecord]) -> Result<(), StorageError> {
        Err(StorageError::Rejected {
            message: "read-only replica".to_string(),
        })
    }
}

fn restaurant() -> Restaurant {
    Restaurant::new(RestaurantId(8), "Le Zinc")
}

fn opts_with(obs: Arc<dyn ImportObserver>) -> ImportOptions {
    ImportOptions {
        batch_size: 2,
        observer: Some(obs),
        alert_at_or_above: ImportSeverity::Critical,
        ..Default::default()
    }
}

#[test]
fn observer_sees_skips_flushes_and_success() {
    let obs = Arc::new(RecordingObserver::default());
    let input = "date,affluence\n2024-01-01,1\nbad,2\n2024-01-03,3\n2024-01-04\n2024-01-05,5\n";

    let mut store = MemoryStore::new();
    ingest(input.as_bytes(), &restaurant(), &mut store, &opts_with(obs.clone())).unwrap();

    assert_eq!(
        *obs.skipped.lock().unwrap(),
        vec![(3, SkipReason::InvalidDate), (5, SkipReason::ColumnCountMismatch)]
    );
    assert_eq!(
        *obs.batches.lock().unwrap(),
        vec![
            BatchStats {
                batch_index: 0,
                size: 2,
                rows_processed: 2
            },
            BatchStats {
                batch_index: 1,
                size: 1,
                rows_processed: 3
            },
        ]
    );
    assert_eq!(
        *obs.successes.lock().unwrap(),
        vec![ImportStats {
            rows_processed: 3,
            rows_skipped: 2,
            batches_flushed: 2
        }]
    );
    assert_eq!(*obs.sources.lock().unwrap(), vec!["<stream>".to_string()]);
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn storage_failure_is_critical_and_alerts() {
    let obs = Arc::new(RecordingObserver::default());
    let input = "date\n2024-01-01\n2024-01-02\n2024-01-03\n";

    let summary = ingest(input.as_bytes(), &restaurant(), &mut RejectingStore, &opts_with(obs.clone())).unwrap();

    assert!(summary.fatal.is_some());
    assert_eq!(*obs.failures.lock().unwrap(), vec![ImportSeverity::Critical]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![ImportSeverity::Critical]);
    assert!(obs.successes.lock().unwrap().is_empty());
    assert!(obs.batches.lock().unwrap().is_empty());
}

#[test]
fn format_error_fails_without_alert() {
    let obs = Arc::new(RecordingObserver::default());
    let mut store = MemoryStore::new();

    let _ = ingest("".as_bytes(), &restaurant(), &mut store, &opts_with(obs.clone())).unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ImportSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn missing_file_is_critical_and_reports_path() {
    let obs = Arc::new(RecordingObserver::default());
    let mut store = MemoryStore::new();

    let _ = ingest_from_path(
        "tests/fixtures/does_not_exist.csv",
        &restaurant(),
        &mut store,
        &opts_with(obs.clone()),
    )
    .unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ImportSeverity::Critical]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![ImportSeverity::Critical]);
    assert!(obs.sources.lock().unwrap()[0].ends_with("does_not_exist.csv"));
}

#[test]
fn lower_alert_threshold_alerts_on_errors() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = ImportOptions {
        alert_at_or_above: ImportSeverity::Error,
        ..opts_with(obs.clone())
    };
    let mut store = MemoryStore::new();

    let _ = ingest_from_path("tests/fixtures/attendance.txt", &restaurant(), &mut store, &opts).unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ImportSeverity::Error]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![ImportSeverity::Error]);
}

#[test]
fn skipped_rows_are_warnings() {
    let row = RowError {
        row_number: 4,
        reason: SkipReason::ColumnCountMismatch,
        detail: None,
    };
    assert_eq!(ImportSeverity::for_skip(&row), ImportSeverity::Warning);
    assert!(ImportSeverity::Warning < ImportSeverity::Error);
    assert!(ImportSeverity::Info < ImportSeverity::Warning);
}

#[test]
fn composite_observer_fans_out() {
    let a = Arc::new(RecordingObserver::default());
    let b = Arc::new(RecordingObserver::default());
    let composite = Arc::new(CompositeObserver::new(vec![
        a.clone() as Arc<dyn ImportObserver>,
        b.clone(),
    ]));

    let mut store = MemoryStore::new();
    ingest("date\n2024-01-01\nnope\n".as_bytes(), &restaurant(), &mut store, &opts_with(composite)).unwrap();

    for obs in [&a, &b] {
        assert_eq!(obs.successes.lock().unwrap().len(), 1);
        assert_eq!(obs.skipped.lock().unwrap().len(), 1);
        assert_eq!(obs.batches.lock().unwrap().len(), 1);
    }
}

#[test]
fn file_observer_appends_lines() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let log: PathBuf = std::env::temp_dir().join(format!("affluence-import-observer-{nanos}.log"));
    let obs = Arc::new(FileObserver::new(&log));

    let mut store = MemoryStore::new();
    ingest("date\n2024-01-01\nnope\n".as_bytes(), &restaurant(), &mut store, &opts_with(obs)).unwrap();
    let _ = ingest("".as_bytes(), &restaurant(), &mut store, &opts_with(Arc::new(FileObserver::new(&log))));

    let contents = std::fs::read_to_string(&log).unwrap();
    let _ = std::fs::remove_file(&log);

    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("Warning skip source=<stream> restaurant=8 row=3 reason=invalid date"));
    assert!(lines[1].contains("Info ok source=<stream> restaurant=8 rows=1 skipped=1 batches=1"));
    assert!(lines[2].contains("Error fail source=<stream>"));
}
