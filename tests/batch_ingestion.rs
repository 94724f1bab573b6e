use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use affluence_import::ingestion::{ImportContext, ImportObserver, ImportOptions, ImportSeverity, ingest};
use affluence_import::store::{AttendanceStore, MemoryStore};
use affluence_import::types::{AttendanceRecord, FatalErrorKind, Restaurant, RestaurantId};
use affluence_import::{ImportError, StorageError};
use chrono::{Duration, NaiveDate};

fn restaurant() -> Restaurant {
    Restaurant::new(RestaurantId(3), "La Cantine")
}

/// `rows` valid data rows, one per consecutive day.
fn daily_csv(rows: usize) -> String {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut out = String::from("date,affluence\n");
    for i in 0..rows {
        let day = start + Duration::days(i as i64);
        out.push_str(&format!("{},{}\n", day.format("%Y-%m-%d"), 100 + i));
    }
    out
}

/// Store that accepts `ok_batches` writes, then rejects every write.
struct FailingStore {
    inner: MemoryStore,
    ok_batches: usize,
    attempts: usize,
}

impl FailingStore {
    fn new(ok_batches: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            ok_batches,
            attempts: 0,
        }
    }
}

impl AttendanceStore for FailingStore {
    fn append_batch(&mut self, records: &[AttendanceRecord]) -> Result<(), StorageError> {
        self.attempts += 1;
        if self.attempts > self.ok_batches {
            return Err(StorageError::Rejected {
                message: "connection lost".to_string(),
            });
        }
        self.inner.append_batch(records)
    }
}

#[test]
fn forty_five_rows_flush_as_20_20_5() {
    let mut store = MemoryStore::new();
    let opts = ImportOptions {
        batch_size: 20,
        ..Default::default()
    };
    let summary = ingest(daily_csv(45).as_bytes(), &restaurant(), &mut store, &opts).unwrap();

    assert_eq!(summary.rows_processed, 45);
    assert_eq!(summary.rows_skipped, 0);
    assert_eq!(summary.batches_flushed, 3);
    assert_eq!(store.batch_sizes(), &[20, 20, 5]);
}

#[test]
fn default_batch_size_is_twenty() {
    assert_eq!(ImportOptions::default().batch_size, 20);

    let mut store = MemoryStore::new();
    ingest(daily_csv(40).as_bytes(), &restaurant(), &mut store, &ImportOptions::default()).unwrap();
    assert_eq!(store.batch_sizes(), &[20, 20]);
}

#[test]
fn skipped_rows_do_not_count_towards_a_batch() {
    let mut csv = daily_csv(3);
    csv.push_str("garbage,1\n");
    csv.push_str("2024-02-01,1,extra\n");

    let mut store = MemoryStore::new();
    let opts = ImportOptions {
        batch_size: 2,
        ..Default::default()
    };
    let summary = ingest(csv.as_bytes(), &restaurant(), &mut store, &opts).unwrap();

    assert_eq!(summary.rows_processed, 3);
    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(store.batch_sizes(), &[2, 1]);
}

#[test]
fn batch_size_of_one_writes_every_row_separately() {
    let mut store = MemoryStore::new();
    let opts = ImportOptions {
        batch_size: 1,
        ..Default::default()
    };
    ingest(daily_csv(4).as_bytes(), &restaurant(), &mut store, &opts).unwrap();
    assert_eq!(store.batch_sizes(), &[1, 1, 1, 1]);
}

#[test]
fn zero_batch_size_is_rejected_before_reading() {
    let mut store = MemoryStore::new();
    let opts = ImportOptions {
        batch_size: 0,
        ..Default::default()
    };
    let err = ingest(daily_csv(2).as_bytes(), &restaurant(), &mut store, &opts).unwrap_err();
    assert!(matches!(err, ImportError::InvalidOptions { .. }));
    assert!(store.records().is_empty());
}

#[test]
fn reingesting_the_same_file_appends_duplicates() {
    let csv = daily_csv(10);
    let mut store = MemoryStore::new();

    let first = ingest(csv.as_bytes(), &restaurant(), &mut store, &ImportOptions::default()).unwrap();
    let second = ingest(csv.as_bytes(), &restaurant(), &mut store, &ImportOptions::default()).unwrap();

    assert_eq!(first.rows_processed, 10);
    assert_eq!(second.rows_processed, 10);
    assert_eq!(store.records().len(), 20);
    assert_eq!(store.records()[0], store.records()[10]);
}

#[test]
fn storage_failure_keeps_earlier_batches_and_stops() {
    let mut store = FailingStore::new(2);
    let opts = ImportOptions {
        batch_size: 20,
        ..Default::default()
    };
    let summary = ingest(daily_csv(70).as_bytes(), &restaurant(), &mut store, &opts).unwrap();

    assert_eq!(summary.rows_processed, 40);
    assert_eq!(summary.batches_flushed, 2);
    assert!(!summary.is_complete());

    let fatal = summary.fatal.as_ref().unwrap();
    assert_eq!(fatal.kind, FatalErrorKind::Storage);
    assert_eq!(fatal.rows_discarded, 20);
    // Row 61 is the 60th data row, which filled the failed batch.
    assert_eq!(fatal.row_number, Some(61));
    assert!(fatal.message.contains("connection lost"));

    // No retry, and nothing after the failure is attempted.
    assert_eq!(store.attempts, 3);
    assert_eq!(store.inner.records().len(), 40);
    assert_eq!(
        summary.message(),
        "Import interrupted after 40 rows processed: storage error: batch rejected: connection lost"
    );
}

#[test]
fn storage_failure_on_final_partial_batch() {
    let mut store = FailingStore::new(1);
    let opts = ImportOptions {
        batch_size: 20,
        ..Default::default()
    };
    let summary = ingest(daily_csv(25).as_bytes(), &restaurant(), &mut store, &opts).unwrap();

    assert_eq!(summary.rows_processed, 20);
    let fatal = summary.fatal.unwrap();
    assert_eq!(fatal.kind, FatalErrorKind::Storage);
    assert_eq!(fatal.rows_discarded, 5);
    assert_eq!(store.inner.batch_sizes(), &[20]);
}

/// Reader that yields `data`, then fails instead of reporting end of input.
struct BrokenStream {
    data: io::Cursor<Vec<u8>>,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream closed")),
            n => Ok(n),
        }
    }
}

#[derive(Default)]
struct FailureLog {
    severities: Mutex<Vec<ImportSeverity>>,
}

impl ImportObserver for FailureLog {
    fn on_failure(&self, _ctx: &ImportContext, severity: ImportSeverity, _error: &ImportError) {
        self.severities.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &ImportContext, _severity: ImportSeverity, _error: &ImportError) {}
}

#[test]
fn read_failure_mid_stream_keeps_flushed_batches() {
    let log = Arc::new(FailureLog::default());
    let opts = ImportOptions {
        batch_size: 2,
        observer: Some(log.clone()),
        ..Default::default()
    };
    let stream = BrokenStream {
        data: io::Cursor::new(daily_csv(3).into_bytes()),
    };

    let mut store = MemoryStore::new();
    let summary = ingest(stream, &restaurant(), &mut store, &opts).unwrap();

    assert_eq!(summary.rows_processed, 2);
    assert_eq!(summary.batches_flushed, 1);
    assert!(!summary.is_complete());

    let fatal = summary.fatal.as_ref().unwrap();
    assert_eq!(fatal.kind, FatalErrorKind::Read);
    assert_eq!(fatal.rows_discarded, 1);
    assert_eq!(fatal.row_number, Some(4));
    assert!(fatal.message.contains("stream closed"));

    assert_eq!(store.batch_sizes(), &[2]);
    assert_eq!(*log.severities.lock().unwrap(), vec![ImportSeverity::Critical]);
}
