use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::ImportError;
use crate::types::{RestaurantId, RowError};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportSeverity {
    /// Informational event (completed import, batch flush).
    Info,
    /// Warning-level event (skipped row).
    Warning,
    /// Error-level event (import rejected or stopped).
    Error,
    /// Critical error (I/O or storage failures).
    Critical,
}

impl ImportSeverity {
    /// Severity of a skipped row. Skips never stop an import.
    pub fn for_skip(_error: &RowError) -> Self {
        Self::Warning
    }

    /// Severity of an import error.
    ///
    /// Infrastructure failures (I/O, stream read, storage) are `Critical`; problems with the
    /// request or the file's shape are `Error`.
    pub fn for_error(error: &ImportError) -> Self {
        match error {
            ImportError::Io(_) | ImportError::Storage(_) => Self::Critical,
            ImportError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            ImportError::Format { .. }
            | ImportError::UnsupportedFileType { .. }
            | ImportError::InvalidOptions { .. }
            | ImportError::RestaurantNotFound { .. } => Self::Error,
        }
    }
}

/// Context about an import attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
    /// Where the rows come from: a file path, or a label for stream input.
    pub source: String,
    /// Restaurant every record is attached to.
    pub restaurant: RestaurantId,
}

/// Stats reported when an import reaches the end of the file with every batch written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub batches_flushed: usize,
}

/// Stats for one successful batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    /// 0-based index of the batch within the run.
    pub batch_index: usize,
    /// Records written by this batch.
    pub size: usize,
    /// Records written so far, this batch included.
    pub rows_processed: usize,
}

/// Observer interface for import outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts. Every callback has a no-op default.
pub trait ImportObserver: Send + Sync {
    /// Called when the whole file was scanned and every batch was written.
    fn on_success(&self, _ctx: &ImportContext, _stats: ImportStats) {}

    /// Called for every row excluded from the import.
    fn on_row_skipped(&self, _ctx: &ImportContext, _error: &RowError) {}

    /// Called after each successful batch write.
    fn on_batch_flushed(&self, _ctx: &ImportContext, _stats: BatchStats) {}

    /// Called when the import is rejected or stops early.
    fn on_failure(&self, _ctx: &ImportContext, _severity: ImportSeverity, _error: &ImportError) {}

    /// Called when an import failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Report a failure to `observer`, and raise an alert if its severity reaches `alert_at_or_above`.
pub(crate) fn report_failure(
    observer: Option<&Arc<dyn ImportObserver>>,
    alert_at_or_above: ImportSeverity,
    ctx: &ImportContext,
    error: &ImportError,
) {
    let severity = ImportSeverity::for_error(error);
    tracing::debug!(
        source = %ctx.source,
        restaurant = %ctx.restaurant,
        ?severity,
        %error,
        "attendance import failed"
    );
    if let Some(obs) = observer {
        obs.on_failure(ctx, severity, error);
        if severity >= alert_at_or_above {
            obs.on_alert(ctx, severity, error);
        }
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ImportObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn ImportObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ImportObserver for CompositeObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_row_skipped(&self, ctx: &ImportContext, error: &RowError) {
        for o in &self.observers {
            o.on_row_skipped(ctx, error);
        }
    }

    fn on_batch_flushed(&self, ctx: &ImportContext, stats: BatchStats) {
        for o in &self.observers {
            o.on_batch_flushed(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits import events as `tracing` events.
///
/// Successes and flushes are `info`, skipped rows `warn`, failures `error`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ImportObserver for TracingObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        tracing::info!(
            source = %ctx.source,
            restaurant = %ctx.restaurant,
            rows_processed = stats.rows_processed,
            rows_skipped = stats.rows_skipped,
            batches = stats.batches_flushed,
            "attendance import finished"
        );
    }

    fn on_row_skipped(&self, ctx: &ImportContext, error: &RowError) {
        tracing::warn!(
            source = %ctx.source,
            restaurant = %ctx.restaurant,
            row = error.row_number,
            reason = %error.reason,
            detail = error.detail.as_deref().unwrap_or(""),
            severity = ?ImportSeverity::for_skip(error),
            "row skipped"
        );
    }

    fn on_batch_flushed(&self, ctx: &ImportContext, stats: BatchStats) {
        tracing::info!(
            source = %ctx.source,
            restaurant = %ctx.restaurant,
            batch = stats.batch_index,
            size = stats.size,
            rows_processed = stats.rows_processed,
            "batch flushed"
        );
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        tracing::error!(
            source = %ctx.source,
            restaurant = %ctx.restaurant,
            ?severity,
            %error,
            "attendance import failed"
        );
    }

    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        tracing::error!(
            alert = true,
            source = %ctx.source,
            restaurant = %ctx.restaurant,
            ?severity,
            %error,
            "attendance import failed"
        );
    }
}

/// Appends import events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, severity: ImportSeverity, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {severity:?} {line}", chrono::Utc::now().to_rfc3339());
        }
    }
}

impl ImportObserver for FileObserver {
    fn on_success(&self, ctx: &ImportContext, stats: ImportStats) {
        self.append_line(
            ImportSeverity::Info,
            &format!(
                "ok source={} restaurant={} rows={} skipped={} batches={}",
                ctx.source, ctx.restaurant, stats.rows_processed, stats.rows_skipped, stats.batches_flushed
            ),
        );
    }

    fn on_row_skipped(&self, ctx: &ImportContext, error: &RowError) {
        self.append_line(
            ImportSeverity::for_skip(error),
            &format!(
                "skip source={} restaurant={} row={} reason={}",
                ctx.source, ctx.restaurant, error.row_number, error.reason
            ),
        );
    }

    fn on_failure(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        self.append_line(
            severity,
            &format!("fail source={} restaurant={} err={}", ctx.source, ctx.restaurant, error),
        );
    }

    fn on_alert(&self, ctx: &ImportContext, severity: ImportSeverity, error: &ImportError) {
        self.append_line(
            severity,
            &format!("ALERT source={} restaurant={} err={}", ctx.source, ctx.restaurant, error),
        );
    }
}
