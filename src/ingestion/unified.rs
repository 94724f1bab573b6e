//! Import entrypoints and options.
//!
//! Most callers should use [`ingest_from_path`] (an uploaded file on disk) or [`ingest`] (any
//! reader). Both write [`crate::types::AttendanceRecord`]s for one restaurant into an
//! [`AttendanceStore`] and return an [`ImportSummary`].
//!
//! - Batch size and delimiter come from [`ImportOptions`] (see [`ImportOptions::from_env`]).
//! - If an [`ImportObserver`] is configured, skipped rows, batch flushes, success, failures and
//!   alerts are reported to it.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ImportError, ImportResult};
use crate::store::AttendanceStore;
use crate::types::{ImportSummary, Restaurant};

use super::csv::{NewlineTerminated, STREAM_SOURCE, reader_builder, run_import};
use super::observability::{ImportContext, ImportObserver, ImportSeverity, report_failure};

/// Default number of records written per batch.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Environment variable overriding [`ImportOptions::batch_size`].
pub const ENV_BATCH_SIZE: &str = "AFFLUENCE_IMPORT_BATCH_SIZE";

/// Environment variable overriding [`ImportOptions::delimiter`] (one ASCII character, or `tab`).
pub const ENV_DELIMITER: &str = "AFFLUENCE_IMPORT_DELIMITER";

/// Options controlling an import.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct ImportOptions {
    /// Records per write; must be at least 1.
    pub batch_size: usize,
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn ImportObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: ImportSeverity,
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("batch_size", &self.batch_size)
            .field("delimiter", &char::from(self.delimiter))
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: b',',
            observer: None,
            alert_at_or_above: ImportSeverity::Critical,
        }
    }
}

impl ImportOptions {
    /// Defaults, overridden by [`ENV_BATCH_SIZE`] and [`ENV_DELIMITER`] when set.
    pub fn from_env() -> ImportResult<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> ImportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            opts.batch_size = raw.trim().parse().map_err(|_| ImportError::InvalidOptions {
                message: format!("{ENV_BATCH_SIZE} must be a positive integer, got '{raw}'"),
            })?;
        }

        if let Some(raw) = lookup(ENV_DELIMITER) {
            opts.delimiter = parse_delimiter(&raw).ok_or_else(|| ImportError::InvalidOptions {
                message: format!("{ENV_DELIMITER} must be a single ASCII character or 'tab', got '{raw}'"),
            })?;
        }

        opts.validate()?;
        Ok(opts)
    }

    /// Check that the options can drive an import.
    pub fn validate(&self) -> ImportResult<()> {
        if self.batch_size == 0 {
            return Err(ImportError::InvalidOptions {
                message: "batch_size must be >= 1".to_string(),
            });
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(ImportError::InvalidOptions {
                message: format!("unusable delimiter byte 0x{:02x}", self.delimiter),
            });
        }
        Ok(())
    }
}

fn parse_delimiter(raw: &str) -> Option<u8> {
    if raw.eq_ignore_ascii_case("tab") || raw == "\\t" {
        return Some(b'\t');
    }
    match raw.as_bytes() {
        [b] if b.is_ascii() => Some(*b),
        _ => None,
    }
}

/// Import attendance history from any reader.
///
/// The reader must be positioned at the start of the file; it is consumed and dropped before
/// this function returns.
///
/// # Example
///
/// ```rust
/// use affluence_import::ingestion::{ingest, ImportOptions};
/// use affluence_import::store::MemoryStore;
/// use affluence_import::types::{Restaurant, RestaurantId};
///
/// # fn main() -> Result<(), affluence_import::ImportError> {
/// let restaurant = Restaurant::new(RestaurantId(1), "Chez Nous");
/// let mut store = MemoryStore::new();
/// let csv = "date,affluence,is_weekend\n2024-03-15,120,no\n2024-03-16,180,yes\n";
///
/// let summary = ingest(csv.as_bytes(), &restaurant, &mut store, &ImportOptions::default())?;
/// assert_eq!(summary.rows_processed, 2);
/// assert_eq!(summary.message(), "Import successful. 2 rows processed.");
/// # Ok(())
/// # }
/// ```
pub fn ingest<R, S>(
    reader: R,
    restaurant: &Restaurant,
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary>
where
    R: Read,
    S: AttendanceStore + ?Sized,
{
    let ctx = ImportContext {
        source: STREAM_SOURCE.to_string(),
        restaurant: restaurant.id,
    };
    let mut rdr = reader_builder(options).from_reader(NewlineTerminated::new(reader));
    run_import(&mut rdr, &ctx, store, options)
}

/// Import an uploaded CSV file.
///
/// - The file extension must be `csv` (any case), otherwise [`ImportError::UnsupportedFileType`].
/// - Failing to open the file is an [`ImportError::Io`].
///
/// When an observer is configured, these early failures are reported like any other.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use affluence_import::ingestion::{ingest_from_path, ImportOptions, TracingObserver};
/// use affluence_import::store::{RestaurantResolver, SqliteStore};
/// use affluence_import::types::RestaurantId;
///
/// # fn main() -> Result<(), affluence_import::ImportError> {
/// let mut store = SqliteStore::open("affluence.db")?;
/// let restaurant = store.resolve_restaurant(RestaurantId(1))?;
///
/// let opts = ImportOptions {
///     observer: Some(Arc::new(TracingObserver)),
///     ..ImportOptions::from_env()?
/// };
/// let summary = ingest_from_path("history.csv", &restaurant, &mut store, &opts)?;
/// println!("{}", summary.message());
/// # Ok(())
/// # }
/// ```
pub fn ingest_from_path<S>(
    path: impl AsRef<Path>,
    restaurant: &Restaurant,
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary>
where
    S: AttendanceStore + ?Sized,
{
    let path = path.as_ref();
    let ctx = ImportContext {
        source: path.display().to_string(),
        restaurant: restaurant.id,
    };

    let file = match check_extension(path).and_then(|()| File::open(path).map_err(ImportError::from)) {
        Ok(f) => f,
        Err(e) => {
            report_failure(options.observer.as_ref(), options.alert_at_or_above, &ctx, &e);
            return Err(e);
        }
    };

    let mut rdr = reader_builder(options).from_reader(NewlineTerminated::new(file));
    run_import(&mut rdr, &ctx, store, options)
}

fn check_extension(path: &Path) -> ImportResult<()> {
    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        Ok(())
    } else {
        Err(ImportError::UnsupportedFileType {
            path: path.display().to_string(),
        })
    }
}

/// Convenience helper for callers that want an owned request object.
///
/// This can be useful if you want to enqueue import work in a job system.
#[derive(Clone)]
pub struct ImportRequest {
    /// Path to the uploaded file.
    pub path: PathBuf,
    /// Restaurant the rows belong to.
    pub restaurant: Restaurant,
    /// Options controlling the import.
    pub options: ImportOptions,
}

impl fmt::Debug for ImportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRequest")
            .field("path", &self.path)
            .field("restaurant", &self.restaurant.id)
            .field("options", &self.options)
            .finish()
    }
}

impl ImportRequest {
    /// Execute the request by calling [`ingest_from_path`].
    pub fn run<S>(&self, store: &mut S) -> ImportResult<ImportSummary>
    where
        S: AttendanceStore + ?Sized,
    {
        ingest_from_path(&self.path, &self.restaurant, store, &self.options)
    }
}
