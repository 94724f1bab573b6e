//! CSV import implementation.
//!
//! Rows are read one at a time, converted to [`AttendanceRecord`]s and written to the store in
//! batches of [`ImportOptions::batch_size`]. Memory use is bounded by one batch regardless of file
//! size.

use std::borrow::Cow;
use std::io::{self, Read};
use std::sync::Arc;

use csv::ByteRecord;

use crate::error::{ImportError, ImportResult};
use crate::store::AttendanceStore;
use crate::types::{AttendanceRecord, FatalError, ImportSummary, Restaurant, RestaurantId, RowError, SkipReason};

use super::batch::BatchBuffer;
use super::fields::{
    CanonicalField, HeaderMap, normalize_header, parse_bool, parse_date, parse_float, parse_int, parse_text,
};
use super::observability::{BatchStats, ImportContext, ImportObserver, ImportStats, report_failure};
use super::unified::ImportOptions;

/// Source label used in [`ImportContext`] for reader-based imports.
pub const STREAM_SOURCE: &str = "<stream>";

/// Build a CSV reader configured the way the import pipeline expects (headers on, ragged rows
/// allowed so they can be reported per row, delimiter from `options`).
///
/// Records end at `\n` only. A `\r` before it stays in the last field and is trimmed away by
/// value coercion, which keeps reported row numbers exact for CRLF files.
pub fn reader_builder(options: &ImportOptions) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .flexible(true)
        .delimiter(options.delimiter)
        .terminator(csv::Terminator::Any(b'\n'));
    builder
}

/// Byte source that ends with `\n`, appending one if the underlying input does not.
///
/// With every record terminated, a record's start line can be derived from the reader position
/// after it, including for the last record of a file.
#[derive(Debug)]
pub(crate) struct NewlineTerminated<R> {
    inner: R,
    last: Option<u8>,
    done: bool,
}

impl<R> NewlineTerminated<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            last: None,
            done: false,
        }
    }
}

impl<R: Read> Read for NewlineTerminated<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.last = Some(buf[n - 1]);
            return Ok(n);
        }
        self.done = true;
        match self.last {
            Some(b) if b != b'\n' => {
                buf[0] = b'\n';
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

/// Import attendance history from an existing CSV reader.
///
/// The reader should come from [`reader_builder`]. Readers that are not `flexible` still work:
/// unequal-length errors are reported as skipped rows. Row numbers are exact when the input ends
/// with a newline; [`crate::ingestion::ingest`] guarantees that.
///
/// Rules:
///
/// - The first record is the header; an empty input is an [`ImportError::Format`].
/// - A row whose field count differs from the header is skipped (`column count mismatch`).
/// - A row without a parseable date is skipped (`invalid date`).
/// - Other fields that fail to parse are left `None`.
/// - A failed batch write stops the run; the returned summary carries a
///   [`crate::types::FatalError`] and earlier batches stay persisted.
pub fn ingest_csv_from_reader<R, S>(
    rdr: &mut csv::Reader<R>,
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
    run_import(rdr, &ctx, store, options)
}

/// Validate options, run the import and report the outcome to the configured observer.
pub(crate) fn run_import<R, S>(
    rdr: &mut csv::Reader<R>,
    ctx: &ImportContext,
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary>
where
    R: Read,
    S: AttendanceStore + ?Sized,
{
    let span = tracing::info_span!(
        "attendance_import",
        source = %ctx.source,
        restaurant = %ctx.restaurant,
        batch_size = options.batch_size
    );
    let _entered = span.enter();

    let result = options
        .validate()
        .and_then(|()| import_rows(rdr, ctx, store, options));

    match &result {
        Ok(summary) if summary.is_complete() => {
            if let Some(obs) = options.observer.as_ref() {
                obs.on_success(
                    ctx,
                    ImportStats {
                        rows_processed: summary.rows_processed,
                        rows_skipped: summary.rows_skipped,
                        batches_flushed: summary.batches_flushed,
                    },
                );
            }
        }
        // Mid-run failures were reported where they happened.
        Ok(_) => {}
        Err(e) => report_failure(options.observer.as_ref(), options.alert_at_or_above, ctx, e),
    }

    result
}

fn import_rows<R, S>(
    rdr: &mut csv::Reader<R>,
    ctx: &ImportContext,
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary>
where
    R: Read,
    S: AttendanceStore + ?Sized,
{
    let header = read_header(rdr)?;
    tracing::debug!(
        columns = header.width(),
        resolved = ?header.resolved_fields().map(CanonicalField::name).collect::<Vec<_>>(),
        ignored = ?header.ignored_columns(),
        "header resolved"
    );

    let observer = options.observer.as_ref();
    let mut summary = ImportSummary::default();
    let mut batch = BatchBuffer::new(options.batch_size);
    let mut row = ByteRecord::new();
    let mut last_row: Option<u64> = None;

    loop {
        let (started, mismatch) = match rdr.read_byte_record(&mut row) {
            Ok(false) => break,
            Ok(true) => (row.position().map(|p| p.line()), None),
            Err(err) => {
                if let ::csv::ErrorKind::UnequalLengths {
                    pos,
                    expected_len,
                    len,
                } = err.kind()
                {
                    let detail = format!("expected {expected_len} fields, found {len}");
                    (pos.as_ref().map(|p| p.line()), Some(detail))
                } else {
                    let discarded = batch.len();
                    let error = ImportError::from(err);
                    return Ok(abort(summary, ctx, options, &error, last_row, discarded));
                }
            }
        };
        let started = started.unwrap_or_else(|| next_line(last_row));
        let row_number = record_start_line(started, rdr.position().line(), &row);

        // Empty lines are dropped by the reader before the record starts.
        for blank in started..row_number {
            skip_row(&mut summary, ctx, observer, blank_line(&header, blank));
        }
        last_row = Some(row_number);

        if let Some(detail) = mismatch {
            let skipped = RowError {
                row_number,
                reason: SkipReason::ColumnCountMismatch,
                detail: Some(detail),
            };
            skip_row(&mut summary, ctx, observer, skipped);
            continue;
        }

        match record_from_row(&header, &row, row_number, ctx.restaurant) {
            Ok(record) => {
                if batch.push(record) {
                    let pending = batch.len();
                    if let Err(error) = flush(&mut batch, store, &mut summary, ctx, observer) {
                        return Ok(abort(summary, ctx, options, &error, last_row, pending));
                    }
                }
            }
            Err(skipped) => skip_row(&mut summary, ctx, observer, skipped),
        }
    }

    let pending = batch.len();
    if let Err(error) = flush(&mut batch, store, &mut summary, ctx, observer) {
        return Ok(abort(summary, ctx, options, &error, last_row, pending));
    }

    Ok(summary)
}

fn next_line(last_row: Option<u64>) -> u64 {
    last_row.map_or(2, |n| n + 1)
}

/// Line a record starts on, given the reader's line when the read began and when it ended.
///
/// A record spans one line plus any newlines inside quoted fields, and a terminated record has
/// consumed its own `\n`. Anything between `started` and the computed start was skipped as empty.
fn record_start_line(started: u64, ended: u64, record: &ByteRecord) -> u64 {
    let embedded: u64 = record
        .iter()
        .map(|field| field.iter().filter(|&&b| b == b'\n').count() as u64)
        .sum();
    let end = ended.saturating_sub(embedded);
    if end > started { end - 1 } else { started }
}

/// A blank line reads as one empty field: a field-count mismatch, or a missing date when the
/// header has a single column.
fn blank_line(header: &HeaderMap, row_number: u64) -> RowError {
    let reason = if header.width() == 1 {
        SkipReason::InvalidDate
    } else {
        SkipReason::ColumnCountMismatch
    };
    RowError {
        row_number,
        reason,
        detail: Some("blank line".to_string()),
    }
}

fn read_header<R: Read>(rdr: &mut csv::Reader<R>) -> ImportResult<HeaderMap> {
    let headers = rdr.byte_headers().map_err(|e| ImportError::Format {
        message: format!("cannot read header row: {e}"),
    })?;

    let tokens: Vec<Cow<'_, str>> = headers.iter().map(String::from_utf8_lossy).collect();
    if tokens.iter().all(|t| normalize_header(t).is_empty()) {
        return Err(ImportError::Format {
            message: "empty file: no header row".to_string(),
        });
    }

    Ok(HeaderMap::from_headers(tokens))
}

/// Convert one data row. Only the field count and the date can reject a row.
fn record_from_row(
    header: &HeaderMap,
    row: &ByteRecord,
    row_number: u64,
    restaurant: RestaurantId,
) -> Result<AttendanceRecord, RowError> {
    if row.len() == 1 && row[0].trim_ascii().is_empty() {
        return Err(blank_line(header, row_number));
    }
    if row.len() != header.width() {
        return Err(RowError {
            row_number,
            reason: SkipReason::ColumnCountMismatch,
            detail: Some(format!("expected {} fields, found {}", header.width(), row.len())),
        });
    }

    let cell = |field: CanonicalField| {
        header
            .column(field)
            .and_then(|idx| row.get(idx))
            .map(String::from_utf8_lossy)
    };

    let raw_date = cell(CanonicalField::Date);
    let date = raw_date
        .as_deref()
        .and_then(parse_date)
        .ok_or_else(|| RowError {
            row_number,
            reason: SkipReason::InvalidDate,
            detail: Some(match raw_date.as_deref() {
                Some(raw) => format!("unparseable date '{raw}'"),
                None => "no date column in header".to_string(),
            }),
        })?;

    let mut record = AttendanceRecord::new(restaurant, date);
    for field in CanonicalField::ALL {
        let Some(raw) = cell(field) else {
            continue;
        };
        let raw = raw.as_ref();
        match field {
            CanonicalField::Date => {}
            CanonicalField::AttendanceCount => record.attendance_count = parse_int(raw),
            CanonicalField::OccupancyRate => record.occupancy_rate = parse_float(raw),
            CanonicalField::IsFull => record.is_full = Some(parse_bool(raw)),
            CanonicalField::WeatherCode => record.weather_code = parse_int(raw),
            CanonicalField::TempMax => record.temp_max = parse_float(raw),
            CanonicalField::TempMin => record.temp_min = parse_float(raw),
            CanonicalField::Precipitation => record.precipitation = parse_float(raw),
            CanonicalField::WindSpeed => record.wind_speed = parse_float(raw),
            CanonicalField::IsHoliday => record.is_holiday = Some(parse_bool(raw)),
            CanonicalField::IsSchoolVacation => record.is_school_vacation = Some(parse_bool(raw)),
            CanonicalField::IsWeekend => record.is_weekend = Some(parse_bool(raw)),
            CanonicalField::HolidayName => record.holiday_name = parse_text(raw),
            CanonicalField::VacationName => record.vacation_name = parse_text(raw),
            CanonicalField::DayOfWeek => record.day_of_week = parse_text(raw),
        }
    }

    Ok(record)
}

fn skip_row(
    summary: &mut ImportSummary,
    ctx: &ImportContext,
    observer: Option<&Arc<dyn ImportObserver>>,
    error: RowError,
) {
    tracing::debug!(
        row = error.row_number,
        reason = %error.reason,
        detail = error.detail.as_deref().unwrap_or(""),
        "row skipped"
    );
    if let Some(obs) = observer {
        obs.on_row_skipped(ctx, &error);
    }
    summary.record_skip(error);
}

fn flush<S>(
    batch: &mut BatchBuffer<AttendanceRecord>,
    store: &mut S,
    summary: &mut ImportSummary,
    ctx: &ImportContext,
    observer: Option<&Arc<dyn ImportObserver>>,
) -> ImportResult<()>
where
    S: AttendanceStore + ?Sized,
{
    let written = batch.flush_with(|records| store.append_batch(records))?;
    if written == 0 {
        return Ok(());
    }

    summary.rows_processed += written;
    let stats = BatchStats {
        batch_index: summary.batches_flushed,
        size: written,
        rows_processed: summary.rows_processed,
    };
    summary.batches_flushed += 1;

    tracing::debug!(batch = stats.batch_index, size = written, "batch flushed");
    if let Some(obs) = observer {
        obs.on_batch_flushed(ctx, stats);
    }
    Ok(())
}

/// End the run early: report the failure and mark the summary.
fn abort(
    mut summary: ImportSummary,
    ctx: &ImportContext,
    options: &ImportOptions,
    error: &ImportError,
    last_row: Option<u64>,
    rows_discarded: usize,
) -> ImportSummary {
    report_failure(options.observer.as_ref(), options.alert_at_or_above, ctx, error);
    summary.fatal = Some(FatalError::from_error(error, last_row, rows_discarded));
    summary
}
