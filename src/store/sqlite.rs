//! SQLite-backed store (feature `sqlite`).

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{ImportError, ImportResult, StorageError};
use crate::types::{AttendanceRecord, Restaurant, RestaurantId};

use super::{AttendanceStore, RestaurantResolver};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS restaurant (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS attendance_history (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    restaurant_id      INTEGER NOT NULL REFERENCES restaurant (id),
    date               TEXT NOT NULL,
    attendance_count   INTEGER,
    occupancy_rate     REAL,
    is_full            INTEGER,
    weather_code       INTEGER,
    temp_max           REAL,
    temp_min           REAL,
    precipitation      REAL,
    wind_speed         REAL,
    is_holiday         INTEGER,
    is_school_vacation INTEGER,
    is_weekend         INTEGER,
    holiday_name       TEXT,
    vacation_name      TEXT,
    day_of_week        TEXT
);
CREATE INDEX IF NOT EXISTS idx_attendance_history_restaurant
    ON attendance_history (restaurant_id);
";

const INSERT_HISTORY: &str = "INSERT INTO attendance_history (
    restaurant_id, date, attendance_count, occupancy_rate, is_full, weather_code,
    temp_max, temp_min, precipitation, wind_speed, is_holiday, is_school_vacation,
    is_weekend, holiday_name, vacation_name, day_of_week
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const SELECT_HISTORY: &str = "SELECT
    restaurant_id, date, attendance_count, occupancy_rate, is_full, weather_code,
    temp_max, temp_min, precipitation, wind_speed, is_holiday, is_school_vacation,
    is_weekend, holiday_name, vacation_name, day_of_week
FROM attendance_history WHERE restaurant_id = ?1 ORDER BY id";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Attendance store backed by a SQLite database.
///
/// Every [`AttendanceStore::append_batch`] call runs in its own transaction. The history table
/// references `restaurant (id)` with foreign keys enforced, so records for an unknown restaurant
/// are rejected.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a restaurant and return it with its generated id.
    pub fn insert_restaurant(&mut self, name: &str) -> Result<Restaurant, StorageError> {
        self.conn
            .execute("INSERT INTO restaurant (name) VALUES (?1)", params![name])?;
        Ok(Restaurant::new(
            RestaurantId(self.conn.last_insert_rowid()),
            name,
        ))
    }

    /// Number of history rows stored for a restaurant.
    pub fn history_count(&self, id: RestaurantId) -> Result<u64, StorageError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance_history WHERE restaurant_id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// History rows for a restaurant, in insertion order.
    pub fn history_for(&self, id: RestaurantId) -> Result<Vec<AttendanceRecord>, StorageError> {
        let mut stmt = self.conn.prepare_cached(SELECT_HISTORY)?;
        let rows = stmt.query_map(params![id.0], record_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl AttendanceStore for SqliteStore {
    fn append_batch(&mut self, records: &[AttendanceRecord]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_HISTORY)?;
            for r in records {
                stmt.execute(params![
                    r.restaurant_id.0,
                    r.date.format(DATE_FORMAT).to_string(),
                    r.attendance_count,
                    r.occupancy_rate,
                    r.is_full,
                    r.weather_code,
                    r.temp_max,
                    r.temp_min,
                    r.precipitation,
                    r.wind_speed,
                    r.is_holiday,
                    r.is_school_vacation,
                    r.is_weekend,
                    r.holiday_name,
                    r.vacation_name,
                    r.day_of_week,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl RestaurantResolver for SqliteStore {
    fn resolve_restaurant(&self, id: RestaurantId) -> ImportResult<Restaurant> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM restaurant WHERE id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;

        name.map(|name| Restaurant::new(id, name))
            .ok_or(ImportError::RestaurantNotFound { id })
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let raw_date: String = row.get(1)?;
    let date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(AttendanceRecord {
        restaurant_id: RestaurantId(row.get(0)?),
        date,
        attendance_count: row.get(2)?,
        occupancy_rate: row.get(3)?,
        is_full: row.get(4)?,
        weather_code: row.get(5)?,
        temp_max: row.get(6)?,
        temp_min: row.get(7)?,
        precipitation: row.get(8)?,
        wind_speed: row.get(9)?,
        is_holiday: row.get(10)?,
        is_school_vacation: row.get(11)?,
        is_weekend: row.get(12)?,
        holiday_name: row.get(13)?,
        vacation_name: row.get(14)?,
        day_of_week: row.get(15)?,
    })
}
