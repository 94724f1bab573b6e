//! Canonical attendance fields, header resolution and per-type value coercion.
//!
//! The set of fields an import can populate is closed: [`CanonicalField`] enumerates it. Header
//! tokens are normalized (trimmed, lower-cased) and matched against each field's accepted names;
//! cell text is converted with one `parse_*` function per value type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A target attribute of [`crate::types::AttendanceRecord`] that a CSV column can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Date,
    AttendanceCount,
    OccupancyRate,
    IsFull,
    WeatherCode,
    TempMax,
    TempMin,
    Precipitation,
    WindSpeed,
    IsHoliday,
    IsSchoolVacation,
    IsWeekend,
    HolidayName,
    VacationName,
    DayOfWeek,
}

impl CanonicalField {
    /// Number of canonical fields.
    pub const COUNT: usize = 15;

    /// Every canonical field, required `Date` first.
    pub const ALL: [CanonicalField; Self::COUNT] = [
        Self::Date,
        Self::AttendanceCount,
        Self::OccupancyRate,
        Self::IsFull,
        Self::WeatherCode,
        Self::TempMax,
        Self::TempMin,
        Self::Precipitation,
        Self::WindSpeed,
        Self::IsHoliday,
        Self::IsSchoolVacation,
        Self::IsWeekend,
        Self::HolidayName,
        Self::VacationName,
        Self::DayOfWeek,
    ];

    /// Canonical (snake_case) name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::AttendanceCount => "attendance_count",
            Self::OccupancyRate => "occupancy_rate",
            Self::IsFull => "is_full",
            Self::WeatherCode => "weather_code",
            Self::TempMax => "temp_max",
            Self::TempMin => "temp_min",
            Self::Precipitation => "precipitation",
            Self::WindSpeed => "wind_speed",
            Self::IsHoliday => "is_holiday",
            Self::IsSchoolVacation => "is_school_vacation",
            Self::IsWeekend => "is_weekend",
            Self::HolidayName => "holiday_name",
            Self::VacationName => "vacation_name",
            Self::DayOfWeek => "day_of_week",
        }
    }

    /// Normalized header names accepted for this field, in priority order.
    ///
    /// Legacy export columns (`affluence`, `tmax`, `prcd`, ...) are accepted next to the canonical
    /// names. For the date, `date_historique` is the primary name and `date` the fallback.
    pub fn header_names(self) -> &'static [&'static str] {
        match self {
            Self::Date => &["date_historique", "date"],
            Self::AttendanceCount => &["attendance_count", "affluence"],
            Self::OccupancyRate => &["occupancy_rate", "pourcentage_occupation"],
            Self::IsFull => &["is_full", "is_complet"],
            Self::WeatherCode => &["weather_code"],
            Self::TempMax => &["temp_max", "tmax"],
            Self::TempMin => &["temp_min", "tmin"],
            Self::Precipitation => &["precipitation", "prcp", "prcd"],
            Self::WindSpeed => &["wind_speed", "wspd"],
            Self::IsHoliday => &["is_holiday"],
            Self::IsSchoolVacation => &["is_school_vacation", "is_school_vacations"],
            Self::IsWeekend => &["is_weekend"],
            Self::HolidayName => &["holiday_name"],
            Self::VacationName => &["vacation_name"],
            Self::DayOfWeek => &["day_of_week"],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Normalize a raw header token: strip a UTF-8 BOM, trim whitespace, lower-case.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Resolved mapping from canonical fields to column indexes of one CSV header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    width: usize,
    columns: [Option<usize>; CanonicalField::COUNT],
    ignored: Vec<String>,
}

impl HeaderMap {
    /// Resolve a header row.
    ///
    /// For each field the first accepted name (in [`CanonicalField::header_names`] order) present
    /// in the header wins; if a name appears more than once, its first column wins. Columns that
    /// match no field are kept in [`Self::ignored_columns`].
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = headers
            .into_iter()
            .map(|h| normalize_header(h.as_ref()))
            .collect();

        let mut columns = [None; CanonicalField::COUNT];
        for field in CanonicalField::ALL {
            columns[field.index()] = field
                .header_names()
                .iter()
                .find_map(|name| normalized.iter().position(|h| h == name));
        }

        let ignored = normalized
            .iter()
            .filter(|h| {
                !CanonicalField::ALL
                    .iter()
                    .any(|f| f.header_names().contains(&h.as_str()))
            })
            .cloned()
            .collect();

        Self {
            width: normalized.len(),
            columns,
            ignored,
        }
    }

    /// Number of columns in the header; every data row must have exactly this many fields.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Column index feeding `field`, if the header contains one of its names.
    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns[field.index()]
    }

    /// Canonical fields present in the header.
    pub fn resolved_fields(&self) -> impl Iterator<Item = CanonicalField> + '_ {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| self.column(*f).is_some())
    }

    /// Normalized header tokens that match no canonical field.
    pub fn ignored_columns(&self) -> &[String] {
        &self.ignored
    }
}

/// Parse a calendar date.
///
/// Accepts ISO dates (`2024-03-15`, `2024/03/15`), day-first dash/dot dates (`15-03-2024`,
/// `15.03.2024`), US slash dates (`03/15/2024`), date-times with a space or `T` separator, and
/// RFC 3339 timestamps (the date part is kept). Empty input is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y", "%m/%d/%Y"];
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Parse an integer. A float token with no fractional part (`"12.0"`) is accepted.
pub fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = parse_float(s)?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a finite float. A single decimal comma (`"12,5"`) is read as a decimal point.
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = match s.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) if s.matches(',').count() == 1 && !s.contains('.') => s.replace(',', ".").parse().ok(),
        Err(_) => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Permissive boolean: `1`, `true`, `yes`, `on` (any case) are `true`, everything else is `false`.
///
/// Never fails: once a boolean column is present, an unrecognized or empty cell reads as `false`.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Trimmed string; empty is `None`.
pub fn parse_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() { None } else { Some(s.to_owned()) }
}
