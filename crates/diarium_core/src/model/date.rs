//! Date references as written in document headers.
//!
//! # Invariants
//! - `ThisDocument` (`.`) and `Unknown` (`~` / `??`) are kept as sentinels and
//!   are never converted into calendar values at parse time.
//! - Calendar values keep their precision (year, month or day) and an
//!   approximate marker (`~2019-05`).
//! - `to_text()` is the canonical storage/export form; `parse(to_text(x)) == x`.

use chrono::{Datelike, NaiveDate};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Canonical text for the "this document's own date" sentinel.
pub const THIS_DOCUMENT_SENTINEL: &str = ".";
/// Canonical text for the "unknown/approximate" sentinel.
pub const UNKNOWN_SENTINEL: &str = "~";
const UNKNOWN_ALT_SENTINEL: &str = "??";

/// Date referenced from a header field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DateRef {
    /// The owning document's own date.
    ThisDocument,
    /// Date is unknown; only the fact that a moment happened is recorded.
    Unknown,
    /// Calendar date with year/month/day precision.
    Calendar(CalendarDate),
}

/// Calendar value with partial precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub approximate: bool,
}

/// Error raised for text that is neither a sentinel nor a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParseError {
    pub input: String,
}

impl Display for DateParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid date `{}`; expected YYYY[-MM[-DD]], `.`, `~` or `??`",
            self.input
        )
    }
}

impl Error for DateParseError {}

impl DateRef {
    /// Parses header date text.
    pub fn parse(text: &str) -> Result<Self, DateParseError> {
        let trimmed = text.trim();
        match trimmed {
            THIS_DOCUMENT_SENTINEL => return Ok(Self::ThisDocument),
            UNKNOWN_SENTINEL | UNKNOWN_ALT_SENTINEL => return Ok(Self::Unknown),
            _ => {}
        }

        let (approximate, body) = match trimmed.strip_prefix('~') {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };
        let mut calendar = CalendarDate::parse(body).ok_or_else(|| DateParseError {
            input: trimmed.to_string(),
        })?;
        calendar.approximate = approximate;
        Ok(Self::Calendar(calendar))
    }

    /// Exact day-precision reference.
    pub fn exact(date: NaiveDate) -> Self {
        Self::Calendar(CalendarDate::from_naive(date))
    }

    /// Replaces the `ThisDocument` sentinel with the given document date.
    ///
    /// Used wherever two references must be compared by effective date.
    pub fn effective(&self, document_date: NaiveDate) -> Self {
        match self {
            Self::ThisDocument => Self::exact(document_date),
            other => other.clone(),
        }
    }

    /// Returns the exact day when this reference has day precision and is
    /// not approximate.
    pub fn as_exact_day(&self) -> Option<NaiveDate> {
        match self {
            Self::Calendar(value) if !value.approximate => value.as_naive(),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::ThisDocument | Self::Unknown)
    }

    /// Canonical text used for storage and export.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl Display for DateRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThisDocument => f.write_str(THIS_DOCUMENT_SENTINEL),
            Self::Unknown => f.write_str(UNKNOWN_SENTINEL),
            Self::Calendar(value) => write!(f, "{value}"),
        }
    }
}

impl CalendarDate {
    fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('-');
        let year_text = parts.next()?;
        if year_text.len() != 4 || !year_text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year = year_text.parse::<i32>().ok()?;
        let month = parse_component(parts.next(), 12)?;
        let day = parse_component(parts.next(), 31)?;
        if parts.next().is_some() || (day.is_some() && month.is_none()) {
            return None;
        }

        if let (Some(month), Some(day)) = (month, day) {
            NaiveDate::from_ymd_opt(year, month, day)?;
        }

        Some(Self {
            year,
            month,
            day,
            approximate: false,
        })
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: Some(date.month()),
            day: Some(date.day()),
            approximate: false,
        }
    }

    pub fn as_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month?, self.day?)
    }
}

impl Display for CalendarDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.approximate {
            f.write_str("~")?;
        }
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
            if let Some(day) = self.day {
                write!(f, "-{day:02}")?;
            }
        }
        Ok(())
    }
}

// Outer `None` = malformed component, inner `None` = component absent.
fn parse_component(part: Option<&str>, max: u32) -> Option<Option<u32>> {
    let Some(part) = part else {
        return Some(None);
    };
    if part.len() != 2 || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value = part.parse::<u32>().ok()?;
    if value == 0 || value > max {
        return None;
    }
    Some(Some(value))
}

/// Date plus optional free-text context, e.g. `2024-03-09 (the concert)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatedContext {
    pub date: DateRef,
    pub context: Option<String>,
}

impl DatedContext {
    pub fn new(date: DateRef, context: Option<String>) -> Self {
        Self { date, context }
    }

    /// Renders the packed `date (context)` form.
    pub fn to_packed(&self) -> String {
        match self.context.as_deref() {
            Some(context) => format!("{} ({context})", self.date),
            None => self.date.to_text(),
        }
    }
}

/// Parses a stored `YYYY-MM-DD` column value.
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Formats a day as stored in `documents.date`.
pub fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
