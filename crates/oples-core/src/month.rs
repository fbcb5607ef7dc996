use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// A calendar month, rendered as `MM/YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_datetime(value: &NaiveDateTime) -> Self {
        Self::from_date(&value.date())
    }

    pub fn from_date(value: &NaiveDate) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
        }
    }

    /// Parses the stored `MM/YYYY` form. Both parts must be numeric and the
    /// year must have four digits.
    pub fn parse(value: &str) -> Option<Self> {
        let (month, year) = value.trim().split_once('/')?;
        if month.is_empty() || month.len() > 2 || year.len() != 4 {
            return None;
        }
        if !month.bytes().chain(year.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months elapsed since year zero; sorts chronologically.
    pub fn ordinal(&self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl PartialOrd for Month {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Month {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

/// Newest-first ordering on the `MM/YYYY` text itself.
///
/// This compares month digits before years, so `12/2023` ranks ahead of
/// `01/2024`. Load summaries have always been ordered this way and are kept
/// as-is; use [`calendar_desc`] where real chronology matters.
pub fn text_desc(a: &str, b: &str) -> Ordering {
    b.cmp(a)
}

/// Newest-first calendar ordering.
pub fn calendar_desc(a: &Month, b: &Month) -> Ordering {
    b.cmp(a)
}
