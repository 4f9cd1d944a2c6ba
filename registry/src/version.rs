//! Dated model identifiers (`name-YYYY-MM-DD`), calendar dates and minimum-version gating.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RegistryError, Result};

static DATED_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)-(\d{4}-\d{2}-\d{2})$").expect("Invalid regex")
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("Invalid regex"));

/// A validated calendar date. Invalid dates (month 13, Feb 30) never make it into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Builds a date from components, rejecting anything that is not a real calendar day.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        let value = format!("{:04}-{:02}-{:02}", year, month, day);
        if !(1000..=9999).contains(&year) {
            return Err(RegistryError::InvalidDate {
                value,
                reason: "year must be between 1000 and 9999".to_string(),
            });
        }
        if !(1..=12).contains(&month) {
            return Err(RegistryError::InvalidDate {
                value,
                reason: "month must be between 1 and 12".to_string(),
            });
        }
        if !(1..=31).contains(&day) {
            return Err(RegistryError::InvalidDate {
                value,
                reason: "day must be between 1 and 31".to_string(),
            });
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(CalendarDate)
            .ok_or_else(|| RegistryError::InvalidDate {
                value,
                reason: "not a valid calendar day".to_string(),
            })
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for CalendarDate {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = DATE_RE.captures(s).ok_or_else(|| RegistryError::InvalidDate {
            value: s.to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        })?;
        // The regex guarantees ASCII digits of fixed width, so these parses cannot overflow.
        let year: i32 = caps[1].parse().unwrap_or_default();
        let month: u32 = caps[2].parse().unwrap_or_default();
        let day: u32 = caps[3].parse().unwrap_or_default();
        Self::from_ymd(year, month, day).map_err(|e| match e {
            RegistryError::InvalidDate { reason, .. } => RegistryError::InvalidDate {
                value: s.to_string(),
                reason,
            },
            other => other,
        })
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts `"2024-08-06"` or `{year: 2024, month: 8, day: 6}`.
impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Parts { year: i32, month: u32, day: u32 },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Parts { year, month, day } => {
                CalendarDate::from_ymd(year, month, day).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// A model identifier split into its family name and release date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedIdentifier {
    pub base: String,
    pub date: CalendarDate,
}

impl fmt::Display for DatedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.date)
    }
}

/// Splits `name-YYYY-MM-DD` into base name and date.
///
/// Returns `None` for aliases and for suffixes that look like a date but are not a real
/// calendar day (`gpt-4o-2024-13-01`), so such names are never mistaken for dated ids.
pub fn parse_dated_identifier(name: &str) -> Option<DatedIdentifier> {
    let caps = DATED_ID_RE.captures(name)?;
    let date = caps[2].parse::<CalendarDate>().ok()?;
    Some(DatedIdentifier {
        base: caps[1].to_string(),
        date,
    })
}

/// True when `name` ends in a date-shaped suffix, valid or not.
pub fn has_date_suffix(name: &str) -> bool {
    DATED_ID_RE.is_match(name)
}

pub fn compare(a: &CalendarDate, b: &CalendarDate) -> Ordering {
    a.cmp(b)
}

/// Fails with `VersionTooOld` when `requested` predates `min_version`.
pub fn check_min_version(
    model: &str,
    requested: CalendarDate,
    min_version: Option<CalendarDate>,
    alias: Option<&str>,
) -> Result<()> {
    match min_version {
        Some(min) if requested < min => Err(RegistryError::VersionTooOld {
            model: model.to_string(),
            requested,
            min_version: min,
            alias: alias.map(str::to_string),
        }),
        _ => Ok(()),
    }
}
