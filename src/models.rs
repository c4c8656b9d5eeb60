use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::WmmError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub bank: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    /// Empty when uncategorized.
    pub category: String,
    pub filter_id: Option<i64>,
    pub external_id: Option<String>,
    pub not_duplicate: bool,
}

impl Transaction {
    pub fn is_categorized(&self) -> bool {
        !self.category.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub id: i64,
    pub category: String,
    pub pattern: String,
    pub label: String,
}

impl Filter {
    /// The label when one was given, otherwise the pattern itself.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.pattern
        } else {
            &self.label
        }
    }
}

/// A row from a bank feed, before the store assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Year,
    Month,
    Day,
    /// One point per transaction, no bucketing.
    Unit,
}

impl FromStr for Granularity {
    type Err = WmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Day),
            "unit" => Ok(Self::Unit),
            _ => Err(WmmError::UnknownGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Unit => "unit",
        };
        f.write_str(s)
    }
}

/// A timeline bucket. Ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Period {
    Year(i32),
    Month(i32, u32),
    Day(NaiveDate),
}

impl Period {
    pub fn of(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Year => Self::Year(date.year()),
            Granularity::Month => Self::Month(date.year(), date.month()),
            Granularity::Day | Granularity::Unit => Self::Day(date),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(y) => write!(f, "{y:04}"),
            Self::Month(y, m) => write!(f, "{y:04}-{m:02}"),
            Self::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
