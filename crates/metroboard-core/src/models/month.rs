//! Calendar month identifier (`YYYY-MM`)
//!
//! Months order chronologically and key every dataset-scoped cache entry.

use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month, the unit of dataset storage and aggregation.
///
/// Field order matters: deriving `Ord` on (year, month) gives chronological
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, CoreError> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(CoreError::InvalidMonth {
                input: format!("{year}-{month}"),
            });
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Previous calendar month, crossing year boundaries.
    pub fn prev(&self) -> Month {
        if self.month > 1 {
            Month {
                year: self.year,
                month: self.month - 1,
            }
        } else {
            Month {
                year: self.year - 1,
                month: 12,
            }
        }
    }

    /// Next calendar month, crossing year boundaries.
    pub fn next(&self) -> Month {
        if self.month < 12 {
            Month {
                year: self.year,
                month: self.month + 1,
            }
        } else {
            Month {
                year: self.year + 1,
                month: 1,
            }
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidMonth {
            input: s.to_string(),
        };
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Month::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
