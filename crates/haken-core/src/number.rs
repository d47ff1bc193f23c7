//! Contract numbers of the form `PREFIX-YYYYMM-NNNN`.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A calendar month; the scope of one sequence counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
  year:  i32,
  month: u32,
}

impl YearMonth {
  pub fn new(year: i32, month: u32) -> Option<Self> {
    ((1..=12).contains(&month) && (0..=9999).contains(&year))
      .then_some(Self { year, month })
  }

  pub fn of(date: NaiveDate) -> Self {
    Self { year: date.year(), month: date.month() }
  }

  pub fn year(&self) -> i32 { self.year }

  pub fn month(&self) -> u32 { self.month }

  /// The `YYYYMM` key used for the counter and the contract number.
  pub fn key(&self) -> String { format!("{:04}{:02}", self.year, self.month) }
}

impl fmt::Display for YearMonth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}{:02}", self.year, self.month)
  }
}

impl FromStr for YearMonth {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let bad = || Error::InvalidContractNumber(s.to_owned());
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(bad());
    }
    let year = s[..4].parse().map_err(|_| bad())?;
    let month = s[4..].parse().map_err(|_| bad())?;
    Self::new(year, month).ok_or_else(bad)
  }
}

/// Deployment-level prefix check: 1–8 uppercase ASCII letters or digits.
pub fn validate_prefix(prefix: &str) -> Result<()> {
  let ok = !prefix.is_empty()
    && prefix.len() <= 8
    && prefix
      .bytes()
      .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
  if ok { Ok(()) } else { Err(Error::InvalidPrefix(prefix.to_owned())) }
}

/// A globally unique, human-readable contract identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractNumber {
  pub prefix:   String,
  pub period:   YearMonth,
  pub sequence: u32,
}

impl ContractNumber {
  pub fn new(
    prefix: impl Into<String>,
    period: YearMonth,
    sequence: u32,
  ) -> Result<Self> {
    let prefix = prefix.into();
    validate_prefix(&prefix)?;
    Ok(Self { prefix, period, sequence })
  }
}

impl fmt::Display for ContractNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}-{:04}", self.prefix, self.period, self.sequence)
  }
}

impl FromStr for ContractNumber {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let bad = || Error::InvalidContractNumber(s.to_owned());
    let mut parts = s.split('-');
    let (Some(prefix), Some(period), Some(seq), None) =
      (parts.next(), parts.next(), parts.next(), parts.next())
    else {
      return Err(bad());
    };
    if !seq.bytes().all(|b| b.is_ascii_digit()) {
      return Err(bad());
    }
    let period = period.parse::<YearMonth>().map_err(|_| bad())?;
    let sequence = seq.parse::<u32>().map_err(|_| bad())?;
    // Only the zero-padded form `Display` produces is accepted.
    if seq != format!("{sequence:04}") {
      return Err(bad());
    }
    Self::new(prefix, period, sequence).map_err(|_| bad())
  }
}

impl Serialize for ContractNumber {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for ContractNumber {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}
