//! Dispatched workers. Owned externally; the engine only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
  #[default]
  Active,
  Resigned,
  OnLeave,
}

impl EmploymentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Resigned => "resigned",
      Self::OnLeave => "on_leave",
    }
  }
}

impl std::str::FromStr for EmploymentStatus {
  type Err = crate::Error;

  fn from_str(s: &str) -> crate::Result<Self> {
    match s {
      "active" => Ok(Self::Active),
      "resigned" => Ok(Self::Resigned),
      "on_leave" => Ok(Self::OnLeave),
      other => Err(crate::Error::UnknownVariant {
        kind:  "employment status",
        value: other.to_owned(),
      }),
    }
  }
}

impl fmt::Display for EmploymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
  pub worker_number:     String,
  pub name:              String,
  /// The worker's own base hourly rate, in yen.
  pub base_hourly_rate:  u32,
  pub employment_status: EmploymentStatus,
}
