//! Read-only snapshot handed to the document-generation collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  assignment::Assignment, config::CompanyProfile, contract::Contract,
  site::ClientSite,
};

/// Everything a contract document needs, resolved at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
  pub contract:    Contract,
  pub site:        ClientSite,
  /// Live assignments only.
  pub assignments: Vec<Assignment>,
  pub company:     CompanyProfile,
  pub taken_at:    DateTime<Utc>,
}
