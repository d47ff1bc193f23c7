//! Client sites: the placement locations contracts are signed against.
//!
//! Sites are owned by an external import or admin module. The engine reads
//! them and only ever changes `conflict_date`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The unique business key of a client site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteKey {
  pub company_name:    String,
  pub plant_name:      String,
  pub department:      String,
  pub production_line: String,
}

impl std::fmt::Display for SiteKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} / {} / {} / {}",
      self.company_name, self.plant_name, self.department, self.production_line
    )
  }
}

/// A specific organisational unit at a client factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSite {
  pub site_id:          Uuid,
  pub key:              SiteKey,
  /// Statutory dispatch ceiling (抵触日). `None` means not yet established.
  pub conflict_date:    Option<NaiveDate>,
  /// Default hourly rate for the site, in yen.
  pub base_hourly_rate: u32,
  pub updated_at:       DateTime<Utc>,
}

/// Input to [`crate::store::ContractStore::put_client_site`]; upserted by
/// [`SiteKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClientSite {
  pub key:              SiteKey,
  pub conflict_date:    Option<NaiveDate>,
  pub base_hourly_rate: u32,
}
