//! The append-only audit trail.
//!
//! Every mutating engine operation hands its audit entries to the same store
//! call that performs the mutation, so an entry exists if and only if the
//! mutation it describes committed. Entries are never updated or deleted.
//!
//! Each stored entry carries a SHA-256 hash chained to the previous entry of
//! the same entity; [`verify_chain`] recomputes the chain to detect edits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Error, Result,
  contract::{Contract, LifecycleStatus},
};

/// Actor recorded for system-driven changes (scheduled activation/expiry).
pub const SYSTEM_ACTOR: &str = "system";

/// Field name used by lifecycle entries; [`replay_lifecycle`] folds over it.
pub const LIFECYCLE_FIELD: &str = "lifecycle_status";

// ─── Classification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
  Contract,
  Assignment,
  ClientSite,
}

impl EntityType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Contract => "contract",
      Self::Assignment => "assignment",
      Self::ClientSite => "client_site",
    }
  }
}

impl std::str::FromStr for EntityType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "contract" => Ok(Self::Contract),
      "assignment" => Ok(Self::Assignment),
      "client_site" => Ok(Self::ClientSite),
      other => Err(Error::UnknownVariant {
        kind:  "entity type",
        value: other.to_owned(),
      }),
    }
  }
}

impl fmt::Display for EntityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  Created,
  Updated,
  Transitioned,
  Attached,
  Detached,
}

impl AuditAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::Updated => "updated",
      Self::Transitioned => "transitioned",
      Self::Attached => "attached",
      Self::Detached => "detached",
    }
  }
}

impl std::str::FromStr for AuditAction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "created" => Ok(Self::Created),
      "updated" => Ok(Self::Updated),
      "transitioned" => Ok(Self::Transitioned),
      "attached" => Ok(Self::Attached),
      "detached" => Ok(Self::Detached),
      other => Err(Error::UnknownVariant {
        kind:  "audit action",
        value: other.to_owned(),
      }),
    }
  }
}

impl fmt::Display for AuditAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// An audit entry before the store assigns its id, sequence, timestamp and
/// hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub action:      AuditAction,
  pub field_name:  Option<String>,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub actor:       String,
  pub reason:      Option<String>,
}

impl NewAuditEntry {
  pub fn new(
    entity_type: EntityType,
    entity_id: Uuid,
    action: AuditAction,
    actor: impl Into<String>,
  ) -> Self {
    Self {
      entity_type,
      entity_id,
      action,
      field_name: None,
      old_value: None,
      new_value: None,
      actor: actor.into(),
      reason: None,
    }
  }

  /// A single-field change.
  pub fn field(
    mut self,
    name: &str,
    old: Option<String>,
    new: Option<String>,
  ) -> Self {
    self.field_name = Some(name.to_owned());
    self.old_value = old;
    self.new_value = new;
    self
  }

  pub fn with_reason(mut self, reason: Option<String>) -> Self {
    self.reason = reason;
    self
  }

  /// The first entry of every contract: lifecycle status set to `draft`.
  pub fn contract_created(contract: &Contract, actor: &str) -> Self {
    Self::new(
      EntityType::Contract,
      contract.contract_id,
      AuditAction::Created,
      actor,
    )
    .field(
      LIFECYCLE_FIELD,
      None,
      Some(contract.lifecycle_status.as_str().to_owned()),
    )
  }
}

/// A committed, immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub entry_id:    Uuid,
  /// Store-assigned position in the global append order.
  pub sequence:    i64,
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub action:      AuditAction,
  pub field_name:  Option<String>,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub actor:       String,
  pub recorded_at: DateTime<Utc>,
  pub reason:      Option<String>,
  /// Hex SHA-256 over the previous hash of this entity and this entry.
  pub hash:        String,
}

// ─── Field-level diffs ───────────────────────────────────────────────────────

/// One entry per editable contract field that differs between `old` and `new`.
pub fn diff_contract(
  old: &Contract,
  new: &Contract,
  actor: &str,
) -> Vec<NewAuditEntry> {
  let mut entries = Vec::new();
  let mut push = |name: &str, a: Option<String>, b: Option<String>| {
    if a != b {
      entries.push(
        NewAuditEntry::new(
          EntityType::Contract,
          new.contract_id,
          AuditAction::Updated,
          actor,
        )
        .field(name, a, b),
      );
    }
  };

  push(
    "start",
    Some(old.range.start.to_string()),
    Some(new.range.start.to_string()),
  );
  push(
    "end",
    Some(old.range.end.to_string()),
    Some(new.range.end.to_string()),
  );
  push(
    "work_description",
    Some(old.work_description.clone()),
    Some(new.work_description.clone()),
  );
  push(
    "hourly_rate",
    Some(old.hourly_rate.to_string()),
    Some(new.hourly_rate.to_string()),
  );
  push("approver", old.approver.clone(), new.approver.clone());

  entries
}

// ─── Hash chain ──────────────────────────────────────────────────────────────

fn update_opt(hasher: &mut Sha256, value: Option<&str>) {
  match value {
    Some(v) => {
      hasher.update([1u8]);
      hasher.update((v.len() as u64).to_le_bytes());
      hasher.update(v.as_bytes());
    }
    None => hasher.update([0u8]),
  }
}

/// Compute the chained hash of an entry given the previous entry's hash for
/// the same entity (`None` for the first entry).
pub fn chain_hash(
  previous: Option<&str>,
  entry_id: Uuid,
  entry: &NewAuditEntry,
  recorded_at: DateTime<Utc>,
) -> String {
  let mut hasher = Sha256::new();
  update_opt(&mut hasher, previous);
  hasher.update(entry_id.as_bytes());
  hasher.update(entry.entity_type.as_str().as_bytes());
  hasher.update(entry.entity_id.as_bytes());
  hasher.update(entry.action.as_str().as_bytes());
  update_opt(&mut hasher, entry.field_name.as_deref());
  update_opt(&mut hasher, entry.old_value.as_deref());
  update_opt(&mut hasher, entry.new_value.as_deref());
  update_opt(&mut hasher, Some(entry.actor.as_str()));
  update_opt(&mut hasher, entry.reason.as_deref());
  hasher.update(recorded_at.timestamp_micros().to_le_bytes());
  hex::encode(hasher.finalize())
}

impl AuditEntry {
  fn as_new(&self) -> NewAuditEntry {
    NewAuditEntry {
      entity_type: self.entity_type,
      entity_id:   self.entity_id,
      action:      self.action,
      field_name:  self.field_name.clone(),
      old_value:   self.old_value.clone(),
      new_value:   self.new_value.clone(),
      actor:       self.actor.clone(),
      reason:      self.reason.clone(),
    }
  }
}

/// Recompute the hash chain of one entity's history (oldest first).
///
/// Returns the `entry_id` of the first entry whose stored hash does not
/// match, or `None` if the chain is intact.
pub fn verify_chain(history: &[AuditEntry]) -> Option<Uuid> {
  let mut previous: Option<&str> = None;
  for entry in history {
    let expected =
      chain_hash(previous, entry.entry_id, &entry.as_new(), entry.recorded_at);
    if expected != entry.hash {
      return Some(entry.entry_id);
    }
    previous = Some(entry.hash.as_str());
  }
  None
}

// ─── Replay ──────────────────────────────────────────────────────────────────

/// Reconstruct a contract's lifecycle status by replaying its history in
/// order from an empty initial state.
pub fn replay_lifecycle(history: &[AuditEntry]) -> Result<Option<LifecycleStatus>> {
  history
    .iter()
    .filter(|e| e.field_name.as_deref() == Some(LIFECYCLE_FIELD))
    .try_fold(None, |_, e| {
      e.new_value
        .as_deref()
        .map(str::parse::<LifecycleStatus>)
        .transpose()
    })
}
