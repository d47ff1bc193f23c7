//! Error types for `haken-core`.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  contract::{DateRange, LifecycleStatus},
  worker::EmploymentStatus,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  // ── Compliance ──────────────────────────────────────────────────────────
  #[error("invalid date range: start {start} is after end {end}")]
  InvalidRange { start: NaiveDate, end: NaiveDate },

  #[error("contract end {end} exceeds the site conflict date {conflict_date}")]
  ConflictDateExceeded {
    end:           NaiveDate,
    conflict_date: NaiveDate,
  },

  // ── Lifecycle ───────────────────────────────────────────────────────────
  #[error("transition `{transition}` is not allowed from status {from}")]
  InvalidTransition {
    from:       LifecycleStatus,
    transition: &'static str,
  },

  /// Another writer changed the contract since it was read. Re-read and
  /// retry.
  #[error("contract {0} was modified concurrently")]
  StaleState(Uuid),

  #[error("a non-empty reason is required to {0}")]
  ReasonRequired(&'static str),

  #[error("contract {0} has no approver assigned")]
  ApproverRequired(Uuid),

  #[error("contract {contract_id} starts on {start} and cannot be activated yet")]
  NotYetStarted { contract_id: Uuid, start: NaiveDate },

  #[error("contract {contract_id} runs until {end} and cannot expire yet")]
  NotYetEnded { contract_id: Uuid, end: NaiveDate },

  #[error("cannot {action} contract {contract_id} while it is {status}")]
  NotEditable {
    contract_id: Uuid,
    status:      LifecycleStatus,
    action:      &'static str,
  },

  // ── Identifiers ─────────────────────────────────────────────────────────
  /// The atomic per-period counter could not be incremented.
  #[error("contract number sequencer unavailable: {0}")]
  SequencerUnavailable(#[source] BoxError),

  #[error("malformed contract number: {0:?}")]
  InvalidContractNumber(String),

  #[error("contract prefix must be 1-8 uppercase ASCII letters or digits, got {0:?}")]
  InvalidPrefix(String),

  // ── Configuration ───────────────────────────────────────────────────────
  #[error("invalid compliance policy: {0}")]
  InvalidPolicy(&'static str),

  // ── Assignments ─────────────────────────────────────────────────────────
  #[error("assignment window {window} lies outside contract range {contract}")]
  AssignmentOutOfRange {
    window:   DateRange,
    contract: DateRange,
  },

  #[error("worker {worker_number} is {status} and cannot be assigned")]
  WorkerNotActive {
    worker_number: String,
    status:        EmploymentStatus,
  },

  #[error("worker {worker_number} is already assigned to contract {contract_id} in that window")]
  WorkerAlreadyAssigned {
    worker_number: String,
    contract_id:   Uuid,
  },

  // ── Lookups ─────────────────────────────────────────────────────────────
  #[error("contract not found: {0}")]
  ContractNotFound(Uuid),

  #[error("client site not found: {0}")]
  SiteNotFound(Uuid),

  #[error("worker not found: {0}")]
  WorkerNotFound(String),

  #[error("assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("unknown {kind} value: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  // ── Infrastructure ──────────────────────────────────────────────────────
  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Whether the immediate caller may retry the same call without side
  /// effects.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::StaleState(_) | Self::SequencerUnavailable(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
