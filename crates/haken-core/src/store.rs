//! The `ContractStore` trait and supporting query and write types.
//!
//! The trait is implemented by storage backends (e.g. `haken-store-sqlite`).
//! The engine and the outbox relay depend on this abstraction, not on any
//! concrete backend. A backend must provide three primitives the engine
//! cannot build on its own:
//!
//! - an atomic increment of a per-period counter ([`ContractStore::next_sequence`]),
//! - a conditional update guarded by the expected version
//!   ([`ContractStore::update_contract`], [`ContractStore::insert_assignment`]),
//! - append-only inserts of audit entries and outbox events, committed in the
//!   same transaction as the mutation they accompany.

use std::future::Future;

use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  assignment::Assignment,
  audit::{AuditEntry, EntityType, NewAuditEntry},
  contract::{Contract, DateRange, LifecycleStatus},
  notify::{NotificationEvent, OutboxEntry},
  number::{ContractNumber, YearMonth},
  site::{ClientSite, NewClientSite, SiteKey},
  worker::Worker,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ContractStore::list_contracts`]. Unset fields do not
/// filter.
#[derive(Debug, Clone, Default)]
pub struct ContractQuery {
  pub site_id:     Option<Uuid>,
  /// Restrict to these lifecycle statuses; empty means any.
  pub statuses:    Vec<LifecycleStatus>,
  /// Contracts whose range overlaps or abuts this window.
  pub near:        Option<DateRange>,
  /// Contracts starting on or before this date.
  pub starts_by:   Option<NaiveDate>,
  /// Contracts ending strictly before this date.
  pub ends_before: Option<NaiveDate>,
  pub limit:       Option<usize>,
}

impl ContractQuery {
  /// Whether `contract` satisfies every filter. Backends may use this to
  /// post-filter; the SQLite backend pushes the same predicates into SQL.
  pub fn matches(&self, contract: &Contract) -> bool {
    self.site_id.is_none_or(|id| contract.site_id == id)
      && (self.statuses.is_empty()
        || self.statuses.contains(&contract.lifecycle_status))
      && self.near.is_none_or(|w| {
        contract.range.overlaps(&w) || contract.range.abuts(&w)
      })
      && self.starts_by.is_none_or(|d| contract.range.start <= d)
      && self.ends_before.is_none_or(|d| contract.range.end < d)
  }

  /// The `near` window widened by one day on each side, so that an overlap
  /// test against it also admits abutting ranges.
  pub fn near_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
    self.near.map(|w| {
      (
        w.start.checked_sub_days(Days::new(1)).unwrap_or(w.start),
        w.end.checked_add_days(Days::new(1)).unwrap_or(w.end),
      )
    })
  }
}

// ─── Write types ─────────────────────────────────────────────────────────────

/// A guarded write of one contract row plus everything that must commit with
/// it.
#[derive(Debug, Clone)]
pub struct ContractWrite {
  /// The new state of the row. `version` is set by the store.
  pub contract:         Contract,
  /// The version the caller read; the write fails as stale otherwise.
  pub expected_version: i64,
  /// The status the caller read; checked alongside the version.
  pub expected_status:  LifecycleStatus,
  pub audit:            Vec<NewAuditEntry>,
  /// Outbox event enqueued with the write.
  pub event:            Option<NotificationEvent>,
  /// A successor contract inserted in the same transaction (renewals).
  pub spawned:          Option<SpawnedContract>,
}

/// A contract created as a side effect of another write.
#[derive(Debug, Clone)]
pub struct SpawnedContract {
  pub contract:    Contract,
  pub assignments: Vec<Assignment>,
  pub audit:       Vec<NewAuditEntry>,
}

/// A new assignment, guarded by the version of its contract.
///
/// The contract's version covers its assignment set: the store bumps it when
/// the assignment is inserted, so a concurrent edit of the contract or a
/// concurrent attach made from the same read fails as stale.
#[derive(Debug, Clone)]
pub struct AssignmentWrite {
  pub assignment:       Assignment,
  pub expected_version: i64,
  pub expected_status:  LifecycleStatus,
  pub audit:            NewAuditEntry,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
  Applied(T),
  /// The expected version or status no longer matched; nothing was written.
  Stale,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a contract store backend.
///
/// Contracts are never deleted. Audit entries and outbox events are only ever
/// inserted, always in the same transaction as the mutation they describe.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait ContractStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Client sites & workers ──────────────────────────────────────────────

  /// Insert or update a site by its business key. Returns the stored row.
  fn put_client_site(
    &self,
    site: NewClientSite,
  ) -> impl Future<Output = Result<ClientSite, Self::Error>> + Send + '_;

  fn get_client_site(
    &self,
    site_id: Uuid,
  ) -> impl Future<Output = Result<Option<ClientSite>, Self::Error>> + Send + '_;

  fn find_client_site(
    &self,
    key: SiteKey,
  ) -> impl Future<Output = Result<Option<ClientSite>, Self::Error>> + Send + '_;

  /// Replace a site's conflict date, recording `audit` atomically at
  /// `updated_at`. Returns `None` if the site does not exist.
  fn update_conflict_date(
    &self,
    site_id: Uuid,
    conflict_date: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
    audit: NewAuditEntry,
  ) -> impl Future<Output = Result<Option<ClientSite>, Self::Error>> + Send + '_;

  /// Insert or replace a worker by `worker_number`.
  fn put_worker(
    &self,
    worker: Worker,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_worker(
    &self,
    worker_number: String,
  ) -> impl Future<Output = Result<Option<Worker>, Self::Error>> + Send + '_;

  // ── Identifier sequence ─────────────────────────────────────────────────

  /// Atomically increment and return the counter for `period`, starting at 1.
  /// Must be a single indivisible operation; concurrent callers never observe
  /// the same value.
  fn next_sequence(
    &self,
    period: YearMonth,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  // ── Contracts ───────────────────────────────────────────────────────────

  /// Insert a new contract row together with its creation audit entries,
  /// recorded at the contract's `created_at`.
  fn insert_contract(
    &self,
    contract: Contract,
    audit: Vec<NewAuditEntry>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_contract(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  fn get_contract_by_number(
    &self,
    number: ContractNumber,
  ) -> impl Future<Output = Result<Option<Contract>, Self::Error>> + Send + '_;

  fn list_contracts<'a>(
    &'a self,
    query: &'a ContractQuery,
  ) -> impl Future<Output = Result<Vec<Contract>, Self::Error>> + Send + 'a;

  /// Conditionally write a contract row. The write, its audit entries, its
  /// outbox event and any spawned contract commit together or not at all.
  /// Audit entries are recorded at the new row's `updated_at`.
  fn update_contract(
    &self,
    write: ContractWrite,
  ) -> impl Future<Output = Result<WriteOutcome<Contract>, Self::Error>> + Send + '_;

  // ── Assignments ─────────────────────────────────────────────────────────

  /// Insert an assignment if its contract still has the expected version and
  /// status, bumping the contract's version. Audit timestamps are the
  /// assignment's `assigned_at`.
  fn insert_assignment(
    &self,
    write: AssignmentWrite,
  ) -> impl Future<Output = Result<WriteOutcome<Assignment>, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    assignment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  fn list_assignments(
    &self,
    contract_id: Uuid,
    include_detached: bool,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// Live assignments of one worker across all contracts.
  fn list_worker_assignments(
    &self,
    worker_number: String,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// Soft-detach a live assignment and bump its contract's version. Returns
  /// `Stale` if it was already detached.
  fn detach_assignment(
    &self,
    assignment_id: Uuid,
    detached_at: DateTime<Utc>,
    audit: NewAuditEntry,
  ) -> impl Future<Output = Result<WriteOutcome<Assignment>, Self::Error>> + Send + '_;

  // ── Audit trail ─────────────────────────────────────────────────────────

  /// Append a standalone entry.
  fn append_audit(
    &self,
    entry: NewAuditEntry,
    recorded_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;

  /// All entries for one entity, oldest first.
  fn history(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;

  // ── Notification outbox ─────────────────────────────────────────────────

  /// Pending entries whose `next_attempt_at` is at or before `now`, oldest
  /// first.
  fn due_notifications(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_;

  /// Every outbox entry ever enqueued for a contract, oldest first.
  fn contract_notifications(
    &self,
    contract_id: Uuid,
  ) -> impl Future<Output = Result<Vec<OutboxEntry>, Self::Error>> + Send + '_;

  fn mark_delivered(
    &self,
    event_id: Uuid,
    delivered_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn schedule_retry(
    &self,
    event_id: Uuid,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
    error: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn dead_letter(
    &self,
    event_id: Uuid,
    attempts: u32,
    error: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
