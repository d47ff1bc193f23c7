//! [`ContractEngine`]: the orchestration layer over a [`ContractStore`].
//!
//! Every mutating operation follows the same shape: read, validate with the
//! pure modules (`compliance`, `lifecycle`, `advisor`), then hand one
//! [`ContractWrite`] (row + audit entries + outbox event) to the store, which
//! commits it only if the row still has the version that was read. Attaching
//! a worker is guarded by the same version, and bumps it.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use crate::{
  Error, Result,
  advisor::{self, Candidate, Recommendation},
  assignment::{self, Assignment, NewAssignment},
  audit::{
    self, AuditAction, AuditEntry, EntityType, LIFECYCLE_FIELD, NewAuditEntry,
    SYSTEM_ACTOR,
  },
  clock::{Clock, SystemClock},
  compliance::{self, ComplianceReport, ComplianceWarning},
  config::{CompanyProfile, EngineConfig},
  contract::{
    ApprovalStatus, Contract, ContractPatch, DateRange, LifecycleStatus,
    NewContract,
  },
  lifecycle::{self, RenewalTerms, Transition},
  notify::NotificationEvent,
  number::{ContractNumber, YearMonth},
  sequencer::IdentifierSequencer,
  site::ClientSite,
  snapshot::ContractSnapshot,
  store::{
    AssignmentWrite, ContractQuery, ContractStore, ContractWrite, SpawnedContract,
    WriteOutcome,
  },
  worker::{EmploymentStatus, Worker},
};

// ─── Results ─────────────────────────────────────────────────────────────────

/// The outcome of a committed transition.
#[derive(Debug, Clone)]
pub struct TransitionResult {
  pub contract:  Contract,
  /// Non-blocking findings from the compliance re-check, if one ran.
  pub warnings:  Vec<ComplianceWarning>,
  /// The draft spawned by a renewal.
  pub successor: Option<Contract>,
}

/// Counts from one [`ContractEngine::run_scheduled`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub activated: usize,
  pub expired:   usize,
  /// Contracts left alone because of a compliance failure or a lost race.
  pub skipped:   usize,
}

/// The outcome of [`ContractEngine::recalculate_conflict_date`].
#[derive(Debug, Clone)]
pub struct ConflictDateChange {
  pub site:      ClientSite,
  /// Non-terminal contracts at the site whose end now exceeds the ceiling.
  pub violating: Vec<Contract>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct ContractEngine<S> {
  store:  S,
  config: EngineConfig,
  clock:  Arc<dyn Clock>,
}

impl<S: ContractStore> ContractEngine<S> {
  pub fn new(store: S, config: EngineConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { store, config, clock: Arc::new(SystemClock) })
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn sequencer(&self) -> IdentifierSequencer<'_, S> {
    IdentifierSequencer::new(&self.store, &self.config.contract_prefix)
  }

  // ── Lookups ───────────────────────────────────────────────────────────────

  pub async fn get_contract(&self, contract_id: Uuid) -> Result<Contract> {
    self
      .store
      .get_contract(contract_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ContractNotFound(contract_id))
  }

  /// Look a contract up by its `PREFIX-YYYYMM-NNNN` number.
  pub async fn find_by_number(&self, number: &str) -> Result<Option<Contract>> {
    let number: ContractNumber = number.parse()?;
    self
      .store
      .get_contract_by_number(number)
      .await
      .map_err(Error::store)
  }

  async fn site(&self, site_id: Uuid) -> Result<ClientSite> {
    self
      .store
      .get_client_site(site_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::SiteNotFound(site_id))
  }

  async fn worker(&self, worker_number: &str) -> Result<Worker> {
    self
      .store
      .get_worker(worker_number.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::WorkerNotFound(worker_number.to_owned()))
  }

  async fn live_assignments(&self, contract_id: Uuid) -> Result<Vec<Assignment>> {
    self
      .store
      .list_assignments(contract_id, false)
      .await
      .map_err(Error::store)
  }

  /// Run the compliance check for a candidate range at a stored site.
  pub async fn validate(
    &self,
    site_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<ComplianceReport> {
    let site = self.site(site_id).await?;
    compliance::validate(&site, start, end, &self.config.policy)
  }

  // ── Drafting ──────────────────────────────────────────────────────────────

  /// Create a contract in `draft`.
  ///
  /// A conflict-date violation does not prevent saving; it is returned in the
  /// report and will block approval until the dates are fixed.
  pub async fn create_contract(
    &self,
    input: NewContract,
    actor: &str,
  ) -> Result<(Contract, ComplianceReport)> {
    let site = self.site(input.site_id).await?;
    let range = DateRange::new(input.start, input.end)?;
    let report =
      compliance::validate(&site, range.start, range.end, &self.config.policy)?;

    let now = self.clock.now();
    let number = self.sequencer().next(YearMonth::of(self.clock.today())).await?;
    let approver = input
      .approver
      .map(|a| a.trim().to_owned())
      .filter(|a| !a.is_empty());

    let contract = Contract {
      contract_id: Uuid::new_v4(),
      contract_number: number,
      site_id: site.site_id,
      range,
      work_description: input.work_description,
      hourly_rate: input.hourly_rate,
      approval_status: ApprovalStatus::Pending,
      lifecycle_status: LifecycleStatus::Draft,
      approver,
      renewed_from: None,
      rejection_reason: None,
      version: 1,
      created_at: now,
      updated_at: now,
    };

    let mut entries = vec![NewAuditEntry::contract_created(&contract, actor)];
    if let Some(approver) = &contract.approver {
      entries.push(
        NewAuditEntry::new(
          EntityType::Contract,
          contract.contract_id,
          AuditAction::Updated,
          actor,
        )
        .field("approver", None, Some(approver.clone())),
      );
    }

    self
      .store
      .insert_contract(contract.clone(), entries)
      .await
      .map_err(Error::store)?;

    if let Some(v) = &report.violation {
      tracing::warn!(contract = %contract.contract_number, violation = ?v, "draft saved with compliance violation");
    }
    tracing::info!(contract = %contract.contract_number, site = %site.key, %actor, "contract drafted");

    Ok((contract, report))
  }

  /// Edit a draft's dates, description or rate. Field-level changes are
  /// audited one entry per field.
  pub async fn update_draft(
    &self,
    contract_id: Uuid,
    patch: ContractPatch,
    actor: &str,
  ) -> Result<(Contract, ComplianceReport)> {
    let contract = self.get_contract(contract_id).await?;
    if contract.lifecycle_status != LifecycleStatus::Draft {
      return Err(Error::NotEditable {
        contract_id,
        status: contract.lifecycle_status,
        action: "edit",
      });
    }

    let next = patch.apply_to(&contract)?;
    for a in self.live_assignments(contract_id).await? {
      if let Some(window) = a.sub_range {
        assignment::check_within(&window, &next.range)?;
      }
    }

    let site = self.site(contract.site_id).await?;
    let report = compliance::validate(
      &site,
      next.range.start,
      next.range.end,
      &self.config.policy,
    )?;

    let entries = audit::diff_contract(&contract, &next, actor);
    if entries.is_empty() {
      return Ok((contract, report));
    }

    let updated = self.write(contract.clone(), next, entries, None, None).await?;
    Ok((updated, report))
  }

  /// Set the approver. Only possible before approval.
  pub async fn assign_approver(
    &self,
    contract_id: Uuid,
    approver: &str,
    actor: &str,
  ) -> Result<Contract> {
    let contract = self.get_contract(contract_id).await?;
    if !matches!(
      contract.lifecycle_status,
      LifecycleStatus::Draft
        | LifecycleStatus::PendingReview
        | LifecycleStatus::PendingApproval
    ) {
      return Err(Error::NotEditable {
        contract_id,
        status: contract.lifecycle_status,
        action: "assign an approver to",
      });
    }
    let approver = approver.trim();
    if approver.is_empty() {
      return Err(Error::ApproverRequired(contract_id));
    }

    let mut next = contract.clone();
    next.approver = Some(approver.to_owned());
    let entries = audit::diff_contract(&contract, &next, actor);
    if entries.is_empty() {
      return Ok(contract);
    }
    self.write(contract, next, entries, None, None).await
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Re-read the contract and apply `transition` to it.
  pub async fn transition(
    &self,
    contract_id: Uuid,
    transition: Transition,
    actor: &str,
  ) -> Result<TransitionResult> {
    let contract = self.get_contract(contract_id).await?;
    self.apply(&contract, transition, actor).await
  }

  /// Apply `transition` to the caller's copy of `contract`.
  ///
  /// Commits only if the stored row still has `contract.version`; otherwise
  /// fails with [`Error::StaleState`] and nothing is written.
  pub async fn apply(
    &self,
    contract: &Contract,
    transition: Transition,
    actor: &str,
  ) -> Result<TransitionResult> {
    let today = self.clock.today();
    let now = self.clock.now();
    let step = lifecycle::plan(contract, &transition, today)?;

    let warnings = if step.needs_compliance {
      let site = self.site(contract.site_id).await?;
      compliance::validate(
        &site,
        contract.range.start,
        contract.range.end,
        &self.config.policy,
      )?
      .into_result()?
    } else {
      Vec::new()
    };

    let mut next = contract.clone();
    next.lifecycle_status = step.to;
    next.approval_status = step.approval_status;
    if step.rejection_reason.is_some() {
      next.rejection_reason = step.rejection_reason.clone();
    }

    let mut entries = vec![
      NewAuditEntry::new(
        EntityType::Contract,
        contract.contract_id,
        AuditAction::Transitioned,
        actor,
      )
      .field(
        LIFECYCLE_FIELD,
        Some(step.from.as_str().to_owned()),
        Some(step.to.as_str().to_owned()),
      )
      .with_reason(step.reason.clone()),
    ];
    if step.approval_status != contract.approval_status {
      entries.push(
        NewAuditEntry::new(
          EntityType::Contract,
          contract.contract_id,
          AuditAction::Updated,
          actor,
        )
        .field(
          "approval_status",
          Some(contract.approval_status.as_str().to_owned()),
          Some(step.approval_status.as_str().to_owned()),
        )
        .with_reason(step.reason.clone()),
      );
    }

    let spawned = match &transition {
      Transition::Renew(terms) => Some(self.successor(contract, terms, actor).await?),
      _ => None,
    };
    let successor = spawned.as_ref().map(|s| s.contract.clone());

    let event = NotificationEvent::new(
      step.event_name(),
      contract.contract_id,
      now,
      json!({
        "contract_number": contract.contract_number.to_string(),
        "from":            step.from,
        "to":              step.to,
        "actor":           actor,
        "reason":          step.reason,
        "successor_id":    successor.as_ref().map(|s| s.contract_id),
      }),
    );

    let updated = self
      .write(contract.clone(), next, entries, Some(event), spawned)
      .await?;

    tracing::info!(
      contract = %updated.contract_number,
      from = %step.from,
      to = %step.to,
      %actor,
      "contract transitioned"
    );

    Ok(TransitionResult { contract: updated, warnings, successor })
  }

  /// Build the draft that succeeds `parent` on renewal.
  async fn successor(
    &self,
    parent: &Contract,
    terms: &RenewalTerms,
    actor: &str,
  ) -> Result<SpawnedContract> {
    let range = terms.successor_range(&parent.range)?;
    let now = self.clock.now();
    let number = self.sequencer().next(YearMonth::of(self.clock.today())).await?;

    let contract = Contract {
      contract_id: Uuid::new_v4(),
      contract_number: number,
      site_id: parent.site_id,
      range,
      work_description: terms
        .work_description
        .clone()
        .unwrap_or_else(|| parent.work_description.clone()),
      hourly_rate: terms.hourly_rate.unwrap_or(parent.hourly_rate),
      approval_status: ApprovalStatus::Pending,
      lifecycle_status: LifecycleStatus::Draft,
      approver: parent.approver.clone(),
      renewed_from: Some(parent.contract_id),
      rejection_reason: None,
      version: 1,
      created_at: now,
      updated_at: now,
    };

    let reason = Some(format!("renewed from {}", parent.contract_number));
    let mut entries =
      vec![NewAuditEntry::contract_created(&contract, actor).with_reason(reason)];

    // Workers carry over for the whole successor range.
    let assignments: Vec<Assignment> = self
      .live_assignments(parent.contract_id)
      .await?
      .into_iter()
      .map(|a| Assignment {
        assignment_id: Uuid::new_v4(),
        contract_id:   contract.contract_id,
        worker_number: a.worker_number,
        rate_override: a.rate_override,
        sub_range:     None,
        assigned_at:   now,
        detached_at:   None,
      })
      .collect();
    for a in &assignments {
      entries.push(
        NewAuditEntry::new(
          EntityType::Assignment,
          a.assignment_id,
          AuditAction::Attached,
          actor,
        )
        .field("worker_number", None, Some(a.worker_number.clone())),
      );
    }

    Ok(SpawnedContract { contract, assignments, audit: entries })
  }

  async fn write(
    &self,
    read: Contract,
    next: Contract,
    audit: Vec<NewAuditEntry>,
    event: Option<NotificationEvent>,
    spawned: Option<SpawnedContract>,
  ) -> Result<Contract> {
    let mut next = next;
    next.updated_at = self.clock.now();
    let outcome = self
      .store
      .update_contract(ContractWrite {
        contract: next,
        expected_version: read.version,
        expected_status: read.lifecycle_status,
        audit,
        event,
        spawned,
      })
      .await
      .map_err(Error::store)?;

    match outcome {
      WriteOutcome::Applied(contract) => Ok(contract),
      WriteOutcome::Stale => {
        tracing::debug!(contract = %read.contract_number, version = read.version, "stale write rejected");
        Err(Error::StaleState(read.contract_id))
      }
    }
  }

  pub async fn submit(&self, contract_id: Uuid, actor: &str) -> Result<TransitionResult> {
    self.transition(contract_id, Transition::Submit, actor).await
  }

  pub async fn send_back(
    &self,
    contract_id: Uuid,
    reason: &str,
    actor: &str,
  ) -> Result<TransitionResult> {
    let reason = reason.to_owned();
    self
      .transition(contract_id, Transition::SendBack { reason }, actor)
      .await
  }

  /// Approve, then activate straight away if the start date has arrived.
  pub async fn approve(&self, contract_id: Uuid, actor: &str) -> Result<TransitionResult> {
    let approved = self
      .transition(contract_id, Transition::Approve, actor)
      .await?;
    if approved.contract.range.start > self.clock.today() {
      return Ok(approved);
    }

    match self.apply(&approved.contract, Transition::Activate, actor).await {
      Ok(mut active) => {
        active.warnings = approved.warnings;
        Ok(active)
      }
      Err(e) => {
        tracing::warn!(contract = %approved.contract.contract_number, error = %e, "immediate activation deferred to the scheduler");
        Ok(approved)
      }
    }
  }

  pub async fn reject(
    &self,
    contract_id: Uuid,
    reason: &str,
    actor: &str,
  ) -> Result<TransitionResult> {
    let reason = reason.to_owned();
    self
      .transition(contract_id, Transition::Reject { reason }, actor)
      .await
  }

  pub async fn activate(&self, contract_id: Uuid, actor: &str) -> Result<TransitionResult> {
    self.transition(contract_id, Transition::Activate, actor).await
  }

  pub async fn expire(&self, contract_id: Uuid, actor: &str) -> Result<TransitionResult> {
    self.transition(contract_id, Transition::Expire, actor).await
  }

  pub async fn renew(
    &self,
    contract_id: Uuid,
    terms: RenewalTerms,
    actor: &str,
  ) -> Result<TransitionResult> {
    self
      .transition(contract_id, Transition::Renew(terms), actor)
      .await
  }

  pub async fn cancel(
    &self,
    contract_id: Uuid,
    reason: &str,
    actor: &str,
  ) -> Result<TransitionResult> {
    let reason = reason.to_owned();
    self
      .transition(contract_id, Transition::Cancel { reason }, actor)
      .await
  }

  // ── System-driven transitions ─────────────────────────────────────────────

  /// Activate approved contracts whose start date has arrived and expire
  /// active contracts whose end date has passed.
  pub async fn run_scheduled(&self) -> Result<SweepReport> {
    let today = self.clock.today();
    let mut report = SweepReport::default();

    let due_to_start = ContractQuery {
      statuses: vec![LifecycleStatus::Approved],
      starts_by: Some(today),
      ..Default::default()
    };
    let due_to_end = ContractQuery {
      statuses: vec![LifecycleStatus::Active],
      ends_before: Some(today),
      ..Default::default()
    };

    for (query, transition) in [
      (due_to_start, Transition::Activate),
      (due_to_end, Transition::Expire),
    ] {
      let contracts =
        self.store.list_contracts(&query).await.map_err(Error::store)?;
      for contract in contracts {
        match self.apply(&contract, transition.clone(), SYSTEM_ACTOR).await {
          Ok(_) if transition == Transition::Activate => report.activated += 1,
          Ok(_) => report.expired += 1,
          Err(e @ (Error::ConflictDateExceeded { .. } | Error::StaleState(_))) => {
            tracing::warn!(contract = %contract.contract_number, error = %e, "scheduled transition skipped");
            report.skipped += 1;
          }
          Err(e) => return Err(e),
        }
      }
    }

    if report != SweepReport::default() {
      tracing::info!(
        activated = report.activated,
        expired = report.expired,
        skipped = report.skipped,
        "scheduled sweep finished"
      );
    }
    Ok(report)
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  /// Attach a worker to a contract, optionally for a sub-range of it.
  ///
  /// Fails with [`Error::StaleState`] if the contract or its assignments
  /// changed after they were read.
  pub async fn attach_worker(
    &self,
    contract_id: Uuid,
    input: NewAssignment,
    actor: &str,
  ) -> Result<Assignment> {
    let contract = self.get_contract(contract_id).await?;
    if contract.lifecycle_status.is_terminal() {
      return Err(Error::NotEditable {
        contract_id,
        status: contract.lifecycle_status,
        action: "attach a worker to",
      });
    }

    let worker = self.worker(&input.worker_number).await?;
    if worker.employment_status != EmploymentStatus::Active {
      return Err(Error::WorkerNotActive {
        worker_number: worker.worker_number,
        status:        worker.employment_status,
      });
    }

    if let Some(window) = &input.sub_range {
      assignment::check_within(window, &contract.range)?;
    }
    let window = input.sub_range.unwrap_or(contract.range);

    let clash = self
      .live_assignments(contract_id)
      .await?
      .iter()
      .any(|a| {
        a.worker_number == worker.worker_number
          && a.effective_window(&contract.range).overlaps(&window)
      });
    if clash {
      return Err(Error::WorkerAlreadyAssigned {
        worker_number: worker.worker_number,
        contract_id,
      });
    }

    let assignment = Assignment {
      assignment_id: Uuid::new_v4(),
      contract_id,
      worker_number: worker.worker_number.clone(),
      rate_override: input.rate_override,
      sub_range: input.sub_range,
      assigned_at: self.clock.now(),
      detached_at: None,
    };
    let entry = NewAuditEntry::new(
      EntityType::Assignment,
      assignment.assignment_id,
      AuditAction::Attached,
      actor,
    )
    .field("worker_number", None, Some(worker.worker_number.clone()))
    .with_reason(Some(format!("contract {}", contract.contract_number)));

    let outcome = self
      .store
      .insert_assignment(AssignmentWrite {
        assignment,
        expected_version: contract.version,
        expected_status: contract.lifecycle_status,
        audit: entry,
      })
      .await
      .map_err(Error::store)?;

    match outcome {
      WriteOutcome::Applied(assignment) => {
        tracing::info!(contract = %contract.contract_number, worker = %worker.worker_number, "worker attached");
        Ok(assignment)
      }
      WriteOutcome::Stale => {
        tracing::debug!(contract = %contract.contract_number, version = contract.version, "stale attach rejected");
        Err(Error::StaleState(contract_id))
      }
    }
  }

  /// Soft-detach an assignment. Detaching twice is a no-op.
  pub async fn detach_worker(
    &self,
    assignment_id: Uuid,
    reason: Option<String>,
    actor: &str,
  ) -> Result<Assignment> {
    let current = self
      .store
      .get_assignment(assignment_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::AssignmentNotFound(assignment_id))?;
    if !current.is_live() {
      return Ok(current);
    }

    let at = self.clock.now();
    let entry = NewAuditEntry::new(
      EntityType::Assignment,
      assignment_id,
      AuditAction::Detached,
      actor,
    )
    .field("detached_at", None, Some(at.to_rfc3339()))
    .with_reason(reason);

    match self
      .store
      .detach_assignment(assignment_id, at, entry)
      .await
      .map_err(Error::store)?
    {
      WriteOutcome::Applied(a) => Ok(a),
      WriteOutcome::Stale => Err(Error::StaleState(assignment_id)),
    }
  }

  /// Advise whether to attach `worker_number` to an existing contract at
  /// `site_id` or to draft a new one. Read-only.
  pub async fn recommend(
    &self,
    worker_number: &str,
    site_id: Uuid,
    desired_start: NaiveDate,
    desired_end: NaiveDate,
  ) -> Result<Recommendation> {
    let desired = DateRange::new(desired_start, desired_end)?;
    let worker = self.worker(worker_number).await?;
    let site = self.site(site_id).await?;

    let query = ContractQuery {
      site_id: Some(site_id),
      statuses: vec![LifecycleStatus::Approved, LifecycleStatus::Active],
      near: Some(desired),
      ..Default::default()
    };
    let contracts = self.store.list_contracts(&query).await.map_err(Error::store)?;

    let mut candidates = Vec::with_capacity(contracts.len());
    for contract in contracts {
      let assignments = self.live_assignments(contract.contract_id).await?;
      candidates.push(Candidate { contract, assignments });
    }

    advisor::recommend(
      &worker,
      &site,
      desired.start,
      desired.end,
      &candidates,
      &self.config.policy,
    )
  }

  // ── Client sites ──────────────────────────────────────────────────────────

  /// Record a recalculated conflict date for a site and report the contracts
  /// it now puts out of compliance.
  pub async fn recalculate_conflict_date(
    &self,
    site_id: Uuid,
    conflict_date: Option<NaiveDate>,
    reason: Option<String>,
    actor: &str,
  ) -> Result<ConflictDateChange> {
    let site = self.site(site_id).await?;
    let site = if site.conflict_date == conflict_date {
      site
    } else {
      let entry = NewAuditEntry::new(
        EntityType::ClientSite,
        site_id,
        AuditAction::Updated,
        actor,
      )
      .field(
        "conflict_date",
        site.conflict_date.map(|d| d.to_string()),
        conflict_date.map(|d| d.to_string()),
      )
      .with_reason(reason);
      self
        .store
        .update_conflict_date(site_id, conflict_date, self.clock.now(), entry)
        .await
        .map_err(Error::store)?
        .ok_or(Error::SiteNotFound(site_id))?
    };

    let violating = match site.conflict_date {
      None => Vec::new(),
      Some(ceiling) => {
        let query = ContractQuery { site_id: Some(site_id), ..Default::default() };
        self
          .store
          .list_contracts(&query)
          .await
          .map_err(Error::store)?
          .into_iter()
          .filter(|c| !c.lifecycle_status.is_terminal() && c.range.end > ceiling)
          .collect()
      }
    };

    for c in &violating {
      tracing::warn!(contract = %c.contract_number, status = %c.lifecycle_status, end = %c.range.end, "contract exceeds recalculated conflict date");
    }
    Ok(ConflictDateChange { site, violating })
  }

  // ── Audit & documents ─────────────────────────────────────────────────────

  /// Append a standalone audit entry (e.g. for an externally performed
  /// action that should appear in the contract's history).
  pub async fn record_audit(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
    self
      .store
      .append_audit(entry, self.clock.now())
      .await
      .map_err(Error::store)
  }

  pub async fn history(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> Result<Vec<AuditEntry>> {
    self
      .store
      .history(entity_type, entity_id)
      .await
      .map_err(Error::store)
  }

  /// A read-only view for the document-generation collaborator.
  pub async fn snapshot(
    &self,
    contract_id: Uuid,
    company: &CompanyProfile,
  ) -> Result<ContractSnapshot> {
    let contract = self.get_contract(contract_id).await?;
    let site = self.site(contract.site_id).await?;
    let assignments = self.live_assignments(contract_id).await?;
    Ok(ContractSnapshot {
      contract,
      site,
      assignments,
      company: company.clone(),
      taken_at: self.clock.now(),
    })
  }
}
