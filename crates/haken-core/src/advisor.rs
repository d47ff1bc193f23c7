//! Placement advice: attach a worker to an existing contract, or draft a new
//! one.
//!
//! [`recommend`] is read-only. The caller still has to create the contract or
//! attach the worker explicitly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  assignment::Assignment,
  config::CompliancePolicy,
  contract::{Contract, DateRange},
  site::ClientSite,
  worker::{EmploymentStatus, Worker},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
  ExtendExisting,
  CreateNew,
}

/// Why the advisor chose its action, or what the caller should double-check.
/// None of these block a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum AdvisoryReason {
  /// The contract rate differs from the worker's base rate by more than the
  /// policy threshold.
  RateDeltaSignificant { rate_delta_pct: f64 },
  /// The worker is already placed at this site in an overlapping window.
  OverlappingAssignmentExists { contract_id: Uuid },
  /// Several live contracts could take the worker; none is picked.
  AmbiguousCandidates { contract_ids: Vec<Uuid> },
  /// The desired window runs past the candidate contract's end.
  ExtendsBeyondContractEnd { contract_end: NaiveDate },
  /// The worker already has a non-overlapping assignment on the candidate.
  WorkerAlreadyOnContract { contract_id: Uuid },
  WorkerNotActive { status: EmploymentStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
  pub action:             Action,
  pub candidate_contract: Option<Uuid>,
  /// `(contract rate − worker base rate) / worker base rate`.
  pub rate_delta_pct:     Option<f64>,
  pub reasons:            Vec<AdvisoryReason>,
}

impl Recommendation {
  fn create_new(reasons: Vec<AdvisoryReason>) -> Self {
    Self {
      action: Action::CreateNew,
      candidate_contract: None,
      rate_delta_pct: None,
      reasons,
    }
  }

  pub fn has_reason(&self, f: impl Fn(&AdvisoryReason) -> bool) -> bool {
    self.reasons.iter().any(f)
  }
}

/// A contract together with its assignments, as read from the store.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub contract:    Contract,
  pub assignments: Vec<Assignment>,
}

/// Whether `contract` can absorb a placement at `site_id` during `desired`.
pub fn is_candidate(contract: &Contract, site_id: Uuid, desired: &DateRange) -> bool {
  contract.site_id == site_id
    && contract.lifecycle_status.is_placeable()
    && (contract.range.overlaps(desired) || contract.range.abuts(desired))
}

/// Windows during which `worker_number` is currently placed on `candidate`.
fn placed_windows<'a>(
  candidate: &'a Candidate,
  worker_number: &'a str,
) -> impl Iterator<Item = DateRange> + 'a {
  candidate
    .assignments
    .iter()
    .filter(move |a| a.is_live() && a.worker_number == worker_number)
    .map(move |a| a.effective_window(&candidate.contract.range))
}

/// Recommend extending an existing contract or creating a new one.
pub fn recommend(
  worker: &Worker,
  site: &ClientSite,
  desired_start: NaiveDate,
  desired_end: NaiveDate,
  candidates: &[Candidate],
  policy: &CompliancePolicy,
) -> Result<Recommendation> {
  let desired = DateRange::new(desired_start, desired_end)?;

  let mut notes = Vec::new();
  if worker.employment_status != EmploymentStatus::Active {
    notes.push(AdvisoryReason::WorkerNotActive {
      status: worker.employment_status,
    });
  }

  let live: Vec<&Candidate> = candidates
    .iter()
    .filter(|c| is_candidate(&c.contract, site.site_id, &desired))
    .collect();

  if live.is_empty() {
    return Ok(Recommendation::create_new(notes));
  }

  let number = worker.worker_number.as_str();
  if let Some(clash) = live
    .iter()
    .find(|c| placed_windows(c, number).any(|w| w.overlaps(&desired)))
  {
    notes.insert(0, AdvisoryReason::OverlappingAssignmentExists {
      contract_id: clash.contract.contract_id,
    });
    return Ok(Recommendation::create_new(notes));
  }

  if live.len() > 1 {
    notes.insert(0, AdvisoryReason::AmbiguousCandidates {
      contract_ids: live.iter().map(|c| c.contract.contract_id).collect(),
    });
    return Ok(Recommendation::create_new(notes));
  }

  let only = live[0];
  let contract = &only.contract;
  let mut reasons = Vec::new();

  let rate_delta_pct = (worker.base_hourly_rate > 0).then(|| {
    (f64::from(contract.hourly_rate) - f64::from(worker.base_hourly_rate))
      / f64::from(worker.base_hourly_rate)
  });
  if let Some(delta) = rate_delta_pct
    && delta.abs() > policy.rate_delta_threshold
  {
    reasons.push(AdvisoryReason::RateDeltaSignificant {
      rate_delta_pct: delta,
    });
  }
  if placed_windows(only, number).next().is_some() {
    reasons.push(AdvisoryReason::WorkerAlreadyOnContract {
      contract_id: contract.contract_id,
    });
  }
  if desired.end > contract.range.end {
    reasons.push(AdvisoryReason::ExtendsBeyondContractEnd {
      contract_end: contract.range.end,
    });
  }
  reasons.extend(notes);

  Ok(Recommendation {
    action: Action::ExtendExisting,
    candidate_contract: Some(contract.contract_id),
    rate_delta_pct,
    reasons,
  })
}
