//! Integration tests for `SqliteStore` and the engine against an in-memory
//! database.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicU32, Ordering},
};

use chrono::{Duration, NaiveDate};
use haken_core::{
  ContractEngine, Error as CoreError, SweepReport,
  advisor::{Action, AdvisoryReason},
  assignment::NewAssignment,
  audit::{self, AuditAction, EntityType},
  clock::{Clock, FixedClock},
  compliance::{ComplianceWarning, Severity},
  config::{CompanyProfile, EngineConfig},
  contract::{ApprovalStatus, ContractPatch, DateRange, LifecycleStatus, NewContract},
  lifecycle::{RenewalTerms, Transition},
  notify::{BackoffPolicy, DeliveryState, NotificationEvent, NotificationSink, OutboxRelay},
  number::YearMonth,
  site::{ClientSite, NewClientSite, SiteKey},
  store::{ContractQuery, ContractStore},
  worker::{EmploymentStatus, Worker},
};
use uuid::Uuid;

use crate::SqliteStore;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn key(line: &str) -> SiteKey {
  SiteKey {
    company_name:    "Tanaka Seiki".into(),
    plant_name:      "Kobe Plant".into(),
    department:      "Assembly".into(),
    production_line: line.into(),
  }
}

async fn site(s: &SqliteStore, conflict_date: Option<NaiveDate>) -> ClientSite {
  s.put_client_site(NewClientSite {
    key: key("Line 1"),
    conflict_date,
    base_hourly_rate: 1600,
  })
  .await
  .unwrap()
}

async fn worker(s: &SqliteStore, number: &str, status: EmploymentStatus) {
  s.put_worker(Worker {
    worker_number:     number.into(),
    name:              format!("Worker {number}"),
    base_hourly_rate:  1600,
    employment_status: status,
  })
  .await
  .unwrap();
}

fn engine(s: &SqliteStore, today: NaiveDate) -> ContractEngine<SqliteStore> {
  ContractEngine::new(s.clone(), EngineConfig::new("KOB").unwrap())
    .unwrap()
    .with_clock(FixedClock::on(today))
}

fn draft(site_id: Uuid, start: NaiveDate, end: NaiveDate) -> NewContract {
  NewContract {
    site_id,
    start,
    end,
    work_description: "Press line assembly".into(),
    hourly_rate: 1700,
    approver: Some("Sato".into()),
  }
}

// ─── Sites & workers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn client_site_upserts_by_business_key() {
  let s = store().await;
  let first = site(&s, None).await;

  let second = s
    .put_client_site(NewClientSite {
      key:              key("Line 1"),
      conflict_date:    Some(d(2026, 3, 31)),
      base_hourly_rate: 1750,
    })
    .await
    .unwrap();
  assert_eq!(second.site_id, first.site_id);
  assert_eq!(second.base_hourly_rate, 1750);

  let found = s.find_client_site(key("Line 1")).await.unwrap().unwrap();
  assert_eq!(found.conflict_date, Some(d(2026, 3, 31)));
  assert!(s.find_client_site(key("Line 2")).await.unwrap().is_none());
}

#[tokio::test]
async fn get_missing_rows_returns_none() {
  let s = store().await;
  assert!(s.get_client_site(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.get_contract(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.get_worker("W-404".into()).await.unwrap().is_none());
}

// ─── Identifier sequence ─────────────────────────────────────────────────────

#[tokio::test]
async fn sequence_is_per_period() {
  let s = store().await;
  let dec = YearMonth::new(2025, 12).unwrap();
  let jan = YearMonth::new(2026, 1).unwrap();

  assert_eq!(s.next_sequence(dec).await.unwrap(), 1);
  assert_eq!(s.next_sequence(dec).await.unwrap(), 2);
  assert_eq!(s.next_sequence(jan).await.unwrap(), 1);
  assert_eq!(s.next_sequence(dec).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sequence_allocation_never_repeats() {
  let s = store().await;
  let period = YearMonth::new(2025, 12).unwrap();

  let handles: Vec<_> = (0..32)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move { s.next_sequence(period).await.unwrap() })
    })
    .collect();

  let mut values = Vec::new();
  for h in handles {
    values.push(h.await.unwrap());
  }
  values.sort_unstable();
  assert_eq!(values, (1..=32).collect::<Vec<u32>>());
}

#[tokio::test]
async fn numbers_are_sequential_within_period() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2025, 12, 10));

  let (first, _) = engine
    .create_contract(draft(site.site_id, d(2026, 1, 1), d(2026, 3, 31)), "ito")
    .await
    .unwrap();
  let (second, _) = engine
    .create_contract(draft(site.site_id, d(2026, 4, 1), d(2026, 6, 30)), "ito")
    .await
    .unwrap();

  assert_eq!(first.contract_number.to_string(), "KOB-202512-0001");
  assert_eq!(second.contract_number.to_string(), "KOB-202512-0002");

  let found = engine.find_by_number("KOB-202512-0002").await.unwrap().unwrap();
  assert_eq!(found.contract_id, second.contract_id);
  assert!(engine.find_by_number("KOB-202512-0003").await.unwrap().is_none());
}

// ─── Compliance ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn approaching_conflict_date_warns_but_saves() {
  let s = store().await;
  let site = site(&s, Some(d(2025, 12, 31))).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, report) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 11, 15)), "ito")
    .await
    .unwrap();

  assert!(report.is_ok());
  assert_eq!(report.warnings, vec![ComplianceWarning::ApproachingConflictDate {
    conflict_date:  d(2025, 12, 31),
    days_remaining: 46,
    severity:       Severity::Notice,
  }]);
  assert_eq!(contract.lifecycle_status, LifecycleStatus::Draft);
}

#[tokio::test]
async fn conflict_date_violation_saves_draft_but_blocks_approval() {
  let s = store().await;
  let site = site(&s, Some(d(2025, 12, 31))).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, report) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2026, 1, 15)), "ito")
    .await
    .unwrap();
  assert!(!report.is_ok());
  assert_eq!(contract.lifecycle_status, LifecycleStatus::Draft);

  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();

  let err = engine.approve(id, "sato").await.unwrap_err();
  assert!(matches!(err, CoreError::ConflictDateExceeded { .. }));
  let stored = engine.get_contract(id).await.unwrap();
  assert_eq!(stored.lifecycle_status, LifecycleStatus::PendingApproval);
  assert_eq!(stored.approval_status, ApprovalStatus::Pending);

  // Fix the dates and go round again.
  engine
    .reject(id, "end date exceeds conflict date", "sato")
    .await
    .unwrap();
  let (fixed, report) = engine
    .update_draft(
      id,
      ContractPatch { end: Some(d(2025, 12, 31)), ..Default::default() },
      "ito",
    )
    .await
    .unwrap();
  assert!(report.is_ok());
  assert_eq!(fixed.range.end, d(2025, 12, 31));

  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();
  let approved = engine.approve(id, "sato").await.unwrap();
  assert_eq!(approved.contract.lifecycle_status, LifecycleStatus::Approved);
  assert_eq!(
    approved.contract.rejection_reason.as_deref(),
    Some("end date exceeds conflict date")
  );
}

#[tokio::test]
async fn recalculated_conflict_date_reports_violations() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 6, 30)), "ito")
    .await
    .unwrap();

  let change = engine
    .recalculate_conflict_date(
      site.site_id,
      Some(d(2025, 3, 31)),
      Some("client headcount change".into()),
      "admin",
    )
    .await
    .unwrap();
  assert_eq!(change.site.conflict_date, Some(d(2025, 3, 31)));
  assert_eq!(change.violating.len(), 1);
  assert_eq!(change.violating[0].contract_id, contract.contract_id);

  let history = engine
    .history(EntityType::ClientSite, site.site_id)
    .await
    .unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].field_name.as_deref(), Some("conflict_date"));
  assert_eq!(history[0].old_value, None);
  assert_eq!(history[0].new_value.as_deref(), Some("2025-03-31"));
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn approval_on_start_date_activates_immediately() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2025, 1, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();

  let result = engine.approve(id, "sato").await.unwrap();
  assert_eq!(result.contract.lifecycle_status, LifecycleStatus::Active);
  assert_eq!(result.contract.approval_status, ApprovalStatus::Approved);

  let events: Vec<String> = s
    .contract_notifications(id)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.event.event_name)
    .collect();
  assert_eq!(events, [
    "contract.pending_review",
    "contract.pending_approval",
    "contract.approved",
    "contract.active",
  ]);
}

#[tokio::test]
async fn invalid_transition_writes_nothing() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2025, 1, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  let before = engine.history(EntityType::Contract, id).await.unwrap().len();

  let err = engine.activate(id, "ito").await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition {
    from: LifecycleStatus::Draft,
    ..
  }));
  let err = engine.cancel(id, "   ", "ito").await.unwrap_err();
  assert!(matches!(err, CoreError::ReasonRequired(_)));

  assert_eq!(engine.history(EntityType::Contract, id).await.unwrap().len(), before);
  assert!(s.contract_notifications(id).await.unwrap().is_empty());
  let stored = engine.get_contract(id).await.unwrap();
  assert_eq!(stored.version, contract.version);
}

#[tokio::test]
async fn concurrent_approvals_from_same_version_one_wins() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();

  let snapshot = engine.get_contract(id).await.unwrap();
  let (a, b) = tokio::join!(
    engine.apply(&snapshot, Transition::Approve, "sato"),
    engine.apply(&snapshot, Transition::Approve, "suzuki"),
  );

  let (ok, err) = match (a, b) {
    (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
    other => panic!("expected exactly one winner, got {other:?}"),
  };
  assert_eq!(ok.contract.lifecycle_status, LifecycleStatus::Approved);
  assert_eq!(ok.contract.version, snapshot.version + 1);
  assert!(matches!(err, CoreError::StaleState(stale) if stale == id));
  assert!(err.is_retryable());

  let approvals = engine
    .history(EntityType::Contract, id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.new_value.as_deref() == Some("approved"))
    .filter(|e| e.field_name.as_deref() == Some(audit::LIFECYCLE_FIELD))
    .count();
  assert_eq!(approvals, 1);
}

#[tokio::test]
async fn outdated_snapshot_is_stale() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  engine.submit(contract.contract_id, "ito").await.unwrap();

  let err = engine
    .apply(&contract, Transition::Submit, "ito")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::StaleState(_)));
}

#[tokio::test]
async fn draft_edits_are_audited_per_field() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;

  let (updated, _) = engine
    .update_draft(
      id,
      ContractPatch { hourly_rate: Some(1800), ..Default::default() },
      "ito",
    )
    .await
    .unwrap();
  assert_eq!(updated.hourly_rate, 1800);
  assert_eq!(updated.version, contract.version + 1);

  let history = engine.history(EntityType::Contract, id).await.unwrap();
  let edit = history
    .iter()
    .find(|e| e.field_name.as_deref() == Some("hourly_rate"))
    .expect("hourly_rate entry");
  assert_eq!(edit.action, AuditAction::Updated);
  assert_eq!(edit.old_value.as_deref(), Some("1700"));
  assert_eq!(edit.new_value.as_deref(), Some("1800"));
  assert_eq!(edit.actor, "ito");

  engine.submit(id, "ito").await.unwrap();
  let err = engine
    .update_draft(
      id,
      ContractPatch { hourly_rate: Some(1900), ..Default::default() },
      "ito",
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::NotEditable { .. }));
}

#[tokio::test]
async fn approval_requires_an_approver() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let mut input = draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31));
  input.approver = None;
  let (contract, _) = engine.create_contract(input, "ito").await.unwrap();
  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();

  let err = engine.approve(id, "sato").await.unwrap_err();
  assert!(matches!(err, CoreError::ApproverRequired(_)));

  engine.assign_approver(id, "Sato", "kato").await.unwrap();
  let approved = engine.approve(id, "sato").await.unwrap();
  assert_eq!(approved.contract.approver.as_deref(), Some("Sato"));
}

#[tokio::test]
async fn audit_replay_matches_stored_status() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2025, 2, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 2, 1), d(2025, 4, 30)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  engine.send_back(id, "missing line details", "kato").await.unwrap();
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();
  engine.reject(id, "rate too high", "sato").await.unwrap();
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();
  engine.approve(id, "sato").await.unwrap();
  engine.cancel(id, "client withdrew", "sato").await.unwrap();

  let stored = engine.get_contract(id).await.unwrap();
  assert_eq!(stored.lifecycle_status, LifecycleStatus::Cancelled);

  let history = engine.history(EntityType::Contract, id).await.unwrap();
  assert_eq!(
    audit::replay_lifecycle(&history).unwrap(),
    Some(stored.lifecycle_status)
  );
  assert_eq!(audit::verify_chain(&history), None);
  assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));

  let cancel = history.last().unwrap();
  assert_eq!(cancel.reason.as_deref(), Some("client withdrew"));
  assert_eq!(cancel.action, AuditAction::Transitioned);
}

#[tokio::test]
async fn tampered_history_is_detected() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  engine.submit(contract.contract_id, "ito").await.unwrap();

  let mut history = engine
    .history(EntityType::Contract, contract.contract_id)
    .await
    .unwrap();
  history[0].actor = "mallory".into();
  assert_eq!(audit::verify_chain(&history), Some(history[0].entry_id));
}

#[tokio::test]
async fn standalone_audit_entries_chain_onto_history() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let stored = engine
    .record_audit(
      audit::NewAuditEntry::new(
        EntityType::Contract,
        contract.contract_id,
        AuditAction::Updated,
        "ito",
      )
      .field("document", None, Some("printed".into())),
    )
    .await
    .unwrap();

  let history = engine
    .history(EntityType::Contract, contract.contract_id)
    .await
    .unwrap();
  assert_eq!(history.last().unwrap().entry_id, stored.entry_id);
  assert_eq!(audit::verify_chain(&history), None);
}

// ─── Scheduled transitions ───────────────────────────────────────────────────

async fn approved(
  engine: &ContractEngine<SqliteStore>,
  site_id: Uuid,
  start: NaiveDate,
  end: NaiveDate,
) -> Uuid {
  let (contract, _) = engine
    .create_contract(draft(site_id, start, end), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  engine.submit(id, "kato").await.unwrap();
  engine.approve(id, "sato").await.unwrap();
  id
}

#[tokio::test]
async fn scheduled_sweep_activates_and_expires() {
  let s = store().await;
  let site = site(&s, None).await;
  let day_one = engine(&s, d(2025, 1, 1));

  let upcoming = approved(&day_one, site.site_id, d(2025, 2, 1), d(2025, 3, 31)).await;
  let running = approved(&day_one, site.site_id, d(2025, 1, 1), d(2025, 1, 31)).await;
  assert_eq!(
    day_one.get_contract(running).await.unwrap().lifecycle_status,
    LifecycleStatus::Active
  );

  let day_two = engine(&s, d(2025, 2, 1));
  let report = day_two.run_scheduled().await.unwrap();
  assert_eq!(report, SweepReport { activated: 1, expired: 1, skipped: 0 });

  let upcoming = day_two.get_contract(upcoming).await.unwrap();
  assert_eq!(upcoming.lifecycle_status, LifecycleStatus::Active);
  let running = day_two.get_contract(running).await.unwrap();
  assert_eq!(running.lifecycle_status, LifecycleStatus::Expired);

  let history = day_two
    .history(EntityType::Contract, running.contract_id)
    .await
    .unwrap();
  assert_eq!(history.last().unwrap().actor, audit::SYSTEM_ACTOR);

  assert_eq!(day_two.run_scheduled().await.unwrap(), SweepReport::default());
}

#[tokio::test]
async fn scheduled_activation_skips_noncompliant_contracts() {
  let s = store().await;
  let site = site(&s, None).await;
  let day_one = engine(&s, d(2025, 1, 1));

  let id = approved(&day_one, site.site_id, d(2025, 2, 1), d(2025, 3, 31)).await;
  day_one
    .recalculate_conflict_date(site.site_id, Some(d(2025, 2, 28)), None, "admin")
    .await
    .unwrap();

  let day_two = engine(&s, d(2025, 2, 1));
  let report = day_two.run_scheduled().await.unwrap();
  assert_eq!(report, SweepReport { activated: 0, expired: 0, skipped: 1 });
  assert_eq!(
    day_two.get_contract(id).await.unwrap().lifecycle_status,
    LifecycleStatus::Approved
  );
}

#[tokio::test]
async fn list_filters_agree_with_query_predicate() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2025, 1, 1));

  engine
    .create_contract(draft(site.site_id, d(2025, 2, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  engine
    .create_contract(draft(site.site_id, d(2025, 4, 1), d(2025, 4, 30)), "ito")
    .await
    .unwrap();
  approved(&engine, site.site_id, d(2025, 6, 1), d(2025, 6, 30)).await;

  let all = s.list_contracts(&ContractQuery::default()).await.unwrap();
  assert_eq!(all.len(), 3);

  let queries = [
    ContractQuery {
      near: Some(DateRange::new(d(2025, 3, 1), d(2025, 3, 31)).unwrap()),
      ..Default::default()
    },
    ContractQuery {
      statuses: vec![LifecycleStatus::Approved],
      ..Default::default()
    },
    ContractQuery {
      site_id: Some(site.site_id),
      starts_by: Some(d(2025, 4, 1)),
      ..Default::default()
    },
    ContractQuery {
      ends_before: Some(d(2025, 4, 1)),
      ..Default::default()
    },
  ];
  let expected_lens = [2, 1, 2, 1];

  for (query, len) in queries.iter().zip(expected_lens) {
    let listed = s.list_contracts(query).await.unwrap();
    let filtered: Vec<_> = all.iter().filter(|c| query.matches(c)).collect();
    assert_eq!(listed.len(), len, "{query:?}");
    assert_eq!(
      listed.iter().map(|c| c.contract_id).collect::<Vec<_>>(),
      filtered.iter().map(|c| c.contract_id).collect::<Vec<_>>(),
    );
  }
}

// ─── Renewal ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn renewal_spawns_linked_draft_with_workers() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2025, 6, 1));

  let parent = approved(&engine, site.site_id, d(2025, 1, 1), d(2025, 6, 30)).await;
  let placed = engine
    .attach_worker(
      parent,
      NewAssignment::new("W-001")
        .with_sub_range(DateRange::new(d(2025, 3, 1), d(2025, 6, 30)).unwrap()),
      "ito",
    )
    .await
    .unwrap();

  let result = engine
    .renew(parent, RenewalTerms { hourly_rate: Some(1750), ..Default::default() }, "sato")
    .await
    .unwrap();
  assert_eq!(result.contract.lifecycle_status, LifecycleStatus::Renewed);

  let successor = result.successor.expect("successor draft");
  assert_eq!(successor.lifecycle_status, LifecycleStatus::Draft);
  assert_eq!(successor.renewed_from, Some(parent));
  assert_eq!(successor.range.start, d(2025, 7, 1));
  assert_eq!(successor.range.len_days(), 181);
  assert_eq!(successor.hourly_rate, 1750);
  assert_eq!(successor.contract_number.to_string(), "KOB-202506-0002");

  let stored = engine.get_contract(successor.contract_id).await.unwrap();
  assert_eq!(stored.lifecycle_status, LifecycleStatus::Draft);

  let carried = s.list_assignments(successor.contract_id, false).await.unwrap();
  assert_eq!(carried.len(), 1);
  assert_eq!(carried[0].worker_number, "W-001");
  assert_eq!(carried[0].sub_range, None);
  assert_ne!(carried[0].assignment_id, placed.assignment_id);

  let err = engine.renew(parent, RenewalTerms::default(), "sato").await.unwrap_err();
  assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

// ─── Assignments & advisor ───────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_assignment_recommends_new_contract() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  worker(&s, "W-002", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2024, 12, 1));

  let c1 = approved(&engine, site.site_id, d(2025, 1, 1), d(2025, 12, 31)).await;
  engine
    .attach_worker(
      c1,
      NewAssignment::new("W-001")
        .with_sub_range(DateRange::new(d(2025, 3, 1), d(2025, 6, 1)).unwrap()),
      "ito",
    )
    .await
    .unwrap();

  let rec = engine
    .recommend("W-001", site.site_id, d(2025, 4, 1), d(2025, 5, 1))
    .await
    .unwrap();
  assert_eq!(rec.action, Action::CreateNew);
  assert!(rec.has_reason(|r| matches!(
    r,
    AdvisoryReason::OverlappingAssignmentExists { contract_id } if *contract_id == c1
  )));

  let rec = engine
    .recommend("W-002", site.site_id, d(2025, 4, 1), d(2025, 5, 1))
    .await
    .unwrap();
  assert_eq!(rec.action, Action::ExtendExisting);
  assert_eq!(rec.candidate_contract, Some(c1));
  assert!(rec.reasons.is_empty());
}

#[tokio::test]
async fn attach_enforces_worker_and_range_rules() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  worker(&s, "W-009", EmploymentStatus::Resigned).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;

  let err = engine
    .attach_worker(id, NewAssignment::new("W-009"), "ito")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::WorkerNotActive { .. }));

  let err = engine
    .attach_worker(id, NewAssignment::new("W-404"), "ito")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::WorkerNotFound(_)));

  let outside = DateRange::new(d(2025, 3, 1), d(2025, 4, 30)).unwrap();
  let err = engine
    .attach_worker(id, NewAssignment::new("W-001").with_sub_range(outside), "ito")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::AssignmentOutOfRange { .. }));

  engine
    .attach_worker(id, NewAssignment::new("W-001"), "ito")
    .await
    .unwrap();
  let err = engine
    .attach_worker(id, NewAssignment::new("W-001"), "ito")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::WorkerAlreadyAssigned { .. }));

  // Draft edits may not strand a sub-range outside the contract.
  let (second, _) = engine
    .create_contract(draft(site.site_id, d(2025, 4, 1), d(2025, 6, 30)), "ito")
    .await
    .unwrap();
  engine
    .attach_worker(
      second.contract_id,
      NewAssignment::new("W-001")
        .with_sub_range(DateRange::new(d(2025, 6, 1), d(2025, 6, 30)).unwrap()),
      "ito",
    )
    .await
    .unwrap();
  let err = engine
    .update_draft(
      second.contract_id,
      ContractPatch { end: Some(d(2025, 5, 31)), ..Default::default() },
      "ito",
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::AssignmentOutOfRange { .. }));
}

#[tokio::test]
async fn concurrent_attach_and_draft_edit_keep_sub_ranges_inside() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 12, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  let late = DateRange::new(d(2025, 11, 1), d(2025, 12, 31)).unwrap();

  let (attached, edited) = tokio::join!(
    engine.attach_worker(id, NewAssignment::new("W-001").with_sub_range(late), "ito"),
    engine.update_draft(
      id,
      ContractPatch { end: Some(d(2025, 6, 30)), ..Default::default() },
      "kato",
    ),
  );
  assert!(
    attached.is_ok() != edited.is_ok(),
    "exactly one write may win: {attached:?} / {edited:?}"
  );
  for err in [attached.err(), edited.err()].into_iter().flatten() {
    assert!(
      matches!(err, CoreError::StaleState(_) | CoreError::AssignmentOutOfRange { .. }),
      "{err:?}"
    );
  }

  let stored = engine.get_contract(id).await.unwrap();
  for a in s.list_assignments(id, false).await.unwrap() {
    let window = a.effective_window(&stored.range);
    assert!(stored.range.contains(&window), "{window} outside {}", stored.range);
  }
}

#[tokio::test]
async fn concurrent_attaches_book_a_worker_once() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;

  let (a, b) = tokio::join!(
    engine.attach_worker(id, NewAssignment::new("W-001"), "ito"),
    engine.attach_worker(id, NewAssignment::new("W-001"), "kato"),
  );
  let err = match (a, b) {
    (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
    other => panic!("expected exactly one attach, got {other:?}"),
  };
  assert!(
    matches!(err, CoreError::StaleState(_) | CoreError::WorkerAlreadyAssigned { .. }),
    "{err:?}"
  );
  assert_eq!(s.list_worker_assignments("W-001".into()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn assignment_changes_bump_contract_version() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;

  let placed = engine
    .attach_worker(id, NewAssignment::new("W-001"), "ito")
    .await
    .unwrap();
  let after_attach = engine.get_contract(id).await.unwrap();
  assert_eq!(after_attach.version, contract.version + 1);

  let err = engine
    .apply(&contract, Transition::Submit, "ito")
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::StaleState(_)));

  engine.detach_worker(placed.assignment_id, None, "ito").await.unwrap();
  assert_eq!(
    engine.get_contract(id).await.unwrap().version,
    after_attach.version + 1
  );
}

#[tokio::test]
async fn audit_times_come_from_the_engine_clock() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  let today = d(2024, 12, 1);
  let engine = engine(&s, today);
  let now = FixedClock::on(today).now();

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  engine.submit(id, "ito").await.unwrap();
  let placed = engine
    .attach_worker(id, NewAssignment::new("W-001"), "ito")
    .await
    .unwrap();
  engine.detach_worker(placed.assignment_id, None, "ito").await.unwrap();
  engine
    .record_audit(
      audit::NewAuditEntry::new(EntityType::Contract, id, AuditAction::Updated, "ito")
        .field("document", None, Some("printed".into())),
    )
    .await
    .unwrap();
  let change = engine
    .recalculate_conflict_date(site.site_id, Some(d(2026, 3, 31)), None, "admin")
    .await
    .unwrap();
  assert_eq!(change.site.updated_at, now);

  let mut entries = engine.history(EntityType::Contract, id).await.unwrap();
  entries.extend(
    engine
      .history(EntityType::Assignment, placed.assignment_id)
      .await
      .unwrap(),
  );
  entries.extend(engine.history(EntityType::ClientSite, site.site_id).await.unwrap());
  assert!(entries.len() >= 6);
  assert!(entries.iter().all(|e| e.recorded_at == now), "{entries:?}");
  assert_eq!(engine.get_contract(id).await.unwrap().updated_at, now);
}

#[tokio::test]
async fn detach_is_soft_and_idempotent() {
  let s = store().await;
  let site = site(&s, None).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  let placed = engine
    .attach_worker(id, NewAssignment::new("W-001"), "ito")
    .await
    .unwrap();
  assert_eq!(s.list_worker_assignments("W-001".into()).await.unwrap().len(), 1);

  let detached = engine
    .detach_worker(placed.assignment_id, Some("reassigned".into()), "ito")
    .await
    .unwrap();
  assert!(detached.detached_at.is_some());
  assert!(s.list_assignments(id, false).await.unwrap().is_empty());
  assert_eq!(s.list_assignments(id, true).await.unwrap().len(), 1);
  assert!(s.list_worker_assignments("W-001".into()).await.unwrap().is_empty());

  let again = engine
    .detach_worker(placed.assignment_id, None, "ito")
    .await
    .unwrap();
  assert_eq!(again.detached_at, detached.detached_at);

  let history = engine
    .history(EntityType::Assignment, placed.assignment_id)
    .await
    .unwrap();
  let actions: Vec<_> = history.iter().map(|e| e.action).collect();
  assert_eq!(actions, [AuditAction::Attached, AuditAction::Detached]);
  assert_eq!(history[1].reason.as_deref(), Some("reassigned"));
}

#[tokio::test]
async fn snapshot_carries_company_profile_and_live_workers() {
  let s = store().await;
  let site = site(&s, Some(d(2026, 3, 31))).await;
  worker(&s, "W-001", EmploymentStatus::Active).await;
  worker(&s, "W-002", EmploymentStatus::Active).await;
  let engine = engine(&s, d(2024, 12, 1));

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  let id = contract.contract_id;
  engine.attach_worker(id, NewAssignment::new("W-001"), "ito").await.unwrap();
  let gone = engine
    .attach_worker(id, NewAssignment::new("W-002"), "ito")
    .await
    .unwrap();
  engine.detach_worker(gone.assignment_id, None, "ito").await.unwrap();

  let company = CompanyProfile {
    name: "Haken Staffing KK".into(),
    license_number: "HA 28-300001".into(),
    ..Default::default()
  };
  let snap = engine.snapshot(id, &company).await.unwrap();
  assert_eq!(snap.company, company);
  assert_eq!(snap.site.conflict_date, Some(d(2026, 3, 31)));
  assert_eq!(snap.contract.contract_id, id);
  assert_eq!(snap.assignments.len(), 1);
  assert_eq!(snap.assignments[0].worker_number, "W-001");
  assert_eq!(snap.taken_at, FixedClock::on(d(2024, 12, 1)).now());
}

// ─── Outbox relay ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("sink down")]
struct SinkDown;

/// Fails the first `failures` deliveries, then records event names.
struct ScriptedSink {
  failures:  AtomicU32,
  delivered: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSink {
  fn new(failures: u32) -> (Self, Arc<Mutex<Vec<String>>>) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Self { failures: AtomicU32::new(failures), delivered: delivered.clone() };
    (sink, delivered)
  }
}

impl NotificationSink for ScriptedSink {
  type Error = SinkDown;

  async fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> Result<(), SinkDown> {
    let remaining = self.failures.load(Ordering::SeqCst);
    if remaining > 0 {
      self.failures.store(remaining - 1, Ordering::SeqCst);
      return Err(SinkDown);
    }
    self.delivered.lock().unwrap().push(event.event_name.clone());
    Ok(())
  }
}

fn backoff() -> BackoffPolicy {
  BackoffPolicy { initial_delay_secs: 10, max_delay_secs: 100, max_attempts: 3 }
}

#[tokio::test]
async fn relay_retries_with_backoff_then_delivers() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));
  let t0 = FixedClock::on(d(2024, 12, 1)).now();

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  engine.submit(contract.contract_id, "ito").await.unwrap();

  let (sink, delivered) = ScriptedSink::new(1);
  let relay = OutboxRelay::new(s.clone(), sink, backoff(), 10);

  let report = relay.drain_once(t0).await.unwrap();
  assert_eq!(report.retried, 1);
  let entry = &s.contract_notifications(contract.contract_id).await.unwrap()[0];
  assert_eq!(entry.state, DeliveryState::Pending);
  assert_eq!(entry.attempts, 1);
  assert_eq!(entry.next_attempt_at, t0 + Duration::seconds(10));
  assert_eq!(entry.last_error.as_deref(), Some("sink down"));

  // Not due yet.
  let report = relay.drain_once(t0 + Duration::seconds(5)).await.unwrap();
  assert_eq!(report.delivered + report.retried + report.dead_lettered, 0);

  let report = relay.drain_once(t0 + Duration::seconds(10)).await.unwrap();
  assert_eq!(report.delivered, 1);
  let entry = &s.contract_notifications(contract.contract_id).await.unwrap()[0];
  assert_eq!(entry.state, DeliveryState::Delivered);
  assert!(entry.delivered_at.is_some());
  assert_eq!(*delivered.lock().unwrap(), ["contract.pending_review"]);

  assert!(s.due_notifications(t0 + Duration::days(1), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn relay_dead_letters_after_max_attempts() {
  let s = store().await;
  let site = site(&s, None).await;
  let engine = engine(&s, d(2024, 12, 1));
  let t0 = FixedClock::on(d(2024, 12, 1)).now();

  let (contract, _) = engine
    .create_contract(draft(site.site_id, d(2025, 1, 1), d(2025, 3, 31)), "ito")
    .await
    .unwrap();
  engine.submit(contract.contract_id, "ito").await.unwrap();

  let (sink, delivered) = ScriptedSink::new(u32::MAX);
  let relay = OutboxRelay::new(s.clone(), sink, backoff(), 10);

  assert_eq!(relay.drain_once(t0).await.unwrap().retried, 1);
  assert_eq!(relay.drain_once(t0 + Duration::seconds(10)).await.unwrap().retried, 1);
  let report = relay.drain_once(t0 + Duration::seconds(30)).await.unwrap();
  assert_eq!(report.dead_lettered, 1);

  let entry = &s.contract_notifications(contract.contract_id).await.unwrap()[0];
  assert_eq!(entry.state, DeliveryState::DeadLettered);
  assert_eq!(entry.attempts, 3);
  assert!(delivered.lock().unwrap().is_empty());
  assert!(s.due_notifications(t0 + Duration::days(1), 10).await.unwrap().is_empty());
}
