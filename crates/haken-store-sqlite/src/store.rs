//! [`SqliteStore`], the SQLite implementation of [`ContractStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use haken_core::{
  assignment::Assignment,
  audit::{AuditEntry, EntityType, NewAuditEntry, chain_hash},
  contract::Contract,
  notify::{DeliveryState, NotificationEvent, OutboxEntry},
  number::{ContractNumber, YearMonth},
  site::{ClientSite, NewClientSite, SiteKey},
  store::{AssignmentWrite, ContractQuery, ContractStore, ContractWrite, WriteOutcome},
  worker::Worker,
};

use crate::{
  Error, Result,
  encode::{
    ASSIGNMENT_COLUMNS, AUDIT_COLUMNS, CONTRACT_COLUMNS, OUTBOX_COLUMNS,
    RawAssignment, RawAuditEntry, RawContract, RawOutboxEntry, RawSite,
    RawWorker, SITE_COLUMNS, WORKER_COLUMNS, assignment_params, contract_params,
    encode_date, encode_dt, encode_uuid, now, truncate_micros,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Haken contract store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row writers (run inside `call` closures) ────────────────────────────────

/// Append one audit entry, chaining its hash to the entity's previous entry.
/// `recorded_at` is hashed at the precision it is stored with.
fn insert_audit(
  conn: &rusqlite::Connection,
  entry: NewAuditEntry,
  recorded_at: DateTime<Utc>,
) -> rusqlite::Result<AuditEntry> {
  let recorded_at = truncate_micros(recorded_at);
  let entity_id = encode_uuid(entry.entity_id);
  let previous: Option<String> = conn
    .query_row(
      "SELECT hash FROM audit_entries
        WHERE entity_type = ?1 AND entity_id = ?2
        ORDER BY sequence DESC LIMIT 1",
      rusqlite::params![entry.entity_type.as_str(), entity_id],
      |r| r.get(0),
    )
    .optional()?;

  let entry_id = Uuid::new_v4();
  let hash = chain_hash(previous.as_deref(), entry_id, &entry, recorded_at);

  conn.execute(
    "INSERT INTO audit_entries (
       entry_id, entity_type, entity_id, action, field_name,
       old_value, new_value, actor, recorded_at, reason, hash
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    rusqlite::params![
      encode_uuid(entry_id),
      entry.entity_type.as_str(),
      entity_id,
      entry.action.as_str(),
      entry.field_name,
      entry.old_value,
      entry.new_value,
      entry.actor,
      encode_dt(recorded_at),
      entry.reason,
      hash,
    ],
  )?;

  Ok(AuditEntry {
    entry_id,
    sequence: conn.last_insert_rowid(),
    entity_type: entry.entity_type,
    entity_id: entry.entity_id,
    action: entry.action,
    field_name: entry.field_name,
    old_value: entry.old_value,
    new_value: entry.new_value,
    actor: entry.actor,
    recorded_at,
    reason: entry.reason,
    hash,
  })
}

fn insert_contract_row(
  conn: &rusqlite::Connection,
  contract: &Contract,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO contracts ({CONTRACT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
    ),
    rusqlite::params_from_iter(contract_params(contract)),
  )?;
  Ok(())
}

fn insert_assignment_row(
  conn: &rusqlite::Connection,
  assignment: &Assignment,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO assignments ({ASSIGNMENT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
    ),
    rusqlite::params_from_iter(assignment_params(assignment)),
  )?;
  Ok(())
}

fn insert_event(
  conn: &rusqlite::Connection,
  event: &NotificationEvent,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO outbox (
       event_id, event_name, contract_id, occurred_at, payload,
       state, attempts, next_attempt_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?4)",
    rusqlite::params![
      encode_uuid(event.event_id),
      event.event_name,
      encode_uuid(event.contract_id),
      encode_dt(event.occurred_at),
      event.payload.to_string(),
      DeliveryState::Pending.as_str(),
    ],
  )?;
  Ok(())
}

fn limit_param(limit: usize) -> i64 { i64::try_from(limit).unwrap_or(i64::MAX) }

// ─── ContractStore impl ──────────────────────────────────────────────────────

impl ContractStore for SqliteStore {
  type Error = Error;

  // ── Client sites & workers ────────────────────────────────────────────────

  async fn put_client_site(&self, site: NewClientSite) -> Result<ClientSite> {
    let NewClientSite { key, conflict_date, base_hourly_rate } = site;
    let id_str = encode_uuid(Uuid::new_v4());
    let date_str = conflict_date.map(encode_date);
    let at_str = encode_dt(now());

    let raw: RawSite = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO client_sites ({SITE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (company_name, plant_name, department, production_line)
             DO UPDATE SET conflict_date    = excluded.conflict_date,
                           base_hourly_rate = excluded.base_hourly_rate,
                           updated_at       = excluded.updated_at
             RETURNING {SITE_COLUMNS}"
          ),
          rusqlite::params![
            id_str,
            key.company_name,
            key.plant_name,
            key.department,
            key.production_line,
            date_str,
            base_hourly_rate,
            at_str,
          ],
          RawSite::from_row,
        )?)
      })
      .await?;

    raw.into_site()
  }

  async fn get_client_site(&self, site_id: Uuid) -> Result<Option<ClientSite>> {
    let id_str = encode_uuid(site_id);

    let raw: Option<RawSite> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SITE_COLUMNS} FROM client_sites WHERE site_id = ?1"),
              rusqlite::params![id_str],
              RawSite::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSite::into_site).transpose()
  }

  async fn find_client_site(&self, key: SiteKey) -> Result<Option<ClientSite>> {
    let raw: Option<RawSite> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SITE_COLUMNS} FROM client_sites
                  WHERE company_name = ?1 AND plant_name = ?2
                    AND department = ?3 AND production_line = ?4"
              ),
              rusqlite::params![
                key.company_name,
                key.plant_name,
                key.department,
                key.production_line,
              ],
              RawSite::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSite::into_site).transpose()
  }

  async fn update_conflict_date(
    &self,
    site_id: Uuid,
    conflict_date: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
    audit: NewAuditEntry,
  ) -> Result<Option<ClientSite>> {
    let id_str = encode_uuid(site_id);
    let date_str = conflict_date.map(encode_date);

    let raw: Option<RawSite> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!(
              "UPDATE client_sites SET conflict_date = ?2, updated_at = ?3
                WHERE site_id = ?1
                RETURNING {SITE_COLUMNS}"
            ),
            rusqlite::params![id_str, date_str, encode_dt(updated_at)],
            RawSite::from_row,
          )
          .optional()?;
        if raw.is_some() {
          insert_audit(&tx, audit, updated_at)?;
          tx.commit()?;
        }
        Ok(raw)
      })
      .await?;

    raw.map(RawSite::into_site).transpose()
  }

  async fn put_worker(&self, worker: Worker) -> Result<()> {
    let status = worker.employment_status.as_str();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO workers ({WORKER_COLUMNS}) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (worker_number)
             DO UPDATE SET name              = excluded.name,
                           base_hourly_rate  = excluded.base_hourly_rate,
                           employment_status = excluded.employment_status"
          ),
          rusqlite::params![
            worker.worker_number,
            worker.name,
            worker.base_hourly_rate,
            status,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_worker(&self, worker_number: String) -> Result<Option<Worker>> {
    let raw: Option<RawWorker> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {WORKER_COLUMNS} FROM workers WHERE worker_number = ?1"),
              rusqlite::params![worker_number],
              RawWorker::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawWorker::into_worker).transpose()
  }

  // ── Identifier sequence ───────────────────────────────────────────────────

  async fn next_sequence(&self, period: YearMonth) -> Result<u32> {
    let key = period.key();

    let value: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO contract_sequences (period, value) VALUES (?1, 1)
           ON CONFLICT (period) DO UPDATE SET value = value + 1
           RETURNING value",
          rusqlite::params![key],
          |r| r.get(0),
        )?)
      })
      .await?;

    tracing::debug!(%period, value, "sequence allocated");
    u32::try_from(value).map_err(|_| Error::Corrupt {
      column: "contract_sequences.value",
      value:  value.to_string(),
    })
  }

  // ── Contracts ─────────────────────────────────────────────────────────────

  async fn insert_contract(
    &self,
    contract: Contract,
    audit: Vec<NewAuditEntry>,
  ) -> Result<()> {
    let at = contract.created_at;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert_contract_row(&tx, &contract)?;
        for entry in audit {
          insert_audit(&tx, entry, at)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>> {
    let id_str = encode_uuid(contract_id);

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE contract_id = ?1"),
              rusqlite::params![id_str],
              RawContract::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn get_contract_by_number(
    &self,
    number: ContractNumber,
  ) -> Result<Option<Contract>> {
    let number_str = number.to_string();

    let raw: Option<RawContract> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE contract_number = ?1"
              ),
              rusqlite::params![number_str],
              RawContract::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContract::into_contract).transpose()
  }

  async fn list_contracts<'a>(&'a self, query: &'a ContractQuery) -> Result<Vec<Contract>> {
    // Build WHERE clause dynamically; placeholders are numbered as pushed.
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<Value> = vec![];

    if let Some(site_id) = query.site_id {
      params.push(Value::Text(encode_uuid(site_id)));
      conds.push(format!("site_id = ?{}", params.len()));
    }
    if !query.statuses.is_empty() {
      let mut marks = Vec::with_capacity(query.statuses.len());
      for status in &query.statuses {
        params.push(Value::Text(status.as_str().to_owned()));
        marks.push(format!("?{}", params.len()));
      }
      conds.push(format!("lifecycle_status IN ({})", marks.join(", ")));
    }
    if let Some((lo, hi)) = query.near_bounds() {
      params.push(Value::Text(encode_date(hi)));
      conds.push(format!("start_date <= ?{}", params.len()));
      params.push(Value::Text(encode_date(lo)));
      conds.push(format!("end_date >= ?{}", params.len()));
    }
    if let Some(d) = query.starts_by {
      params.push(Value::Text(encode_date(d)));
      conds.push(format!("start_date <= ?{}", params.len()));
    }
    if let Some(d) = query.ends_before {
      params.push(Value::Text(encode_date(d)));
      conds.push(format!("end_date < ?{}", params.len()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    params.push(Value::Integer(query.limit.map_or(-1, limit_param)));
    let sql = format!(
      "SELECT {CONTRACT_COLUMNS} FROM contracts
       {where_clause}
       ORDER BY start_date, contract_number
       LIMIT ?{}",
      params.len()
    );

    let raws: Vec<RawContract> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawContract::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContract::into_contract).collect()
  }

  async fn update_contract(&self, write: ContractWrite) -> Result<WriteOutcome<Contract>> {
    let ContractWrite {
      mut contract,
      expected_version,
      expected_status,
      audit,
      event,
      spawned,
    } = write;
    contract.version = expected_version + 1;
    let row = contract_params(&contract);
    let expected_status = expected_status.as_str();
    let at = contract.updated_at;

    let applied: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE contracts
              SET start_date = ?2, end_date = ?3, work_description = ?4,
                  hourly_rate = ?5, approval_status = ?6, lifecycle_status = ?7,
                  approver = ?8, rejection_reason = ?9, version = ?10,
                  updated_at = ?11
            WHERE contract_id = ?1 AND version = ?12 AND lifecycle_status = ?13",
          rusqlite::params![
            row[0], row[3], row[4], row[5], row[6], row[7], row[8], row[9],
            row[11], row[12], row[14], expected_version, expected_status,
          ],
        )?;
        if changed == 0 {
          return Ok(false);
        }

        for entry in audit {
          insert_audit(&tx, entry, at)?;
        }
        if let Some(event) = &event {
          insert_event(&tx, event)?;
        }
        if let Some(spawned) = spawned {
          insert_contract_row(&tx, &spawned.contract)?;
          for a in &spawned.assignments {
            insert_assignment_row(&tx, a)?;
          }
          for entry in spawned.audit {
            insert_audit(&tx, entry, spawned.contract.created_at)?;
          }
        }

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if applied {
      Ok(WriteOutcome::Applied(contract))
    } else {
      tracing::debug!(contract = %contract.contract_number, expected_version, "conditional update matched no row");
      Ok(WriteOutcome::Stale)
    }
  }

  // ── Assignments ───────────────────────────────────────────────────────────

  async fn insert_assignment(
    &self,
    write: AssignmentWrite,
  ) -> Result<WriteOutcome<Assignment>> {
    let AssignmentWrite { assignment, expected_version, expected_status, audit } = write;
    let contract_str = encode_uuid(assignment.contract_id);
    let expected_status = expected_status.as_str();
    let at = assignment.assigned_at;

    let applied: bool = self
      .conn
      .call({
        let assignment = assignment.clone();
        move |conn| {
          let tx = conn.transaction()?;
          let changed = tx.execute(
            "UPDATE contracts SET version = version + 1, updated_at = ?2
              WHERE contract_id = ?1 AND version = ?3 AND lifecycle_status = ?4",
            rusqlite::params![contract_str, encode_dt(at), expected_version, expected_status],
          )?;
          if changed == 0 {
            return Ok(false);
          }
          insert_assignment_row(&tx, &assignment)?;
          insert_audit(&tx, audit, at)?;
          tx.commit()?;
          Ok(true)
        }
      })
      .await?;

    if applied {
      Ok(WriteOutcome::Applied(assignment))
    } else {
      tracing::debug!(contract = %assignment.contract_id, expected_version, "guarded assignment insert matched no contract");
      Ok(WriteOutcome::Stale)
    }
  }

  async fn get_assignment(&self, assignment_id: Uuid) -> Result<Option<Assignment>> {
    let id_str = encode_uuid(assignment_id);

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE assignment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawAssignment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAssignment::into_assignment).transpose()
  }

  async fn list_assignments(
    &self,
    contract_id: Uuid,
    include_detached: bool,
  ) -> Result<Vec<Assignment>> {
    let id_str = encode_uuid(contract_id);
    let live_only = if include_detached { "" } else { "AND detached_at IS NULL" };
    let sql = format!(
      "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
        WHERE contract_id = ?1 {live_only}
        ORDER BY assigned_at, assignment_id"
    );

    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn list_worker_assignments(&self, worker_number: String) -> Result<Vec<Assignment>> {
    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
            WHERE worker_number = ?1 AND detached_at IS NULL
            ORDER BY assigned_at, assignment_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![worker_number], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }

  async fn detach_assignment(
    &self,
    assignment_id: Uuid,
    detached_at: DateTime<Utc>,
    audit: NewAuditEntry,
  ) -> Result<WriteOutcome<Assignment>> {
    let id_str = encode_uuid(assignment_id);
    let at_str = encode_dt(detached_at);

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!(
              "UPDATE assignments SET detached_at = ?2
                WHERE assignment_id = ?1 AND detached_at IS NULL
                RETURNING {ASSIGNMENT_COLUMNS}"
            ),
            rusqlite::params![id_str, at_str],
            RawAssignment::from_row,
          )
          .optional()?;
        if let Some(raw) = &raw {
          tx.execute(
            "UPDATE contracts SET version = version + 1, updated_at = ?2
              WHERE contract_id = ?1",
            rusqlite::params![raw.contract_id, at_str],
          )?;
          insert_audit(&tx, audit, detached_at)?;
          tx.commit()?;
        }
        Ok(raw)
      })
      .await?;

    match raw {
      Some(raw) => Ok(WriteOutcome::Applied(raw.into_assignment()?)),
      None => Ok(WriteOutcome::Stale),
    }
  }

  // ── Audit trail ───────────────────────────────────────────────────────────

  async fn append_audit(
    &self,
    entry: NewAuditEntry,
    recorded_at: DateTime<Utc>,
  ) -> Result<AuditEntry> {
    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let stored = insert_audit(&tx, entry, recorded_at)?;
        tx.commit()?;
        Ok(stored)
      })
      .await?;
    Ok(stored)
  }

  async fn history(
    &self,
    entity_type: EntityType,
    entity_id: Uuid,
  ) -> Result<Vec<AuditEntry>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<RawAuditEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM audit_entries
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY sequence"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![entity_type.as_str(), id_str],
            RawAuditEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEntry::into_entry).collect()
  }

  // ── Notification outbox ───────────────────────────────────────────────────

  async fn due_notifications(
    &self,
    now: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<OutboxEntry>> {
    let now_str = encode_dt(now);
    let limit_val = limit_param(limit);

    let raws: Vec<RawOutboxEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OUTBOX_COLUMNS} FROM outbox
            WHERE state = ?1 AND next_attempt_at <= ?2
            ORDER BY next_attempt_at, occurred_at
            LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![DeliveryState::Pending.as_str(), now_str, limit_val],
            RawOutboxEntry::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOutboxEntry::into_entry).collect()
  }

  async fn contract_notifications(&self, contract_id: Uuid) -> Result<Vec<OutboxEntry>> {
    let id_str = encode_uuid(contract_id);

    let raws: Vec<RawOutboxEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OUTBOX_COLUMNS} FROM outbox
            WHERE contract_id = ?1
            ORDER BY occurred_at, rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawOutboxEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOutboxEntry::into_entry).collect()
  }

  async fn mark_delivered(&self, event_id: Uuid, delivered_at: DateTime<Utc>) -> Result<()> {
    let id_str = encode_uuid(event_id);
    let at_str = encode_dt(delivered_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE outbox
              SET state = ?2, delivered_at = ?3, attempts = attempts + 1,
                  last_error = NULL
            WHERE event_id = ?1",
          rusqlite::params![id_str, DeliveryState::Delivered.as_str(), at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn schedule_retry(
    &self,
    event_id: Uuid,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
    error: String,
  ) -> Result<()> {
    let id_str = encode_uuid(event_id);
    let next_str = encode_dt(next_attempt_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE outbox
              SET attempts = ?2, next_attempt_at = ?3, last_error = ?4
            WHERE event_id = ?1",
          rusqlite::params![id_str, attempts, next_str, error],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn dead_letter(&self, event_id: Uuid, attempts: u32, error: String) -> Result<()> {
    let id_str = encode_uuid(event_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE outbox SET state = ?2, attempts = ?3, last_error = ?4
            WHERE event_id = ?1",
          rusqlite::params![
            id_str,
            DeliveryState::DeadLettered.as_str(),
            attempts,
            error,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
