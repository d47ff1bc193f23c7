//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision, so lexical order in SQL matches chronological order. Dates are
//! `YYYY-MM-DD`. UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use haken_core::{
  assignment::Assignment,
  audit::AuditEntry,
  contract::{Contract, DateRange},
  notify::{NotificationEvent, OutboxEntry},
  site::{ClientSite, SiteKey},
  worker::Worker,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { truncate_micros(Utc::now()) }

pub fn truncate_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
  DateTime::from_timestamp_micros(dt.timestamp_micros()).unwrap_or(dt)
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt<T>(
  s: Option<String>,
  f: impl Fn(&str) -> Result<T>,
) -> Result<Option<T>> {
  s.as_deref().map(f).transpose()
}

fn decode_u32(column: &'static str, v: i64) -> Result<u32> {
  u32::try_from(v).map_err(|_| Error::Corrupt { column, value: v.to_string() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SITE_COLUMNS: &str = "site_id, company_name, plant_name, department, \
                                production_line, conflict_date, base_hourly_rate, \
                                updated_at";

/// Raw values read directly from a `client_sites` row.
pub struct RawSite {
  pub site_id:          String,
  pub company_name:     String,
  pub plant_name:       String,
  pub department:       String,
  pub production_line:  String,
  pub conflict_date:    Option<String>,
  pub base_hourly_rate: i64,
  pub updated_at:       String,
}

impl RawSite {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      site_id:          row.get(0)?,
      company_name:     row.get(1)?,
      plant_name:       row.get(2)?,
      department:       row.get(3)?,
      production_line:  row.get(4)?,
      conflict_date:    row.get(5)?,
      base_hourly_rate: row.get(6)?,
      updated_at:       row.get(7)?,
    })
  }

  pub fn into_site(self) -> Result<ClientSite> {
    Ok(ClientSite {
      site_id:          decode_uuid(&self.site_id)?,
      key:              SiteKey {
        company_name:    self.company_name,
        plant_name:      self.plant_name,
        department:      self.department,
        production_line: self.production_line,
      },
      conflict_date:    decode_opt(self.conflict_date, decode_date)?,
      base_hourly_rate: decode_u32("base_hourly_rate", self.base_hourly_rate)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

pub const WORKER_COLUMNS: &str =
  "worker_number, name, base_hourly_rate, employment_status";

pub struct RawWorker {
  pub worker_number:     String,
  pub name:              String,
  pub base_hourly_rate:  i64,
  pub employment_status: String,
}

impl RawWorker {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      worker_number:     row.get(0)?,
      name:              row.get(1)?,
      base_hourly_rate:  row.get(2)?,
      employment_status: row.get(3)?,
    })
  }

  pub fn into_worker(self) -> Result<Worker> {
    Ok(Worker {
      worker_number:     self.worker_number,
      name:              self.name,
      base_hourly_rate:  decode_u32("base_hourly_rate", self.base_hourly_rate)?,
      employment_status: self.employment_status.parse()?,
    })
  }
}

pub const CONTRACT_COLUMNS: &str = "contract_id, contract_number, site_id, \
                                    start_date, end_date, work_description, \
                                    hourly_rate, approval_status, lifecycle_status, \
                                    approver, renewed_from, rejection_reason, \
                                    version, created_at, updated_at";

/// Raw values read directly from a `contracts` row.
pub struct RawContract {
  pub contract_id:      String,
  pub contract_number:  String,
  pub site_id:          String,
  pub start_date:       String,
  pub end_date:         String,
  pub work_description: String,
  pub hourly_rate:      i64,
  pub approval_status:  String,
  pub lifecycle_status: String,
  pub approver:         Option<String>,
  pub renewed_from:     Option<String>,
  pub rejection_reason: Option<String>,
  pub version:          i64,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawContract {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contract_id:      row.get(0)?,
      contract_number:  row.get(1)?,
      site_id:          row.get(2)?,
      start_date:       row.get(3)?,
      end_date:         row.get(4)?,
      work_description: row.get(5)?,
      hourly_rate:      row.get(6)?,
      approval_status:  row.get(7)?,
      lifecycle_status: row.get(8)?,
      approver:         row.get(9)?,
      renewed_from:     row.get(10)?,
      rejection_reason: row.get(11)?,
      version:          row.get(12)?,
      created_at:       row.get(13)?,
      updated_at:       row.get(14)?,
    })
  }

  pub fn into_contract(self) -> Result<Contract> {
    let range = DateRange::new(
      decode_date(&self.start_date)?,
      decode_date(&self.end_date)?,
    )?;
    Ok(Contract {
      contract_id: decode_uuid(&self.contract_id)?,
      contract_number: self.contract_number.parse()?,
      site_id: decode_uuid(&self.site_id)?,
      range,
      work_description: self.work_description,
      hourly_rate: decode_u32("hourly_rate", self.hourly_rate)?,
      approval_status: self.approval_status.parse()?,
      lifecycle_status: self.lifecycle_status.parse()?,
      approver: self.approver,
      renewed_from: decode_opt(self.renewed_from, decode_uuid)?,
      rejection_reason: self.rejection_reason,
      version: self.version,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Column values for inserting a contract, in [`CONTRACT_COLUMNS`] order.
pub fn contract_params(c: &Contract) -> [rusqlite::types::Value; 15] {
  use rusqlite::types::Value;
  let opt = |s: Option<String>| s.map_or(Value::Null, Value::Text);
  [
    Value::Text(encode_uuid(c.contract_id)),
    Value::Text(c.contract_number.to_string()),
    Value::Text(encode_uuid(c.site_id)),
    Value::Text(encode_date(c.range.start)),
    Value::Text(encode_date(c.range.end)),
    Value::Text(c.work_description.clone()),
    Value::Integer(i64::from(c.hourly_rate)),
    Value::Text(c.approval_status.as_str().to_owned()),
    Value::Text(c.lifecycle_status.as_str().to_owned()),
    opt(c.approver.clone()),
    opt(c.renewed_from.map(encode_uuid)),
    opt(c.rejection_reason.clone()),
    Value::Integer(c.version),
    Value::Text(encode_dt(c.created_at)),
    Value::Text(encode_dt(c.updated_at)),
  ]
}

pub const ASSIGNMENT_COLUMNS: &str = "assignment_id, contract_id, worker_number, \
                                      rate_override, sub_start, sub_end, \
                                      assigned_at, detached_at";

pub struct RawAssignment {
  pub assignment_id: String,
  pub contract_id:   String,
  pub worker_number: String,
  pub rate_override: Option<i64>,
  pub sub_start:     Option<String>,
  pub sub_end:       Option<String>,
  pub assigned_at:   String,
  pub detached_at:   Option<String>,
}

impl RawAssignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id: row.get(0)?,
      contract_id:   row.get(1)?,
      worker_number: row.get(2)?,
      rate_override: row.get(3)?,
      sub_start:     row.get(4)?,
      sub_end:       row.get(5)?,
      assigned_at:   row.get(6)?,
      detached_at:   row.get(7)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    let sub_range = match (self.sub_start, self.sub_end) {
      (Some(s), Some(e)) => Some(DateRange::new(decode_date(&s)?, decode_date(&e)?)?),
      _ => None,
    };
    Ok(Assignment {
      assignment_id: decode_uuid(&self.assignment_id)?,
      contract_id: decode_uuid(&self.contract_id)?,
      worker_number: self.worker_number,
      rate_override: self
        .rate_override
        .map(|v| decode_u32("rate_override", v))
        .transpose()?,
      sub_range,
      assigned_at: decode_dt(&self.assigned_at)?,
      detached_at: decode_opt(self.detached_at, decode_dt)?,
    })
  }
}

pub fn assignment_params(a: &Assignment) -> [rusqlite::types::Value; 8] {
  use rusqlite::types::Value;
  let opt = |s: Option<String>| s.map_or(Value::Null, Value::Text);
  [
    Value::Text(encode_uuid(a.assignment_id)),
    Value::Text(encode_uuid(a.contract_id)),
    Value::Text(a.worker_number.clone()),
    a.rate_override
      .map_or(Value::Null, |r| Value::Integer(i64::from(r))),
    opt(a.sub_range.map(|r| encode_date(r.start))),
    opt(a.sub_range.map(|r| encode_date(r.end))),
    Value::Text(encode_dt(a.assigned_at)),
    opt(a.detached_at.map(encode_dt)),
  ]
}

pub const AUDIT_COLUMNS: &str = "entry_id, sequence, entity_type, entity_id, \
                                 action, field_name, old_value, new_value, \
                                 actor, recorded_at, reason, hash";

/// Raw values read directly from an `audit_entries` row.
pub struct RawAuditEntry {
  pub entry_id:    String,
  pub sequence:    i64,
  pub entity_type: String,
  pub entity_id:   String,
  pub action:      String,
  pub field_name:  Option<String>,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub actor:       String,
  pub recorded_at: String,
  pub reason:      Option<String>,
  pub hash:        String,
}

impl RawAuditEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:    row.get(0)?,
      sequence:    row.get(1)?,
      entity_type: row.get(2)?,
      entity_id:   row.get(3)?,
      action:      row.get(4)?,
      field_name:  row.get(5)?,
      old_value:   row.get(6)?,
      new_value:   row.get(7)?,
      actor:       row.get(8)?,
      recorded_at: row.get(9)?,
      reason:      row.get(10)?,
      hash:        row.get(11)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      entry_id:    decode_uuid(&self.entry_id)?,
      sequence:    self.sequence,
      entity_type: self.entity_type.parse()?,
      entity_id:   decode_uuid(&self.entity_id)?,
      action:      self.action.parse()?,
      field_name:  self.field_name,
      old_value:   self.old_value,
      new_value:   self.new_value,
      actor:       self.actor,
      recorded_at: decode_dt(&self.recorded_at)?,
      reason:      self.reason,
      hash:        self.hash,
    })
  }
}

pub const OUTBOX_COLUMNS: &str = "event_id, event_name, contract_id, occurred_at, \
                                  payload, state, attempts, next_attempt_at, \
                                  last_error, delivered_at";

pub struct RawOutboxEntry {
  pub event_id:        String,
  pub event_name:      String,
  pub contract_id:     String,
  pub occurred_at:     String,
  pub payload:         String,
  pub state:           String,
  pub attempts:        i64,
  pub next_attempt_at: String,
  pub last_error:      Option<String>,
  pub delivered_at:    Option<String>,
}

impl RawOutboxEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:        row.get(0)?,
      event_name:      row.get(1)?,
      contract_id:     row.get(2)?,
      occurred_at:     row.get(3)?,
      payload:         row.get(4)?,
      state:           row.get(5)?,
      attempts:        row.get(6)?,
      next_attempt_at: row.get(7)?,
      last_error:      row.get(8)?,
      delivered_at:    row.get(9)?,
    })
  }

  pub fn into_entry(self) -> Result<OutboxEntry> {
    Ok(OutboxEntry {
      event:           NotificationEvent {
        event_id:    decode_uuid(&self.event_id)?,
        event_name:  self.event_name,
        contract_id: decode_uuid(&self.contract_id)?,
        occurred_at: decode_dt(&self.occurred_at)?,
        payload:     serde_json::from_str(&self.payload)?,
      },
      state:           self.state.parse()?,
      attempts:        decode_u32("attempts", self.attempts)?,
      next_attempt_at: decode_dt(&self.next_attempt_at)?,
      last_error:      self.last_error,
      delivered_at:    decode_opt(self.delivered_at, decode_dt)?,
    })
  }
}
