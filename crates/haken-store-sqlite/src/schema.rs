//! SQL schema for the Haken SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS client_sites (
    site_id          TEXT PRIMARY KEY,
    company_name     TEXT NOT NULL,
    plant_name       TEXT NOT NULL,
    department       TEXT NOT NULL,
    production_line  TEXT NOT NULL,
    conflict_date    TEXT,            -- YYYY-MM-DD or NULL
    base_hourly_rate INTEGER NOT NULL,
    updated_at       TEXT NOT NULL,
    UNIQUE (company_name, plant_name, department, production_line)
);

CREATE TABLE IF NOT EXISTS workers (
    worker_number     TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    base_hourly_rate  INTEGER NOT NULL,
    employment_status TEXT NOT NULL   -- 'active' | 'resigned' | 'on_leave'
);

-- One counter per YYYYMM period; only ever incremented.
CREATE TABLE IF NOT EXISTS contract_sequences (
    period TEXT PRIMARY KEY,
    value  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS contracts (
    contract_id      TEXT PRIMARY KEY,
    contract_number  TEXT NOT NULL UNIQUE,
    site_id          TEXT NOT NULL REFERENCES client_sites(site_id),
    start_date       TEXT NOT NULL,
    end_date         TEXT NOT NULL,
    work_description TEXT NOT NULL,
    hourly_rate      INTEGER NOT NULL,
    approval_status  TEXT NOT NULL,
    lifecycle_status TEXT NOT NULL,
    approver         TEXT,
    renewed_from     TEXT REFERENCES contracts(contract_id),
    rejection_reason TEXT,
    version          INTEGER NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    CHECK (start_date <= end_date)
);

CREATE TABLE IF NOT EXISTS assignments (
    assignment_id TEXT PRIMARY KEY,
    contract_id   TEXT NOT NULL REFERENCES contracts(contract_id),
    worker_number TEXT NOT NULL REFERENCES workers(worker_number),
    rate_override INTEGER,
    sub_start     TEXT,
    sub_end       TEXT,
    assigned_at   TEXT NOT NULL,
    detached_at   TEXT,
    CHECK ((sub_start IS NULL) = (sub_end IS NULL))
);

-- Audit entries are strictly append-only.
CREATE TABLE IF NOT EXISTS audit_entries (
    sequence    INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id    TEXT NOT NULL UNIQUE,
    entity_type TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    action      TEXT NOT NULL,
    field_name  TEXT,
    old_value   TEXT,
    new_value   TEXT,
    actor       TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    reason      TEXT,
    hash        TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS audit_entries_no_update
BEFORE UPDATE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_entries_no_delete
BEFORE DELETE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are append-only');
END;

CREATE TABLE IF NOT EXISTS outbox (
    event_id        TEXT PRIMARY KEY,
    event_name      TEXT NOT NULL,
    contract_id     TEXT NOT NULL REFERENCES contracts(contract_id),
    occurred_at     TEXT NOT NULL,
    payload         TEXT NOT NULL,    -- JSON
    state           TEXT NOT NULL DEFAULT 'pending',
    attempts        INTEGER NOT NULL DEFAULT 0,
    next_attempt_at TEXT NOT NULL,
    last_error      TEXT,
    delivered_at    TEXT
);

CREATE INDEX IF NOT EXISTS contracts_site_idx      ON contracts(site_id, lifecycle_status);
CREATE INDEX IF NOT EXISTS contracts_status_idx    ON contracts(lifecycle_status, start_date, end_date);
CREATE INDEX IF NOT EXISTS assignments_contract_idx ON assignments(contract_id);
CREATE INDEX IF NOT EXISTS assignments_worker_idx  ON assignments(worker_number);
CREATE INDEX IF NOT EXISTS audit_entity_idx        ON audit_entries(entity_type, entity_id, sequence);
CREATE INDEX IF NOT EXISTS outbox_due_idx          ON outbox(state, next_attempt_at);

PRAGMA user_version = 1;
";
