//! SQL schema for the Rolo SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Cross-entity references (`company_id`, `contact_id`, ...) are plain TEXT
/// columns without `REFERENCES` clauses. Dangling and cross-tenant references
/// must be storable so the integrity validator can report them.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    email           TEXT NOT NULL,
    version         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS companies (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    domain          TEXT,
    version         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contacts (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    email           TEXT NOT NULL,
    phone           TEXT,
    job_title       TEXT,
    company_id      TEXT,
    version         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deals (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    title           TEXT NOT NULL,
    amount          REAL,
    stage           TEXT NOT NULL,   -- free text; validated by integrity checks
    probability     INTEGER NOT NULL,
    contact_id      TEXT,
    company_id      TEXT,
    owner_id        TEXT,
    version         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS activities (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    kind            TEXT NOT NULL,   -- 'call' | 'email' | 'meeting' | 'task' | 'note'
    subject         TEXT NOT NULL,
    due_date        TEXT,
    completed       INTEGER NOT NULL DEFAULT 0,
    contact_id      TEXT,
    deal_id         TEXT,
    user_id         TEXT NOT NULL,
    version         INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS contacts_org_email_idx  ON contacts(organization_id, email);
CREATE UNIQUE INDEX IF NOT EXISTS companies_org_name_idx  ON companies(organization_id, name);
CREATE UNIQUE INDEX IF NOT EXISTS companies_org_domain_idx
    ON companies(organization_id, domain) WHERE domain IS NOT NULL;

CREATE INDEX IF NOT EXISTS contacts_company_idx   ON contacts(company_id);
CREATE INDEX IF NOT EXISTS deals_org_idx          ON deals(organization_id);
CREATE INDEX IF NOT EXISTS deals_contact_idx      ON deals(contact_id);
CREATE INDEX IF NOT EXISTS deals_company_idx      ON deals(company_id);
CREATE INDEX IF NOT EXISTS activities_org_idx     ON activities(organization_id);
CREATE INDEX IF NOT EXISTS activities_contact_idx ON activities(contact_id);
CREATE INDEX IF NOT EXISTS activities_deal_idx    ON activities(deal_id);

PRAGMA user_version = 1;
";
