//! SQL schema for the Wattline SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- The transition log is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
-- The unique triple makes concurrent duplicate appends a no-op: second
-- granularity on recorded_at is the deduplication contract.
CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    source      TEXT NOT NULL,
    state       TEXT NOT NULL,   -- 'ACTIVE' | 'UNSTABLE' | 'FAILED' | 'ERROR'
    voltage     REAL,            -- reading at the transition; NULL for manual events
    recorded_at TEXT NOT NULL,   -- 'YYYY-MM-DD HH:MM:SS'
    UNIQUE (source, state, recorded_at)
);

-- Runtime settings, kind-tagged so coercion happens exactly once at this
-- boundary.
CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    kind       TEXT NOT NULL DEFAULT 'text',  -- 'float'|'int'|'bool'|'json'|'text'
    updated_at TEXT NOT NULL,
    updated_by TEXT NOT NULL DEFAULT 'system'
);

-- The log grows unboundedly (retention is an external concern); these keep
-- windowed and per-source queries usable.
CREATE INDEX IF NOT EXISTS events_recorded_idx ON events(recorded_at DESC);
CREATE INDEX IF NOT EXISTS events_source_idx   ON events(source);

PRAGMA user_version = 1;
";
