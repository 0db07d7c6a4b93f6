//! SQL schema for the Locus SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS canonical_facilities (
    facility_id  TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    address      TEXT NOT NULL,
    country_code TEXT NOT NULL,
    lat          REAL,
    lng          REAL,
    is_closed    INTEGER NOT NULL DEFAULT 0,
    successor_id TEXT REFERENCES canonical_facilities(facility_id),
    created_at   TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    version      INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS list_items (
    item_id              TEXT PRIMARY KEY,
    list_id              TEXT NOT NULL,
    row_index            INTEGER NOT NULL,   -- 1-based position in the upload
    country_code         TEXT NOT NULL,
    raw_name             TEXT NOT NULL,
    raw_address          TEXT NOT NULL,
    status               TEXT NOT NULL,
    processing_errors    TEXT NOT NULL DEFAULT '[]',   -- JSON array
    lat                  REAL,
    lng                  REAL,
    resolved_facility_id TEXT REFERENCES canonical_facilities(facility_id),
    created_at           TEXT NOT NULL,
    version              INTEGER NOT NULL DEFAULT 1
);

-- Matches are immutable except for status and facility_id; facility_id is
-- re-pointed when the facility on the other end is merged away or split out.
-- is_candidate = 0 marks the contribution row written when an item resolves
-- to a freshly created facility; those rows never appear in an item's
-- candidate list but give merge/split a uniform handle.
CREATE TABLE IF NOT EXISTS matches (
    match_id          TEXT PRIMARY KEY,
    item_id           TEXT NOT NULL REFERENCES list_items(item_id),
    facility_id       TEXT NOT NULL REFERENCES canonical_facilities(facility_id),
    candidate_name    TEXT NOT NULL,
    candidate_address TEXT NOT NULL,
    confidence        REAL NOT NULL,
    status            TEXT NOT NULL,   -- 'pending' | 'confirmed' | 'rejected'
    ordinal           INTEGER NOT NULL DEFAULT 0,   -- candidate order
    is_candidate      INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL
);

-- At most one confirmed match per item, enforced by the store itself and
-- double-checked here.
CREATE UNIQUE INDEX IF NOT EXISTS matches_one_confirmed_idx
    ON matches(item_id) WHERE status = 'confirmed';

CREATE INDEX IF NOT EXISTS matches_item_idx        ON matches(item_id);
CREATE INDEX IF NOT EXISTS matches_facility_idx    ON matches(facility_id);
CREATE INDEX IF NOT EXISTS list_items_list_idx     ON list_items(list_id);
CREATE INDEX IF NOT EXISTS list_items_resolved_idx ON list_items(resolved_facility_id);

PRAGMA user_version = 1;
";
