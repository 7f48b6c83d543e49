//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per scheduled interval of package access.
-- Rows are soft-deleted so that a void can revert them.
CREATE TABLE IF NOT EXISTS timeline_entries (
    entry_id             TEXT PRIMARY KEY,
    package_id           TEXT NOT NULL,
    order_id             TEXT NOT NULL,
    course_id            TEXT NOT NULL,
    recorded_by          TEXT,
    start_at             TEXT,            -- NULL only on cancellation tombstones
    end_at               TEXT,            -- NULL = does not expire
    is_current           INTEGER NOT NULL DEFAULT 0,
    from_entry_id        TEXT,
    executed_by_schedule INTEGER NOT NULL DEFAULT 0,
    execution_error      TEXT,
    snapshot             TEXT,            -- JSON PackageProjection
    displaced            TEXT,            -- JSON Displaced, set on creates only
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    deleted_at           TEXT
);

CREATE TABLE IF NOT EXISTS package_projections (
    package_id   TEXT PRIMARY KEY,
    student_id   TEXT NOT NULL,
    product_id   TEXT NOT NULL,
    start_at     TEXT,
    end_at       TEXT,
    is_active    INTEGER NOT NULL,
    location_ids TEXT NOT NULL DEFAULT '[]',
    properties   TEXT NOT NULL,           -- JSON PackageProperties
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    deleted_at   TEXT
);

-- Exactly one of the three quantity columns is set, per the package's
-- quantity type.
CREATE TABLE IF NOT EXISTS course_assignments (
    package_id           TEXT NOT NULL,
    course_id            TEXT NOT NULL,
    student_id           TEXT NOT NULL,
    location_id          TEXT NOT NULL,
    package_type         TEXT NOT NULL,
    start_at             TEXT,
    end_at               TEXT,
    course_slot          INTEGER,
    course_slot_per_week INTEGER,
    weight               INTEGER,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    deleted_at           TEXT,
    PRIMARY KEY (package_id, course_id)
);

CREATE TABLE IF NOT EXISTS access_paths (
    student_id  TEXT NOT NULL,
    course_id   TEXT NOT NULL,
    package_id  TEXT NOT NULL,
    location_id TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT,
    PRIMARY KEY (student_id, course_id)
);

CREATE TABLE IF NOT EXISTS packages (
    product_id   TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    package_type TEXT NOT NULL,
    start_at     TEXT,
    end_at       TEXT
);

CREATE TABLE IF NOT EXISTS package_quantity_types (
    package_type  TEXT PRIMARY KEY,
    quantity_type TEXT NOT NULL
);

-- Append-only.
CREATE TABLE IF NOT EXISTS package_audit_log (
    log_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id  TEXT NOT NULL,
    student_id  TEXT NOT NULL,
    course_id   TEXT NOT NULL,
    action      TEXT NOT NULL,
    flow        TEXT NOT NULL,
    snapshot    TEXT NOT NULL,
    recorded_by TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS entries_package_idx  ON timeline_entries(package_id);
CREATE INDEX IF NOT EXISTS entries_order_idx    ON timeline_entries(package_id, order_id);
CREATE INDEX IF NOT EXISTS packages_end_idx     ON package_projections(end_at);
CREATE INDEX IF NOT EXISTS audit_package_idx    ON package_audit_log(package_id);

PRAGMA user_version = 1;
";
