//! [`SqliteBackend`]: the engine's store traits over a [`rusqlite::Connection`].
//!
//! The backend holds no state. Every call goes through the connection the
//! caller passes in, which is normally an open transaction dereferenced to
//! its connection; nothing here commits.

use chrono::{DateTime, Utc};
use roster_core::{
  audit::AuditRecord,
  entry::TimelineEntry,
  package::{
    AccessPath, CourseAssignment, PackageMetadata, PackageProjection, PackageType,
    QuantityType,
  },
  store::{
    AccessPathStore, AuditLog, CatalogStore, CourseAssignmentStore, PackageStore, StoreScope,
    TimelineStore,
  },
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    COURSE_COLUMNS, ENTRY_COLUMNS, PACKAGE_COLUMNS, PATH_COLUMNS, RawAccessPath, RawAudit,
    RawCourse, RawEntry, RawMetadata, RawPackage, decode_enum, decode_uuid, encode_dt,
    encode_json, encode_opt_dt, encode_quantity, encode_uuid,
  },
};

/// Stateless SQLite implementation of every store trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl StoreScope for SqliteBackend {
  type Tx = Connection;
  type Error = Error;
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn query_entry(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Option<TimelineEntry>> {
  conn
    .query_row(sql, params, RawEntry::from_row)
    .optional()?
    .map(RawEntry::into_entry)
    .transpose()
}

fn clear_current(conn: &Connection, package_id: Uuid) -> Result<()> {
  conn.execute(
    "UPDATE timeline_entries SET is_current = 0 WHERE package_id = ?1 AND is_current = 1",
    params![encode_uuid(package_id)],
  )?;
  Ok(())
}

fn snapshot_json(entry: &TimelineEntry) -> Result<Option<String>> {
  entry.snapshot.as_ref().map(encode_json).transpose()
}

fn displaced_json(entry: &TimelineEntry) -> Result<Option<String>> {
  entry.displaced.as_ref().map(encode_json).transpose()
}

// ─── Timeline ────────────────────────────────────────────────────────────────

impl TimelineStore for SqliteBackend {
  fn get_entry(&self, conn: &Connection, entry_id: Uuid) -> Result<Option<TimelineEntry>> {
    query_entry(
      conn,
      &format!(
        "SELECT {ENTRY_COLUMNS} FROM timeline_entries
         WHERE entry_id = ?1 AND deleted_at IS NULL"
      ),
      params![encode_uuid(entry_id)],
    )
  }

  fn get_entry_at(
    &self,
    conn: &Connection,
    package_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<TimelineEntry>> {
    query_entry(
      conn,
      &format!(
        "SELECT {ENTRY_COLUMNS} FROM timeline_entries
         WHERE package_id = ?1
           AND deleted_at IS NULL
           AND start_at IS NOT NULL
           AND start_at <= ?2
           AND (end_at IS NULL OR end_at >= ?2)
         ORDER BY is_current DESC, start_at DESC
         LIMIT 1"
      ),
      params![encode_uuid(package_id), encode_dt(at)],
    )
  }

  fn get_entry_for_order(
    &self,
    conn: &Connection,
    package_id: Uuid,
    order_id: &str,
  ) -> Result<Option<TimelineEntry>> {
    query_entry(
      conn,
      &format!(
        "SELECT {ENTRY_COLUMNS} FROM timeline_entries
         WHERE package_id = ?1 AND order_id = ?2 AND deleted_at IS NULL
         ORDER BY created_at DESC
         LIMIT 1"
      ),
      params![encode_uuid(package_id), order_id],
    )
  }

  fn get_current_entry(&self, conn: &Connection, package_id: Uuid) -> Result<Option<TimelineEntry>> {
    query_entry(
      conn,
      &format!(
        "SELECT {ENTRY_COLUMNS} FROM timeline_entries
         WHERE package_id = ?1 AND is_current = 1 AND deleted_at IS NULL
         LIMIT 1"
      ),
      params![encode_uuid(package_id)],
    )
  }

  fn list_entries(&self, conn: &Connection, package_id: Uuid) -> Result<Vec<TimelineEntry>> {
    let mut stmt = conn.prepare(&format!(
      "SELECT {ENTRY_COLUMNS} FROM timeline_entries
       WHERE package_id = ?1 AND deleted_at IS NULL
       ORDER BY start_at IS NULL, start_at, created_at"
    ))?;
    let raws = stmt
      .query_map(params![encode_uuid(package_id)], RawEntry::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  fn insert_entry(&self, conn: &Connection, entry: &TimelineEntry) -> Result<()> {
    if entry.is_current {
      clear_current(conn, entry.package_id)?;
    }
    conn.execute(
      &format!(
        "INSERT INTO timeline_entries ({ENTRY_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
      ),
      params![
        encode_uuid(entry.entry_id),
        encode_uuid(entry.package_id),
        entry.order_id,
        entry.course_id,
        entry.recorded_by,
        encode_opt_dt(entry.start_at),
        encode_opt_dt(entry.end_at),
        entry.is_current,
        entry.from_entry_id.map(encode_uuid),
        entry.executed_by_schedule,
        entry.execution_error,
        snapshot_json(entry)?,
        displaced_json(entry)?,
        encode_dt(entry.created_at),
        encode_dt(entry.updated_at),
      ],
    )?;
    Ok(())
  }

  fn soft_delete_entry(&self, conn: &Connection, entry_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
      "UPDATE timeline_entries
       SET deleted_at = ?2, updated_at = ?2, is_current = 0
       WHERE entry_id = ?1",
      params![encode_uuid(entry_id), encode_dt(now)],
    )?;
    Ok(())
  }

  fn revert_entry(&self, conn: &Connection, entry_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
      "UPDATE timeline_entries SET deleted_at = NULL, updated_at = ?2 WHERE entry_id = ?1",
      params![encode_uuid(entry_id), encode_dt(now)],
    )?;
    Ok(())
  }

  fn update_entry(&self, conn: &Connection, entry: &TimelineEntry) -> Result<()> {
    if entry.is_current {
      clear_current(conn, entry.package_id)?;
    }
    conn.execute(
      "UPDATE timeline_entries
       SET recorded_by = ?2, start_at = ?3, end_at = ?4, is_current = ?5,
           from_entry_id = ?6, executed_by_schedule = ?7, execution_error = ?8,
           snapshot = ?9, displaced = ?10, updated_at = ?11
       WHERE entry_id = ?1",
      params![
        encode_uuid(entry.entry_id),
        entry.recorded_by,
        encode_opt_dt(entry.start_at),
        encode_opt_dt(entry.end_at),
        entry.is_current,
        entry.from_entry_id.map(encode_uuid),
        entry.executed_by_schedule,
        entry.execution_error,
        snapshot_json(entry)?,
        displaced_json(entry)?,
        encode_dt(entry.updated_at),
      ],
    )?;
    Ok(())
  }

  fn set_current_by_time(
    &self,
    conn: &Connection,
    package_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<TimelineEntry>> {
    let package = encode_uuid(package_id);
    let at = encode_dt(at);
    clear_current(conn, package_id)?;

    let running: Option<String> = conn
      .query_row(
        "SELECT entry_id FROM timeline_entries
         WHERE package_id = ?1
           AND deleted_at IS NULL
           AND start_at IS NOT NULL
           AND start_at <= ?2
           AND (end_at IS NULL OR end_at >= ?2)
         ORDER BY start_at DESC, created_at DESC
         LIMIT 1",
        params![package, at],
        |row| row.get(0),
      )
      .optional()?;
    let chosen = match running {
      Some(id) => Some(id),
      None => conn
        .query_row(
          "SELECT entry_id FROM timeline_entries
           WHERE package_id = ?1
             AND deleted_at IS NULL
             AND start_at IS NOT NULL
             AND start_at > ?2
           ORDER BY start_at ASC, created_at DESC
           LIMIT 1",
          params![package, at],
          |row| row.get(0),
        )
        .optional()?,
    };
    let Some(entry_id) = chosen else {
      return Ok(None);
    };

    conn.execute(
      "UPDATE timeline_entries SET is_current = 1 WHERE entry_id = ?1",
      params![entry_id],
    )?;
    self.get_entry(conn, decode_uuid(&entry_id)?)
  }

  fn record_execution(
    &self,
    conn: &Connection,
    entry_id: Uuid,
    error: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    conn.execute(
      "UPDATE timeline_entries
       SET executed_by_schedule = 1, execution_error = ?2, updated_at = ?3
       WHERE entry_id = ?1",
      params![encode_uuid(entry_id), error, encode_dt(now)],
    )?;
    Ok(())
  }
}

// ─── Projections ─────────────────────────────────────────────────────────────

impl PackageStore for SqliteBackend {
  fn get_package(&self, conn: &Connection, package_id: Uuid) -> Result<Option<PackageProjection>> {
    conn
      .query_row(
        &format!(
          "SELECT {PACKAGE_COLUMNS} FROM package_projections
           WHERE package_id = ?1 AND deleted_at IS NULL"
        ),
        params![encode_uuid(package_id)],
        RawPackage::from_row,
      )
      .optional()?
      .map(RawPackage::into_package)
      .transpose()
  }

  fn upsert_package(&self, conn: &Connection, package: &PackageProjection, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
      &format!(
        "INSERT INTO package_projections ({PACKAGE_COLUMNS}, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(package_id) DO UPDATE SET
           student_id   = excluded.student_id,
           product_id   = excluded.product_id,
           start_at     = excluded.start_at,
           end_at       = excluded.end_at,
           is_active    = excluded.is_active,
           location_ids = excluded.location_ids,
           properties   = excluded.properties,
           updated_at   = excluded.updated_at,
           deleted_at   = NULL"
      ),
      params![
        encode_uuid(package.package_id),
        package.student_id,
        package.product_id,
        encode_opt_dt(package.start_at),
        encode_opt_dt(package.end_at),
        package.is_active,
        encode_json(&package.location_ids)?,
        encode_json(&package.properties)?,
        encode_dt(now),
      ],
    )?;
    Ok(())
  }

  fn update_package_window(
    &self,
    conn: &Connection,
    package_id: Uuid,
    end_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    conn.execute(
      "UPDATE package_projections SET end_at = ?2, updated_at = ?3 WHERE package_id = ?1",
      params![
        encode_uuid(package_id),
        encode_opt_dt(end_at),
        encode_dt(now)
      ],
    )?;
    Ok(())
  }

  fn cancel_package(&self, conn: &Connection, package_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
      "UPDATE package_projections
       SET is_active = 0, deleted_at = ?2, updated_at = ?2
       WHERE package_id = ?1",
      params![encode_uuid(package_id), encode_dt(now)],
    )?;
    Ok(())
  }

  fn list_expiring_packages(
    &self,
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
      "SELECT package_id FROM package_projections
       WHERE deleted_at IS NULL
         AND is_active = 1
         AND end_at IS NOT NULL
         AND end_at >= ?1
         AND end_at <= ?2
       ORDER BY end_at, package_id",
    )?;
    let ids = stmt
      .query_map(params![encode_dt(from), encode_dt(to)], |row| {
        row.get::<_, String>(0)
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.iter().map(|id| decode_uuid(id)).collect()
  }
}

impl CourseAssignmentStore for SqliteBackend {
  fn get_course_assignment(
    &self,
    conn: &Connection,
    package_id: Uuid,
    course_id: &str,
  ) -> Result<Option<CourseAssignment>> {
    conn
      .query_row(
        &format!(
          "SELECT {COURSE_COLUMNS} FROM course_assignments
           WHERE package_id = ?1 AND course_id = ?2 AND deleted_at IS NULL"
        ),
        params![encode_uuid(package_id), course_id],
        RawCourse::from_row,
      )
      .optional()?
      .map(RawCourse::into_course)
      .transpose()
  }

  fn upsert_course_assignment(
    &self,
    conn: &Connection,
    assignment: &CourseAssignment,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let (slot, slot_per_week, weight) = encode_quantity(assignment.quantity);
    conn.execute(
      &format!(
        "INSERT INTO course_assignments ({COURSE_COLUMNS}, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(package_id, course_id) DO UPDATE SET
           student_id           = excluded.student_id,
           location_id          = excluded.location_id,
           package_type         = excluded.package_type,
           start_at             = excluded.start_at,
           end_at               = excluded.end_at,
           course_slot          = excluded.course_slot,
           course_slot_per_week = excluded.course_slot_per_week,
           weight               = excluded.weight,
           updated_at           = excluded.updated_at,
           deleted_at           = NULL"
      ),
      params![
        encode_uuid(assignment.package_id),
        assignment.course_id,
        assignment.student_id,
        assignment.location_id,
        assignment.package_type.to_string(),
        encode_opt_dt(assignment.start_at),
        encode_opt_dt(assignment.end_at),
        slot,
        slot_per_week,
        weight,
        encode_dt(now),
      ],
    )?;
    Ok(())
  }

  fn update_course_window(
    &self,
    conn: &Connection,
    package_id: Uuid,
    course_id: &str,
    end_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
  ) -> Result<()> {
    conn.execute(
      "UPDATE course_assignments SET end_at = ?3, updated_at = ?4
       WHERE package_id = ?1 AND course_id = ?2",
      params![
        encode_uuid(package_id),
        course_id,
        encode_opt_dt(end_at),
        encode_dt(now)
      ],
    )?;
    Ok(())
  }

  fn cancel_course_assignment(
    &self,
    conn: &Connection,
    package_id: Uuid,
    course_id: &str,
    now: DateTime<Utc>,
  ) -> Result<()> {
    conn.execute(
      "UPDATE course_assignments SET deleted_at = ?3, updated_at = ?3
       WHERE package_id = ?1 AND course_id = ?2",
      params![encode_uuid(package_id), course_id, encode_dt(now)],
    )?;
    Ok(())
  }
}

// ─── Access paths ────────────────────────────────────────────────────────────

impl AccessPathStore for SqliteBackend {
  fn get_access_path(
    &self,
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    include_deleted: bool,
  ) -> Result<Option<AccessPath>> {
    conn
      .query_row(
        &format!(
          "SELECT {PATH_COLUMNS} FROM access_paths
           WHERE student_id = ?1 AND course_id = ?2 AND (?3 OR deleted_at IS NULL)"
        ),
        params![student_id, course_id, include_deleted],
        RawAccessPath::from_row,
      )
      .optional()?
      .map(RawAccessPath::into_path)
      .transpose()
  }

  fn get_access_paths(&self, conn: &Connection, student_ids: &[String]) -> Result<Vec<AccessPath>> {
    if student_ids.is_empty() {
      return Ok(Vec::new());
    }
    let placeholders = vec!["?"; student_ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
      "SELECT {PATH_COLUMNS} FROM access_paths
       WHERE deleted_at IS NULL AND student_id IN ({placeholders})
       ORDER BY student_id, course_id"
    ))?;
    let raws = stmt
      .query_map(
        rusqlite::params_from_iter(student_ids.iter()),
        RawAccessPath::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawAccessPath::into_path).collect()
  }

  fn insert_access_path(&self, conn: &Connection, path: &AccessPath, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
      "INSERT INTO access_paths
         (student_id, course_id, package_id, location_id, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?5)
       ON CONFLICT(student_id, course_id) DO UPDATE SET
         package_id  = excluded.package_id,
         location_id = excluded.location_id,
         updated_at  = excluded.updated_at,
         deleted_at  = NULL",
      params![
        path.student_id,
        path.course_id,
        encode_uuid(path.package_id),
        path.location_id,
        encode_dt(now),
      ],
    )?;
    Ok(())
  }

  fn revert_access_path(
    &self,
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    now: DateTime<Utc>,
  ) -> Result<()> {
    conn.execute(
      "UPDATE access_paths SET deleted_at = NULL, updated_at = ?3
       WHERE student_id = ?1 AND course_id = ?2",
      params![student_id, course_id, encode_dt(now)],
    )?;
    Ok(())
  }

  fn soft_delete_access_path(
    &self,
    conn: &Connection,
    student_id: &str,
    course_id: &str,
    now: DateTime<Utc>,
  ) -> Result<()> {
    conn.execute(
      "UPDATE access_paths SET deleted_at = ?3, updated_at = ?3
       WHERE student_id = ?1 AND course_id = ?2",
      params![student_id, course_id, encode_dt(now)],
    )?;
    Ok(())
  }
}

// ─── Catalog & audit ─────────────────────────────────────────────────────────

impl CatalogStore for SqliteBackend {
  fn get_package_metadata(&self, conn: &Connection, product_id: &str) -> Result<Option<PackageMetadata>> {
    conn
      .query_row(
        "SELECT product_id, name, package_type, start_at, end_at
         FROM packages WHERE product_id = ?1",
        params![product_id],
        |row| {
          Ok(RawMetadata {
            product_id:   row.get(0)?,
            name:         row.get(1)?,
            package_type: row.get(2)?,
            start_at:     row.get(3)?,
            end_at:       row.get(4)?,
          })
        },
      )
      .optional()?
      .map(RawMetadata::into_metadata)
      .transpose()
  }

  fn get_quantity_type(&self, conn: &Connection, package_type: PackageType) -> Result<Option<QuantityType>> {
    let raw: Option<String> = conn
      .query_row(
        "SELECT quantity_type FROM package_quantity_types WHERE package_type = ?1",
        params![package_type.to_string()],
        |row| row.get(0),
      )
      .optional()?;
    raw
      .map(|s| decode_enum("quantity type", &s))
      .transpose()
  }
}

impl AuditLog for SqliteBackend {
  fn append_audit(&self, conn: &Connection, record: &AuditRecord) -> Result<()> {
    conn.execute(
      "INSERT INTO package_audit_log
         (package_id, student_id, course_id, action, flow, snapshot, recorded_by, recorded_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        encode_uuid(record.package_id),
        record.student_id,
        record.course_id,
        record.action.to_string(),
        record.flow,
        encode_json(&record.snapshot)?,
        record.recorded_by,
        encode_dt(record.recorded_at),
      ],
    )?;
    Ok(())
  }
}

// ─── Catalog maintenance & audit reads ───────────────────────────────────────

impl SqliteBackend {
  /// Insert or replace a catalog product.
  pub fn put_package_metadata(&self, conn: &Connection, metadata: &PackageMetadata) -> Result<()> {
    conn.execute(
      "INSERT INTO packages (product_id, name, package_type, start_at, end_at)
       VALUES (?1, ?2, ?3, ?4, ?5)
       ON CONFLICT(product_id) DO UPDATE SET
         name         = excluded.name,
         package_type = excluded.package_type,
         start_at     = excluded.start_at,
         end_at       = excluded.end_at",
      params![
        metadata.product_id,
        metadata.name,
        metadata.package_type.to_string(),
        encode_opt_dt(metadata.start_at),
        encode_opt_dt(metadata.end_at),
      ],
    )?;
    Ok(())
  }

  pub fn put_quantity_type(
    &self,
    conn: &Connection,
    package_type: PackageType,
    quantity_type: QuantityType,
  ) -> Result<()> {
    conn.execute(
      "INSERT INTO package_quantity_types (package_type, quantity_type) VALUES (?1, ?2)
       ON CONFLICT(package_type) DO UPDATE SET quantity_type = excluded.quantity_type",
      params![package_type.to_string(), quantity_type.to_string()],
    )?;
    Ok(())
  }

  /// Audit records of a package, oldest first.
  pub fn list_audit(&self, conn: &Connection, package_id: Uuid) -> Result<Vec<AuditRecord>> {
    let mut stmt = conn.prepare(
      "SELECT package_id, student_id, course_id, action, flow, snapshot, recorded_by, recorded_at
       FROM package_audit_log WHERE package_id = ?1 ORDER BY log_id",
    )?;
    let raws = stmt
      .query_map(params![encode_uuid(package_id)], |row| {
        Ok(RawAudit {
          package_id:  row.get(0)?,
          student_id:  row.get(1)?,
          course_id:   row.get(2)?,
          action:      row.get(3)?,
          flow:        row.get(4)?,
          snapshot:    row.get(5)?,
          recorded_by: row.get(6)?,
          recorded_at: row.get(7)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawAudit::into_record).collect()
  }
}
