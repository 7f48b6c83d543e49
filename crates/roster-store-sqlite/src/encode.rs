//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with nanosecond
//! precision and a `Z` suffix, so lexicographic comparison in SQL matches
//! chronological order. Snapshots, package properties and location lists are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use roster_core::{
  audit::{AuditAction, AuditRecord},
  entry::TimelineEntry,
  package::{
    AccessPath, CourseAssignment, CourseQuantity, PackageMetadata, PackageProjection,
    PackageProperties, PackageType,
  },
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn encode_opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Parse a strum-backed enum column.
pub fn decode_enum<T: std::str::FromStr>(column: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {column}: {s:?}")))
}

// ─── Course quantity ─────────────────────────────────────────────────────────

/// Split a quantity over the `(course_slot, course_slot_per_week, weight)`
/// columns.
pub fn encode_quantity(quantity: Option<CourseQuantity>) -> (Option<i32>, Option<i32>, Option<i32>) {
  match quantity {
    Some(CourseQuantity::Slot(n)) => (Some(n), None, None),
    Some(CourseQuantity::SlotPerWeek(n)) => (None, Some(n), None),
    Some(CourseQuantity::Weight(n)) => (None, None, Some(n)),
    None => (None, None, None),
  }
}

pub fn decode_quantity(
  slot: Option<i32>,
  slot_per_week: Option<i32>,
  weight: Option<i32>,
) -> Result<Option<CourseQuantity>> {
  match (slot, slot_per_week, weight) {
    (Some(n), None, None) => Ok(Some(CourseQuantity::Slot(n))),
    (None, Some(n), None) => Ok(Some(CourseQuantity::SlotPerWeek(n))),
    (None, None, Some(n)) => Ok(Some(CourseQuantity::Weight(n))),
    (None, None, None) => Ok(None),
    _ => Err(Error::Decode(
      "course assignment has more than one quantity column set".into(),
    )),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawEntry::from_row`].
pub const ENTRY_COLUMNS: &str = "entry_id, package_id, order_id, course_id, recorded_by, \
                                 start_at, end_at, is_current, from_entry_id, \
                                 executed_by_schedule, execution_error, snapshot, \
                                 displaced, created_at, updated_at";

/// Raw values read directly from a `timeline_entries` row.
pub struct RawEntry {
  pub entry_id:             String,
  pub package_id:           String,
  pub order_id:             String,
  pub course_id:            String,
  pub recorded_by:          Option<String>,
  pub start_at:             Option<String>,
  pub end_at:               Option<String>,
  pub is_current:           bool,
  pub from_entry_id:        Option<String>,
  pub executed_by_schedule: bool,
  pub execution_error:      Option<String>,
  pub snapshot:             Option<String>,
  pub displaced:            Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:             row.get(0)?,
      package_id:           row.get(1)?,
      order_id:             row.get(2)?,
      course_id:            row.get(3)?,
      recorded_by:          row.get(4)?,
      start_at:             row.get(5)?,
      end_at:               row.get(6)?,
      is_current:           row.get(7)?,
      from_entry_id:        row.get(8)?,
      executed_by_schedule: row.get(9)?,
      execution_error:      row.get(10)?,
      snapshot:             row.get(11)?,
      displaced:            row.get(12)?,
      created_at:           row.get(13)?,
      updated_at:           row.get(14)?,
    })
  }

  pub fn into_entry(self) -> Result<TimelineEntry> {
    Ok(TimelineEntry {
      entry_id:             decode_uuid(&self.entry_id)?,
      package_id:           decode_uuid(&self.package_id)?,
      order_id:             self.order_id,
      course_id:            self.course_id,
      recorded_by:          self.recorded_by,
      start_at:             decode_opt_dt(self.start_at.as_deref())?,
      end_at:               decode_opt_dt(self.end_at.as_deref())?,
      is_current:           self.is_current,
      from_entry_id:        decode_opt_uuid(self.from_entry_id.as_deref())?,
      executed_by_schedule: self.executed_by_schedule,
      execution_error:      self.execution_error,
      snapshot:             self.snapshot.as_deref().map(decode_json).transpose()?,
      displaced:            self.displaced.as_deref().map(decode_json).transpose()?,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

pub const PACKAGE_COLUMNS: &str =
  "package_id, student_id, product_id, start_at, end_at, is_active, location_ids, properties";

/// Raw values read directly from a `package_projections` row.
pub struct RawPackage {
  pub package_id:   String,
  pub student_id:   String,
  pub product_id:   String,
  pub start_at:     Option<String>,
  pub end_at:       Option<String>,
  pub is_active:    bool,
  pub location_ids: String,
  pub properties:   String,
}

impl RawPackage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      package_id:   row.get(0)?,
      student_id:   row.get(1)?,
      product_id:   row.get(2)?,
      start_at:     row.get(3)?,
      end_at:       row.get(4)?,
      is_active:    row.get(5)?,
      location_ids: row.get(6)?,
      properties:   row.get(7)?,
    })
  }

  pub fn into_package(self) -> Result<PackageProjection> {
    let properties: PackageProperties = decode_json(&self.properties)?;
    Ok(PackageProjection {
      package_id: decode_uuid(&self.package_id)?,
      student_id: self.student_id,
      product_id: self.product_id,
      start_at: decode_opt_dt(self.start_at.as_deref())?,
      end_at: decode_opt_dt(self.end_at.as_deref())?,
      is_active: self.is_active,
      location_ids: decode_json(&self.location_ids)?,
      properties,
    })
  }
}

pub const COURSE_COLUMNS: &str = "package_id, course_id, student_id, location_id, package_type, \
                                  start_at, end_at, course_slot, course_slot_per_week, weight";

/// Raw values read directly from a `course_assignments` row.
pub struct RawCourse {
  pub package_id:    String,
  pub course_id:     String,
  pub student_id:    String,
  pub location_id:   String,
  pub package_type:  String,
  pub start_at:      Option<String>,
  pub end_at:        Option<String>,
  pub slot:          Option<i32>,
  pub slot_per_week: Option<i32>,
  pub weight:        Option<i32>,
}

impl RawCourse {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      package_id:    row.get(0)?,
      course_id:     row.get(1)?,
      student_id:    row.get(2)?,
      location_id:   row.get(3)?,
      package_type:  row.get(4)?,
      start_at:      row.get(5)?,
      end_at:        row.get(6)?,
      slot:          row.get(7)?,
      slot_per_week: row.get(8)?,
      weight:        row.get(9)?,
    })
  }

  pub fn into_course(self) -> Result<CourseAssignment> {
    Ok(CourseAssignment {
      package_id:   decode_uuid(&self.package_id)?,
      course_id:    self.course_id,
      student_id:   self.student_id,
      location_id:  self.location_id,
      package_type: decode_enum::<PackageType>("package type", &self.package_type)?,
      start_at:     decode_opt_dt(self.start_at.as_deref())?,
      end_at:       decode_opt_dt(self.end_at.as_deref())?,
      quantity:     decode_quantity(self.slot, self.slot_per_week, self.weight)?,
    })
  }
}

pub const PATH_COLUMNS: &str = "student_id, course_id, package_id, location_id, deleted_at";

/// Raw values read directly from an `access_paths` row.
pub struct RawAccessPath {
  pub student_id:  String,
  pub course_id:   String,
  pub package_id:  String,
  pub location_id: String,
  pub deleted_at:  Option<String>,
}

impl RawAccessPath {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id:  row.get(0)?,
      course_id:   row.get(1)?,
      package_id:  row.get(2)?,
      location_id: row.get(3)?,
      deleted_at:  row.get(4)?,
    })
  }

  pub fn into_path(self) -> Result<AccessPath> {
    Ok(AccessPath {
      student_id:  self.student_id,
      course_id:   self.course_id,
      package_id:  decode_uuid(&self.package_id)?,
      location_id: self.location_id,
      deleted_at:  decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

/// Raw values read directly from a `packages` catalog row.
pub struct RawMetadata {
  pub product_id:   String,
  pub name:         String,
  pub package_type: String,
  pub start_at:     Option<String>,
  pub end_at:       Option<String>,
}

impl RawMetadata {
  pub fn into_metadata(self) -> Result<PackageMetadata> {
    Ok(PackageMetadata {
      product_id:   self.product_id,
      name:         self.name,
      package_type: decode_enum("package type", &self.package_type)?,
      start_at:     decode_opt_dt(self.start_at.as_deref())?,
      end_at:       decode_opt_dt(self.end_at.as_deref())?,
    })
  }
}

/// Raw values read directly from a `package_audit_log` row.
pub struct RawAudit {
  pub package_id:  String,
  pub student_id:  String,
  pub course_id:   String,
  pub action:      String,
  pub flow:        String,
  pub snapshot:    String,
  pub recorded_by: Option<String>,
  pub recorded_at: String,
}

impl RawAudit {
  pub fn into_record(self) -> Result<AuditRecord> {
    Ok(AuditRecord {
      package_id:  decode_uuid(&self.package_id)?,
      student_id:  self.student_id,
      course_id:   self.course_id,
      action:      decode_enum::<AuditAction>("audit action", &self.action)?,
      flow:        self.flow,
      snapshot:    decode_json(&self.snapshot)?,
      recorded_by: self.recorded_by,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
