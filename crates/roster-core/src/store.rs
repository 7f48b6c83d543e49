//! Capability traits for the engine's persistence collaborators.
//!
//! The traits are implemented by storage backends (e.g. `roster-store-sqlite`).
//! Every method takes the caller's transactional scope `tx`; implementations
//! must issue all reads and writes through it and never commit on their own.
//!
//! Reads of timeline entries, projections and access paths skip soft-deleted
//! rows unless stated otherwise. Writes that stamp a row take the engine's
//! clock reading as `now`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  audit::AuditRecord,
  entry::TimelineEntry,
  package::{
    AccessPath, CourseAssignment, PackageMetadata, PackageProjection, PackageType,
    QuantityType,
  },
};

/// Shared associated types of every store trait.
pub trait StoreScope {
  /// The transactional unit of work threaded through every call.
  type Tx: ?Sized;
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Timeline ────────────────────────────────────────────────────────────────

pub trait TimelineStore: StoreScope {
  fn get_entry(&self, tx: &Self::Tx, entry_id: Uuid)
  -> Result<Option<TimelineEntry>, Self::Error>;

  /// The live, windowed entry of `package_id` whose window contains `at`.
  /// Prefers the current entry, then the latest start.
  fn get_entry_at(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<TimelineEntry>, Self::Error>;

  /// The most recent live entry `order_id` left on `package_id`.
  fn get_entry_for_order(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    order_id: &str,
  ) -> Result<Option<TimelineEntry>, Self::Error>;

  fn get_current_entry(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
  ) -> Result<Option<TimelineEntry>, Self::Error>;

  /// Live entries of a package ordered by start, tombstones last.
  fn list_entries(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
  ) -> Result<Vec<TimelineEntry>, Self::Error>;

  /// Insert `entry`. If it is flagged current, every other entry of the
  /// package loses the flag first.
  fn insert_entry(&self, tx: &Self::Tx, entry: &TimelineEntry) -> Result<(), Self::Error>;

  fn soft_delete_entry(
    &self,
    tx: &Self::Tx,
    entry_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  /// Undo a soft delete.
  fn revert_entry(
    &self,
    tx: &Self::Tx,
    entry_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  /// Overwrite window, snapshot and flags of an existing entry.
  fn update_entry(&self, tx: &Self::Tx, entry: &TimelineEntry) -> Result<(), Self::Error>;

  /// Recompute which live entry of the package is current as of `at`: the
  /// entry whose window contains `at`, otherwise the earliest entry starting
  /// after `at`. Clears the flag everywhere else and returns the new current
  /// entry, if any.
  fn set_current_by_time(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<TimelineEntry>, Self::Error>;

  /// Mark an entry as processed by the promotion sweep, with the failure
  /// message if processing failed.
  fn record_execution(
    &self,
    tx: &Self::Tx,
    entry_id: Uuid,
    error: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;
}

// ─── Projections ─────────────────────────────────────────────────────────────

pub trait PackageStore: StoreScope {
  fn get_package(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
  ) -> Result<Option<PackageProjection>, Self::Error>;

  /// Insert or overwrite; also revives a cancelled projection.
  fn upsert_package(
    &self,
    tx: &Self::Tx,
    package: &PackageProjection,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  fn update_package_window(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    end_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  /// Mark inactive and hide from reads.
  fn cancel_package(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  /// Active packages whose end falls within `[from, to]`.
  fn list_expiring_packages(
    &self,
    tx: &Self::Tx,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<Uuid>, Self::Error>;
}

pub trait CourseAssignmentStore: StoreScope {
  fn get_course_assignment(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    course_id: &str,
  ) -> Result<Option<CourseAssignment>, Self::Error>;

  fn upsert_course_assignment(
    &self,
    tx: &Self::Tx,
    assignment: &CourseAssignment,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  fn update_course_window(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    course_id: &str,
    end_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  fn cancel_course_assignment(
    &self,
    tx: &Self::Tx,
    package_id: Uuid,
    course_id: &str,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;
}

// ─── Access paths ────────────────────────────────────────────────────────────

pub trait AccessPathStore: StoreScope {
  fn get_access_path(
    &self,
    tx: &Self::Tx,
    student_id: &str,
    course_id: &str,
    include_deleted: bool,
  ) -> Result<Option<AccessPath>, Self::Error>;

  /// Live access paths of every student in `student_ids`.
  fn get_access_paths(
    &self,
    tx: &Self::Tx,
    student_ids: &[String],
  ) -> Result<Vec<AccessPath>, Self::Error>;

  /// Insert, replacing a soft-deleted row for the same (student, course).
  fn insert_access_path(
    &self,
    tx: &Self::Tx,
    path: &AccessPath,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  fn revert_access_path(
    &self,
    tx: &Self::Tx,
    student_id: &str,
    course_id: &str,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;

  fn soft_delete_access_path(
    &self,
    tx: &Self::Tx,
    student_id: &str,
    course_id: &str,
    now: DateTime<Utc>,
  ) -> Result<(), Self::Error>;
}

// ─── Catalog & audit ─────────────────────────────────────────────────────────

pub trait CatalogStore: StoreScope {
  fn get_package_metadata(
    &self,
    tx: &Self::Tx,
    product_id: &str,
  ) -> Result<Option<PackageMetadata>, Self::Error>;

  fn get_quantity_type(
    &self,
    tx: &Self::Tx,
    package_type: PackageType,
  ) -> Result<Option<QuantityType>, Self::Error>;
}

pub trait AuditLog: StoreScope {
  fn append_audit(&self, tx: &Self::Tx, record: &AuditRecord) -> Result<(), Self::Error>;
}

/// Everything the engine needs from a backend.
pub trait Stores:
  TimelineStore + PackageStore + CourseAssignmentStore + AccessPathStore + CatalogStore + AuditLog
{
}

impl<T> Stores for T where
  T: TimelineStore
    + PackageStore
    + CourseAssignmentStore
    + AccessPathStore
    + CatalogStore
    + AuditLog
{
}
