//! The enrollment-timeline engine.
//!
//! [`Engine`] applies orders to a package timeline and keeps the package and
//! course-assignment projections in step with it. Every public method takes
//! the caller's transactional scope; the engine never commits. Writes inside
//! one step run through a [`WriteBatch`] that stops at the first failure.
//!
//! | Order | Method |
//! |-------|--------|
//! | new, enrollment, resume | [`Engine::create_order`] |
//! | withdrawal, graduate, leave of absence, cancelling update | [`Engine::cancel_order`] |
//! | update | [`Engine::update_order`] |
//! | void of any of the above | [`Engine::void_order`] |
//!
//! [`Engine::apply_order`] picks the mutator from the order kind.

pub mod classify;
pub mod project;

mod cancel;
mod create;
mod promote;
mod update;
mod void;

pub use project::{Catalog, Projected};
pub use promote::{PromotionOutcome, PromotionReport};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::{AuditAction, AuditRecord},
  batch::WriteBatch,
  entry::{Position, TimelineEntry, Window},
  error::StoreContext as _,
  event::PackageChangeEvent,
  order::OrderItem,
  package::PackageProjection,
  store::Stores,
};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Engine over a set of stores `S`.
///
/// Cloning is cheap when `S` is.
#[derive(Clone)]
pub struct Engine<S> {
  stores: S,
  clock:  Clock,
}

impl<S> Engine<S> {
  pub fn new(stores: S) -> Self { Self::with_clock(stores, Utc::now) }

  /// Engine whose notion of "now" comes from `clock`.
  pub fn with_clock(
    stores: S,
    clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
  ) -> Self {
    Self {
      stores,
      clock: Arc::new(clock),
    }
  }

  pub fn stores(&self) -> &S { &self.stores }

  pub fn now(&self) -> DateTime<Utc> { (self.clock)() }
}

impl<S: Stores> Engine<S> {
  /// Route an order to the mutator its kind calls for.
  pub fn apply_order(&self, tx: &S::Tx, order: &OrderItem) -> Result<Vec<PackageChangeEvent>> {
    tracing::debug!(
      order_id = %order.order_id,
      kind = %order.kind,
      courses = order.courses.len(),
      "applying order"
    );
    if order.is_cancellation() {
      self.cancel_order(tx, order)
    } else if order.kind.is_creation() {
      self.create_order(tx, order)
    } else {
      self.update_order(tx, order)
    }
  }

  // ── Classification ──────────────────────────────────────────────────

  /// Position of an existing entry relative to its package's current entry.
  pub fn classify(&self, tx: &S::Tx, candidate: &TimelineEntry) -> Result<Position> {
    if candidate.is_current {
      return Ok(Position::Current);
    }
    if candidate.package_id.is_nil() {
      return Err(Error::precondition(format!(
        "timeline entry {} has no package",
        candidate.entry_id
      )));
    }
    let current = self.current_entry(tx, candidate.package_id)?;
    Ok(classify::position(candidate, current.as_ref()))
  }

  /// Position a window for `order_id` would take on `package_id`.
  ///
  /// Fails with a precondition error if the window overlaps the package's
  /// current entry.
  pub fn classify_window(
    &self,
    tx: &S::Tx,
    package_id: Uuid,
    window: &Window,
    order_id: &str,
  ) -> Result<Position> {
    let current = self.current_entry(tx, package_id)?;
    let current_window = current.as_ref().map(TimelineEntry::window);
    classify::prospective(window, current_window.as_ref(), self.now()).ok_or_else(|| {
      Error::precondition(format!(
        "order {order_id} overlaps the current entry of package {package_id}"
      ))
    })
  }

  // ── Shared steps ────────────────────────────────────────────────────

  pub(crate) fn catalog(&self, tx: &S::Tx, product_id: &str) -> Result<Catalog> {
    let metadata = self
      .stores
      .get_package_metadata(tx, product_id)
      .context_with(|| format!("get package metadata {product_id}"))?
      .ok_or_else(|| Error::precondition(format!("unknown package product {product_id}")))?;
    let quantity_type = self
      .stores
      .get_quantity_type(tx, metadata.package_type)
      .context_with(|| format!("get quantity type for {}", metadata.package_type))?
      .ok_or_else(|| {
        Error::precondition(format!(
          "no quantity type mapped for package type {}",
          metadata.package_type
        ))
      })?;
    Ok(Catalog {
      metadata,
      quantity_type,
    })
  }

  pub(crate) fn current_entry(
    &self,
    tx: &S::Tx,
    package_id: Uuid,
  ) -> Result<Option<TimelineEntry>> {
    self
      .stores
      .get_current_entry(tx, package_id)
      .context_with(|| format!("get current entry of package {package_id}"))
  }

  pub(crate) fn set_current(&self, tx: &S::Tx, package_id: Uuid) -> Result<Option<TimelineEntry>> {
    let now = self.now();
    self
      .stores
      .set_current_by_time(tx, package_id, now)
      .context_with(|| format!("set current entry of package {package_id}"))
  }

  /// The package projection `entry` belongs to, falling back to the entry's
  /// own snapshot when the projection is already gone.
  pub(crate) fn package_state(&self, tx: &S::Tx, entry: &TimelineEntry) -> Result<PackageProjection> {
    let package_id = entry.package_id;
    let stored = self
      .stores
      .get_package(tx, package_id)
      .context_with(|| format!("get package {package_id}"))?;
    stored
      .or_else(|| entry.snapshot.clone())
      .ok_or_else(|| Error::internal(format!("package {package_id} has no projection")))
  }

  pub(crate) fn audit_record(
    &self,
    snapshot: &PackageProjection,
    course_id: &str,
    action: AuditAction,
    flow: &str,
    recorded_by: Option<&str>,
  ) -> AuditRecord {
    AuditRecord {
      package_id:  snapshot.package_id,
      student_id:  snapshot.student_id.clone(),
      course_id:   course_id.to_owned(),
      action,
      flow:        flow.to_owned(),
      snapshot:    snapshot.clone(),
      recorded_by: recorded_by.map(str::to_owned),
      recorded_at: self.now(),
    }
  }

  /// Writes that make `projected` the package's now-state.
  pub(crate) fn write_projection<'a>(
    &'a self,
    tx: &'a S::Tx,
    batch: WriteBatch<'a, Error>,
    projected: &'a Projected,
    audit: &'a AuditRecord,
  ) -> WriteBatch<'a, Error> {
    let package_id = projected.package.package_id;
    let course_id = &projected.course.course_id;
    let now = self.now();
    batch
      .push("upsert package", move || {
        self
          .stores
          .upsert_package(tx, &projected.package, now)
          .context_with(|| format!("upsert package {package_id}"))
      })
      .push("upsert course assignment", move || {
        self
          .stores
          .upsert_course_assignment(tx, &projected.course, now)
          .context_with(|| format!("upsert course {course_id} of package {package_id}"))
      })
      .push("append audit", move || self.append_audit(tx, audit))
  }

  /// Writes that end a package's now-state but keep the student's path to
  /// the course.
  pub(crate) fn write_deactivation<'a>(
    &'a self,
    tx: &'a S::Tx,
    batch: WriteBatch<'a, Error>,
    course_id: &'a str,
    audit: &'a AuditRecord,
  ) -> WriteBatch<'a, Error> {
    let package_id = audit.package_id;
    let now = self.now();
    batch
      .push("cancel package", move || {
        self
          .stores
          .cancel_package(tx, package_id, now)
          .context_with(|| format!("cancel package {package_id}"))
      })
      .push("cancel course assignment", move || {
        self
          .stores
          .cancel_course_assignment(tx, package_id, course_id, now)
          .context_with(|| format!("cancel course {course_id} of package {package_id}"))
      })
      .push("append audit", move || self.append_audit(tx, audit))
  }

  /// Writes that leave a package with no access at all.
  pub(crate) fn write_cancellation<'a>(
    &'a self,
    tx: &'a S::Tx,
    batch: WriteBatch<'a, Error>,
    student_id: &'a str,
    course_id: &'a str,
    audit: &'a AuditRecord,
  ) -> WriteBatch<'a, Error> {
    let now = self.now();
    self
      .write_deactivation(tx, batch, course_id, audit)
      .push("soft delete access path", move || {
        self
          .stores
          .soft_delete_access_path(tx, student_id, course_id, now)
          .context_with(|| format!("soft delete access path {student_id}/{course_id}"))
      })
  }

  pub(crate) fn insert_entry(&self, tx: &S::Tx, entry: &TimelineEntry) -> Result<()> {
    self.stores.insert_entry(tx, entry).context_with(|| {
      format!(
        "insert entry {} of package {} for order {}",
        entry.entry_id, entry.package_id, entry.order_id
      )
    })
  }

  pub(crate) fn update_entry(&self, tx: &S::Tx, entry: &TimelineEntry) -> Result<()> {
    self.stores.update_entry(tx, entry).context_with(|| {
      format!(
        "update entry {} of package {}",
        entry.entry_id, entry.package_id
      )
    })
  }

  pub(crate) fn soft_delete_entry(&self, tx: &S::Tx, entry: &TimelineEntry) -> Result<()> {
    self.stores.soft_delete_entry(tx, entry.entry_id, self.now()).context_with(|| {
      format!(
        "delete entry {} of package {} for order {}",
        entry.entry_id, entry.package_id, entry.order_id
      )
    })
  }

  fn append_audit(&self, tx: &S::Tx, record: &AuditRecord) -> Result<()> {
    self.stores.append_audit(tx, record).context_with(|| {
      format!(
        "append audit {} for package {}",
        record.action, record.package_id
      )
    })
  }

  pub(crate) fn run(&self, batch: WriteBatch<'_, Error>) -> Result<usize> {
    batch.run().map_err(|failed| {
      tracing::warn!(
        write = failed.label,
        completed = failed.completed,
        "write batch aborted"
      );
      failed.source
    })
  }
}
