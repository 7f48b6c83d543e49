//! Cancel-order mutator.
//!
//! A complete cancellation removes the covering entry outright and leaves a
//! windowless tombstone linked to it. A partial cancellation replaces the
//! entry with a copy that ends on the cancellation's effective day.

use super::{
  Catalog, Engine, Projected,
  project::{active_event, inactive_event},
};
use crate::{
  Error, Result,
  audit::{AuditAction, flow},
  batch::WriteBatch,
  entry::{Position, TimelineEntry},
  error::StoreContext as _,
  event::PackageChangeEvent,
  order::OrderItem,
  store::Stores,
  time::end_of_day,
};

impl<S: Stores> Engine<S> {
  /// Terminate the order's courses, from the product's origin when the
  /// cancellation is complete and from the effective day otherwise.
  pub fn cancel_order(&self, tx: &S::Tx, order: &OrderItem) -> Result<Vec<PackageChangeEvent>> {
    let catalog = self.catalog(tx, &order.product_id)?;
    let complete = order.is_complete();
    let mut events = Vec::new();
    for course in &order.courses {
      events.extend(self.cancel_course(tx, order, &course.course_id, complete, &catalog)?);
    }
    Ok(events)
  }

  pub(crate) fn cancel_course(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course_id: &str,
    complete: bool,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let target = self.covering_entry(tx, order, course_id)?;
    let position = self.classify(tx, &target)?;
    tracing::debug!(
      order_id = %order.order_id,
      course_id,
      package_id = %target.package_id,
      entry_id = %target.entry_id,
      %position,
      complete,
      "cancelling entry"
    );

    if position == Position::Past {
      return Err(Error::internal(format!(
        "order {} cancels entry {} of package {} which already lies in the past",
        order.order_id, target.entry_id, target.package_id
      )));
    }

    if complete {
      self.cancel_complete(tx, order, course_id, target, position, catalog)
    } else {
      self.cancel_partial(tx, order, course_id, target, position)
    }
  }

  /// The live entry of the student's package for `course_id` that covers
  /// the order's lookup instant.
  pub(crate) fn covering_entry(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course_id: &str,
  ) -> Result<TimelineEntry> {
    let student_id = &order.student_id;
    let path = self
      .stores()
      .get_access_path(tx, student_id, course_id, false)
      .context_with(|| format!("get access path {student_id}/{course_id}"))?
      .ok_or_else(|| {
        Error::precondition(format!(
          "student {student_id} has no access path to course {course_id}"
        ))
      })?;

    let at = order.lookup_at();
    let package_id = path.package_id;
    self
      .stores()
      .get_entry_at(tx, package_id, at)
      .context_with(|| format!("get entry of package {package_id} at {at}"))?
      .ok_or_else(|| {
        Error::precondition(format!(
          "missing timeline entry of package {package_id} at {at} for order {}",
          order.order_id
        ))
      })
  }

  fn cancel_complete(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course_id: &str,
    target: TimelineEntry,
    position: Position,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let now = self.now();
    let mut tombstone = target.tombstone(&order.order_id, now);
    tombstone.recorded_by = order.recorded_by.clone();

    self.soft_delete_entry(tx, &target)?;
    if position == Position::Future {
      self.insert_entry(tx, &tombstone)?;
      return Ok(None);
    }

    let batch = WriteBatch::new().push("insert tombstone", || self.insert_entry(tx, &tombstone));
    match self.set_current(tx, target.package_id)? {
      Some(next) => {
        tracing::debug!(
          package_id = %target.package_id,
          entry_id = %next.entry_id,
          "successor takes over cancelled entry"
        );
        let projected = Projected::from_entry(&next, catalog)?;
        let audit = self.audit_record(
          &projected.package,
          course_id,
          AuditAction::Upsert,
          flow::CANCEL_ORDER,
          order.recorded_by.as_deref(),
        );
        self.run(self.write_projection(tx, batch, &projected, &audit))?;
        Ok(Some(projected.event()))
      }
      None => {
        let package = self.package_state(tx, &target)?;
        let audit = self.audit_record(
          &package,
          course_id,
          AuditAction::Canceled,
          flow::CANCEL_ORDER,
          order.recorded_by.as_deref(),
        );
        self.run(self.write_cancellation(tx, batch, &order.student_id, course_id, &audit))?;
        Ok(Some(inactive_event(&package, course_id, now)))
      }
    }
  }

  fn cancel_partial(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course_id: &str,
    target: TimelineEntry,
    position: Position,
  ) -> Result<Option<PackageChangeEvent>> {
    let end_at = Some(end_of_day(order.effective_at, order.timezone));
    let mut fork = target.fork(&order.order_id, self.now()).with_end(end_at);
    fork.recorded_by = order.recorded_by.clone();

    if position == Position::Future {
      let batch = WriteBatch::new()
        .push("delete entry", || self.soft_delete_entry(tx, &target))
        .push("insert shortened entry", || self.insert_entry(tx, &fork));
      self.run(batch)?;
      return Ok(None);
    }

    fork.is_current = true;
    let mut package = self.package_state(tx, &target)?;
    package.end_at = end_at;
    let audit = self.audit_record(
      &package,
      course_id,
      AuditAction::Update,
      flow::UPDATE_TIME,
      order.recorded_by.as_deref(),
    );
    let package_id = target.package_id;

    let batch = WriteBatch::new()
      .push("update package window", || {
        self
          .stores()
          .update_package_window(tx, package_id, end_at, self.now())
          .context_with(|| format!("update window of package {package_id}"))
      })
      .push("update course window", || {
        self
          .stores()
          .update_course_window(tx, package_id, course_id, end_at, self.now())
          .context_with(|| format!("update window of course {course_id} in package {package_id}"))
      })
      .push("delete entry", || self.soft_delete_entry(tx, &target))
      .push("insert shortened entry", || self.insert_entry(tx, &fork))
      .push("append audit", || self.append_audit(tx, &audit));
    self.run(batch)?;

    Ok(Some(active_event(&package)))
  }
}
