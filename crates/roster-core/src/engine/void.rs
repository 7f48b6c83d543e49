//! Void compensator.
//!
//! Every mutation leaves exactly one entry per course tagged with its order
//! id, linked through `from_entry_id` to whatever it displaced. Voiding
//! deletes that entry, restores the linked one and re-derives the package's
//! now-state from whichever entry is current afterwards.
//!
//! A create that took over an ended timeline carries the now-state it
//! displaced, and a void of it puts that state back as it was.
//!
//! Voiding an order whose entry is already gone does nothing, so a repeated
//! void is harmless.

use std::collections::BTreeMap;

use super::{
  Catalog, Engine, Projected,
  project::inactive_event,
};
use crate::{
  Error, Result,
  audit::{AuditAction, flow},
  batch::WriteBatch,
  entry::{Displaced, Position, TimelineEntry},
  error::StoreContext as _,
  event::PackageChangeEvent,
  order::{CourseItem, OrderItem},
  store::Stores,
};

impl<S: Stores> Engine<S> {
  /// Undo everything `order` did when it was applied.
  pub fn void_order(&self, tx: &S::Tx, order: &OrderItem) -> Result<Vec<PackageChangeEvent>> {
    let catalog = self.catalog(tx, &order.product_id)?;
    let mut events = Vec::new();

    if order.kind.is_creation() || order.is_cancellation() {
      for course in &order.courses {
        events.extend(self.compensate_course(tx, order, &course.course_id, &catalog)?);
      }
      return Ok(events);
    }

    // Updates only touched courses that were added, removed or re-quantified.
    let mut origin: BTreeMap<&str, &CourseItem> = order
      .origin_courses
      .iter()
      .map(|course| (course.course_id.as_str(), course))
      .collect();
    for course in &order.courses {
      if let Some(previous) = origin.remove(course.course_id.as_str())
        && course.quantity_unchanged(previous)
      {
        continue;
      }
      events.extend(self.compensate_course(tx, order, &course.course_id, &catalog)?);
    }
    for course_id in origin.into_keys() {
      events.extend(self.compensate_course(tx, order, course_id, &catalog)?);
    }
    Ok(events)
  }

  fn compensate_course(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course_id: &str,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let student_id = &order.student_id;
    let path = self
      .stores()
      .get_access_path(tx, student_id, course_id, true)
      .context_with(|| format!("get access path {student_id}/{course_id}"))?
      .ok_or_else(|| {
        Error::precondition(format!(
          "student {student_id} never had an access path to course {course_id}"
        ))
      })?;
    let package_id = path.package_id;

    let Some(forward) = self
      .stores()
      .get_entry_for_order(tx, package_id, &order.order_id)
      .context_with(|| format!("get entry of order {} in package {package_id}", order.order_id))?
    else {
      tracing::debug!(
        order_id = %order.order_id,
        %package_id,
        "nothing left to void"
      );
      return Ok(None);
    };

    let forward_position = if forward.is_tombstone() {
      if forward.from_entry_id.is_none() {
        return Err(Error::internal(format!(
          "tombstone {} of package {package_id} cancels nothing",
          forward.entry_id
        )));
      }
      None
    } else {
      Some(self.classify(tx, &forward)?)
    };
    if forward_position == Some(Position::Past) {
      if forward.from_entry_id.is_some() {
        return Err(Error::internal(format!(
          "order {} left entry {} of package {package_id} in the past",
          order.order_id, forward.entry_id
        )));
      }
      // A backfilled enrollment only ever added history.
      tracing::debug!(
        order_id = %order.order_id,
        entry_id = %forward.entry_id,
        "voiding past entry"
      );
      self.soft_delete_entry(tx, &forward)?;
      return Ok(None);
    }

    if path.is_deleted() {
      self
        .stores()
        .revert_access_path(tx, student_id, course_id, self.now())
        .context_with(|| format!("revert access path {student_id}/{course_id}"))?;
    }

    let prior = match forward.from_entry_id {
      Some(prior_id) => Some(self.restore_prior(tx, &forward, prior_id)?),
      None => None,
    };
    let prior_position = match &prior {
      Some(prior) => Some(self.classify(tx, prior)?),
      None => None,
    };
    let position = compensation_position(forward_position, prior_position);
    tracing::debug!(
      order_id = %order.order_id,
      entry_id = %forward.entry_id,
      prior_id = ?forward.from_entry_id,
      %position,
      "voiding entry"
    );

    self.soft_delete_entry(tx, &forward)?;
    if position != Position::Current {
      return Ok(None);
    }

    match self.set_current(tx, package_id)? {
      Some(current) => {
        let projected = Projected::from_entry(&current, catalog)?;
        self.reproject(tx, order, course_id, &projected)
      }
      None => match &forward.displaced {
        Some(displaced) => self.restore_displaced(tx, order, &forward, displaced, catalog),
        None => self.remove_access(tx, order, &forward),
      },
    }
  }

  fn reproject(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course_id: &str,
    projected: &Projected,
  ) -> Result<Option<PackageChangeEvent>> {
    let audit = self.audit_record(
      &projected.package,
      course_id,
      AuditAction::Upsert,
      flow::VOID_ORDER,
      order.recorded_by.as_deref(),
    );
    self.run(self.write_projection(tx, WriteBatch::new(), projected, &audit))?;
    Ok(Some(projected.event()))
  }

  /// Put back the now-state a create took over from an ended timeline.
  fn restore_displaced(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    forward: &TimelineEntry,
    displaced: &Displaced,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let course_id = forward.course_id.as_str();
    if let Some(entry_id) = displaced.entry_id {
      let mut previous = self
        .stores()
        .get_entry(tx, entry_id)
        .context_with(|| format!("get entry {entry_id}"))?
        .ok_or_else(|| {
          Error::precondition(format!(
            "entry {entry_id} displaced by entry {} no longer exists",
            forward.entry_id
          ))
        })?;
      previous.is_current = true;
      self.update_entry(tx, &previous)?;
    }

    if let Some(projection) = &displaced.projection {
      let projected = Projected::from_snapshot(projection.clone(), catalog)?;
      return self.reproject(tx, order, course_id, &projected);
    }

    // Only backfilled history was left, which never projects.
    let package = self.package_state(tx, forward)?;
    let audit = self.audit_record(
      &package,
      course_id,
      AuditAction::Voided,
      flow::VOID_ORDER,
      order.recorded_by.as_deref(),
    );
    self.run(self.write_deactivation(tx, WriteBatch::new(), course_id, &audit))?;
    Ok(Some(inactive_event(&package, course_id, self.now())))
  }

  /// Withdraw the student's access that `forward` alone granted.
  fn remove_access(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    forward: &TimelineEntry,
  ) -> Result<Option<PackageChangeEvent>> {
    let student_id = order.student_id.as_str();
    let course_id = forward.course_id.as_str();
    let package_id = forward.package_id;
    let now = self.now();

    let stored = self
      .stores()
      .get_package(tx, package_id)
      .context_with(|| format!("get package {package_id}"))?;
    let Some(package) = stored else {
      // Backfilled history never projected anything.
      self
        .stores()
        .soft_delete_access_path(tx, student_id, course_id, now)
        .context_with(|| format!("soft delete access path {student_id}/{course_id}"))?;
      return Ok(None);
    };

    let audit = self.audit_record(
      &package,
      course_id,
      AuditAction::Voided,
      flow::VOID_ORDER,
      order.recorded_by.as_deref(),
    );
    self.run(self.write_cancellation(tx, WriteBatch::new(), student_id, course_id, &audit))?;
    Ok(Some(inactive_event(&package, course_id, now)))
  }

  /// Bring back the entry `forward` displaced.
  ///
  /// Replaced and cancelled entries were soft-deleted and come back as they
  /// were. A split entry was only shortened, so it gets its original end
  /// back from the successor.
  fn restore_prior(
    &self,
    tx: &S::Tx,
    forward: &TimelineEntry,
    prior_id: uuid::Uuid,
  ) -> Result<TimelineEntry> {
    self
      .stores()
      .revert_entry(tx, prior_id, self.now())
      .context_with(|| format!("revert entry {prior_id}"))?;
    let prior = self
      .stores()
      .get_entry(tx, prior_id)
      .context_with(|| format!("get entry {prior_id}"))?
      .ok_or_else(|| {
        Error::precondition(format!(
          "entry {prior_id} displaced by entry {} no longer exists",
          forward.entry_id
        ))
      })?;

    if !forward.window().starts_after(&prior.window()) {
      return Ok(prior);
    }
    let mut restored = prior.with_end(forward.end_at);
    restored.updated_at = self.now();
    self.update_entry(tx, &restored)?;
    Ok(restored)
  }
}

/// Which bucket a void falls in, given the forward entry's position (absent
/// for tombstones) and the restored entry's.
fn compensation_position(forward: Option<Position>, prior: Option<Position>) -> Position {
  match (forward, prior) {
    (Some(Position::Past), _) => Position::Past,
    (Some(Position::Current), _) | (_, Some(Position::Current)) => Position::Current,
    // The restored entry was the live one when the cancellation ran.
    (None, Some(Position::Past)) => Position::Current,
    (Some(Position::Future), _) | (None, Some(Position::Future)) => Position::Future,
    // A tombstone always links back, so it never arrives without a prior.
    (None, None) => Position::Current,
  }
}
