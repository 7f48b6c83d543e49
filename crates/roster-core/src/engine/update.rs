//! Update-order mutator.
//!
//! Reconciles the update's course set against the originating order's:
//! added courses are enrolled, removed courses are cancelled, and courses
//! whose quantity changed are either replaced outright (complete update) or
//! split at the effective day (partial update). Every replacement links back
//! to the entry it displaced so a void can restore it.

use std::collections::{BTreeMap, HashSet};

use chrono::Duration;

use super::{Catalog, Engine, Projected, project::snapshot_for_course};
use crate::{
  Error, Result,
  audit::{AuditAction, flow},
  batch::WriteBatch,
  entry::{Position, TimelineEntry, Window},
  error::StoreContext as _,
  event::PackageChangeEvent,
  order::{CourseItem, OrderItem},
  store::Stores,
  time::{end_of_day, start_of_day},
};

impl<S: Stores> Engine<S> {
  pub fn update_order(&self, tx: &S::Tx, order: &OrderItem) -> Result<Vec<PackageChangeEvent>> {
    let catalog = self.catalog(tx, &order.product_id)?;
    let complete = order.is_complete();

    let mut origin: BTreeMap<&str, &CourseItem> = order
      .origin_courses
      .iter()
      .map(|course| (course.course_id.as_str(), course))
      .collect();
    let students = [order.student_id.clone()];
    let assigned: HashSet<String> = self
      .stores()
      .get_access_paths(tx, &students)
      .context_with(|| format!("get access paths of student {}", order.student_id))?
      .into_iter()
      .map(|path| path.course_id)
      .collect();

    let mut events = Vec::new();
    for course in &order.courses {
      let previous = origin.remove(course.course_id.as_str());
      let event = match previous {
        Some(previous) if assigned.contains(&course.course_id) => {
          if course.quantity_unchanged(previous) {
            tracing::debug!(
              order_id = %order.order_id,
              course_id = %course.course_id,
              "course quantity unchanged"
            );
            continue;
          }
          if complete {
            self.replace_course(tx, order, course, &catalog)?
          } else {
            self.split_course(tx, order, course, &catalog)?
          }
        }
        _ => self.create_course(tx, order, course, &catalog)?,
      };
      events.extend(event);
    }

    for course_id in origin.into_keys() {
      events.extend(self.cancel_course(tx, order, course_id, complete, &catalog)?);
    }
    Ok(events)
  }

  fn updatable_entry(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course: &CourseItem,
  ) -> Result<(TimelineEntry, Position)> {
    let target = self.covering_entry(tx, order, &course.course_id)?;
    let position = self.classify(tx, &target)?;
    tracing::debug!(
      order_id = %order.order_id,
      course_id = %course.course_id,
      entry_id = %target.entry_id,
      %position,
      "updating entry"
    );
    if position == Position::Past {
      return Err(Error::internal(format!(
        "order {} updates entry {} of package {} which already lies in the past",
        order.order_id, target.entry_id, target.package_id
      )));
    }
    Ok((target, position))
  }

  /// Complete update: a new entry with the new quantity takes the old one's
  /// place.
  fn replace_course(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course: &CourseItem,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let (target, position) = self.updatable_entry(tx, order, course)?;

    let window = order.window();
    let snapshot = snapshot_for_course(order, target.package_id, course, window);
    let mut replacement = TimelineEntry::new(
      target.package_id,
      &order.order_id,
      &course.course_id,
      window,
      self.now(),
    );
    replacement.recorded_by = order.recorded_by.clone();
    replacement.from_entry_id = Some(target.entry_id);
    replacement.snapshot = Some(snapshot.clone());
    replacement.is_current = position == Position::Current;

    let batch = WriteBatch::new()
      .push("delete entry", || self.soft_delete_entry(tx, &target))
      .push("insert replacement entry", || self.insert_entry(tx, &replacement));

    if position == Position::Future {
      self.run(batch)?;
      return Ok(None);
    }

    let projected = Projected::from_snapshot(snapshot, catalog)?;
    let audit = self.audit_record(
      &projected.package,
      &course.course_id,
      AuditAction::Upsert,
      flow::UPDATE_ORDER,
      order.recorded_by.as_deref(),
    );
    self.run(self.write_projection(tx, batch, &projected, &audit))?;
    Ok(Some(projected.event()))
  }

  /// Partial update: the old entry ends the day before the effective day and
  /// a linked successor carries the new quantity from the effective day on.
  fn split_course(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course: &CourseItem,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let (target, position) = self.updatable_entry(tx, order, course)?;
    let now = self.now();

    let cut_at = Some(end_of_day(
      order.effective_at - Duration::days(1),
      order.timezone,
    ));
    let mut shortened = target.clone().with_end(cut_at);
    shortened.updated_at = now;

    let window = Window::new(
      Some(start_of_day(order.effective_at, order.timezone)),
      target.end_at,
    );
    let mut successor = TimelineEntry::new(
      target.package_id,
      &order.order_id,
      &course.course_id,
      window,
      now,
    );
    successor.recorded_by = order.recorded_by.clone();
    successor.from_entry_id = Some(target.entry_id);
    successor.snapshot = Some(snapshot_for_course(
      order,
      target.package_id,
      course,
      window,
    ));

    let batch = WriteBatch::new()
      .push("shorten entry", || self.update_entry(tx, &shortened))
      .push("insert successor entry", || self.insert_entry(tx, &successor));

    if position == Position::Future {
      self.run(batch)?;
      return Ok(None);
    }

    let projected = Projected::from_entry(&shortened, catalog)?;
    let audit = self.audit_record(
      &projected.package,
      &course.course_id,
      AuditAction::Update,
      flow::UPDATE_ORDER,
      order.recorded_by.as_deref(),
    );
    self.run(self.write_projection(tx, batch, &projected, &audit))?;
    Ok(Some(projected.event()))
  }
}
