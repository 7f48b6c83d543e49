//! Create-order mutator.

use uuid::Uuid;

use super::{Catalog, Engine, Projected, project::snapshot_for_course};
use crate::{
  Result,
  audit::{AuditAction, flow},
  batch::WriteBatch,
  entry::{Displaced, Position, TimelineEntry},
  error::StoreContext as _,
  event::PackageChangeEvent,
  order::{CourseItem, OrderItem},
  package::AccessPath,
  store::Stores,
};

impl<S: Stores> Engine<S> {
  /// Enroll the order's student in every course the order lists.
  ///
  /// A course the student already has access to lands on that package's
  /// timeline; any other course gets a fresh package and access path.
  pub fn create_order(&self, tx: &S::Tx, order: &OrderItem) -> Result<Vec<PackageChangeEvent>> {
    let catalog = self.catalog(tx, &order.product_id)?;
    let mut events = Vec::new();
    for course in &order.courses {
      events.extend(self.create_course(tx, order, course, &catalog)?);
    }
    Ok(events)
  }

  pub(crate) fn create_course(
    &self,
    tx: &S::Tx,
    order: &OrderItem,
    course: &CourseItem,
    catalog: &Catalog,
  ) -> Result<Option<PackageChangeEvent>> {
    let existing = self
      .stores()
      .get_access_path(tx, &order.student_id, &course.course_id, false)
      .context_with(|| {
        format!(
          "get access path {}/{}",
          order.student_id, course.course_id
        )
      })?;
    let is_new = existing.is_none();
    let package_id = existing
      .as_ref()
      .map_or_else(Uuid::new_v4, |path| path.package_id);

    let window = order.window();
    let position = self.classify_window(tx, package_id, &window, &order.order_id)?;
    tracing::debug!(
      order_id = %order.order_id,
      course_id = %course.course_id,
      %package_id,
      %position,
      is_new,
      "classified new enrollment"
    );

    if position == Position::Past && !is_new {
      tracing::warn!(
        order_id = %order.order_id,
        %package_id,
        "skipping past enrollment on an existing assignment"
      );
      return Ok(None);
    }

    let snapshot = snapshot_for_course(order, package_id, course, window);
    let mut entry = TimelineEntry::new(
      package_id,
      &order.order_id,
      &course.course_id,
      window,
      self.now(),
    );
    entry.recorded_by = order.recorded_by.clone();
    entry.snapshot = Some(snapshot.clone());
    entry.is_current = position == Position::Current;
    if entry.is_current && !is_new {
      entry.displaced = Some(self.displaced_state(tx, package_id)?);
    }

    let path = AccessPath {
      student_id:  order.student_id.clone(),
      course_id:   course.course_id.clone(),
      package_id,
      location_id: order.location_id.clone(),
      deleted_at:  None,
    };

    let projected = match position {
      Position::Current => Some(Projected::from_snapshot(snapshot, catalog)?),
      Position::Past | Position::Future => None,
    };
    let audit = projected.as_ref().map(|projected| {
      self.audit_record(
        &projected.package,
        &course.course_id,
        AuditAction::Upsert,
        flow::CREATE_ORDER,
        order.recorded_by.as_deref(),
      )
    });

    let mut batch = WriteBatch::new();
    if let (Some(projected), Some(audit)) = (&projected, &audit) {
      batch = self.write_projection(tx, batch, projected, audit);
    }
    let batch = batch
      .push("insert entry", || self.insert_entry(tx, &entry))
      .push_if(is_new, "insert access path", || {
        self
          .stores()
          .insert_access_path(tx, &path, self.now())
          .context_with(|| {
            format!(
              "insert access path {}/{}",
              path.student_id, path.course_id
            )
          })
      });
    self.run(batch)?;

    Ok(projected.map(|projected| projected.event()))
  }

  /// Now-state of `package_id` before a new entry takes over as current.
  fn displaced_state(&self, tx: &S::Tx, package_id: Uuid) -> Result<Displaced> {
    let entry_id = self
      .current_entry(tx, package_id)?
      .map(|current| current.entry_id);
    let projection = self
      .stores()
      .get_package(tx, package_id)
      .context_with(|| format!("get package {package_id}"))?;
    Ok(Displaced {
      entry_id,
      projection,
    })
  }
}
