//! Timeline entry → package projection, course assignment and change event.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  entry::{TimelineEntry, Window},
  event::PackageChangeEvent,
  order::{CourseItem, OrderItem},
  package::{
    CourseAssignment, CourseInfo, CourseQuantity, PackageMetadata, PackageProjection,
    PackageProperties, QuantityType,
  },
  time::yesterday,
};

/// Catalog facts needed to derive a course assignment.
#[derive(Debug, Clone)]
pub struct Catalog {
  pub metadata:      PackageMetadata,
  pub quantity_type: QuantityType,
}

/// The read-models a timeline entry materialises as a package's now-state.
#[derive(Debug, Clone, PartialEq)]
pub struct Projected {
  pub package: PackageProjection,
  pub course:  CourseAssignment,
}

impl Projected {
  pub fn from_snapshot(mut snapshot: PackageProjection, catalog: &Catalog) -> Result<Self> {
    snapshot.is_active = true;
    let info = snapshot.properties.courses.first().ok_or_else(|| {
      Error::internal(format!(
        "snapshot of package {} lists no course",
        snapshot.package_id
      ))
    })?;

    let course = CourseAssignment {
      package_id:   snapshot.package_id,
      course_id:    info.course_id.clone(),
      student_id:   snapshot.student_id.clone(),
      location_id:  snapshot.location_ids.first().cloned().unwrap_or_default(),
      package_type: catalog.metadata.package_type,
      start_at:     snapshot.start_at,
      end_at:       snapshot.end_at,
      quantity:     CourseQuantity::select(catalog.quantity_type, info),
    };

    Ok(Self {
      package: snapshot,
      course,
    })
  }

  pub fn from_entry(entry: &TimelineEntry, catalog: &Catalog) -> Result<Self> {
    let snapshot = entry.snapshot.clone().ok_or_else(|| {
      Error::internal(format!("timeline entry {} has no snapshot", entry.entry_id))
    })?;
    Self::from_snapshot(snapshot, catalog)
  }

  /// Activation event for this now-state.
  pub fn event(&self) -> PackageChangeEvent { active_event(&self.package) }
}

/// Event announcing that `package` is active over its window.
pub fn active_event(package: &PackageProjection) -> PackageChangeEvent {
  PackageChangeEvent {
    student_id:   package.student_id.clone(),
    package_id:   package.package_id,
    course_ids:   package.course_ids(),
    is_active:    true,
    start_at:     package.start_at,
    end_at:       package.end_at,
    location_ids: package.location_ids.clone(),
  }
}

/// The projection a new entry for `course` carries as its snapshot.
pub fn snapshot_for_course(
  order: &OrderItem,
  package_id: Uuid,
  course: &CourseItem,
  window: Window,
) -> PackageProjection {
  let course_id = course.course_id.clone();
  PackageProjection {
    package_id,
    student_id: order.student_id.clone(),
    product_id: order.product_id.clone(),
    start_at: window.start_at,
    end_at: window.end_at,
    is_active: true,
    location_ids: vec![order.location_id.clone()],
    properties: PackageProperties {
      courses: vec![CourseInfo {
        course_id: course_id.clone(),
        name:      course.name.clone(),
        slots:     course.slots,
        weight:    course.weight,
      }],
      can_watch_video: vec![course_id.clone()],
      can_view_study_guide: vec![course_id.clone()],
      can_do_quiz: vec![course_id],
      ..PackageProperties::default()
    },
  }
}

/// Deactivation event for a package left without any current entry.
///
/// The window collapses to a single instant one day before `now` so that
/// consumers treat access as already over.
pub fn inactive_event(
  package: &PackageProjection,
  course_id: &str,
  now: DateTime<Utc>,
) -> PackageChangeEvent {
  let ended = Some(yesterday(now));
  PackageChangeEvent {
    student_id:   package.student_id.clone(),
    package_id:   package.package_id,
    course_ids:   vec![course_id.to_owned()],
    is_active:    false,
    start_at:     ended,
    end_at:       ended,
    location_ids: package.location_ids.clone(),
  }
}
