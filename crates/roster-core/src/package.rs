//! Package read-models and catalog metadata.
//!
//! A *student package* is one student's access to one course through a
//! purchased product. Its materialised "now" state lives in a
//! [`PackageProjection`] plus a per-course [`CourseAssignment`]; both are
//! overwritten in place whenever a mutation changes the current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Package projection ──────────────────────────────────────────────────────

/// Current state of a student's access to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageProjection {
  pub package_id:   Uuid,
  pub student_id:   String,
  /// Package definition (catalog product) this access was bought through.
  pub product_id:   String,
  pub start_at:     Option<DateTime<Utc>>,
  /// Absent means the access does not expire.
  pub end_at:       Option<DateTime<Utc>>,
  pub is_active:    bool,
  pub location_ids: Vec<String>,
  pub properties:   PackageProperties,
}

impl PackageProjection {
  pub fn course_ids(&self) -> Vec<String> {
    self
      .properties
      .courses
      .iter()
      .map(|c| c.course_id.clone())
      .collect()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageProperties {
  pub courses:              Vec<CourseInfo>,
  #[serde(default)]
  pub can_watch_video:      Vec<String>,
  #[serde(default)]
  pub can_view_study_guide: Vec<String>,
  #[serde(default)]
  pub can_do_quiz:          Vec<String>,
  #[serde(default)]
  pub limit_online_lesson:  i32,
  #[serde(default)]
  pub ask_tutor:            Option<AskTutor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
  pub course_id: String,
  #[serde(default)]
  pub name:      String,
  pub slots:     Option<i32>,
  pub weight:    Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskTutor {
  pub total_question_limit: i32,
  pub limit_duration:       String,
}

// ─── Course assignment ───────────────────────────────────────────────────────

/// Per-(package, course) window and billing quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAssignment {
  pub package_id:   Uuid,
  pub course_id:    String,
  pub student_id:   String,
  pub location_id:  String,
  pub package_type: PackageType,
  pub start_at:     Option<DateTime<Utc>>,
  pub end_at:       Option<DateTime<Utc>>,
  pub quantity:     Option<CourseQuantity>,
}

/// The single billing quantity of a course assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CourseQuantity {
  Slot(i32),
  SlotPerWeek(i32),
  Weight(i32),
}

impl CourseQuantity {
  /// Pick the quantity from `info` that `quantity_type` bills by.
  pub fn select(quantity_type: QuantityType, info: &CourseInfo) -> Option<Self> {
    match quantity_type {
      QuantityType::Slot => info.slots.map(Self::Slot),
      QuantityType::SlotPerWeek => info.slots.map(Self::SlotPerWeek),
      QuantityType::CourseWeight => info.weight.map(Self::Weight),
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageType {
  OneTime,
  SlotBased,
  Frequency,
  Scheduled,
}

/// Which course quantity a package type bills by.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QuantityType {
  Slot,
  SlotPerWeek,
  CourseWeight,
}

/// Read-only catalog entry for a package product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
  pub product_id:   String,
  pub name:         String,
  pub package_type: PackageType,
  /// Fixed access window of one-time packages.
  pub start_at:     Option<DateTime<Utc>>,
  pub end_at:       Option<DateTime<Utc>>,
}

// ─── Access path ─────────────────────────────────────────────────────────────

/// Lookup row from (student, course) to the package governing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPath {
  pub student_id:  String,
  pub course_id:   String,
  pub package_id:  Uuid,
  pub location_id: String,
  /// Set once the assignment has been fully removed.
  pub deleted_at:  Option<DateTime<Utc>>,
}

impl AccessPath {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  fn info(slots: Option<i32>, weight: Option<i32>) -> CourseInfo {
    CourseInfo {
      course_id: "course-1".into(),
      name: "Algebra".into(),
      slots,
      weight,
    }
  }

  #[test]
  fn quantity_follows_quantity_type() {
    let info = info(Some(4), Some(9));
    assert_eq!(
      CourseQuantity::select(QuantityType::Slot, &info),
      Some(CourseQuantity::Slot(4))
    );
    assert_eq!(
      CourseQuantity::select(QuantityType::SlotPerWeek, &info),
      Some(CourseQuantity::SlotPerWeek(4))
    );
    assert_eq!(
      CourseQuantity::select(QuantityType::CourseWeight, &info),
      Some(CourseQuantity::Weight(9))
    );
  }

  #[test]
  fn missing_quantity_is_none() {
    assert_eq!(
      CourseQuantity::select(QuantityType::CourseWeight, &info(Some(2), None)),
      None
    );
  }

  #[test]
  fn catalog_enums_use_upper_snake_names() {
    assert_eq!(QuantityType::SlotPerWeek.as_ref(), "SLOT_PER_WEEK");
    assert_eq!(
      PackageType::from_str("ONE_TIME").unwrap(),
      PackageType::OneTime
    );
    assert_eq!(
      serde_json::to_string(&QuantityType::CourseWeight).unwrap(),
      "\"COURSE_WEIGHT\""
    );
  }
}
