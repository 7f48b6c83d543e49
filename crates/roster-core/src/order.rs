//! Order input: the already-validated data a mutator projects onto the
//! timeline.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  entry::Window,
  time::start_of_day,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderKind {
  New,
  Enrollment,
  Resume,
  Update,
  Withdrawal,
  Graduate,
  LeaveOfAbsence,
}

impl OrderKind {
  /// Kinds that enroll a student in new courses.
  pub fn is_creation(self) -> bool {
    matches!(self, Self::New | Self::Enrollment | Self::Resume)
  }

  /// Kinds that always terminate access.
  pub fn is_termination(self) -> bool {
    matches!(self, Self::Withdrawal | Self::Graduate | Self::LeaveOfAbsence)
  }
}

/// One course requested by an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseItem {
  pub course_id: String,
  #[serde(default)]
  pub name:      String,
  #[serde(default)]
  pub slots:     Option<i32>,
  #[serde(default)]
  pub weight:    Option<i32>,
}

impl CourseItem {
  /// True if this item requests the same quantity `origin` already has.
  /// Quantities the item leaves out are not compared.
  pub fn quantity_unchanged(&self, origin: &CourseItem) -> bool {
    self.slots.is_none_or(|slots| origin.slots == Some(slots))
      && self.weight.is_none_or(|weight| origin.weight == Some(weight))
  }
}

fn default_timezone() -> Tz { Tz::UTC }

/// A single product line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
  pub order_id:         String,
  pub kind:             OrderKind,
  /// Marks an `Update` order that removes the product.
  #[serde(default)]
  pub is_cancel:        bool,
  pub student_id:       String,
  pub location_id:      String,
  pub product_id:       String,
  pub effective_at:     DateTime<Utc>,
  #[serde(default = "default_timezone")]
  pub timezone:         Tz,
  /// Access window this order grants. A missing start defaults to the start
  /// of the effective day.
  #[serde(default)]
  pub start_at:         Option<DateTime<Utc>>,
  #[serde(default)]
  pub end_at:           Option<DateTime<Utc>>,
  /// Start of the product the order modifies, for cancels and updates.
  #[serde(default)]
  pub product_start_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub is_one_time:      bool,
  pub courses:          Vec<CourseItem>,
  /// Course set of the originating order, for updates.
  #[serde(default)]
  pub origin_courses:   Vec<CourseItem>,
  #[serde(default)]
  pub recorded_by:      Option<String>,
}

impl OrderItem {
  pub fn is_cancellation(&self) -> bool {
    self.kind.is_termination() || (self.kind == OrderKind::Update && self.is_cancel)
  }

  pub fn window(&self) -> Window {
    let start_at = self
      .start_at
      .unwrap_or_else(|| start_of_day(self.effective_at, self.timezone));
    Window::new(Some(start_at), self.end_at)
  }

  /// The instant whose covering entry a cancel or update acts on.
  pub fn lookup_at(&self) -> DateTime<Utc> {
    match (self.is_one_time, self.start_at) {
      (true, Some(start_at)) => start_at,
      _ => self.effective_at,
    }
  }

  /// A complete change takes effect from the product's origin; anything else
  /// only affects the remainder of the window.
  pub fn is_complete(&self) -> bool {
    self.is_one_time
      || self.product_start_at == Some(start_of_day(self.effective_at, self.timezone))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn item(kind: OrderKind) -> OrderItem {
    let now = Utc::now();
    OrderItem {
      order_id: "order-1".into(),
      kind,
      is_cancel: false,
      student_id: "student-1".into(),
      location_id: "location-1".into(),
      product_id: "product-1".into(),
      effective_at: now,
      timezone: chrono_tz::Asia::Tokyo,
      start_at: None,
      end_at: None,
      product_start_at: None,
      is_one_time: false,
      courses: vec![],
      origin_courses: vec![],
      recorded_by: None,
    }
  }

  #[test]
  fn complete_when_product_starts_on_effective_day() {
    let mut order = item(OrderKind::Withdrawal);
    order.product_start_at = Some(start_of_day(order.effective_at, order.timezone));
    assert!(order.is_complete());

    order.product_start_at = Some(order.effective_at - Duration::days(30));
    assert!(!order.is_complete());

    order.is_one_time = true;
    assert!(order.is_complete());
  }

  #[test]
  fn update_with_cancel_flag_is_cancellation() {
    let mut order = item(OrderKind::Update);
    assert!(!order.is_cancellation());
    order.is_cancel = true;
    assert!(order.is_cancellation());
    assert!(item(OrderKind::Graduate).is_cancellation());
  }

  #[test]
  fn quantity_comparison_ignores_unrequested_fields() {
    let origin = CourseItem {
      course_id: "c".into(),
      name:      String::new(),
      slots:     Some(3),
      weight:    Some(2),
    };
    let same = CourseItem { weight: None, ..origin.clone() };
    let more = CourseItem { slots: Some(5), ..origin.clone() };
    assert!(same.quantity_unchanged(&origin));
    assert!(!more.quantity_unchanged(&origin));
  }
}
