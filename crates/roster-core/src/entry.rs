//! Timeline entries: scheduled intervals of package access.
//!
//! Every order that touches a package leaves one entry per course. Entries
//! form an undo chain through `from_entry_id`: an entry that replaced, split
//! or cancelled another points back at it, so a void can restore exactly the
//! state the order displaced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::package::PackageProjection;

// ─── Window ──────────────────────────────────────────────────────────────────

/// An access interval with inclusive bounds. Absent bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
  pub start_at: Option<DateTime<Utc>>,
  pub end_at:   Option<DateTime<Utc>>,
}

impl Window {
  pub fn new(start_at: Option<DateTime<Utc>>, end_at: Option<DateTime<Utc>>) -> Self {
    Self { start_at, end_at }
  }

  /// True if this window ends strictly before `other` starts.
  pub fn ends_before(&self, other: &Window) -> bool {
    matches!((self.end_at, other.start_at), (Some(end), Some(start)) if end < start)
  }

  /// True if this window starts strictly after `other` ends.
  pub fn starts_after(&self, other: &Window) -> bool {
    matches!((self.start_at, other.end_at), (Some(start), Some(end)) if start > end)
  }

  pub fn overlaps(&self, other: &Window) -> bool {
    !self.ends_before(other) && !self.starts_after(other)
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.start_at.is_none_or(|start| start <= at) && self.end_at.is_none_or(|end| at <= end)
  }

  pub fn has_ended(&self, at: DateTime<Utc>) -> bool {
    self.end_at.is_some_and(|end| end < at)
  }
}

// ─── Position ────────────────────────────────────────────────────────────────

/// Where an entry sits relative to its package's current entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Position {
  Past,
  Current,
  Future,
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// Now-state a new enrollment took over from when it became current on a
/// package whose own timeline had run out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Displaced {
  /// Entry still flagged current at the time; absent once promotion had
  /// already cleared the flag.
  pub entry_id:   Option<Uuid>,
  /// Projection the package held; absent when it only had backfilled
  /// history.
  pub projection: Option<PackageProjection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub entry_id:             Uuid,
  pub package_id:           Uuid,
  pub order_id:             String,
  pub course_id:            String,
  /// Acting user; absent for system actions.
  pub recorded_by:          Option<String>,
  /// Absent only on cancellation tombstones.
  pub start_at:             Option<DateTime<Utc>>,
  /// Absent means the access does not expire (or, on a tombstone, that
  /// there is no window at all).
  pub end_at:               Option<DateTime<Utc>>,
  pub is_current:           bool,
  /// The entry this one replaced, split or cancelled.
  pub from_entry_id:        Option<Uuid>,
  pub executed_by_schedule: bool,
  pub execution_error:      Option<String>,
  /// Package projection as of this entry.
  pub snapshot:             Option<PackageProjection>,
  /// What a void of this entry has to put back.
  pub displaced:            Option<Displaced>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl TimelineEntry {
  /// A fresh, non-current entry for `order_id` covering `window`.
  pub fn new(
    package_id: Uuid,
    order_id: impl Into<String>,
    course_id: impl Into<String>,
    window: Window,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      package_id,
      order_id: order_id.into(),
      course_id: course_id.into(),
      recorded_by: None,
      start_at: window.start_at,
      end_at: window.end_at,
      is_current: false,
      from_entry_id: None,
      executed_by_schedule: false,
      execution_error: None,
      snapshot: None,
      displaced: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn window(&self) -> Window { Window::new(self.start_at, self.end_at) }

  /// Tombstones carry no window; they only record which entry a complete
  /// cancellation removed.
  pub fn is_tombstone(&self) -> bool { self.start_at.is_none() }

  /// Copy of this entry under a new id, owned by `order_id` and linked back
  /// to this one.
  pub fn fork(&self, order_id: &str, now: DateTime<Utc>) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      order_id: order_id.to_owned(),
      is_current: false,
      from_entry_id: Some(self.entry_id),
      executed_by_schedule: false,
      execution_error: None,
      displaced: None,
      created_at: now,
      updated_at: now,
      ..self.clone()
    }
  }

  /// Windowless fork left behind by a complete cancellation.
  pub fn tombstone(&self, order_id: &str, now: DateTime<Utc>) -> Self {
    Self {
      start_at: None,
      end_at: None,
      ..self.fork(order_id, now)
    }
  }

  /// Set the end of both the entry and its snapshot.
  pub fn with_end(mut self, end_at: Option<DateTime<Utc>>) -> Self {
    self.end_at = end_at;
    if let Some(snapshot) = self.snapshot.as_mut() {
      snapshot.end_at = end_at;
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn touching_windows_overlap() {
    let now = Utc::now();
    let a = Window::new(Some(now - Duration::days(10)), Some(now));
    let b = Window::new(Some(now), Some(now + Duration::days(10)));
    assert!(a.overlaps(&b));
    assert!(!a.ends_before(&b));
    assert!(!b.starts_after(&a));
  }

  #[test]
  fn open_bounds_never_disambiguate() {
    let now = Utc::now();
    let open = Window::default();
    let closed = Window::new(Some(now), Some(now + Duration::days(1)));
    assert!(open.overlaps(&closed));
    assert!(open.contains(now - Duration::days(365)));
  }

  #[test]
  fn tombstone_links_back_without_window() {
    let now = Utc::now();
    let entry = TimelineEntry::new(
      Uuid::new_v4(),
      "order-1",
      "course-1",
      Window::new(Some(now), None),
      now,
    );
    let tomb = entry.tombstone("order-2", now);
    assert!(tomb.is_tombstone());
    assert_eq!(tomb.from_entry_id, Some(entry.entry_id));
    assert_eq!(tomb.order_id, "order-2");
    assert_ne!(tomb.entry_id, entry.entry_id);
  }

  #[test]
  fn fork_does_not_inherit_displaced_state() {
    let now = Utc::now();
    let mut entry = TimelineEntry::new(
      Uuid::new_v4(),
      "order-1",
      "course-1",
      Window::new(Some(now), None),
      now,
    );
    entry.displaced = Some(Displaced {
      entry_id:   Some(Uuid::new_v4()),
      projection: None,
    });
    assert!(entry.fork("order-2", now).displaced.is_none());
  }
}
