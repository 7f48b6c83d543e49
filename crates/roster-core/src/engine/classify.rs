//! Past / Current / Future classification.
//!
//! Absent window bounds are open, so an entry without a disambiguating bound
//! always counts as overlapping. Windows that touch exactly at a boundary
//! overlap too.

use chrono::{DateTime, Utc};

use crate::entry::{Position, TimelineEntry, Window};

/// Position of `candidate` relative to the package's `current` entry.
pub fn position(candidate: &TimelineEntry, current: Option<&TimelineEntry>) -> Position {
  if candidate.is_current {
    return Position::Current;
  }
  match current {
    Some(current) => relative(&candidate.window(), &current.window()),
    None => Position::Current,
  }
}

pub fn relative(candidate: &Window, current: &Window) -> Position {
  if candidate.ends_before(current) {
    Position::Past
  } else if candidate.starts_after(current) {
    Position::Future
  } else {
    Position::Current
  }
}

/// Position of a window that has no entry yet.
///
/// Returns `None` when the window overlaps the current entry, which would
/// enroll the student twice. Without a current entry the window is current
/// unless it is already over. A window that sorts before the current entry
/// still becomes current while it has not ended; one that sorts after becomes
/// current once the current entry has ended.
pub fn prospective(
  candidate: &Window,
  current: Option<&Window>,
  now: DateTime<Utc>,
) -> Option<Position> {
  let Some(current) = current else {
    if candidate.has_ended(now) {
      return Some(Position::Past);
    }
    return Some(Position::Current);
  };
  if candidate.ends_before(current) {
    if candidate.has_ended(now) {
      Some(Position::Past)
    } else {
      Some(Position::Current)
    }
  } else if candidate.starts_after(current) {
    if current.has_ended(now) {
      Some(Position::Current)
    } else {
      Some(Position::Future)
    }
  } else {
    None
  }
}
