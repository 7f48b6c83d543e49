//! The package change event and the sink it is published to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted whenever a mutation changes a package's "now" state.
///
/// Not produced for mutations that land in the future or are no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChangeEvent {
  pub student_id:   String,
  pub package_id:   Uuid,
  pub course_ids:   Vec<String>,
  pub is_active:    bool,
  pub start_at:     Option<DateTime<Utc>>,
  pub end_at:       Option<DateTime<Utc>>,
  pub location_ids: Vec<String>,
}

/// Downstream notification transport.
///
/// Callers publish only after the transaction that produced the events has
/// committed. Implementations report their own delivery failures.
pub trait ChangeEventSink: Send + Sync {
  fn publish(&self, event: &PackageChangeEvent);
}
