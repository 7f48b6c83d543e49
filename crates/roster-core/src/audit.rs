//! Audit records written alongside every projection change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::package::PackageProjection;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
  Upsert,
  Update,
  Canceled,
  Promoted,
  Voided,
}

/// Flow labels recorded with each audit entry.
pub mod flow {
  pub const CREATE_ORDER: &str = "create order";
  pub const CANCEL_ORDER: &str = "cancel order";
  pub const UPDATE_ORDER: &str = "update order";
  pub const UPDATE_TIME: &str = "update time";
  pub const VOID_ORDER: &str = "void order";
  pub const SCHEDULED_PROMOTION: &str = "scheduled promotion";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
  pub package_id:  Uuid,
  pub student_id:  String,
  pub course_id:   String,
  pub action:      AuditAction,
  pub flow:        String,
  pub snapshot:    PackageProjection,
  pub recorded_by: Option<String>,
  pub recorded_at: DateTime<Utc>,
}
