//! Runtime pieces of the Roster server binary: configuration, the change
//! event sink it publishes through, and the daily promotion scheduler.

pub mod scheduler;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::NaiveTime;
use chrono_tz::Tz;
use roster_core::event::{ChangeEventSink, PackageChangeEvent};
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROSTER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub promotion:  PromotionConfig,
}

/// When and how far back the daily promotion sweep looks.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromotionConfig {
  pub enabled:         bool,
  /// Local wall-clock time of the sweep, `HH:MM`.
  pub run_at:          String,
  pub timezone:        Tz,
  pub lookahead_hours: i64,
}

impl Default for PromotionConfig {
  fn default() -> Self {
    Self {
      enabled:         true,
      run_at:          "02:00".into(),
      timezone:        Tz::UTC,
      lookahead_hours: 24,
    }
  }
}

impl PromotionConfig {
  pub fn run_at(&self) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(&self.run_at, "%H:%M")
      .with_context(|| format!("invalid promotion.run_at {:?}, expected HH:MM", self.run_at))
  }

  pub fn lookahead(&self) -> anyhow::Result<chrono::Duration> {
    anyhow::ensure!(
      self.lookahead_hours > 0,
      "promotion.lookahead_hours must be positive, got {}",
      self.lookahead_hours
    );
    Ok(chrono::Duration::hours(self.lookahead_hours))
  }
}

// ─── Event sink ───────────────────────────────────────────────────────────────

/// Publishes change events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl ChangeEventSink for TracingEventSink {
  fn publish(&self, event: &PackageChangeEvent) {
    tracing::info!(
      student_id = %event.student_id,
      package_id = %event.package_id,
      courses = ?event.course_ids,
      is_active = event.is_active,
      start_at = ?event.start_at,
      end_at = ?event.end_at,
      "package changed"
    );
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
