//! Daily promotion scheduler.
//!
//! Sleeps until the configured local run time, runs one promotion sweep and
//! publishes its events, then sleeps again. A failed sweep is logged and
//! retried at the next run time.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use roster_core::{engine::PromotionReport, event::ChangeEventSink, service::TimelineService};
use tokio::sync::watch;

use crate::PromotionConfig;

/// Fallback wait when the next run time cannot be resolved.
const FALLBACK_WAIT: std::time::Duration = std::time::Duration::from_secs(60 * 60);

pub struct PromotionScheduler<S> {
  service:   Arc<S>,
  events:    Arc<dyn ChangeEventSink>,
  run_at:    NaiveTime,
  timezone:  Tz,
  lookahead: Duration,
  shutdown:  watch::Receiver<bool>,
}

impl<S> PromotionScheduler<S>
where
  S: TimelineService + 'static,
{
  pub fn new(
    service: Arc<S>,
    events: Arc<dyn ChangeEventSink>,
    config: &PromotionConfig,
    shutdown: watch::Receiver<bool>,
  ) -> anyhow::Result<Self> {
    Ok(Self {
      service,
      events,
      run_at: config.run_at()?,
      timezone: config.timezone,
      lookahead: config.lookahead()?,
      shutdown,
    })
  }

  /// Main loop; returns once the shutdown signal fires.
  pub async fn run(mut self) {
    tracing::info!(run_at = %self.run_at, timezone = %self.timezone, "promotion scheduler started");

    loop {
      let wait = duration_until_next_run(Utc::now(), self.run_at, self.timezone);
      tracing::info!(minutes = wait.as_secs() / 60, "next promotion sweep scheduled");

      tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = self.shutdown.changed() => {
          tracing::info!("promotion scheduler received shutdown signal");
          return;
        }
      }

      self.sweep().await;
    }
  }

  /// Run one sweep and publish the events it produced.
  pub async fn sweep(&self) -> Option<PromotionReport> {
    match self.service.run_promotion(self.lookahead).await {
      Ok(report) => {
        for event in &report.events {
          self.events.publish(event);
        }
        if !report.failed.is_empty() {
          tracing::warn!(failed = report.failed.len(), "promotion sweep had failures");
        }
        Some(report)
      }
      Err(err) => {
        tracing::error!(error = %err, "promotion sweep failed");
        None
      }
    }
  }
}

/// Time from `now` until the next occurrence of `run_at` on the wall clock of
/// `tz`.
///
/// A run time that falls in a DST gap moves forward by an hour; an ambiguous
/// one resolves to its earlier instant.
pub fn duration_until_next_run(now: DateTime<Utc>, run_at: NaiveTime, tz: Tz) -> std::time::Duration {
  let local = now.with_timezone(&tz);
  let mut date = local.date_naive();
  if local.time() >= run_at {
    date += Duration::days(1);
  }

  let naive = date.and_time(run_at);
  let target = tz
    .from_local_datetime(&naive)
    .earliest()
    .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest());
  let Some(target) = target else {
    tracing::error!(%naive, %tz, "cannot resolve next promotion run time");
    return FALLBACK_WAIT;
  };

  (target.with_timezone(&Utc) - now)
    .to_std()
    .unwrap_or(FALLBACK_WAIT)
}
