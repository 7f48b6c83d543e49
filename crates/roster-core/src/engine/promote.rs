//! Scheduled promotion of future entries whose time has come.
//!
//! The sweep is split into steps so that a caller can run each package in its
//! own transaction: list the due packages, promote them one by one, and
//! record failures on the package's current entry.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Engine, Projected};
use crate::{
  Error, Result,
  audit::{AuditAction, flow},
  batch::WriteBatch,
  entry::Window,
  error::StoreContext as _,
  event::PackageChangeEvent,
  store::Stores,
};

/// What promotion did to one package.
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionOutcome {
  /// A successor became current and the projections were re-materialised.
  Promoted {
    entry_id: Uuid,
    event:    PackageChangeEvent,
  },
  /// The current entry is still running.
  Unchanged,
  /// Nothing follows the ended entry; the package stays expired.
  Expired,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
  pub promoted:  Vec<Uuid>,
  pub unchanged: Vec<Uuid>,
  pub expired:   Vec<Uuid>,
  pub failed:    Vec<PromotionFailure>,
  pub events:    Vec<PackageChangeEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionFailure {
  pub package_id: Uuid,
  pub error:      String,
}

impl PromotionReport {
  pub fn record(&mut self, package_id: Uuid, outcome: PromotionOutcome) {
    match outcome {
      PromotionOutcome::Promoted { event, .. } => {
        self.promoted.push(package_id);
        self.events.push(event);
      }
      PromotionOutcome::Unchanged => self.unchanged.push(package_id),
      PromotionOutcome::Expired => self.expired.push(package_id),
    }
  }

  pub fn record_failure(&mut self, package_id: Uuid, error: impl ToString) {
    self.failed.push(PromotionFailure {
      package_id,
      error: error.to_string(),
    });
  }
}

impl<S: Stores> Engine<S> {
  /// Packages whose projection ended within the last `lookahead`.
  pub fn due_for_promotion(&self, tx: &S::Tx, lookahead: Duration) -> Result<Vec<Uuid>> {
    let now = self.now();
    let from = now - lookahead;
    self
      .stores()
      .list_expiring_packages(tx, from, now)
      .context_with(|| format!("list packages expiring between {from} and {now}"))
  }

  /// Make the entry that follows the package's expiring one current.
  pub fn promote_package(&self, tx: &S::Tx, package_id: Uuid) -> Result<PromotionOutcome> {
    let package = self
      .stores()
      .get_package(tx, package_id)
      .context_with(|| format!("get package {package_id}"))?
      .ok_or_else(|| Error::precondition(format!("package {package_id} has no projection")))?;
    let expiring = Window::new(package.start_at, package.end_at);

    let Some(next) = self.set_current(tx, package_id)? else {
      tracing::info!(%package_id, "package expired with no successor");
      return Ok(PromotionOutcome::Expired);
    };
    if !next.window().starts_after(&expiring) {
      return Ok(PromotionOutcome::Unchanged);
    }

    let catalog = self.catalog(tx, &package.product_id)?;
    let projected = Projected::from_entry(&next, &catalog)?;
    let audit = self.audit_record(
      &projected.package,
      &next.course_id,
      AuditAction::Promoted,
      flow::SCHEDULED_PROMOTION,
      None,
    );
    let entry_id = next.entry_id;
    let batch = self
      .write_projection(tx, WriteBatch::new(), &projected, &audit)
      .push("record execution", || {
        self
          .stores()
          .record_execution(tx, entry_id, None, self.now())
          .context_with(|| format!("record execution of entry {entry_id}"))
      });
    self.run(batch)?;

    tracing::info!(%package_id, %entry_id, "promoted successor entry");
    Ok(PromotionOutcome::Promoted {
      entry_id,
      event: projected.event(),
    })
  }

  /// Note a failed promotion on the package's current entry.
  pub fn record_promotion_failure(&self, tx: &S::Tx, package_id: Uuid, error: &str) -> Result<()> {
    let Some(current) = self.current_entry(tx, package_id)? else {
      return Ok(());
    };
    self
      .stores()
      .record_execution(tx, current.entry_id, Some(error), self.now())
      .context_with(|| format!("record execution error of entry {}", current.entry_id))
  }
}
