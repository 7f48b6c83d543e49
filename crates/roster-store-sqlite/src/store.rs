//! [`SqliteStore`]: the SQLite implementation of [`TimelineService`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use roster_core::{
  Engine,
  audit::AuditRecord,
  engine::PromotionReport,
  entry::TimelineEntry,
  event::PackageChangeEvent,
  order::OrderItem,
  package::{AccessPath, CourseAssignment, PackageMetadata, PackageProjection, PackageType, QuantityType},
  service::TimelineService,
  store::{AccessPathStore, CourseAssignmentStore, PackageStore, TimelineStore},
};
use rusqlite::Connection;
use uuid::Uuid;

use crate::{Result, backend::SqliteBackend, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roster timeline store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  engine: Engine<SqliteBackend>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self {
      conn,
      engine: Engine::new(SqliteBackend),
    };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Replace the engine's clock.
  pub fn with_clock(self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
    Self {
      engine: Engine::with_clock(SqliteBackend, clock),
      ..self
    }
  }

  /// Run `f` inside one SQLite transaction, committing only if it succeeds.
  pub async fn transact<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Engine<SqliteBackend>, &Connection) -> roster_core::Result<T> + Send + 'static,
  {
    let engine = self.engine.clone();
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = f(&engine, &tx);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;
    Ok(outcome?)
  }

  /// Run `f` against the backend outside any explicit transaction.
  pub async fn with_backend<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&SqliteBackend, &Connection) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| Ok(f(&SqliteBackend, conn)))
      .await?
  }

  /// Audit trail of a package, oldest first.
  pub async fn list_audit(&self, package_id: Uuid) -> Result<Vec<AuditRecord>> {
    self
      .with_backend(move |backend, conn| backend.list_audit(conn, package_id))
      .await
  }
}

// ─── TimelineService impl ────────────────────────────────────────────────────

impl TimelineService for SqliteStore {
  type Error = crate::Error;

  async fn apply_order(&self, order: OrderItem) -> Result<Vec<PackageChangeEvent>> {
    self
      .transact(move |engine, conn| engine.apply_order(conn, &order))
      .await
  }

  async fn void_order(&self, order: OrderItem) -> Result<Vec<PackageChangeEvent>> {
    self
      .transact(move |engine, conn| engine.void_order(conn, &order))
      .await
  }

  async fn run_promotion(&self, lookahead: Duration) -> Result<PromotionReport> {
    let due = self
      .transact(move |engine, conn| engine.due_for_promotion(conn, lookahead))
      .await?;
    tracing::debug!(packages = due.len(), "promotion sweep started");

    let mut report = PromotionReport::default();
    for package_id in due {
      match self
        .transact(move |engine, conn| engine.promote_package(conn, package_id))
        .await
      {
        Ok(outcome) => report.record(package_id, outcome),
        Err(err) => {
          tracing::warn!(%package_id, error = %err, "promotion failed");
          let message = err.to_string();
          let recorded = message.clone();
          self
            .transact(move |engine, conn| {
              engine.record_promotion_failure(conn, package_id, &recorded)
            })
            .await?;
          report.record_failure(package_id, message);
        }
      }
    }

    tracing::info!(
      promoted = report.promoted.len(),
      unchanged = report.unchanged.len(),
      expired = report.expired.len(),
      failed = report.failed.len(),
      "promotion sweep finished"
    );
    Ok(report)
  }

  async fn get_package(&self, package_id: Uuid) -> Result<Option<PackageProjection>> {
    self
      .with_backend(move |backend, conn| backend.get_package(conn, package_id))
      .await
  }

  async fn get_timeline(&self, package_id: Uuid) -> Result<Vec<TimelineEntry>> {
    self
      .with_backend(move |backend, conn| backend.list_entries(conn, package_id))
      .await
  }

  async fn get_course_assignment(
    &self,
    package_id: Uuid,
    course_id: String,
  ) -> Result<Option<CourseAssignment>> {
    self
      .with_backend(move |backend, conn| backend.get_course_assignment(conn, package_id, &course_id))
      .await
  }

  async fn get_access_path(&self, student_id: String, course_id: String) -> Result<Option<AccessPath>> {
    self
      .with_backend(move |backend, conn| {
        backend.get_access_path(conn, &student_id, &course_id, false)
      })
      .await
  }

  async fn put_package_metadata(&self, metadata: PackageMetadata) -> Result<()> {
    self
      .with_backend(move |backend, conn| backend.put_package_metadata(conn, &metadata))
      .await
  }

  async fn put_quantity_type(&self, package_type: PackageType, quantity_type: QuantityType) -> Result<()> {
    self
      .with_backend(move |backend, conn| backend.put_quantity_type(conn, package_type, quantity_type))
      .await
  }
}
