//! The `TimelineService` trait: the async seam outer layers depend on.
//!
//! A backend implements it by running each engine call inside one of its own
//! transactions. Higher layers (`roster-api`, `roster-server`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::Duration;
use uuid::Uuid;

use crate::{
  engine::PromotionReport,
  entry::TimelineEntry,
  error::AsErrorKind,
  event::PackageChangeEvent,
  order::OrderItem,
  package::{AccessPath, CourseAssignment, PackageMetadata, PackageProjection, PackageType, QuantityType},
};

/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TimelineService: Send + Sync {
  type Error: std::error::Error + AsErrorKind + Send + Sync + 'static;

  // ── Orders ────────────────────────────────────────────────────────────

  /// Apply an order atomically and return the change events it produced.
  fn apply_order(
    &self,
    order: OrderItem,
  ) -> impl Future<Output = Result<Vec<PackageChangeEvent>, Self::Error>> + Send + '_;

  /// Void a previously applied order atomically.
  fn void_order(
    &self,
    order: OrderItem,
  ) -> impl Future<Output = Result<Vec<PackageChangeEvent>, Self::Error>> + Send + '_;

  /// Promote every package that ended within the last `lookahead`, each in
  /// its own transaction. Per-package failures are reported, not returned.
  fn run_promotion(
    &self,
    lookahead: Duration,
  ) -> impl Future<Output = Result<PromotionReport, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_package(
    &self,
    package_id: Uuid,
  ) -> impl Future<Output = Result<Option<PackageProjection>, Self::Error>> + Send + '_;

  fn get_timeline(
    &self,
    package_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TimelineEntry>, Self::Error>> + Send + '_;

  fn get_course_assignment(
    &self,
    package_id: Uuid,
    course_id: String,
  ) -> impl Future<Output = Result<Option<CourseAssignment>, Self::Error>> + Send + '_;

  fn get_access_path(
    &self,
    student_id: String,
    course_id: String,
  ) -> impl Future<Output = Result<Option<AccessPath>, Self::Error>> + Send + '_;

  // ── Catalog ───────────────────────────────────────────────────────────

  fn put_package_metadata(
    &self,
    metadata: PackageMetadata,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn put_quantity_type(
    &self,
    package_type: PackageType,
    quantity_type: QuantityType,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
