//! JSON REST API for Roster.
//!
//! Exposes an axum [`Router`] backed by any
//! [`roster_core::service::TimelineService`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roster_api::api_router(store.clone(), sink))
//! ```

pub mod catalog;
pub mod error;
pub mod orders;
pub mod packages;
pub mod promotions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use roster_core::{
  event::{ChangeEventSink, PackageChangeEvent},
  service::TimelineService,
};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub service: Arc<S>,
  pub events:  Arc<dyn ChangeEventSink>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      service: Arc::clone(&self.service),
      events:  Arc::clone(&self.events),
    }
  }
}

impl<S> ApiState<S> {
  /// Hand committed change events to the sink.
  pub fn publish(&self, events: &[PackageChangeEvent]) {
    for event in events {
      self.events.publish(event);
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `service`, publishing change
/// events to `events`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: Arc<S>, events: Arc<dyn ChangeEventSink>) -> Router<()>
where
  S: TimelineService + 'static,
{
  Router::new()
    // Orders
    .route("/orders", post(orders::apply::<S>))
    .route("/orders/{order_id}/void", post(orders::void::<S>))
    // Promotion
    .route("/promotions/run", post(promotions::run::<S>))
    // Reads
    .route("/packages/{id}", get(packages::get_one::<S>))
    .route("/packages/{id}/timeline", get(packages::timeline::<S>))
    .route("/packages/{id}/courses/{course_id}", get(packages::course::<S>))
    .route(
      "/students/{student_id}/courses/{course_id}/access",
      get(packages::access::<S>),
    )
    // Catalog
    .route("/catalog/packages/{product_id}", put(catalog::put_package::<S>))
    .route(
      "/catalog/quantity-types/{package_type}",
      put(catalog::put_quantity_type::<S>),
    )
    .with_state(ApiState { service, events })
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{Duration, Utc};
  use roster_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  #[derive(Default)]
  struct RecordingSink {
    events: Mutex<Vec<PackageChangeEvent>>,
  }

  impl ChangeEventSink for RecordingSink {
    fn publish(&self, event: &PackageChangeEvent) {
      self.events.lock().unwrap().push(event.clone());
    }
  }

  impl RecordingSink {
    fn count(&self) -> usize { self.events.lock().unwrap().len() }
  }

  async fn app() -> (Router, Arc<RecordingSink>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let sink = Arc::new(RecordingSink::default());
    let router = api_router(Arc::new(store), sink.clone());

    let (status, _) = send(
      router.clone(),
      "PUT",
      "/catalog/packages/weekly-math",
      Some(json!({ "name": "Weekly maths", "package_type": "FREQUENCY" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(
      router.clone(),
      "PUT",
      "/catalog/quantity-types/FREQUENCY",
      Some(json!({ "quantity_type": "SLOT_PER_WEEK" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    (router, sink)
  }

  async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(value) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(value.to_string())
      }
      None => Body::empty(),
    };
    let resp = router.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn new_order(order_id: &str, start_days: i64, end_days: i64) -> Value {
    let now = Utc::now();
    json!({
      "order_id": order_id,
      "kind": "new",
      "student_id": "student-1",
      "location_id": "location-1",
      "product_id": "weekly-math",
      "effective_at": now + Duration::days(start_days),
      "timezone": "Asia/Ho_Chi_Minh",
      "start_at": now + Duration::days(start_days),
      "end_at": now + Duration::days(end_days),
      "courses": [{ "course_id": "math", "name": "Maths", "slots": 2 }],
    })
  }

  // ── Orders ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn apply_order_returns_and_publishes_events() {
    let (router, sink) = app().await;
    let (status, body) = send(router.clone(), "POST", "/orders", Some(new_order("order-1", -1, 30))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["is_active"], json!(true));
    assert_eq!(sink.count(), 1);

    let (status, path) = send(
      router.clone(),
      "GET",
      "/students/student-1/courses/math/access",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let package_id = path["package_id"].as_str().unwrap().to_string();
    assert_eq!(events[0]["package_id"], json!(package_id));

    let (status, package) = send(router.clone(), "GET", &format!("/packages/{package_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(package["student_id"], json!("student-1"));

    let (status, course) = send(
      router.clone(),
      "GET",
      &format!("/packages/{package_id}/courses/math"),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(course["quantity"], json!({ "kind": "slot_per_week", "value": 2 }));

    let (status, timeline) =
      send(router, "GET", &format!("/packages/{package_id}/timeline"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn overlapping_order_is_conflict() {
    let (router, sink) = app().await;
    send(router.clone(), "POST", "/orders", Some(new_order("order-1", -1, 30))).await;

    let (status, body) = send(router, "POST", "/orders", Some(new_order("order-2", 5, 40))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("overlaps"));
    assert_eq!(sink.count(), 1);
  }

  #[tokio::test]
  async fn order_without_courses_is_bad_request() {
    let (router, _) = app().await;
    let mut order = new_order("order-1", -1, 30);
    order["courses"] = json!([]);
    let (status, _) = send(router, "POST", "/orders", Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn void_removes_access() {
    let (router, sink) = app().await;
    let order = new_order("order-1", -1, 30);
    send(router.clone(), "POST", "/orders", Some(order.clone())).await;

    let (status, body) = send(router.clone(), "POST", "/orders/order-1/void", Some(order)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["events"][0]["is_active"], json!(false));
    assert_eq!(sink.count(), 2);

    let (status, _) = send(
      router,
      "GET",
      "/students/student-1/courses/math/access",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn void_path_must_match_body() {
    let (router, _) = app().await;
    let (status, _) = send(
      router,
      "POST",
      "/orders/order-2/void",
      Some(new_order("order-1", -1, 30)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Reads & catalog ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_package_is_not_found() {
    let (router, _) = app().await;
    let (status, body) = send(
      router,
      "GET",
      "/packages/00000000-0000-0000-0000-000000000000",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn unknown_package_type_is_bad_request() {
    let (router, _) = app().await;
    let (status, _) = send(
      router,
      "PUT",
      "/catalog/quantity-types/MONTHLY",
      Some(json!({ "quantity_type": "SLOT" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Promotion ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn promotion_run_reports_nothing_due() {
    let (router, sink) = app().await;
    send(router.clone(), "POST", "/orders", Some(new_order("order-1", -1, 30))).await;

    let (status, report) = send(
      router,
      "POST",
      "/promotions/run",
      Some(json!({ "lookahead_hours": 12 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["promoted"], json!([]));
    assert_eq!(report["failed"], json!([]));
    assert_eq!(sink.count(), 1);
  }

  #[tokio::test]
  async fn promotion_rejects_non_positive_lookahead() {
    let (router, _) = app().await;
    let (status, _) = send(
      router,
      "POST",
      "/promotions/run",
      Some(json!({ "lookahead_hours": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
}
