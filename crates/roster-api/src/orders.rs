//! Handlers for `/orders` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/orders` | Body: [`OrderItem`]; returns the change events it produced |
//! | `POST` | `/orders/{order_id}/void` | Body: the [`OrderItem`] being voided |
//!
//! Events are handed to the sink only once the order's transaction has
//! committed.

use axum::{
  Json,
  extract::{Path, State},
};
use roster_core::{event::PackageChangeEvent, order::OrderItem, service::TimelineService};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

/// Response body of both order endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderOutcome {
  pub events: Vec<PackageChangeEvent>,
}

fn check(order: &OrderItem) -> Result<(), ApiError> {
  if order.order_id.trim().is_empty() {
    return Err(ApiError::BadRequest("order_id must not be empty".into()));
  }
  if order.student_id.trim().is_empty() {
    return Err(ApiError::BadRequest("student_id must not be empty".into()));
  }
  if order.courses.is_empty() && order.origin_courses.is_empty() {
    return Err(ApiError::BadRequest(format!(
      "order {} lists no courses",
      order.order_id
    )));
  }
  Ok(())
}

// ─── Apply ───────────────────────────────────────────────────────────────────

/// `POST /orders`
pub async fn apply<S>(
  State(state): State<ApiState<S>>,
  Json(order): Json<OrderItem>,
) -> Result<Json<OrderOutcome>, ApiError>
where
  S: TimelineService,
{
  check(&order)?;
  let order_id = order.order_id.clone();
  let events = state
    .service
    .apply_order(order)
    .await
    .map_err(ApiError::service)?;

  tracing::info!(%order_id, events = events.len(), "order applied");
  state.publish(&events);
  Ok(Json(OrderOutcome { events }))
}

// ─── Void ────────────────────────────────────────────────────────────────────

/// `POST /orders/{order_id}/void`
pub async fn void<S>(
  State(state): State<ApiState<S>>,
  Path(order_id): Path<String>,
  Json(order): Json<OrderItem>,
) -> Result<Json<OrderOutcome>, ApiError>
where
  S: TimelineService,
{
  if order.order_id != order_id {
    return Err(ApiError::BadRequest(format!(
      "path names order {order_id} but body carries order {}",
      order.order_id
    )));
  }
  check(&order)?;
  let events = state
    .service
    .void_order(order)
    .await
    .map_err(ApiError::service)?;

  tracing::info!(%order_id, events = events.len(), "order voided");
  state.publish(&events);
  Ok(Json(OrderOutcome { events }))
}
