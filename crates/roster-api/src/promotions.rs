//! `POST /promotions/run`: run the promotion sweep on demand.
//!
//! Body: `{"lookahead_hours": 24}` (optional, defaults to 24). Returns the
//! sweep's [`PromotionReport`]; its events are published like an order's.

use axum::{Json, extract::State};
use chrono::Duration;
use roster_core::{engine::PromotionReport, service::TimelineService};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

const DEFAULT_LOOKAHEAD_HOURS: i64 = 24;

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
  pub lookahead_hours: Option<i64>,
}

pub async fn run<S>(
  State(state): State<ApiState<S>>,
  Json(params): Json<RunParams>,
) -> Result<Json<PromotionReport>, ApiError>
where
  S: TimelineService,
{
  let hours = params.lookahead_hours.unwrap_or(DEFAULT_LOOKAHEAD_HOURS);
  if hours <= 0 {
    return Err(ApiError::BadRequest(format!(
      "lookahead_hours must be positive, got {hours}"
    )));
  }
  let report = state
    .service
    .run_promotion(Duration::hours(hours))
    .await
    .map_err(ApiError::service)?;
  state.publish(&report.events);
  Ok(Json(report))
}
