//! Catalog maintenance.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/catalog/packages/{product_id}` | Body: [`PackageBody`]; 204 |
//! | `PUT`  | `/catalog/quantity-types/{package_type}` | Body: `{"quantity_type":"SLOT"}`; 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use roster_core::{
  package::{PackageMetadata, PackageType, QuantityType},
  service::TimelineService,
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PackageBody {
  pub name:         String,
  pub package_type: PackageType,
  #[serde(default)]
  pub start_at:     Option<DateTime<Utc>>,
  #[serde(default)]
  pub end_at:       Option<DateTime<Utc>>,
}

/// `PUT /catalog/packages/{product_id}`
pub async fn put_package<S>(
  State(state): State<ApiState<S>>,
  Path(product_id): Path<String>,
  Json(body): Json<PackageBody>,
) -> Result<StatusCode, ApiError>
where
  S: TimelineService,
{
  let metadata = PackageMetadata {
    product_id,
    name: body.name,
    package_type: body.package_type,
    start_at: body.start_at,
    end_at: body.end_at,
  };
  state
    .service
    .put_package_metadata(metadata)
    .await
    .map_err(ApiError::service)?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QuantityBody {
  pub quantity_type: QuantityType,
}

/// `PUT /catalog/quantity-types/{package_type}`
pub async fn put_quantity_type<S>(
  State(state): State<ApiState<S>>,
  Path(package_type): Path<String>,
  Json(body): Json<QuantityBody>,
) -> Result<StatusCode, ApiError>
where
  S: TimelineService,
{
  let package_type: PackageType = package_type
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("unknown package type {package_type:?}")))?;
  state
    .service
    .put_quantity_type(package_type, body.quantity_type)
    .await
    .map_err(ApiError::service)?;
  Ok(StatusCode::NO_CONTENT)
}
