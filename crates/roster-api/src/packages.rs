//! Read endpoints for packages, their timelines and access paths.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/packages/{id}` | Package projection |
//! | `GET`  | `/packages/{id}/timeline` | Live timeline entries, by start |
//! | `GET`  | `/packages/{id}/courses/{course_id}` | Course assignment |
//! | `GET`  | `/students/{student_id}/courses/{course_id}/access` | Live access path |

use axum::{
  Json,
  extract::{Path, State},
};
use roster_core::{
  entry::TimelineEntry,
  package::{AccessPath, CourseAssignment, PackageProjection},
  service::TimelineService,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// `GET /packages/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PackageProjection>, ApiError>
where
  S: TimelineService,
{
  let package = state
    .service
    .get_package(id)
    .await
    .map_err(ApiError::service)?
    .ok_or_else(|| ApiError::NotFound(format!("package {id} not found")))?;
  Ok(Json(package))
}

/// `GET /packages/{id}/timeline`
pub async fn timeline<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEntry>>, ApiError>
where
  S: TimelineService,
{
  let entries = state
    .service
    .get_timeline(id)
    .await
    .map_err(ApiError::service)?;
  Ok(Json(entries))
}

/// `GET /packages/{id}/courses/{course_id}`
pub async fn course<S>(
  State(state): State<ApiState<S>>,
  Path((id, course_id)): Path<(Uuid, String)>,
) -> Result<Json<CourseAssignment>, ApiError>
where
  S: TimelineService,
{
  let assignment = state
    .service
    .get_course_assignment(id, course_id.clone())
    .await
    .map_err(ApiError::service)?
    .ok_or_else(|| ApiError::NotFound(format!("course {course_id} of package {id} not found")))?;
  Ok(Json(assignment))
}

/// `GET /students/{student_id}/courses/{course_id}/access`
pub async fn access<S>(
  State(state): State<ApiState<S>>,
  Path((student_id, course_id)): Path<(String, String)>,
) -> Result<Json<AccessPath>, ApiError>
where
  S: TimelineService,
{
  let path = state
    .service
    .get_access_path(student_id.clone(), course_id.clone())
    .await
    .map_err(ApiError::service)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "student {student_id} has no access to course {course_id}"
      ))
    })?;
  Ok(Json(path))
}
