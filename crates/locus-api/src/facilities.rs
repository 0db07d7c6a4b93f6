//! Handlers for `/facilities` endpoints.

use axum::{
  Json,
  extract::{Path, RawQuery, State},
};
use locus_core::{
  facility::{CanonicalFacility, MergeRecord},
  filter,
  store::{Page, ReconcileStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /facilities[?q=...&countries=...&page=...]` — live records only.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  RawQuery(query): RawQuery,
) -> Result<Json<Page<CanonicalFacility>>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  let filter = filter::decode_with_page_size(
    query.as_deref().unwrap_or(""),
    state.default_page_size,
  );
  Ok(Json(state.store.list_facilities(&filter).await?))
}

/// `GET /facilities/{id}` — tombstoned records are returned too; check
/// `successor_id`.
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CanonicalFacility>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  let facility = state
    .store
    .get_facility(id)
    .await?
    .ok_or(locus_core::Error::FacilityNotFound(id))?;
  Ok(Json(facility))
}

#[derive(Debug, Deserialize)]
pub struct MergeBody {
  pub target_id: Uuid,
  pub source_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
  pub facility: CanonicalFacility,
  pub record:   MergeRecord,
}

/// `POST /facilities/merge` — body: `{"target_id":"...","source_id":"..."}`.
pub async fn merge<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<MergeBody>,
) -> Result<Json<MergeResponse>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  state.authorize()?;
  let (facility, record) = state
    .store
    .merge_facilities(body.target_id, body.source_id)
    .await?;
  Ok(Json(MergeResponse { facility, record }))
}
