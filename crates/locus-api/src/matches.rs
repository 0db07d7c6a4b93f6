//! Handlers for `/matches` endpoints.

use axum::{
  Json,
  extract::{Path, State},
};
use locus_core::{
  facility::{CanonicalFacility, SplitRecord},
  matching::Match,
  store::ReconcileStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /matches/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Match>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  let m = state
    .store
    .get_match(id)
    .await?
    .ok_or(locus_core::Error::MatchNotFound(id))?;
  Ok(Json(m))
}

#[derive(Debug, Serialize)]
pub struct SplitResponse {
  pub facility: CanonicalFacility,
  pub record:   SplitRecord,
}

/// `POST /matches/{id}/split` — extracts the contribution behind a
/// confirmed match into a new canonical facility.
pub async fn split<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SplitResponse>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  state.authorize()?;
  let (facility, record) = state.store.split_match(id).await?;
  Ok(Json(SplitResponse { facility, record }))
}
