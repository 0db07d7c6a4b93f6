//! Handlers for `/lists/{list_id}/items` and `/items/{id}` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/lists/{list_id}/items` | Query string decoded by the filter codec |
//! | `POST` | `/lists/{list_id}/items` | Body: `[NewListItem]`; returns 201 + items |
//! | `GET`  | `/items/{id}` | Single item |
//! | `GET`  | `/items/{id}/matches` | All matches in candidate order |
//! | `POST` | `/items/{id}/geocode` | Body: [`GeocodeReport`] |
//! | `POST` | `/items/{id}/candidates` | Body: `[CandidateMatch]` |
//! | `POST` | `/items/{id}/matching-error` | Body: `{"error":"..."}` |
//! | `POST` | `/items/{id}/confirm` | Body: `{"match_id":"..."}` |
//! | `POST` | `/items/{id}/reject` | Body: `{"match_id":"..."}` |

use axum::{
  Json,
  extract::{Path, RawQuery, State},
  http::StatusCode,
  response::IntoResponse,
};
use locus_core::{
  filter,
  item::{FacilityListItem, NewListItem},
  matching::{CandidateMatch, GeocodeReport, Match},
  store::{Page, ReconcileStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List / create ────────────────────────────────────────────────────────────

/// `GET /lists/{list_id}/items[?q=...&countries=...&statuses=...&page=...]`
///
/// The raw query string goes through the filter codec, so decoding is
/// defensive: unknown keys and malformed numbers never fail the request.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Path(list_id): Path<Uuid>,
  RawQuery(query): RawQuery,
) -> Result<Json<Page<FacilityListItem>>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  let filter = filter::decode_with_page_size(
    query.as_deref().unwrap_or(""),
    state.default_page_size,
  );
  let page = state.store.list_items(list_id, &filter).await?;
  Ok(Json(page))
}

/// `POST /lists/{list_id}/items` — returns 201 + the stored items.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Path(list_id): Path<Uuid>,
  Json(rows): Json<Vec<NewListItem>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  let items = state.store.create_list_items(list_id, rows).await?;
  Ok((StatusCode::CREATED, Json(items)))
}

// ─── Get ─────────────────────────────────────────────────────────────────────

/// `GET /items/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<FacilityListItem>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  let item = state
    .store
    .get_item(id)
    .await?
    .ok_or(locus_core::Error::ItemNotFound(id))?;
  Ok(Json(item))
}

/// `GET /items/{id}/matches`
pub async fn list_matches<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Match>>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  Ok(Json(state.store.matches_for_item(id).await?))
}

// ─── Collaborator outcomes ───────────────────────────────────────────────────

/// `POST /items/{id}/geocode` — body is a tagged [`GeocodeReport`].
pub async fn geocode<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(report): Json<GeocodeReport>,
) -> Result<Json<FacilityListItem>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  Ok(Json(state.store.record_geocode(id, report).await?))
}

/// `POST /items/{id}/candidates` — body: `[CandidateMatch]`.
pub async fn candidates<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(candidates): Json<Vec<CandidateMatch>>,
) -> Result<Json<FacilityListItem>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  Ok(Json(state.store.record_candidates(id, candidates).await?))
}

#[derive(Debug, Deserialize)]
pub struct MatchingErrorBody {
  pub error: String,
}

/// `POST /items/{id}/matching-error`
pub async fn matching_error<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<MatchingErrorBody>,
) -> Result<Json<FacilityListItem>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  Ok(Json(state.store.record_matching_failure(id, body.error).await?))
}

// ─── Moderation ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MatchActionBody {
  pub match_id: Uuid,
}

/// `POST /items/{id}/confirm` — exclusive: sibling matches are rejected as
/// a side effect.
pub async fn confirm<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<MatchActionBody>,
) -> Result<Json<FacilityListItem>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  state.authorize()?;
  Ok(Json(state.store.confirm_match(id, body.match_id).await?))
}

/// `POST /items/{id}/reject`
pub async fn reject<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<MatchActionBody>,
) -> Result<Json<FacilityListItem>, ApiError>
where
  S: ReconcileStore<Error = locus_core::Error>,
{
  state.authorize()?;
  Ok(Json(state.store.reject_match(id, body.match_id).await?))
}
