//! JSON REST API for the Locus reconciliation engine.
//!
//! Exposes an axum [`Router`] backed by any
//! [`locus_core::store::ReconcileStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility; the only policy hook the engine itself
//! carries is [`policy::ModerationPolicy`].
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", locus_api::api_router(state.clone()))
//! ```

pub mod error;
pub mod facilities;
pub mod items;
pub mod matches;
pub mod policy;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use locus_core::store::ReconcileStore;

pub use error::ApiError;
use policy::ModerationPolicy;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:             Arc<S>,
  pub policy:            Arc<dyn ModerationPolicy>,
  /// Page size used when the query string does not specify one.
  pub default_page_size: u32,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:             Arc::clone(&self.store),
      policy:            Arc::clone(&self.policy),
      default_page_size: self.default_page_size,
    }
  }
}

impl<S> AppState<S> {
  /// Consult the moderation policy before a mutating operation.
  pub fn authorize(&self) -> Result<(), ApiError> {
    if self.policy.allow_moderate() {
      Ok(())
    } else {
      Err(ApiError::Forbidden("moderation not permitted".to_string()))
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router
/// regardless of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: ReconcileStore<Error = locus_core::Error> + 'static,
{
  Router::new()
    // List items
    .route(
      "/lists/{list_id}/items",
      get(items::list::<S>).post(items::create::<S>),
    )
    .route("/items/{id}", get(items::get_one::<S>))
    .route("/items/{id}/matches", get(items::list_matches::<S>))
    .route("/items/{id}/geocode", post(items::geocode::<S>))
    .route("/items/{id}/candidates", post(items::candidates::<S>))
    .route("/items/{id}/matching-error", post(items::matching_error::<S>))
    .route("/items/{id}/confirm", post(items::confirm::<S>))
    .route("/items/{id}/reject", post(items::reject::<S>))
    // Matches
    .route("/matches/{id}", get(matches::get_one::<S>))
    .route("/matches/{id}/split", post(matches::split::<S>))
    // Facilities
    .route(
      "/facilities",
      get(facilities::list::<S>),
    )
    .route("/facilities/{id}", get(facilities::get_one::<S>))
    .route("/facilities/merge", post(facilities::merge::<S>))
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use locus_core::{
    facility::CanonicalFacility,
    item::{FacilityListItem, ItemStatus},
    store::Page,
  };
  use locus_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use crate::policy::{AllowAll, ModerationPolicy};

  struct DenyAll;
  impl ModerationPolicy for DenyAll {
    fn allow_moderate(&self) -> bool { false }
  }

  async fn make_state(
    policy: Arc<dyn ModerationPolicy>,
  ) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState { store: Arc::new(store), policy, default_page_size: 20 }
  }

  async fn send(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let req = builder.body(body).unwrap();
    api_router(state).oneshot(req).await.unwrap()
  }

  async fn body_json<T: serde::de::DeserializeOwned>(
    resp: axum::response::Response,
  ) -> T {
    let bytes =
      axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn rows() -> Value {
    json!([{
      "row_index": 1,
      "country_code": "DE",
      "raw_name": "Werk Eins",
      "raw_address": "Industriestr. 1, Essen"
    }])
  }

  /// Drive one item through ingest → geocode → zero-candidate resolution
  /// and return it, now backed by a fresh facility.
  async fn resolved_item(state: &AppState<SqliteStore>) -> FacilityListItem {
    let list_id = Uuid::new_v4();
    let resp = send(
      state.clone(),
      "POST",
      &format!("/lists/{list_id}/items"),
      Some(rows()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let items: Vec<FacilityListItem> = body_json(resp).await;

    let id = items[0].item_id;
    let resp = send(
      state.clone(),
      "POST",
      &format!("/items/{id}/geocode"),
      Some(json!({ "outcome": "located", "location": { "lat": 51.45, "lng": 7.01 } })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
      state.clone(),
      "POST",
      &format!("/items/{id}/candidates"),
      Some(json!([])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
  }

  // ── Moderation flow ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn confirm_flow_over_http() {
    let state = make_state(Arc::new(AllowAll)).await;

    // Two existing facilities to match against.
    let f1 = resolved_item(&state).await.resolved_facility_id.unwrap();
    let f2 = resolved_item(&state).await.resolved_facility_id.unwrap();

    // A third item with two candidates.
    let list_id = Uuid::new_v4();
    let resp = send(
      state.clone(),
      "POST",
      &format!("/lists/{list_id}/items"),
      Some(rows()),
    )
    .await;
    let items: Vec<FacilityListItem> = body_json(resp).await;
    let id = items[0].item_id;

    send(
      state.clone(),
      "POST",
      &format!("/items/{id}/geocode"),
      Some(json!({ "outcome": "located", "location": { "lat": 51.0, "lng": 7.0 } })),
    )
    .await;
    let resp = send(
      state.clone(),
      "POST",
      &format!("/items/{id}/candidates"),
      Some(json!([
        { "facility_id": f1, "candidate_name": "Werk 1",
          "candidate_address": "Industriestrasse 1", "confidence": 0.9 },
        { "facility_id": f2, "candidate_name": "Werk I",
          "candidate_address": "Industriestr. 1", "confidence": 0.7 }
      ])),
    )
    .await;
    let item: FacilityListItem = body_json(resp).await;
    assert_eq!(item.status, ItemStatus::PotentialMatch);

    let resp = send(
      state.clone(),
      "POST",
      &format!("/items/{id}/confirm"),
      Some(json!({ "match_id": item.matches[0] })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let item: FacilityListItem = body_json(resp).await;
    assert_eq!(item.status, ItemStatus::ConfirmedMatch);
    assert_eq!(item.resolved_facility_id, Some(f1));

    let resp =
      send(state.clone(), "GET", &format!("/facilities/{f1}"), None).await;
    let facility: CanonicalFacility = body_json(resp).await;
    assert!(facility.contributions.contains(&id));
  }

  // ── Error mapping ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_item_returns_404() {
    let state = make_state(Arc::new(AllowAll)).await;
    let resp = send(
      state,
      "GET",
      &format!("/items/{}", Uuid::new_v4()),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn self_merge_returns_409() {
    let state = make_state(Arc::new(AllowAll)).await;
    let f1 = resolved_item(&state).await.resolved_facility_id.unwrap();
    let resp = send(
      state,
      "POST",
      "/facilities/merge",
      Some(json!({ "target_id": f1, "source_id": f1 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("itself"));
  }

  #[tokio::test]
  async fn confirming_out_of_order_returns_409() {
    let state = make_state(Arc::new(AllowAll)).await;
    let item = resolved_item(&state).await;
    // Already resolved; another confirm attempt is an invalid transition.
    let resp = send(
      state,
      "POST",
      &format!("/items/{}/confirm", item.item_id),
      Some(json!({ "match_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn deny_policy_returns_403_before_touching_state() {
    let state = make_state(Arc::new(DenyAll)).await;
    let resp = send(
      state.clone(),
      "POST",
      "/facilities/merge",
      Some(json!({ "target_id": Uuid::new_v4(), "source_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  // ── Listing ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn list_items_applies_codec_decoded_filter() {
    let state = make_state(Arc::new(AllowAll)).await;
    let list_id = Uuid::new_v4();
    send(
      state.clone(),
      "POST",
      &format!("/lists/{list_id}/items"),
      Some(json!([
        { "row_index": 1, "country_code": "DE",
          "raw_name": "Alpha Works", "raw_address": "1 First St" },
        { "row_index": 2, "country_code": "VN",
          "raw_name": "Beta Mill", "raw_address": "2 Second St" }
      ])),
    )
    .await;

    let resp = send(
      state.clone(),
      "GET",
      &format!("/lists/{list_id}/items?countries=VN&statuses=parsed"),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Page<FacilityListItem> = body_json(resp).await;
    assert_eq!(page.total_count, 1);
    assert_eq!(page.items[0].raw_name, "Beta Mill");

    // Unknown keys and malformed paging fail soft, not loud.
    let resp = send(
      state,
      "GET",
      &format!("/lists/{list_id}/items?page=banana&utm_source=mail"),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Page<FacilityListItem> = body_json(resp).await;
    assert_eq!(page.total_count, 2);
  }
}
