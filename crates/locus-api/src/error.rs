//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Engine errors keep their taxonomy across the wire: not-found kinds map
//! to 404, precondition failures to 409, validation to 400. Only
//! `ConcurrentModification` responses carry `"retryable": true` — callers
//! may retry those with fresh reads, boundedly.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The moderation policy refused the action.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error(transparent)]
  Engine(#[from] locus_core::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use locus_core::Error as E;

    let (status, retryable) = match &self {
      ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, false),
      ApiError::Engine(e) => match e {
        E::Validation(_) => (StatusCode::BAD_REQUEST, false),
        E::ItemNotFound(_) | E::MatchNotFound(_) | E::FacilityNotFound(_) => {
          (StatusCode::NOT_FOUND, false)
        }
        E::InvalidTransition { .. }
        | E::SelfMergeRejected
        | E::ConflictingMergeSelection(_) => (StatusCode::CONFLICT, false),
        E::ConcurrentModification(_) => (StatusCode::CONFLICT, true),
        E::Storage(_) | E::Serialization(_) => {
          (StatusCode::INTERNAL_SERVER_ERROR, false)
        }
      },
    };

    let body = if retryable {
      json!({ "error": self.to_string(), "retryable": true })
    } else {
      json!({ "error": self.to_string() })
    };
    (status, Json(body)).into_response()
  }
}
