//! Error types for `locus-core`.
//!
//! Every public engine operation returns one of these variants on failure;
//! expected conditions are never signalled by panicking. Only
//! [`Error::ConcurrentModification`] is worth retrying, with fresh reads and
//! a bounded number of attempts.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A required ID or parameter is missing or malformed. Rejected before any
  /// state is touched.
  #[error("validation failed: {0}")]
  Validation(String),

  /// The operation is not legal for the entity's current status. Nothing is
  /// mutated.
  #[error("invalid transition for {entity}: {detail}")]
  InvalidTransition { entity: Uuid, detail: String },

  #[error("list item not found: {0}")]
  ItemNotFound(Uuid),

  #[error("match not found: {0}")]
  MatchNotFound(Uuid),

  /// The facility does not exist or has been tombstoned.
  #[error("canonical facility not found: {0}")]
  FacilityNotFound(Uuid),

  #[error("cannot merge a facility into itself")]
  SelfMergeRejected,

  /// The facility is already staged on the other side of a concurrent
  /// merge or split.
  #[error("facility {0} is selected on both sides of an operation")]
  ConflictingMergeSelection(Uuid),

  /// Store state changed between read and write. Retryable.
  #[error("concurrent modification: {0}")]
  ConcurrentModification(String),

  /// Backend failure surfaced through the store trait.
  #[error("storage error: {0}")]
  Storage(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
