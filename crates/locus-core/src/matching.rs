//! Matches — candidate associations between a list item and a canonical
//! facility — and the report types the external collaborators feed in.
//!
//! The matching algorithm and the geocoder are black boxes outside this
//! engine; only their outcomes cross the boundary, as [`CandidateMatch`] and
//! [`GeocodeReport`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::facility::Location;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
  Pending,
  Confirmed,
  Rejected,
}

impl MatchStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Confirmed => "confirmed",
      Self::Rejected => "rejected",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Some(match s {
      "pending" => Self::Pending,
      "confirmed" => Self::Confirmed,
      "rejected" => Self::Rejected,
      _ => return None,
    })
  }
}

// ─── Match ───────────────────────────────────────────────────────────────────

/// A candidate association between one list item and one canonical facility.
///
/// Created in a batch when the matching algorithm reports; immutable except
/// for `status` (confirm/reject) and `facility_id`, which is re-pointed when
/// the facility on the other end is merged away or split out.
///
/// Invariant: per item, at most one match is `Confirmed` at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
  pub match_id:          Uuid,
  pub item_id:           Uuid,
  pub facility_id:       Uuid,
  pub candidate_name:    String,
  pub candidate_address: String,
  /// Confidence score from the matching algorithm, in `[0, 1]`.
  pub confidence:        f64,
  pub status:            MatchStatus,
  pub created_at:        DateTime<Utc>,
}

// ─── Collaborator reports ────────────────────────────────────────────────────

/// One candidate produced by the external matching algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
  pub facility_id:       Uuid,
  pub candidate_name:    String,
  pub candidate_address: String,
  pub confidence:        f64,
  /// The algorithm is willing to resolve this candidate without operator
  /// review. Honoured only when it is the sole candidate.
  #[serde(default)]
  pub automatic:         bool,
}

/// Outcome of the external geocoding collaborator for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GeocodeReport {
  Located { location: Location },
  Failed { error: String },
}
