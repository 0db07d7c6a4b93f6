//! Facility list items — contributor-submitted rows awaiting resolution.
//!
//! An item is created when a contributor list is parsed, mutated by the
//! external geocoding/matching collaborators (through the store) and by
//! operator confirm/reject actions, and never deleted — a re-upload of the
//! same list supersedes it with fresh rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::facility::Location;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a list item.
///
/// `Matched` covers the moment a sole high-confidence candidate is
/// auto-resolved without an explicit human confirmation step; for every
/// resolution invariant it behaves like `ConfirmedMatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
  Uploaded,
  Parsed,
  Geocoded,
  PotentialMatch,
  Matched,
  ConfirmedMatch,
  NewFacility,
  ErrorParsing,
  ErrorGeocoding,
  ErrorMatching,
}

impl ItemStatus {
  /// The discriminant string stored in the `status` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Uploaded => "uploaded",
      Self::Parsed => "parsed",
      Self::Geocoded => "geocoded",
      Self::PotentialMatch => "potential_match",
      Self::Matched => "matched",
      Self::ConfirmedMatch => "confirmed_match",
      Self::NewFacility => "new_facility",
      Self::ErrorParsing => "error_parsing",
      Self::ErrorGeocoding => "error_geocoding",
      Self::ErrorMatching => "error_matching",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Some(match s {
      "uploaded" => Self::Uploaded,
      "parsed" => Self::Parsed,
      "geocoded" => Self::Geocoded,
      "potential_match" => Self::PotentialMatch,
      "matched" => Self::Matched,
      "confirmed_match" => Self::ConfirmedMatch,
      "new_facility" => Self::NewFacility,
      "error_parsing" => Self::ErrorParsing,
      "error_geocoding" => Self::ErrorGeocoding,
      "error_matching" => Self::ErrorMatching,
      _ => return None,
    })
  }

  /// The item has been attached to a canonical facility.
  /// Iff this holds, `resolved_facility_id` is set.
  pub fn is_resolved(self) -> bool {
    matches!(self, Self::Matched | Self::ConfirmedMatch | Self::NewFacility)
  }

  /// Terminal error states. No transition leaves them.
  pub fn is_error(self) -> bool {
    matches!(
      self,
      Self::ErrorParsing | Self::ErrorGeocoding | Self::ErrorMatching
    )
  }
}

// ─── FacilityListItem ────────────────────────────────────────────────────────

/// One contributor-submitted facility row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityListItem {
  pub item_id:              Uuid,
  /// The upload this row came from.
  pub list_id:              Uuid,
  /// Position in the source upload, 1-based.
  pub row_index:            u32,
  pub country_code:         String,
  pub raw_name:             String,
  pub raw_address:          String,
  pub status:               ItemStatus,
  pub processing_errors:    Vec<String>,
  /// Geocoded coordinates, once the geocoding collaborator has reported.
  pub location:             Option<Location>,
  /// Candidate match IDs in the order the matching algorithm produced them.
  pub matches:              Vec<Uuid>,
  /// Set exactly once a match is confirmed or a new facility is created.
  pub resolved_facility_id: Option<Uuid>,
  pub created_at:           DateTime<Utc>,
  /// Bumped on every persisted mutation.
  pub version:              i64,
}

// ─── NewListItem ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::ReconcileStore::create_list_items`] — one parsed
/// row from a contributor upload. IDs and timestamps are assigned by the
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListItem {
  pub row_index:    u32,
  pub country_code: String,
  pub raw_name:     String,
  pub raw_address:  String,
}
