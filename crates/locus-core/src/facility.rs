//! Canonical facilities — the deduplicated records list items resolve to —
//! and the audit values produced by merge/split.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::FacilityListItem;

// ─── Location ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub lat: f64,
  pub lng: f64,
}

// ─── CanonicalFacility ───────────────────────────────────────────────────────

/// A deduplicated physical-facility record.
///
/// A facility is **live** while `successor_id` is `None`. Tombstoning (the
/// only form of deletion) sets `successor_id` to the facility that absorbed
/// or replaced it, so stale references remain traceable. IDs are never
/// reused.
///
/// `contributions` is computed on read from the items currently resolved to
/// this facility; it is never stored denormalised. A live facility always
/// has at least one contribution — the operation that would empty it must
/// tombstone it instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalFacility {
  pub facility_id:  Uuid,
  pub name:         String,
  pub address:      String,
  pub country_code: String,
  /// `None` while ungeocoded.
  pub location:     Option<Location>,
  /// Item IDs backing this record.
  pub contributions: Vec<Uuid>,
  pub is_closed:    bool,
  /// Tombstone pointer; `Some` means this record is no longer live.
  pub successor_id: Option<Uuid>,
  pub created_at:   DateTime<Utc>,
  /// Bumped on every persisted mutation.
  pub version:      i64,
}

impl CanonicalFacility {
  pub fn is_live(&self) -> bool { self.successor_id.is_none() }

  /// Seed a new canonical record from an unmatched list item's own fields.
  /// Used by "no match found" resolution and by the last-rejection cascade.
  pub fn from_item(item: &FacilityListItem, now: DateTime<Utc>) -> Self {
    Self {
      facility_id:   Uuid::new_v4(),
      name:          item.raw_name.clone(),
      address:       item.raw_address.clone(),
      country_code:  item.country_code.clone(),
      location:      item.location,
      contributions: vec![item.item_id],
      is_closed:     false,
      successor_id:  None,
      created_at:    now,
      version:       1,
    }
  }
}

// ─── Audit records ───────────────────────────────────────────────────────────

/// Audit of one merge. The post-merge registry state is derivable from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRecord {
  pub target_id:   Uuid,
  pub merged_id:   Uuid,
  /// Items whose resolution moved from `merged_id` to `target_id`.
  pub moved_items: Vec<Uuid>,
  pub recorded_at: DateTime<Utc>,
}

/// Audit of one split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
  pub original_facility_id: Uuid,
  pub match_id:             Uuid,
  pub new_facility_id:      Uuid,
  pub recorded_at:          DateTime<Utc>,
}
