//! The `ReconcileStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `locus-store-sqlite`).
//! Higher layers (`locus-api`, `locus-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Every mutating operation is atomic: it either fully applies (item state,
//! match ledger, and registry updates together) or leaves the store
//! untouched. Mutations are not idempotent — callers must not blindly retry
//! without re-reading current state, except on
//! [`crate::Error::ConcurrentModification`].

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  facility::{CanonicalFacility, MergeRecord, SplitRecord},
  filter::FilterState,
  item::{FacilityListItem, NewListItem},
  matching::{CandidateMatch, GeocodeReport, Match},
};

// ─── Page ────────────────────────────────────────────────────────────────────

/// One page of results plus the total row count for the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:       Vec<T>,
  pub total_count: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Locus reconciliation store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ReconcileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Persist the parsed rows of one contributor upload. Rows missing a
  /// name, address, or country land in `ErrorParsing` with
  /// `processing_errors` populated; the rest start in `Parsed`.
  fn create_list_items(
    &self,
    list_id: Uuid,
    rows: Vec<NewListItem>,
  ) -> impl Future<Output = Result<Vec<FacilityListItem>, Self::Error>> + Send + '_;

  // ── Collaborator outcomes ─────────────────────────────────────────────

  /// Record the geocoding collaborator's outcome for a `Parsed` item.
  fn record_geocode(
    &self,
    item_id: Uuid,
    report: GeocodeReport,
  ) -> impl Future<Output = Result<FacilityListItem, Self::Error>> + Send + '_;

  /// Record the matching algorithm's candidates for a `Geocoded` item.
  ///
  /// Zero candidates create a new canonical facility from the item's own
  /// fields; a sole `automatic` candidate auto-resolves; otherwise the item
  /// enters `PotentialMatch` with one `Pending` match per candidate.
  fn record_candidates(
    &self,
    item_id: Uuid,
    candidates: Vec<CandidateMatch>,
  ) -> impl Future<Output = Result<FacilityListItem, Self::Error>> + Send + '_;

  /// Record that the matching algorithm itself failed for a `Geocoded`
  /// item. Terminal.
  fn record_matching_failure(
    &self,
    item_id: Uuid,
    error: String,
  ) -> impl Future<Output = Result<FacilityListItem, Self::Error>> + Send + '_;

  // ── Moderation ────────────────────────────────────────────────────────

  /// Confirm one `Pending` match for an item in `PotentialMatch`.
  /// Exclusive: all sibling matches are rejected as a side effect, and the
  /// matched facility gains the item as a contribution.
  fn confirm_match(
    &self,
    item_id: Uuid,
    match_id: Uuid,
  ) -> impl Future<Output = Result<FacilityListItem, Self::Error>> + Send + '_;

  /// Reject one `Pending` match. Rejecting the last pending match with no
  /// prior confirmation resolves the item to a freshly created facility.
  fn reject_match(
    &self,
    item_id: Uuid,
    match_id: Uuid,
  ) -> impl Future<Output = Result<FacilityListItem, Self::Error>> + Send + '_;

  // ── Restructuring ─────────────────────────────────────────────────────

  /// Move every contribution of `source_id` to `target_id` and tombstone
  /// the source with `successor_id = target_id`.
  fn merge_facilities(
    &self,
    target_id: Uuid,
    source_id: Uuid,
  ) -> impl Future<Output = Result<(CanonicalFacility, MergeRecord), Self::Error>>
  + Send
  + '_;

  /// Extract the contribution behind a confirmed match into a newly created
  /// facility. Tombstones the original facility when the moved contribution
  /// was its last.
  fn split_match(
    &self,
    match_id: Uuid,
  ) -> impl Future<Output = Result<(CanonicalFacility, SplitRecord), Self::Error>>
  + Send
  + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_item(
    &self,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Option<FacilityListItem>, Self::Error>> + Send + '_;

  fn get_match(
    &self,
    match_id: Uuid,
  ) -> impl Future<Output = Result<Option<Match>, Self::Error>> + Send + '_;

  /// Returns live and tombstoned facilities alike; callers can tell them
  /// apart via `successor_id`.
  fn get_facility(
    &self,
    facility_id: Uuid,
  ) -> impl Future<Output = Result<Option<CanonicalFacility>, Self::Error>> + Send + '_;

  /// All matches for an item in candidate order, including any
  /// contribution row created by a `NewFacility` resolution.
  fn matches_for_item(
    &self,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Match>, Self::Error>> + Send + '_;

  /// List one upload's items under `filter` (free text, countries,
  /// statuses, pagination).
  fn list_items<'a>(
    &'a self,
    list_id: Uuid,
    filter: &'a FilterState,
  ) -> impl Future<Output = Result<Page<FacilityListItem>, Self::Error>> + Send + 'a;

  /// Search live canonical facilities under `filter`.
  fn list_facilities<'a>(
    &'a self,
    filter: &'a FilterState,
  ) -> impl Future<Output = Result<Page<CanonicalFacility>, Self::Error>> + Send + 'a;
}
