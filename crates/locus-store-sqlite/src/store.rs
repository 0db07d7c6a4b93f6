//! [`SqliteStore`] — the SQLite implementation of [`ReconcileStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::TransactionBehavior;
use uuid::Uuid;

use locus_core::{
  facility::{CanonicalFacility, MergeRecord, SplitRecord},
  filter::FilterState,
  item::{FacilityListItem, NewListItem},
  matching::{CandidateMatch, GeocodeReport, Match},
  selection::SelectionArena,
  store::{Page, ReconcileStore},
};

use crate::{Error, Result, ops, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Locus reconciliation store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted, and all
/// clones share one selection arena so concurrent merges and splits cannot
/// stage the same facility twice.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  arena: Arc<SelectionArena>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, arena: Arc::new(SelectionArena::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, arena: Arc::new(SelectionArena::new()) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside a single IMMEDIATE transaction. The transaction commits
  /// only when `f` succeeds; any error rolls every write back.
  async fn mutate<T, F>(&self, f: F) -> Result<T, locus_core::Error>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    let out = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx);
        if result.is_ok() {
          tx.commit()?;
        }
        Ok(result)
      })
      .await
      .map_err(|e| Error::from(e).into_core())?;
    out.map_err(Error::into_core)
  }

  async fn read<T, F>(&self, f: F) -> Result<T, locus_core::Error>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    let out = self
      .conn
      .call(move |conn| Ok(f(conn)))
      .await
      .map_err(|e| Error::from(e).into_core())?;
    out.map_err(Error::into_core)
  }
}

fn require_ids(ids: &[(&str, Uuid)]) -> Result<(), locus_core::Error> {
  for (name, id) in ids {
    if id.is_nil() {
      return Err(locus_core::Error::Validation(format!(
        "{name} must not be nil"
      )));
    }
  }
  Ok(())
}

// ─── ReconcileStore impl ─────────────────────────────────────────────────────

impl ReconcileStore for SqliteStore {
  type Error = locus_core::Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn create_list_items(
    &self,
    list_id: Uuid,
    rows: Vec<NewListItem>,
  ) -> Result<Vec<FacilityListItem>, locus_core::Error> {
    require_ids(&[("list_id", list_id)])?;
    self
      .mutate(move |conn| {
        ops::create_list_items(conn, list_id, rows, Utc::now())
      })
      .await
  }

  // ── Collaborator outcomes ─────────────────────────────────────────────────

  async fn record_geocode(
    &self,
    item_id: Uuid,
    report: GeocodeReport,
  ) -> Result<FacilityListItem, locus_core::Error> {
    require_ids(&[("item_id", item_id)])?;
    self
      .mutate(move |conn| ops::record_geocode(conn, item_id, report))
      .await
  }

  async fn record_candidates(
    &self,
    item_id: Uuid,
    candidates: Vec<CandidateMatch>,
  ) -> Result<FacilityListItem, locus_core::Error> {
    require_ids(&[("item_id", item_id)])?;
    self
      .mutate(move |conn| {
        ops::record_candidates(conn, item_id, candidates, Utc::now())
      })
      .await
  }

  async fn record_matching_failure(
    &self,
    item_id: Uuid,
    error: String,
  ) -> Result<FacilityListItem, locus_core::Error> {
    require_ids(&[("item_id", item_id)])?;
    self
      .mutate(move |conn| ops::record_matching_failure(conn, item_id, error))
      .await
  }

  // ── Moderation ────────────────────────────────────────────────────────────

  async fn confirm_match(
    &self,
    item_id: Uuid,
    match_id: Uuid,
  ) -> Result<FacilityListItem, locus_core::Error> {
    require_ids(&[("item_id", item_id), ("match_id", match_id)])?;
    self
      .mutate(move |conn| ops::confirm_match(conn, item_id, match_id))
      .await
  }

  async fn reject_match(
    &self,
    item_id: Uuid,
    match_id: Uuid,
  ) -> Result<FacilityListItem, locus_core::Error> {
    require_ids(&[("item_id", item_id), ("match_id", match_id)])?;
    self
      .mutate(move |conn| {
        ops::reject_match(conn, item_id, match_id, Utc::now())
      })
      .await
  }

  // ── Restructuring ─────────────────────────────────────────────────────────

  async fn merge_facilities(
    &self,
    target_id: Uuid,
    source_id: Uuid,
  ) -> Result<(CanonicalFacility, MergeRecord), locus_core::Error> {
    // One centralised guard for "same facility on both sides", held for the
    // duration of the operation.
    let _lease =
      self.arena.stage(&[("target", target_id), ("source", source_id)])?;
    self
      .mutate(move |conn| ops::merge(conn, target_id, source_id, Utc::now()))
      .await
  }

  async fn split_match(
    &self,
    match_id: Uuid,
  ) -> Result<(CanonicalFacility, SplitRecord), locus_core::Error> {
    require_ids(&[("match_id", match_id)])?;
    let m = self.read(move |conn| ops::require_match(conn, match_id)).await?;
    let _lease = self.arena.stage(&[("original", m.facility_id)])?;
    self.mutate(move |conn| ops::split(conn, match_id, Utc::now())).await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_item(
    &self,
    item_id: Uuid,
  ) -> Result<Option<FacilityListItem>, locus_core::Error> {
    self.read(move |conn| ops::get_item(conn, item_id)).await
  }

  async fn get_match(
    &self,
    match_id: Uuid,
  ) -> Result<Option<Match>, locus_core::Error> {
    self.read(move |conn| ops::get_match(conn, match_id)).await
  }

  async fn get_facility(
    &self,
    facility_id: Uuid,
  ) -> Result<Option<CanonicalFacility>, locus_core::Error> {
    self.read(move |conn| ops::get_facility(conn, facility_id)).await
  }

  async fn matches_for_item(
    &self,
    item_id: Uuid,
  ) -> Result<Vec<Match>, locus_core::Error> {
    self.read(move |conn| ops::matches_for_item(conn, item_id)).await
  }

  async fn list_items(
    &self,
    list_id: Uuid,
    filter: &FilterState,
  ) -> Result<Page<FacilityListItem>, locus_core::Error> {
    let filter = filter.clone();
    self
      .read(move |conn| ops::list_items(conn, list_id, &filter))
      .await
  }

  async fn list_facilities(
    &self,
    filter: &FilterState,
  ) -> Result<Page<CanonicalFacility>, locus_core::Error> {
    let filter = filter.clone();
    self.read(move |conn| ops::list_facilities(conn, &filter)).await
  }
}
