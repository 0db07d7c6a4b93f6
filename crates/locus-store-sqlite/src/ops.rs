//! Row-level operations, all executed against an open transaction.
//!
//! Each public function here is one engine operation: it reads the rows it
//! needs, runs the pure transition from `locus_core::transition`, and
//! writes every affected row. The caller ([`crate::SqliteStore`]) wraps the
//! whole call in a single IMMEDIATE transaction, so an error at any point
//! rolls the operation back completely.
//!
//! Version columns are checked and bumped on every UPDATE; a mismatch
//! surfaces as `ConcurrentModification`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use locus_core::{
  facility::{CanonicalFacility, MergeRecord, SplitRecord},
  filter::FilterState,
  item::{FacilityListItem, ItemStatus, NewListItem},
  matching::{CandidateMatch, GeocodeReport, Match, MatchStatus},
  store::Page,
  transition,
};

use crate::{
  Error, Result,
  encode::{RawFacility, RawItem, RawMatch, encode_dt, encode_errors, encode_uuid},
};

/// Bound on successor-chain walks; a longer chain means corrupted data.
const MAX_SUCCESSOR_HOPS: usize = 64;

// ─── Item reads ──────────────────────────────────────────────────────────────

const ITEM_COLUMNS: &str = "item_id, list_id, row_index, country_code, \
   raw_name, raw_address, status, processing_errors, lat, lng, \
   resolved_facility_id, created_at, version";

fn raw_item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawItem> {
  Ok(RawItem {
    item_id:              row.get(0)?,
    list_id:              row.get(1)?,
    row_index:            row.get(2)?,
    country_code:         row.get(3)?,
    raw_name:             row.get(4)?,
    raw_address:          row.get(5)?,
    status:               row.get(6)?,
    processing_errors:    row.get(7)?,
    lat:                  row.get(8)?,
    lng:                  row.get(9)?,
    resolved_facility_id: row.get(10)?,
    created_at:           row.get(11)?,
    version:              row.get(12)?,
  })
}

/// Candidate match IDs for an item, in the order the algorithm produced
/// them. Contribution rows (`is_candidate = 0`) are excluded.
fn candidate_match_ids(conn: &Connection, item_id: Uuid) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare(
    "SELECT match_id FROM matches
     WHERE item_id = ?1 AND is_candidate = 1
     ORDER BY ordinal",
  )?;
  let ids = stmt
    .query_map(params![encode_uuid(item_id)], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids
    .iter()
    .map(|s| crate::encode::decode_uuid(s))
    .collect()
}

pub fn get_item(
  conn: &Connection,
  item_id: Uuid,
) -> Result<Option<FacilityListItem>> {
  let raw: Option<RawItem> = conn
    .query_row(
      &format!("SELECT {ITEM_COLUMNS} FROM list_items WHERE item_id = ?1"),
      params![encode_uuid(item_id)],
      raw_item_from_row,
    )
    .optional()?;

  match raw {
    Some(raw) => {
      let matches = candidate_match_ids(conn, item_id)?;
      Ok(Some(raw.into_item(matches)?))
    }
    None => Ok(None),
  }
}

fn require_item(conn: &Connection, item_id: Uuid) -> Result<FacilityListItem> {
  get_item(conn, item_id)?
    .ok_or(Error::Core(locus_core::Error::ItemNotFound(item_id)))
}

// ─── Match reads ─────────────────────────────────────────────────────────────

const MATCH_COLUMNS: &str = "match_id, item_id, facility_id, candidate_name, \
   candidate_address, confidence, status, created_at";

fn raw_match_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMatch> {
  Ok(RawMatch {
    match_id:          row.get(0)?,
    item_id:           row.get(1)?,
    facility_id:       row.get(2)?,
    candidate_name:    row.get(3)?,
    candidate_address: row.get(4)?,
    confidence:        row.get(5)?,
    status:            row.get(6)?,
    created_at:        row.get(7)?,
  })
}

pub fn get_match(conn: &Connection, match_id: Uuid) -> Result<Option<Match>> {
  let raw: Option<RawMatch> = conn
    .query_row(
      &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE match_id = ?1"),
      params![encode_uuid(match_id)],
      raw_match_from_row,
    )
    .optional()?;
  raw.map(RawMatch::into_match).transpose()
}

pub fn require_match(conn: &Connection, match_id: Uuid) -> Result<Match> {
  get_match(conn, match_id)?
    .ok_or(Error::Core(locus_core::Error::MatchNotFound(match_id)))
}

/// Every match row for an item: candidates in ordinal order, then any
/// contribution row.
pub fn matches_for_item(
  conn: &Connection,
  item_id: Uuid,
) -> Result<Vec<Match>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {MATCH_COLUMNS} FROM matches
     WHERE item_id = ?1
     ORDER BY is_candidate DESC, ordinal"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(item_id)], raw_match_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMatch::into_match).collect()
}

// ─── Facility reads ──────────────────────────────────────────────────────────

const FACILITY_COLUMNS: &str = "facility_id, name, address, country_code, \
   lat, lng, is_closed, successor_id, created_at, version";

fn raw_facility_from_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawFacility> {
  Ok(RawFacility {
    facility_id:  row.get(0)?,
    name:         row.get(1)?,
    address:      row.get(2)?,
    country_code: row.get(3)?,
    lat:          row.get(4)?,
    lng:          row.get(5)?,
    is_closed:    row.get(6)?,
    successor_id: row.get(7)?,
    created_at:   row.get(8)?,
    version:      row.get(9)?,
  })
}

/// Item IDs currently resolved to this facility.
fn contributions(conn: &Connection, facility_id: Uuid) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare(
    "SELECT item_id FROM list_items
     WHERE resolved_facility_id = ?1
     ORDER BY created_at, row_index",
  )?;
  let ids = stmt
    .query_map(params![encode_uuid(facility_id)], |row| {
      row.get::<_, String>(0)
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids
    .iter()
    .map(|s| crate::encode::decode_uuid(s))
    .collect()
}

pub fn get_facility(
  conn: &Connection,
  facility_id: Uuid,
) -> Result<Option<CanonicalFacility>> {
  let raw: Option<RawFacility> = conn
    .query_row(
      &format!(
        "SELECT {FACILITY_COLUMNS} FROM canonical_facilities
         WHERE facility_id = ?1"
      ),
      params![encode_uuid(facility_id)],
      raw_facility_from_row,
    )
    .optional()?;

  match raw {
    Some(raw) => {
      let contributions = contributions(conn, facility_id)?;
      Ok(Some(raw.into_facility(contributions)?))
    }
    None => Ok(None),
  }
}

/// A facility that exists and has not been tombstoned.
fn require_live_facility(
  conn: &Connection,
  facility_id: Uuid,
) -> Result<CanonicalFacility> {
  let facility = get_facility(conn, facility_id)?
    .ok_or(Error::Core(locus_core::Error::FacilityNotFound(facility_id)))?;
  if !facility.is_live() {
    return Err(Error::Core(locus_core::Error::FacilityNotFound(
      facility_id,
    )));
  }
  Ok(facility)
}

/// Walk the successor chain to the live root. A match created before a
/// merge may still reference the merged-away facility; the live root is
/// where its contribution belongs now.
fn resolve_live(conn: &Connection, start: Uuid) -> Result<Uuid> {
  let mut id = start;
  for _ in 0..MAX_SUCCESSOR_HOPS {
    let successor: Option<Option<String>> = conn
      .query_row(
        "SELECT successor_id FROM canonical_facilities WHERE facility_id = ?1",
        params![encode_uuid(id)],
        |row| row.get(0),
      )
      .optional()?;
    match successor {
      None => {
        return Err(Error::Core(locus_core::Error::FacilityNotFound(id)));
      }
      Some(None) => return Ok(id),
      Some(Some(next)) => id = crate::encode::decode_uuid(&next)?,
    }
  }
  Err(Error::Core(locus_core::Error::Storage(format!(
    "successor chain from {start} exceeds {MAX_SUCCESSOR_HOPS} hops"
  ))))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

fn insert_item(conn: &Connection, item: &FacilityListItem) -> Result<()> {
  conn.execute(
    "INSERT INTO list_items (
       item_id, list_id, row_index, country_code, raw_name, raw_address,
       status, processing_errors, lat, lng, resolved_facility_id,
       created_at, version
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    params![
      encode_uuid(item.item_id),
      encode_uuid(item.list_id),
      item.row_index,
      item.country_code,
      item.raw_name,
      item.raw_address,
      item.status.as_str(),
      encode_errors(&item.processing_errors)?,
      item.location.map(|l| l.lat),
      item.location.map(|l| l.lng),
      item.resolved_facility_id.map(encode_uuid),
      encode_dt(item.created_at),
      item.version,
    ],
  )?;
  Ok(())
}

/// Persist an item's mutable fields under an optimistic version check and
/// return the item with its version bumped.
fn update_item(
  conn: &Connection,
  item: &FacilityListItem,
) -> Result<FacilityListItem> {
  let next = item.version + 1;
  let changed = conn.execute(
    "UPDATE list_items
     SET status = ?2, processing_errors = ?3, lat = ?4, lng = ?5,
         resolved_facility_id = ?6, version = ?7
     WHERE item_id = ?1 AND version = ?8",
    params![
      encode_uuid(item.item_id),
      item.status.as_str(),
      encode_errors(&item.processing_errors)?,
      item.location.map(|l| l.lat),
      item.location.map(|l| l.lng),
      item.resolved_facility_id.map(encode_uuid),
      next,
      item.version,
    ],
  )?;
  if changed == 0 {
    return Err(Error::Core(locus_core::Error::ConcurrentModification(
      format!("list item {} changed between read and write", item.item_id),
    )));
  }
  Ok(FacilityListItem { version: next, ..item.clone() })
}

fn insert_match(
  conn: &Connection,
  m: &Match,
  ordinal: i64,
  is_candidate: bool,
) -> Result<()> {
  conn.execute(
    "INSERT INTO matches (
       match_id, item_id, facility_id, candidate_name, candidate_address,
       confidence, status, ordinal, is_candidate, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      encode_uuid(m.match_id),
      encode_uuid(m.item_id),
      encode_uuid(m.facility_id),
      m.candidate_name,
      m.candidate_address,
      m.confidence,
      m.status.as_str(),
      ordinal,
      is_candidate,
      encode_dt(m.created_at),
    ],
  )?;
  Ok(())
}

fn set_match_status(
  conn: &Connection,
  match_id: Uuid,
  status: MatchStatus,
) -> Result<()> {
  conn.execute(
    "UPDATE matches SET status = ?2 WHERE match_id = ?1",
    params![encode_uuid(match_id), status.as_str()],
  )?;
  Ok(())
}

fn repoint_match(
  conn: &Connection,
  match_id: Uuid,
  facility_id: Uuid,
) -> Result<()> {
  conn.execute(
    "UPDATE matches SET facility_id = ?2 WHERE match_id = ?1",
    params![encode_uuid(match_id), encode_uuid(facility_id)],
  )?;
  Ok(())
}

fn insert_facility(conn: &Connection, f: &CanonicalFacility) -> Result<()> {
  conn.execute(
    "INSERT INTO canonical_facilities (
       facility_id, name, address, country_code, lat, lng, is_closed,
       successor_id, created_at, version
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      encode_uuid(f.facility_id),
      f.name,
      f.address,
      f.country_code,
      f.location.map(|l| l.lat),
      f.location.map(|l| l.lng),
      f.is_closed,
      f.successor_id.map(encode_uuid),
      encode_dt(f.created_at),
      f.version,
    ],
  )?;
  Ok(())
}

fn bump_facility_version(
  conn: &Connection,
  facility_id: Uuid,
  old_version: i64,
) -> Result<()> {
  let changed = conn.execute(
    "UPDATE canonical_facilities SET version = ?3
     WHERE facility_id = ?1 AND version = ?2",
    params![encode_uuid(facility_id), old_version, old_version + 1],
  )?;
  if changed == 0 {
    return Err(Error::Core(locus_core::Error::ConcurrentModification(
      format!("facility {facility_id} changed between read and write"),
    )));
  }
  Ok(())
}

/// Logically delete a facility, pointing stale references at `successor`.
fn tombstone_facility(
  conn: &Connection,
  facility_id: Uuid,
  successor: Uuid,
  old_version: i64,
) -> Result<()> {
  let changed = conn.execute(
    "UPDATE canonical_facilities SET successor_id = ?2, version = ?4
     WHERE facility_id = ?1 AND version = ?3 AND successor_id IS NULL",
    params![
      encode_uuid(facility_id),
      encode_uuid(successor),
      old_version,
      old_version + 1,
    ],
  )?;
  if changed == 0 {
    return Err(Error::Core(locus_core::Error::ConcurrentModification(
      format!("facility {facility_id} changed between read and write"),
    )));
  }
  Ok(())
}

/// Create a facility from the item's own fields and attach the item as its
/// sole contribution, via a confirmed non-candidate match row so later
/// merges and splits have the same handle as an operator-confirmed match.
fn resolve_to_new_facility(
  conn: &Connection,
  mut item: FacilityListItem,
  now: DateTime<Utc>,
) -> Result<FacilityListItem> {
  let facility = CanonicalFacility::from_item(&item, now);
  insert_facility(conn, &facility)?;

  let contribution = Match {
    match_id:          Uuid::new_v4(),
    item_id:           item.item_id,
    facility_id:       facility.facility_id,
    candidate_name:    item.raw_name.clone(),
    candidate_address: item.raw_address.clone(),
    confidence:        1.0,
    status:            MatchStatus::Confirmed,
    created_at:        now,
  };
  insert_match(conn, &contribution, 0, false)?;

  item.resolved_facility_id = Some(facility.facility_id);
  let item = update_item(conn, &item)?;
  tracing::info!(
    item = %item.item_id,
    facility = %facility.facility_id,
    "resolved list item to a new canonical facility"
  );
  Ok(item)
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

pub fn create_list_items(
  conn: &Connection,
  list_id: Uuid,
  rows: Vec<NewListItem>,
  now: DateTime<Utc>,
) -> Result<Vec<FacilityListItem>> {
  let mut items = Vec::with_capacity(rows.len());
  for row in rows {
    let mut errors = Vec::new();
    if row.raw_name.trim().is_empty() {
      errors.push("missing facility name".to_string());
    }
    if row.raw_address.trim().is_empty() {
      errors.push("missing facility address".to_string());
    }
    if row.country_code.trim().is_empty() {
      errors.push("missing country code".to_string());
    }
    let status =
      if errors.is_empty() { ItemStatus::Parsed } else { ItemStatus::ErrorParsing };

    let item = FacilityListItem {
      item_id:              Uuid::new_v4(),
      list_id,
      row_index:            row.row_index,
      country_code:         row.country_code,
      raw_name:             row.raw_name,
      raw_address:          row.raw_address,
      status,
      processing_errors:    errors,
      location:             None,
      matches:              Vec::new(),
      resolved_facility_id: None,
      created_at:           now,
      version:              1,
    };
    insert_item(conn, &item)?;
    items.push(item);
  }
  Ok(items)
}

// ─── Collaborator outcomes ───────────────────────────────────────────────────

pub fn record_geocode(
  conn: &Connection,
  item_id: Uuid,
  report: GeocodeReport,
) -> Result<FacilityListItem> {
  let item = require_item(conn, item_id)?;
  let item = transition::apply_geocode(item, report)?;
  update_item(conn, &item)
}

pub fn record_matching_failure(
  conn: &Connection,
  item_id: Uuid,
  error: String,
) -> Result<FacilityListItem> {
  let item = require_item(conn, item_id)?;
  let item = transition::apply_matching_failure(item, error)?;
  update_item(conn, &item)
}

pub fn record_candidates(
  conn: &Connection,
  item_id: Uuid,
  candidates: Vec<CandidateMatch>,
  now: DateTime<Utc>,
) -> Result<FacilityListItem> {
  let item = require_item(conn, item_id)?;

  // Candidates may reference facilities merged away since the algorithm
  // ran; re-point them at the live root up front (and reject unknown IDs).
  let mut candidates = candidates;
  for c in &mut candidates {
    c.facility_id = resolve_live(conn, c.facility_id)?;
  }

  match transition::apply_candidates(item, candidates, now)? {
    transition::CandidateOutcome::NoMatch { item } => {
      resolve_to_new_facility(conn, item, now)
    }
    transition::CandidateOutcome::AutoMatched { item, matched } => {
      insert_match(conn, &matched, 0, true)?;
      let item = update_item(conn, &item)?;
      tracing::info!(
        item = %item.item_id,
        facility = %matched.facility_id,
        "auto-resolved sole high-confidence candidate"
      );
      Ok(item)
    }
    transition::CandidateOutcome::Potential { item, matches } => {
      for (ordinal, m) in matches.iter().enumerate() {
        insert_match(conn, m, ordinal as i64, true)?;
      }
      update_item(conn, &item)
    }
  }
}

// ─── Moderation ──────────────────────────────────────────────────────────────

pub fn confirm_match(
  conn: &Connection,
  item_id: Uuid,
  match_id: Uuid,
) -> Result<FacilityListItem> {
  let item = require_item(conn, item_id)?;
  let mut matches = matches_for_item(conn, item_id)?;

  // The chosen candidate's facility may have been merged away while the
  // item sat in review; confirm against the live root.
  if let Some(chosen) = matches.iter_mut().find(|m| m.match_id == match_id) {
    chosen.facility_id = resolve_live(conn, chosen.facility_id)?;
  }

  let outcome = transition::confirm(item, matches, match_id)?;

  conn.execute(
    "UPDATE matches SET status = ?2, facility_id = ?3 WHERE match_id = ?1",
    params![
      encode_uuid(outcome.confirmed.match_id),
      outcome.confirmed.status.as_str(),
      encode_uuid(outcome.confirmed.facility_id),
    ],
  )?;
  for rejected in &outcome.rejected {
    set_match_status(conn, rejected.match_id, MatchStatus::Rejected)?;
  }
  let item = update_item(conn, &outcome.item)?;
  tracing::info!(
    item = %item.item_id,
    match_id = %match_id,
    facility = %outcome.confirmed.facility_id,
    "confirmed match"
  );
  Ok(item)
}

pub fn reject_match(
  conn: &Connection,
  item_id: Uuid,
  match_id: Uuid,
  now: DateTime<Utc>,
) -> Result<FacilityListItem> {
  let item = require_item(conn, item_id)?;
  let matches = matches_for_item(conn, item_id)?;

  match transition::reject(item, matches, match_id)? {
    transition::RejectOutcome::StillPending { item, rejected } => {
      set_match_status(conn, rejected.match_id, MatchStatus::Rejected)?;
      update_item(conn, &item)
    }
    transition::RejectOutcome::ExhaustedToNewFacility { item, rejected } => {
      set_match_status(conn, rejected.match_id, MatchStatus::Rejected)?;
      resolve_to_new_facility(conn, item, now)
    }
  }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

pub fn merge(
  conn: &Connection,
  target_id: Uuid,
  source_id: Uuid,
  now: DateTime<Utc>,
) -> Result<(CanonicalFacility, MergeRecord)> {
  let target = require_live_facility(conn, target_id)?;
  let source = require_live_facility(conn, source_id)?;
  let moved = source.contributions.clone();

  conn.execute(
    "UPDATE list_items SET resolved_facility_id = ?1, version = version + 1
     WHERE resolved_facility_id = ?2",
    params![encode_uuid(target_id), encode_uuid(source_id)],
  )?;
  // Confirmed matches carry the contribution; they follow it. Pending and
  // rejected rows keep their historical reference and are resolved through
  // the successor chain if ever confirmed.
  conn.execute(
    "UPDATE matches SET facility_id = ?1
     WHERE facility_id = ?2 AND status = 'confirmed'",
    params![encode_uuid(target_id), encode_uuid(source_id)],
  )?;

  tombstone_facility(conn, source_id, target_id, source.version)?;
  bump_facility_version(conn, target_id, target.version)?;

  let merged = get_facility(conn, target_id)?
    .ok_or(Error::Core(locus_core::Error::FacilityNotFound(target_id)))?;
  tracing::info!(
    target = %target_id,
    source = %source_id,
    moved = moved.len(),
    "merged canonical facilities"
  );

  let record = MergeRecord {
    target_id,
    merged_id: source_id,
    moved_items: moved,
    recorded_at: now,
  };
  Ok((merged, record))
}

// ─── Split ───────────────────────────────────────────────────────────────────

pub fn split(
  conn: &Connection,
  match_id: Uuid,
  now: DateTime<Utc>,
) -> Result<(CanonicalFacility, SplitRecord)> {
  let m = require_match(conn, match_id)?;
  if m.status != MatchStatus::Confirmed {
    return Err(Error::Core(locus_core::Error::InvalidTransition {
      entity: match_id,
      detail: format!(
        "only a confirmed match backs a contribution, this one is {}",
        m.status.as_str()
      ),
    }));
  }

  let original = require_live_facility(conn, m.facility_id)?;
  let item = require_item(conn, m.item_id)?;
  if item.resolved_facility_id != Some(original.facility_id) {
    return Err(Error::Core(locus_core::Error::InvalidTransition {
      entity: item.item_id,
      detail: "item does not resolve to the match's facility".to_string(),
    }));
  }

  let fresh = CanonicalFacility::from_item(&item, now);
  insert_facility(conn, &fresh)?;
  repoint_match(conn, match_id, fresh.facility_id)?;

  let mut item = item;
  item.resolved_facility_id = Some(fresh.facility_id);
  update_item(conn, &item)?;

  // Never leave a zero-contribution facility behind: if this was the last
  // contribution, the original is tombstoned with the split-off record as
  // its successor.
  let remaining = contributions(conn, original.facility_id)?;
  if remaining.is_empty() {
    tombstone_facility(
      conn,
      original.facility_id,
      fresh.facility_id,
      original.version,
    )?;
  } else {
    bump_facility_version(conn, original.facility_id, original.version)?;
  }

  tracing::info!(
    original = %original.facility_id,
    new = %fresh.facility_id,
    match_id = %match_id,
    "split contribution into a new canonical facility"
  );

  let record = SplitRecord {
    original_facility_id: original.facility_id,
    match_id,
    new_facility_id: fresh.facility_id,
    recorded_at: now,
  };
  Ok((fresh, record))
}

// ─── Listing ─────────────────────────────────────────────────────────────────

fn escape_like(s: &str) -> String {
  s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn placeholders(n: usize) -> String {
  vec!["?"; n].join(", ")
}

pub fn list_items(
  conn: &Connection,
  list_id: Uuid,
  filter: &FilterState,
) -> Result<Page<FacilityListItem>> {
  let mut conds: Vec<String> = vec!["list_id = ?".to_string()];
  let mut binds: Vec<Box<dyn rusqlite::ToSql>> =
    vec![Box::new(encode_uuid(list_id))];

  if let Some(q) = &filter.query
    && !q.is_empty()
  {
    conds.push(
      "(raw_name LIKE ? ESCAPE '\\' OR raw_address LIKE ? ESCAPE '\\')"
        .to_string(),
    );
    let pattern = format!("%{}%", escape_like(q));
    binds.push(Box::new(pattern.clone()));
    binds.push(Box::new(pattern));
  }
  if !filter.countries.is_empty() {
    conds.push(format!(
      "country_code IN ({})",
      placeholders(filter.countries.len())
    ));
    for c in &filter.countries {
      binds.push(Box::new(c.clone()));
    }
  }
  if !filter.statuses.is_empty() {
    conds
      .push(format!("status IN ({})", placeholders(filter.statuses.len())));
    for s in &filter.statuses {
      binds.push(Box::new(s.as_str()));
    }
  }
  let where_clause = conds.join(" AND ");

  let total_count: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM list_items WHERE {where_clause}"),
    params_from_iter(binds.iter().map(|b| b.as_ref())),
    |row| row.get(0),
  )?;

  binds.push(Box::new(i64::from(filter.page_size)));
  binds.push(Box::new(filter.offset() as i64));
  let mut stmt = conn.prepare(&format!(
    "SELECT {ITEM_COLUMNS} FROM list_items
     WHERE {where_clause}
     ORDER BY row_index
     LIMIT ? OFFSET ?"
  ))?;
  let raws = stmt
    .query_map(
      params_from_iter(binds.iter().map(|b| b.as_ref())),
      raw_item_from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut items = Vec::with_capacity(raws.len());
  for raw in raws {
    let item_id = crate::encode::decode_uuid(&raw.item_id)?;
    let matches = candidate_match_ids(conn, item_id)?;
    items.push(raw.into_item(matches)?);
  }

  Ok(Page { items, total_count: total_count as u64 })
}

pub fn list_facilities(
  conn: &Connection,
  filter: &FilterState,
) -> Result<Page<CanonicalFacility>> {
  let mut conds: Vec<String> = vec!["successor_id IS NULL".to_string()];
  let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

  if let Some(q) = &filter.query
    && !q.is_empty()
  {
    conds.push(
      "(name LIKE ? ESCAPE '\\' OR address LIKE ? ESCAPE '\\')".to_string(),
    );
    let pattern = format!("%{}%", escape_like(q));
    binds.push(Box::new(pattern.clone()));
    binds.push(Box::new(pattern));
  }
  if !filter.countries.is_empty() {
    conds.push(format!(
      "country_code IN ({})",
      placeholders(filter.countries.len())
    ));
    for c in &filter.countries {
      binds.push(Box::new(c.clone()));
    }
  }
  let where_clause = conds.join(" AND ");

  let total_count: i64 = conn.query_row(
    &format!(
      "SELECT COUNT(*) FROM canonical_facilities WHERE {where_clause}"
    ),
    params_from_iter(binds.iter().map(|b| b.as_ref())),
    |row| row.get(0),
  )?;

  binds.push(Box::new(i64::from(filter.page_size)));
  binds.push(Box::new(filter.offset() as i64));
  let mut stmt = conn.prepare(&format!(
    "SELECT {FACILITY_COLUMNS} FROM canonical_facilities
     WHERE {where_clause}
     ORDER BY name, facility_id
     LIMIT ? OFFSET ?"
  ))?;
  let raws = stmt
    .query_map(
      params_from_iter(binds.iter().map(|b| b.as_ref())),
      raw_facility_from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut facilities = Vec::with_capacity(raws.len());
  for raw in raws {
    let facility_id = crate::encode::decode_uuid(&raw.facility_id)?;
    let contribs = contributions(conn, facility_id)?;
    facilities.push(raw.into_facility(contribs)?);
  }

  Ok(Page { items: facilities, total_count: total_count as u64 })
}
