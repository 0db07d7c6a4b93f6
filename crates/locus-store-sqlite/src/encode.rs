//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. `processing_errors` is
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase
//! strings. Status enums use their `as_str` discriminants.

use chrono::{DateTime, Utc};
use locus_core::{
  facility::{CanonicalFacility, Location},
  item::{FacilityListItem, ItemStatus},
  matching::{Match, MatchStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Statuses ────────────────────────────────────────────────────────────────

pub fn decode_item_status(s: &str) -> Result<ItemStatus> {
  ItemStatus::parse(s).ok_or_else(|| Error::UnknownStatus(s.to_owned()))
}

pub fn decode_match_status(s: &str) -> Result<MatchStatus> {
  MatchStatus::parse(s).ok_or_else(|| Error::UnknownStatus(s.to_owned()))
}

// ─── Processing errors ───────────────────────────────────────────────────────

pub fn encode_errors(errors: &[String]) -> Result<String> {
  Ok(serde_json::to_string(errors)?)
}

pub fn decode_errors(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Location ────────────────────────────────────────────────────────────────

pub fn decode_location(lat: Option<f64>, lng: Option<f64>) -> Option<Location> {
  match (lat, lng) {
    (Some(lat), Some(lng)) => Some(Location { lat, lng }),
    _ => None,
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `list_items` row.
pub struct RawItem {
  pub item_id:              String,
  pub list_id:              String,
  pub row_index:            u32,
  pub country_code:         String,
  pub raw_name:             String,
  pub raw_address:          String,
  pub status:               String,
  pub processing_errors:    String,
  pub lat:                  Option<f64>,
  pub lng:                  Option<f64>,
  pub resolved_facility_id: Option<String>,
  pub created_at:           String,
  pub version:              i64,
}

impl RawItem {
  /// `matches` is queried separately (candidate rows only, in ordinal
  /// order).
  pub fn into_item(self, matches: Vec<Uuid>) -> Result<FacilityListItem> {
    Ok(FacilityListItem {
      item_id:              decode_uuid(&self.item_id)?,
      list_id:              decode_uuid(&self.list_id)?,
      row_index:            self.row_index,
      country_code:         self.country_code,
      raw_name:             self.raw_name,
      raw_address:          self.raw_address,
      status:               decode_item_status(&self.status)?,
      processing_errors:    decode_errors(&self.processing_errors)?,
      location:             decode_location(self.lat, self.lng),
      matches,
      resolved_facility_id: decode_uuid_opt(
        self.resolved_facility_id.as_deref(),
      )?,
      created_at:           decode_dt(&self.created_at)?,
      version:              self.version,
    })
  }
}

/// Raw strings read directly from a `matches` row.
pub struct RawMatch {
  pub match_id:          String,
  pub item_id:           String,
  pub facility_id:       String,
  pub candidate_name:    String,
  pub candidate_address: String,
  pub confidence:        f64,
  pub status:            String,
  pub created_at:        String,
}

impl RawMatch {
  pub fn into_match(self) -> Result<Match> {
    Ok(Match {
      match_id:          decode_uuid(&self.match_id)?,
      item_id:           decode_uuid(&self.item_id)?,
      facility_id:       decode_uuid(&self.facility_id)?,
      candidate_name:    self.candidate_name,
      candidate_address: self.candidate_address,
      confidence:        self.confidence,
      status:            decode_match_status(&self.status)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `canonical_facilities` row.
pub struct RawFacility {
  pub facility_id:  String,
  pub name:         String,
  pub address:      String,
  pub country_code: String,
  pub lat:          Option<f64>,
  pub lng:          Option<f64>,
  pub is_closed:    bool,
  pub successor_id: Option<String>,
  pub created_at:   String,
  pub version:      i64,
}

impl RawFacility {
  /// `contributions` is computed separately from `list_items`.
  pub fn into_facility(
    self,
    contributions: Vec<Uuid>,
  ) -> Result<CanonicalFacility> {
    Ok(CanonicalFacility {
      facility_id:   decode_uuid(&self.facility_id)?,
      name:          self.name,
      address:       self.address,
      country_code:  self.country_code,
      location:      decode_location(self.lat, self.lng),
      contributions,
      is_closed:     self.is_closed,
      successor_id:  decode_uuid_opt(self.successor_id.as_deref())?,
      created_at:    decode_dt(&self.created_at)?,
      version:       self.version,
    })
  }
}
