//! The list-item state machine, expressed as pure transition functions.
//!
//! Each function takes an in-memory snapshot (the item, plus its matches
//! where relevant), checks the preconditions, and returns the *full* new
//! state as a tagged outcome. Exclusivity of confirmation and the cascade
//! to `NewFacility` on last rejection are enforced here and nowhere else;
//! the store's job is only to persist an outcome atomically.
//!
//! No transition partially applies: every function either returns an
//! outcome or an error with the inputs untouched.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  item::{FacilityListItem, ItemStatus},
  matching::{CandidateMatch, GeocodeReport, Match, MatchStatus},
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Result of feeding the matching algorithm's candidates to a `Geocoded`
/// item.
#[derive(Debug, Clone)]
pub enum CandidateOutcome {
  /// Zero candidates: the item resolves to `NewFacility`. The caller must
  /// create the canonical facility in the same transaction and fill in
  /// `resolved_facility_id`.
  NoMatch { item: FacilityListItem },
  /// A sole candidate flagged `automatic`: resolved without operator
  /// review. The match is already `Confirmed`.
  AutoMatched {
    item:    FacilityListItem,
    matched: Match,
  },
  /// One or more candidates awaiting operator review, all `Pending`.
  Potential {
    item:    FacilityListItem,
    matches: Vec<Match>,
  },
}

/// Result of a successful confirmation: the item, the confirmed match, and
/// every sibling forced to `Rejected`.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
  pub item:      FacilityListItem,
  pub confirmed: Match,
  pub rejected:  Vec<Match>,
}

/// Result of a successful rejection.
#[derive(Debug, Clone)]
pub enum RejectOutcome {
  /// At least one `Pending` sibling remains; the item stays in
  /// `PotentialMatch`.
  StillPending {
    item:     FacilityListItem,
    rejected: Match,
  },
  /// The rejected match was the last `Pending` one and none was ever
  /// confirmed: none of the candidates are this facility. The item cascades
  /// to `NewFacility`; the caller must create the canonical facility in the
  /// same transaction and fill in `resolved_facility_id`.
  ExhaustedToNewFacility {
    item:     FacilityListItem,
    rejected: Match,
  },
}

// ─── Guards ──────────────────────────────────────────────────────────────────

fn require_status(item: &FacilityListItem, expected: ItemStatus) -> Result<()> {
  if item.status != expected {
    return Err(Error::InvalidTransition {
      entity: item.item_id,
      detail: format!(
        "expected status {}, found {}",
        expected.as_str(),
        item.status.as_str()
      ),
    });
  }
  Ok(())
}

/// Find `match_id` among the item's own matches and check it is `Pending`.
fn take_pending<'a>(
  item:     &FacilityListItem,
  matches:  &'a [Match],
  match_id: Uuid,
) -> Result<&'a Match> {
  let m = matches
    .iter()
    .find(|m| m.match_id == match_id && m.item_id == item.item_id)
    .ok_or(Error::MatchNotFound(match_id))?;
  if m.status != MatchStatus::Pending {
    return Err(Error::InvalidTransition {
      entity: match_id,
      detail: format!("match is {}, not pending", m.status.as_str()),
    });
  }
  Ok(m)
}

// ─── Parse / geocode ─────────────────────────────────────────────────────────

/// `Parsed → Geocoded` on success, `Parsed → ErrorGeocoding` (terminal) on
/// failure.
pub fn apply_geocode(
  mut item: FacilityListItem,
  report:   GeocodeReport,
) -> Result<FacilityListItem> {
  require_status(&item, ItemStatus::Parsed)?;
  match report {
    GeocodeReport::Located { location } => {
      item.status = ItemStatus::Geocoded;
      item.location = Some(location);
    }
    GeocodeReport::Failed { error } => {
      item.status = ItemStatus::ErrorGeocoding;
      item.processing_errors.push(error);
    }
  }
  Ok(item)
}

/// `Geocoded → ErrorMatching` (terminal) when the matching algorithm itself
/// fails.
pub fn apply_matching_failure(
  mut item: FacilityListItem,
  error:    String,
) -> Result<FacilityListItem> {
  require_status(&item, ItemStatus::Geocoded)?;
  item.status = ItemStatus::ErrorMatching;
  item.processing_errors.push(error);
  Ok(item)
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// Feed the matching algorithm's candidates to a `Geocoded` item.
///
/// Zero candidates resolve the item to `NewFacility`; a sole `automatic`
/// candidate resolves it to `Matched`; anything else parks it in
/// `PotentialMatch` with one `Pending` match per candidate, in the order
/// the algorithm produced them.
pub fn apply_candidates(
  mut item:   FacilityListItem,
  candidates: Vec<CandidateMatch>,
  now:        DateTime<Utc>,
) -> Result<CandidateOutcome> {
  require_status(&item, ItemStatus::Geocoded)?;

  if candidates.is_empty() {
    item.status = ItemStatus::NewFacility;
    return Ok(CandidateOutcome::NoMatch { item });
  }

  let build = |c: &CandidateMatch, status: MatchStatus| Match {
    match_id:          Uuid::new_v4(),
    item_id:           item.item_id,
    facility_id:       c.facility_id,
    candidate_name:    c.candidate_name.clone(),
    candidate_address: c.candidate_address.clone(),
    confidence:        c.confidence,
    status,
    created_at:        now,
  };

  if let [sole] = candidates.as_slice()
    && sole.automatic
  {
    let matched = build(sole, MatchStatus::Confirmed);
    item.status = ItemStatus::Matched;
    item.matches = vec![matched.match_id];
    item.resolved_facility_id = Some(matched.facility_id);
    return Ok(CandidateOutcome::AutoMatched { item, matched });
  }

  let matches: Vec<Match> = candidates
    .iter()
    .map(|c| build(c, MatchStatus::Pending))
    .collect();
  item.status = ItemStatus::PotentialMatch;
  item.matches = matches.iter().map(|m| m.match_id).collect();
  Ok(CandidateOutcome::Potential { item, matches })
}

// ─── Confirm ─────────────────────────────────────────────────────────────────

/// `PotentialMatch → ConfirmedMatch`. Confirmation is exclusive: every
/// sibling match still `Pending` is forced to `Rejected` in the same
/// outcome, and the confirmed match's facility gains the item as a
/// contribution.
pub fn confirm(
  mut item: FacilityListItem,
  matches:  Vec<Match>,
  match_id: Uuid,
) -> Result<ConfirmOutcome> {
  require_status(&item, ItemStatus::PotentialMatch)?;
  take_pending(&item, &matches, match_id)?;

  let mut confirmed = None;
  let mut rejected = Vec::new();
  for mut m in matches {
    if m.match_id == match_id {
      m.status = MatchStatus::Confirmed;
      confirmed = Some(m);
    } else if m.status == MatchStatus::Pending {
      m.status = MatchStatus::Rejected;
      rejected.push(m);
    }
  }
  // take_pending guarantees the match is present.
  let confirmed = confirmed.ok_or(Error::MatchNotFound(match_id))?;

  item.status = ItemStatus::ConfirmedMatch;
  item.resolved_facility_id = Some(confirmed.facility_id);

  Ok(ConfirmOutcome { item, confirmed, rejected })
}

// ─── Reject ──────────────────────────────────────────────────────────────────

/// Reject one `Pending` match. If other `Pending` matches remain the item
/// stays in `PotentialMatch`; rejecting the final candidate means "none of
/// these are the same facility" and cascades to `NewFacility`.
pub fn reject(
  mut item: FacilityListItem,
  matches:  Vec<Match>,
  match_id: Uuid,
) -> Result<RejectOutcome> {
  require_status(&item, ItemStatus::PotentialMatch)?;
  take_pending(&item, &matches, match_id)?;

  let mut rejected = None;
  let mut pending_left = 0usize;
  for mut m in matches {
    if m.match_id == match_id {
      m.status = MatchStatus::Rejected;
      rejected = Some(m);
    } else if m.status == MatchStatus::Pending {
      pending_left += 1;
    }
  }
  let rejected = rejected.ok_or(Error::MatchNotFound(match_id))?;

  if pending_left > 0 {
    return Ok(RejectOutcome::StillPending { item, rejected });
  }

  // An item in PotentialMatch has never had a confirmation, so exhausting
  // the candidates always resolves to a fresh facility.
  item.status = ItemStatus::NewFacility;
  Ok(RejectOutcome::ExhaustedToNewFacility { item, rejected })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::facility::Location;

  fn item(status: ItemStatus) -> FacilityListItem {
    FacilityListItem {
      item_id:              Uuid::new_v4(),
      list_id:              Uuid::new_v4(),
      row_index:            1,
      country_code:         "DE".into(),
      raw_name:             "Werk Eins".into(),
      raw_address:          "Industriestr. 1, Essen".into(),
      status,
      processing_errors:    Vec::new(),
      location:             None,
      matches:              Vec::new(),
      resolved_facility_id: None,
      created_at:           Utc::now(),
      version:              1,
    }
  }

  fn candidate(automatic: bool) -> CandidateMatch {
    CandidateMatch {
      facility_id:       Uuid::new_v4(),
      candidate_name:    "Werk 1".into(),
      candidate_address: "Industriestrasse 1".into(),
      confidence:        0.92,
      automatic,
    }
  }

  fn potential(n: usize) -> (FacilityListItem, Vec<Match>) {
    let mut it = item(ItemStatus::Geocoded);
    it.location = Some(Location { lat: 51.45, lng: 7.01 });
    let candidates = (0..n).map(|_| candidate(false)).collect();
    match apply_candidates(it, candidates, Utc::now()).unwrap() {
      CandidateOutcome::Potential { item, matches } => (item, matches),
      other => panic!("expected Potential, got {other:?}"),
    }
  }

  // ── geocode ───────────────────────────────────────────────────────────────

  #[test]
  fn geocode_success_sets_location() {
    let loc = Location { lat: 51.45, lng: 7.01 };
    let out = apply_geocode(
      item(ItemStatus::Parsed),
      GeocodeReport::Located { location: loc },
    )
    .unwrap();
    assert_eq!(out.status, ItemStatus::Geocoded);
    assert_eq!(out.location, Some(loc));
  }

  #[test]
  fn geocode_failure_is_terminal_with_error_recorded() {
    let out = apply_geocode(
      item(ItemStatus::Parsed),
      GeocodeReport::Failed { error: "no results".into() },
    )
    .unwrap();
    assert_eq!(out.status, ItemStatus::ErrorGeocoding);
    assert_eq!(out.processing_errors, vec!["no results".to_string()]);
  }

  #[test]
  fn geocode_from_wrong_status_is_invalid() {
    let err = apply_geocode(
      item(ItemStatus::Geocoded),
      GeocodeReport::Failed { error: "x".into() },
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }

  // ── candidates ────────────────────────────────────────────────────────────

  #[test]
  fn zero_candidates_resolves_to_new_facility() {
    let out =
      apply_candidates(item(ItemStatus::Geocoded), vec![], Utc::now()).unwrap();
    match out {
      CandidateOutcome::NoMatch { item } => {
        assert_eq!(item.status, ItemStatus::NewFacility);
        // resolved_facility_id is the store's to fill once the facility row
        // exists.
        assert!(item.resolved_facility_id.is_none());
      }
      other => panic!("expected NoMatch, got {other:?}"),
    }
  }

  #[test]
  fn sole_automatic_candidate_auto_resolves() {
    let c = candidate(true);
    let facility_id = c.facility_id;
    let out =
      apply_candidates(item(ItemStatus::Geocoded), vec![c], Utc::now())
        .unwrap();
    match out {
      CandidateOutcome::AutoMatched { item, matched } => {
        assert_eq!(item.status, ItemStatus::Matched);
        assert_eq!(item.resolved_facility_id, Some(facility_id));
        assert_eq!(matched.status, MatchStatus::Confirmed);
        assert_eq!(item.matches, vec![matched.match_id]);
      }
      other => panic!("expected AutoMatched, got {other:?}"),
    }
  }

  #[test]
  fn automatic_flag_ignored_among_several_candidates() {
    let out = apply_candidates(
      item(ItemStatus::Geocoded),
      vec![candidate(true), candidate(false)],
      Utc::now(),
    )
    .unwrap();
    assert!(matches!(out, CandidateOutcome::Potential { .. }));
  }

  #[test]
  fn candidates_become_pending_matches_in_order() {
    let (item, matches) = potential(3);
    assert_eq!(item.status, ItemStatus::PotentialMatch);
    assert_eq!(item.matches.len(), 3);
    assert!(matches.iter().all(|m| m.status == MatchStatus::Pending));
    let ids: Vec<Uuid> = matches.iter().map(|m| m.match_id).collect();
    assert_eq!(item.matches, ids);
  }

  // ── confirm ───────────────────────────────────────────────────────────────

  #[test]
  fn confirm_is_exclusive() {
    let (item, matches) = potential(3);
    let chosen = matches[1].match_id;
    let out = confirm(item, matches, chosen).unwrap();

    assert_eq!(out.item.status, ItemStatus::ConfirmedMatch);
    assert_eq!(out.confirmed.match_id, chosen);
    assert_eq!(out.confirmed.status, MatchStatus::Confirmed);
    assert_eq!(
      out.item.resolved_facility_id,
      Some(out.confirmed.facility_id)
    );
    assert_eq!(out.rejected.len(), 2);
    assert!(out.rejected.iter().all(|m| m.status == MatchStatus::Rejected));
  }

  #[test]
  fn confirm_foreign_match_is_not_found() {
    let (item, matches) = potential(2);
    let err = confirm(item, matches, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, Error::MatchNotFound(_)));
  }

  #[test]
  fn confirm_outside_potential_match_is_invalid() {
    let (item, matches) = potential(2);
    let chosen = matches[0].match_id;
    let out = confirm(item, matches, chosen).unwrap();

    // A second confirmation must fail and mutate nothing: the item already
    // left PotentialMatch.
    let remaining: Vec<Match> =
      std::iter::once(out.confirmed.clone()).chain(out.rejected).collect();
    let err =
      confirm(out.item, remaining, out.confirmed.match_id).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }

  #[test]
  fn confirm_already_rejected_match_is_invalid() {
    let (item, mut matches) = potential(2);
    matches[0].status = MatchStatus::Rejected;
    let chosen = matches[0].match_id;
    let err = confirm(item, matches, chosen).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }

  // ── reject ────────────────────────────────────────────────────────────────

  #[test]
  fn reject_with_pending_siblings_stays_potential() {
    let (item, matches) = potential(2);
    let first = matches[0].match_id;
    match reject(item, matches, first).unwrap() {
      RejectOutcome::StillPending { item, rejected } => {
        assert_eq!(item.status, ItemStatus::PotentialMatch);
        assert_eq!(rejected.match_id, first);
        assert_eq!(rejected.status, MatchStatus::Rejected);
      }
      other => panic!("expected StillPending, got {other:?}"),
    }
  }

  #[test]
  fn rejecting_last_pending_cascades_to_new_facility() {
    let (item, matches) = potential(2);
    let (first, second) = (matches[0].match_id, matches[1].match_id);

    let item = match reject(item, matches.clone(), first).unwrap() {
      RejectOutcome::StillPending { item, rejected } => {
        // Thread the rejected sibling back into the snapshot.
        let matches: Vec<Match> = matches
          .into_iter()
          .map(|m| if m.match_id == first { rejected.clone() } else { m })
          .collect();
        match reject(item, matches, second).unwrap() {
          RejectOutcome::ExhaustedToNewFacility { item, rejected } => {
            assert_eq!(rejected.match_id, second);
            item
          }
          other => panic!("expected cascade, got {other:?}"),
        }
      }
      other => panic!("expected StillPending, got {other:?}"),
    };
    assert_eq!(item.status, ItemStatus::NewFacility);
  }

  #[test]
  fn reject_nonpending_match_is_invalid() {
    let (item, mut matches) = potential(2);
    matches[1].status = MatchStatus::Rejected;
    let id = matches[1].match_id;
    let err = reject(item, matches, id).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }
}
