//! The selection arena — a single guard for "same facility on both sides".
//!
//! Merge and split both stage the facility IDs they are about to
//! restructure. Staging the same ID twice in one call rejects the call as a
//! self-merge; staging an ID another in-flight call already holds rejects
//! it as a conflicting selection. Callers hold the returned lease for the
//! duration of the operation; the IDs are released when the lease drops.

use std::{
  collections::HashMap,
  sync::Mutex,
};

use uuid::Uuid;

use crate::{Error, Result};

// ─── Arena ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SelectionArena {
  staged: Mutex<HashMap<Uuid, &'static str>>,
}

impl SelectionArena {
  pub fn new() -> Self { Self::default() }

  /// Stage `entries` (role, facility ID) for one operation.
  ///
  /// Returns [`Error::SelfMergeRejected`] when one call stages the same ID
  /// in two roles, and [`Error::ConflictingMergeSelection`] when an ID is
  /// already staged by a concurrent operation. On success every ID is held
  /// until the lease drops.
  pub fn stage(
    &self,
    entries: &[(&'static str, Uuid)],
  ) -> Result<SelectionLease<'_>> {
    for (i, (_, id)) in entries.iter().enumerate() {
      if id.is_nil() {
        return Err(Error::Validation("nil facility id".into()));
      }
      if entries[..i].iter().any(|(_, prior)| prior == id) {
        return Err(Error::SelfMergeRejected);
      }
    }

    let mut staged =
      self.staged.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some((_, id)) =
      entries.iter().find(|(_, id)| staged.contains_key(id))
    {
      return Err(Error::ConflictingMergeSelection(*id));
    }
    for (role, id) in entries {
      staged.insert(*id, role);
    }

    Ok(SelectionLease {
      arena: self,
      ids:   entries.iter().map(|(_, id)| *id).collect(),
    })
  }
}

// ─── Lease ───────────────────────────────────────────────────────────────────

/// Holds staged IDs until dropped.
#[derive(Debug)]
#[must_use = "dropping the lease releases the staged facilities"]
pub struct SelectionLease<'a> {
  arena: &'a SelectionArena,
  ids:   Vec<Uuid>,
}

impl Drop for SelectionLease<'_> {
  fn drop(&mut self) {
    // Must not panic: this Drop can run during unwinding.
    let mut staged = self
      .arena
      .staged
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    for id in &self.ids {
      staged.remove(id);
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_id_in_two_roles_is_a_self_merge() {
    let arena = SelectionArena::new();
    let id = Uuid::new_v4();
    let err = arena.stage(&[("target", id), ("source", id)]).unwrap_err();
    assert!(matches!(err, Error::SelfMergeRejected));
  }

  #[test]
  fn nil_id_fails_validation() {
    let arena = SelectionArena::new();
    let err = arena.stage(&[("target", Uuid::nil())]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn overlapping_concurrent_selection_conflicts() {
    let arena = SelectionArena::new();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let lease = arena.stage(&[("target", a), ("source", b)]).unwrap();
    let err = arena.stage(&[("target", c), ("source", a)]).unwrap_err();
    assert!(matches!(err, Error::ConflictingMergeSelection(id) if id == a));

    // Releasing the first selection clears the conflict.
    drop(lease);
    arena.stage(&[("target", c), ("source", a)]).unwrap();
  }

  #[test]
  fn disjoint_selections_proceed_concurrently() {
    let arena = SelectionArena::new();
    let _one = arena
      .stage(&[("target", Uuid::new_v4()), ("source", Uuid::new_v4())])
      .unwrap();
    let _two = arena.stage(&[("original", Uuid::new_v4())]).unwrap();
  }

  #[test]
  fn failed_stage_holds_nothing() {
    let arena = SelectionArena::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let lease = arena.stage(&[("target", a)]).unwrap();
    // b was part of the failed call; it must not be left staged.
    assert!(arena.stage(&[("source", a), ("target", b)]).is_err());
    drop(lease);
    arena.stage(&[("target", b), ("source", a)]).unwrap();
  }
}
