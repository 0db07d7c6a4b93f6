//! The authorization decision point for mutating operations.
//!
//! Who may confirm, reject, merge, or split is a product policy owned by
//! the surrounding system; this trait is only the seam where that decision
//! plugs in. Caller identity travels through whatever auth layer fronts
//! the router, not through the engine.

/// Consulted once per mutating request, before the store is touched.
pub trait ModerationPolicy: Send + Sync {
  fn allow_moderate(&self) -> bool;
}

/// Default policy: every caller may moderate. Deployments front the router
/// with their own auth and swap this out.
pub struct AllowAll;

impl ModerationPolicy for AllowAll {
  fn allow_moderate(&self) -> bool { true }
}
