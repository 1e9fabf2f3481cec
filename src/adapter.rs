//! The adapter contract (§6, "Adapter API (internal)"): the seam between
//! the transition engine (C4) and whichever external store backs it —
//! nothing (C5), the History/location API (C6), or a platform Navigation
//! API (C7).

use crate::destination::Destination;
use crate::error::NavigationError;
use crate::handlers::LocalBoxFuture;
use crate::state::NavigationState;
use crate::transition::TransitionEvent;

/// Implemented by each of the three binding modes. `commit` reconciles the
/// engine's decision with the external store; `new_navigation_state` is
/// only overridden by adapters for which the external store is itself the
/// source of truth (C7), letting Phase 4 adopt its snapshot wholesale
/// instead of applying the table in §4.4.5.
pub trait Adapter {
    /// Origin used to compute `Destination::same_document`.
    fn origin(&self) -> &str;

    /// Base path prepended to relative URLs (§9, `getUrl(origin, url, base)`).
    fn base(&self) -> &str;

    /// Reconciles `to`/`event` with the external store. Suppressed
    /// (`skip_commit=true`) when the engine is reacting to an external
    /// mutation it must not echo back (host `popstate`, patched
    /// `history.*` calls).
    fn commit<'a>(
        &'a self,
        to: &'a Destination,
        event: &'a TransitionEvent,
        skip_commit: bool,
    ) -> LocalBoxFuture<'a, Result<(), NavigationError>>;

    /// When the external store is authoritative (C7), returns its current
    /// snapshot so Phase 4 can adopt it wholesale instead of computing the
    /// table in §4.4.5.
    fn new_navigation_state(&self) -> Option<NavigationState> {
        None
    }
}
