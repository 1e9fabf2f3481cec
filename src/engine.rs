//! The transition engine (C4): the hardest component in the design. Drives
//! one transition through five phases — Propose, Before, Commit, Mutate,
//! After — with re-entrant redirects and a deferred-confirmation cancel
//! path.

use std::rc::Rc;

use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::adapter::Adapter;
use crate::destination::{same_slot, Destination, DestinationOrProposed, ProposedDestination};
use crate::error::{BeforeHandlerError, NavigationError};
use crate::handlers::{AfterHandlerFn, BeforeHandlerFn, HandlerRegistry, HandlerScope};
use crate::state::{NavigationCell, NavigationState};
use crate::transition::{HistoryMode, NavigateOptions, NavigationEvent, TransitionEvent, TransitionType};
use crate::url_util::resolve_url;

/// Redirect chains deeper than this are a fatal logic error (§4.4.6bis).
pub const MAX_REDIRECT_DEPTH: u32 = 25;

/// The result of one pass through Propose → Before → Commit → Mutate.
enum StepOutcome {
    /// Committed; carries the destination that became current and the
    /// event that committed it (After-handlers need both).
    Committed(Destination, TransitionEvent),
    /// A before-handler cancelled; carries the unchanged current entry.
    Cancelled(Destination),
    /// A before-handler redirected; loop again with this event.
    Redirect(TransitionEvent),
}

enum BeforeOutcome {
    Proceed(TransitionEvent),
    Redirect(crate::error::RedirectSignal),
    Cancelled,
}

/// Orchestrates the engine's operation surface (§4.4.1) over a
/// [`NavigationCell`], a pair of handler registries, and an [`Adapter`].
pub struct NavigationEngine {
    cell: Rc<NavigationCell>,
    before: HandlerRegistry<BeforeHandlerFn>,
    after: HandlerRegistry<AfterHandlerFn>,
    adapter: Rc<dyn Adapter>,
}

impl NavigationEngine {
    pub fn new(cell: Rc<NavigationCell>, adapter: Rc<dyn Adapter>) -> Self {
        Self {
            cell,
            before: HandlerRegistry::new(),
            after: HandlerRegistry::new(),
            adapter,
        }
    }

    pub fn cell(&self) -> &Rc<NavigationCell> {
        &self.cell
    }

    pub fn origin(&self) -> &str {
        self.adapter.origin()
    }

    pub fn base(&self) -> &str {
        self.adapter.base()
    }

    pub fn current_entry(&self) -> Destination {
        self.cell.current_entry()
    }

    pub fn entries(&self) -> Vec<Destination> {
        self.cell.entries()
    }

    pub fn can_go_back(&self) -> bool {
        self.cell.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.cell.can_go_forward()
    }

    pub fn transition(&self) -> Option<TransitionEvent> {
        self.cell.transition()
    }

    /// Registers a before-handler; dropping the returned scope
    /// deregisters it (§4.3).
    pub fn before_navigation(&self, handler: BeforeHandlerFn) -> HandlerScope<BeforeHandlerFn> {
        self.before.register(handler)
    }

    /// Registers an after-handler; dropping the returned scope
    /// deregisters it.
    pub fn on_navigation(&self, handler: AfterHandlerFn) -> HandlerScope<AfterHandlerFn> {
        self.after.register(handler)
    }

    // ---- Operation surface (§4.4.1) -----------------------------------

    pub async fn navigate(&self, url: &str, options: NavigateOptions) -> Result<Destination, NavigationError> {
        let resolved = resolve_url(self.origin(), self.base(), url)
            .map_err(|e| NavigationError::InvalidState(e.to_string()))?;
        self.run_transition(false, move |current| Some(Self::propose_navigate(current, self.origin(), resolved, &options)))
            .await
    }

    pub async fn back(&self, info: Value) -> Result<Destination, NavigationError> {
        self.run_transition(false, move |current| {
            if !current.can_go_back() {
                return None;
            }
            Some(Self::propose_traverse(current, current.index - 1, info.clone()))
        })
        .await
    }

    pub async fn forward(&self, info: Value) -> Result<Destination, NavigationError> {
        self.run_transition(false, move |current| {
            if !current.can_go_forward() {
                return None;
            }
            Some(Self::propose_traverse(current, current.index + 1, info.clone()))
        })
        .await
    }

    /// Traverses by an arbitrary signed delta (the `history.go(delta)`
    /// shape); out-of-range deltas are clamped to a no-op rather than an
    /// error, matching [`Self::back`]/[`Self::forward`] at the bounds.
    pub async fn go(&self, delta: i64, info: Value) -> Result<Destination, NavigationError> {
        self.run_transition(false, move |current| {
            let target = current.index as i64 + delta;
            if target < 0 || target as usize >= current.entries.len() {
                return None;
            }
            Some(Self::propose_traverse(current, target as usize, info.clone()))
        })
        .await
    }

    pub async fn traverse_to(&self, key: Uuid, info: Value) -> Result<Destination, NavigationError> {
        self.run_transition(false, move |current| {
            let target_index = current.entries.iter().position(|d| d.key == key)?;
            Some(Self::propose_traverse(current, target_index, info.clone()))
        })
        .await
    }

    pub async fn reload(&self, info: Value) -> Result<Destination, NavigationError> {
        self.run_transition(false, move |current| {
            let from = current.current_entry().clone();
            let to = from.retarget();
            Some(TransitionEvent {
                kind: TransitionType::Reload,
                from,
                to: DestinationOrProposed::Destination(to),
                delta: 0,
                info: info.clone(),
            })
        })
        .await
    }

    pub async fn update_current_entry(&self, state: Value) -> Result<Destination, NavigationError> {
        self.run_transition(false, move |current| {
            let from = current.current_entry().clone();
            let mut to = from.retarget();
            to.state = state.clone();
            Some(TransitionEvent {
                kind: TransitionType::Replace,
                from,
                to: DestinationOrProposed::Destination(to),
                delta: 0,
                info: Value::Null,
            })
        })
        .await
    }

    /// Entry point used by adapters reacting to an external mutation
    /// (host `popstate`, patched `history.*` calls): builds and runs a
    /// transition with `skip_commit=true` so the engine doesn't echo the
    /// mutation back to the host.
    pub async fn navigate_external(
        &self,
        url: Url,
        state: Value,
        info: Value,
        history: HistoryMode,
    ) -> Result<Destination, NavigationError> {
        let options = NavigateOptions {
            history,
            state,
            info,
        };
        self.run_transition(true, move |current| {
            Some(Self::propose_navigate(current, self.origin(), url.clone(), &options))
        })
        .await
    }

    pub async fn traverse_to_skip_commit(&self, key: Uuid, info: Value) -> Result<Destination, NavigationError> {
        self.run_transition(true, move |current| {
            let target_index = current.entries.iter().position(|d| d.key == key)?;
            Some(Self::propose_traverse(current, target_index, info.clone()))
        })
        .await
    }

    // ---- Phase 1: Propose ----------------------------------------------

    fn propose_navigate(current: &NavigationState, origin: &str, url: Url, options: &NavigateOptions) -> TransitionEvent {
        let from = current.current_entry().clone();
        let is_same_slot = same_slot(&from.url, &url);
        let kind = match options.history {
            HistoryMode::Push => TransitionType::Push,
            HistoryMode::Replace => TransitionType::Replace,
            HistoryMode::Auto => {
                if is_same_slot {
                    TransitionType::Replace
                } else {
                    TransitionType::Push
                }
            }
        };
        // A replace (explicit or Auto-resolved) targets the same slot as
        // `from` whenever the URLs agree, so its identity is resolved now,
        // via `make_or_update`, instead of deferred to Commit's upgrade —
        // that's the only way the resulting entry reuses `from.key`.
        let to = match kind {
            TransitionType::Replace => DestinationOrProposed::Destination(Destination::make_or_update(&from, url, options.state.clone(), origin)),
            _ => DestinationOrProposed::Proposed(ProposedDestination::new(url, options.state.clone(), origin)),
        };
        TransitionEvent {
            kind,
            from,
            to,
            delta: 0,
            info: options.info.clone(),
        }
    }

    fn propose_traverse(current: &NavigationState, target_index: usize, info: Value) -> TransitionEvent {
        let from = current.current_entry().clone();
        let to = current.entries[target_index].retarget();
        TransitionEvent {
            kind: TransitionType::Traverse,
            from,
            delta: target_index as i64 - current.index as i64,
            to: DestinationOrProposed::Destination(to),
            info,
        }
    }

    // ---- Driver: Propose → Before → Commit → Mutate, looped on redirect -

    async fn run_transition<F>(&self, skip_commit: bool, build_initial: F) -> Result<Destination, NavigationError>
    where
        F: FnOnce(&NavigationState) -> Option<TransitionEvent>,
    {
        let Some(mut event) = ({
            let current = self.cell.current();
            build_initial(&current)
        }) else {
            return Ok(self.cell.current_entry());
        };

        let mut depth: u32 = 0;
        loop {
            depth += 1;
            if depth > MAX_REDIRECT_DEPTH {
                log::error!("redirect loop detected at depth {depth}");
                return Err(NavigationError::RedirectLoop { depth });
            }

            let outcome = self.step(event, skip_commit).await?;
            match outcome {
                StepOutcome::Committed(to, committed_event) => {
                    let navigation_event = NavigationEvent {
                        kind: committed_event.kind,
                        destination: to.clone(),
                        info: committed_event.info.clone(),
                    };
                    self.dispatch_after(navigation_event).await;
                    return Ok(to);
                }
                StepOutcome::Cancelled(current) => return Ok(current),
                StepOutcome::Redirect(next_event) => {
                    event = next_event;
                    continue;
                }
            }
        }
    }

    /// One pass through Propose (already built) → Before → Commit →
    /// Mutate, all under a single [`NavigationCell::run_updates`] guard so
    /// a concurrent operation is linearized behind this one through the
    /// end of Mutate (§5).
    async fn step(&self, event: TransitionEvent, skip_commit: bool) -> Result<StepOutcome, NavigationError> {
        let before = self.before.snapshot();
        let adapter = Rc::clone(&self.adapter);
        self.cell
            .run_updates(move |handle| {
                Box::pin(async move {
                let mut proposing = handle.get();
                proposing.transition = Some(event.clone());
                handle.set(proposing);

                match Self::run_before_handlers(&before, event.clone()).await? {
                    BeforeOutcome::Cancelled => {
                        let cleared = NavigationState {
                            transition: None,
                            ..handle.get()
                        };
                        handle.set(cleared.clone());
                        Ok(StepOutcome::Cancelled(cleared.current_entry().clone()))
                    }
                    BeforeOutcome::Redirect(signal) => {
                        let cleared = NavigationState {
                            transition: None,
                            ..handle.get()
                        };
                        let from = cleared.current_entry().clone();
                        handle.set(cleared);
                        let redirect_url = resolve_url(adapter.origin(), adapter.base(), &signal.path)
                            .map_err(|e| NavigationError::InvalidState(e.to_string()))?;
                        let to = Destination::make(
                            redirect_url,
                            signal.state.unwrap_or(Value::Null),
                            adapter.origin(),
                        );
                        Ok(StepOutcome::Redirect(TransitionEvent {
                            kind: TransitionType::Replace,
                            from,
                            to: DestinationOrProposed::Destination(to),
                            delta: 0,
                            info: signal.info.unwrap_or(Value::Null),
                        }))
                    }
                    BeforeOutcome::Proceed(event) => {
                        let to = event.to.clone().into_destination();
                        if let Err(err) = adapter.commit(&to, &event, skip_commit).await {
                            log::error!("commit failed: {err}");
                            let cleared = NavigationState {
                                transition: None,
                                ..handle.get()
                            };
                            handle.set(cleared);
                            return Err(err);
                        }
                        let mutated = match adapter.new_navigation_state() {
                            Some(authoritative) => authoritative,
                            None => Self::mutate(handle.get(), &event, to.clone()),
                        };
                        let committed = mutated.current_entry().clone();
                        handle.set(mutated);
                        Ok(StepOutcome::Committed(committed, event))
                    }
                }
                }) as crate::handlers::LocalBoxFuture<'_, Result<StepOutcome, NavigationError>>
            })
            .await
    }

    async fn run_before_handlers(
        before: &[BeforeHandlerFn],
        event: TransitionEvent,
    ) -> Result<BeforeOutcome, NavigationError> {
        let mut deferred = Vec::new();
        for handler in before {
            match handler(event.clone()).await {
                Ok(None) => {}
                Ok(Some(effect)) => deferred.push(effect),
                Err(BeforeHandlerError::Redirect(signal)) => return Ok(BeforeOutcome::Redirect(signal)),
                Err(BeforeHandlerError::Cancel(_)) => return Ok(BeforeOutcome::Cancelled),
                Err(BeforeHandlerError::Other(err)) => return Err(err),
            }
        }
        for effect in deferred {
            match effect.await {
                Ok(()) => {}
                Err(BeforeHandlerError::Redirect(signal)) => return Ok(BeforeOutcome::Redirect(signal)),
                Err(BeforeHandlerError::Cancel(_)) => return Ok(BeforeOutcome::Cancelled),
                Err(BeforeHandlerError::Other(err)) => return Err(err),
            }
        }
        Ok(BeforeOutcome::Proceed(event))
    }

    /// Phase 4 (§4.4.5): applies the per-`type` transform when the adapter
    /// does not supply an authoritative snapshot.
    fn mutate(mut state: NavigationState, event: &TransitionEvent, to: Destination) -> NavigationState {
        match event.kind {
            TransitionType::Push => {
                state.entries.truncate(state.index + 1);
                state.entries.push(to);
                state.index += 1;
            }
            TransitionType::Replace | TransitionType::Reload => {
                state.entries[state.index] = to;
            }
            TransitionType::Traverse => {
                let target = (state.index as i64 + event.delta) as usize;
                state.entries[target] = to;
                state.index = target;
            }
        }
        state.transition = None;
        state
    }

    /// Phase 5 (§4.4.6): runs after-handlers with `navigation_event`.
    /// Deferred effects from this batch run concurrently; their results
    /// are discarded (logged if `Err`). After-handlers cannot fail the
    /// transition. Also the entry point a C7-style adapter uses to
    /// announce a host-originated move it intercepted (before-handlers
    /// do not apply there — they never ran).
    pub(crate) async fn dispatch_after(&self, navigation_event: NavigationEvent) {
        let handlers = self.after.snapshot();
        let mut deferred = Vec::new();
        for handler in &handlers {
            match handler(navigation_event.clone()).await {
                Ok(None) => {}
                Ok(Some(effect)) => deferred.push(effect),
                Err(err) => log::warn!("after-handler failed, dropped: {err}"),
            }
        }
        let results = futures::future::join_all(deferred).await;
        for result in results {
            if let Err(err) = result {
                log::warn!("deferred after-effect failed, dropped: {err}");
            }
        }
    }
}
