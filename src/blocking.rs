//! The blocking façade (C8): layers one before-handler atop the engine
//! that turns an in-flight transition into an observable request awaiting
//! a single consumer's confirm/cancel/redirect decision.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::error::{BeforeHandlerError, CancelSignal, RedirectSignal};
use crate::engine::NavigationEngine;
use crate::handlers::HandlerScope;
use crate::transition::TransitionEvent;
use crate::watch::{Watch, Watcher};

/// The decision channel handed to a consumer while a transition is
/// blocked. Any one of its methods settles the underlying awaiter exactly
/// once; further calls are no-ops (mirrors a one-shot settlement channel
/// that can only fire once).
#[derive(Clone)]
pub struct Blocking {
    pub event: TransitionEvent,
    settle: Rc<RefCell<Option<oneshot::Sender<Result<(), BeforeHandlerError>>>>>,
}

impl PartialEq for Blocking {
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event && Rc::ptr_eq(&self.settle, &other.settle)
    }
}

impl Blocking {
    fn settle(&self, outcome: Result<(), BeforeHandlerError>) {
        if let Some(tx) = self.settle.borrow_mut().take() {
            let _ = tx.send(outcome);
        }
    }

    pub fn confirm(&self) {
        self.settle(Ok(()));
    }

    pub fn cancel(&self) {
        self.settle(Err(BeforeHandlerError::Cancel(CancelSignal)));
    }

    pub fn redirect(&self, url: impl Into<String>) {
        self.settle(Err(BeforeHandlerError::Redirect(RedirectSignal::new(url))));
    }
}

/// Decides, per transition, whether the façade should engage at all.
/// Default: always block.
pub type ShouldBlock = Rc<dyn Fn(&TransitionEvent) -> bool>;

#[derive(Default, Clone)]
pub struct BlockNavigationOptions {
    pub should_block: Option<ShouldBlock>,
}

impl BlockNavigationOptions {
    pub fn with_should_block(mut self, predicate: ShouldBlock) -> Self {
        self.should_block = Some(predicate);
        self
    }
}

/// Installs the blocking before-handler and owns the `Unblocked ⇄
/// Blocked` cell. The handler abstains while already `Blocked` — per §9's
/// resolution of the "second concurrent navigation during a block" open
/// question, a second event is not re-blocked and proceeds through other
/// before-handlers unimpeded.
pub struct BlockingFacade {
    state: Watch<Option<Blocking>>,
    _scope: HandlerScope<crate::handlers::BeforeHandlerFn>,
}

impl BlockingFacade {
    pub fn install(engine: &NavigationEngine, options: BlockNavigationOptions) -> Self {
        let state: Watch<Option<Blocking>> = Watch::new(None);
        let state_for_handler = state.clone();
        let should_block = options.should_block;

        let scope = engine.before_navigation(Rc::new(move |event: TransitionEvent| -> crate::handlers::LocalBoxFuture<
            'static,
            Result<Option<crate::handlers::DeferredEffect>, BeforeHandlerError>,
        > {
            let state = state_for_handler.clone();
            let should_block = should_block.clone();
            Box::pin(async move {
                if state.get().is_some() {
                    // Already blocked: abstain rather than re-block (§9).
                    return Ok(None);
                }
                if let Some(predicate) = &should_block {
                    if !predicate(&event) {
                        return Ok(None);
                    }
                }

                let (tx, rx) = oneshot::channel();
                let blocking = Blocking {
                    event: event.clone(),
                    settle: Rc::new(RefCell::new(Some(tx))),
                };
                state.set(Some(blocking));

                let deferred_state = state.clone();
                let deferred: crate::handlers::DeferredEffect = Box::pin(async move {
                    let outcome = rx.await.unwrap_or(Err(BeforeHandlerError::Cancel(CancelSignal)));
                    deferred_state.set(None);
                    outcome
                });
                Ok(Some(deferred))
            })
        }));

        Self {
            state,
            _scope: scope,
        }
    }

    pub fn current(&self) -> Option<Blocking> {
        self.state.get()
    }

    pub fn watch(&self) -> Watcher<Option<Blocking>> {
        self.state.subscribe()
    }

    /// Subscribes to the blocking stream and invokes `handler` once per
    /// blocked event (§4.8's `whenBlocked`).
    pub async fn when_blocked<F>(&self, mut handler: F)
    where
        F: FnMut(Blocking),
    {
        let mut watcher = self.watch();
        while let Some(value) = watcher.next().await {
            if let Some(blocking) = value {
                handler(blocking);
            }
        }
    }
}
