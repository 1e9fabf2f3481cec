//! Handler registries (C3): two insertion-ordered sets of scoped
//! subscriptions, one vetoable (before), one observational (after).

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};

use crate::error::BeforeHandlerError;
use crate::transition::{NavigationEvent, TransitionEvent};

pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A unit of work a before-handler defers instead of executing inline —
/// models the source's `void | Option` ambiguity as a plain `Option`
/// (§9: "pick `Option` only").
pub type DeferredEffect = LocalBoxFuture<'static, Result<(), BeforeHandlerError>>;

/// A before-handler may abstain, defer work, or veto/redirect the
/// transition by failing.
pub type BeforeHandlerFn =
    Rc<dyn Fn(TransitionEvent) -> LocalBoxFuture<'static, Result<Option<DeferredEffect>, BeforeHandlerError>>>;

/// A unit of work an after-handler defers until after the whole batch has
/// been polled; its result is discarded (logged if `Err`).
pub type AfterDeferredEffect = LocalBoxFuture<'static, Result<(), crate::error::NavigationError>>;

/// An after-handler observes a committed transition and may optionally
/// defer a side effect. It cannot fail the *transition* (§4.4.6) — an
/// `Err` return is logged and dropped, never surfaced to the caller.
pub type AfterHandlerFn = Rc<
    dyn Fn(
        NavigationEvent,
    ) -> LocalBoxFuture<'static, Result<Option<AfterDeferredEffect>, crate::error::NavigationError>>,
>;

struct Entry<H> {
    id: u64,
    handler: H,
}

/// An insertion-ordered set of `(handler, captured context)` pairs, where
/// "captured context" is whatever the registered closure closes over.
/// Registration returns a [`HandlerScope`] that removes the pair on drop.
pub struct HandlerRegistry<H> {
    entries: Rc<RefCell<Vec<Entry<H>>>>,
    next_id: Rc<RefCell<u64>>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(RefCell::new(0)),
        }
    }
}

impl<H: Clone> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: H) -> HandlerScope<H> {
        let mut next_id = self.next_id.borrow_mut();
        let id = *next_id;
        *next_id += 1;
        drop(next_id);
        self.entries.borrow_mut().push(Entry { id, handler });
        HandlerScope {
            entries: Rc::downgrade(&self.entries),
            id,
        }
    }

    /// Snapshot-iterate: registrations made during iteration of this
    /// snapshot are not observed by it (§4.3).
    pub fn snapshot(&self) -> Vec<H> {
        self.entries.borrow().iter().map(|e| e.handler.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped acquisition: dropping this removes exactly the `(handler, ctx)`
/// pair it was returned for.
pub struct HandlerScope<H> {
    entries: Weak<RefCell<Vec<Entry<H>>>>,
    id: u64,
}

impl<H> Drop for HandlerScope<H> {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.borrow_mut().retain(|e| e.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_insertion_ordered_and_scope_removes_on_drop() {
        let registry: HandlerRegistry<Rc<str>> = HandlerRegistry::new();
        let a = registry.register(Rc::from("a"));
        let b = registry.register(Rc::from("b"));
        assert_eq!(
            registry.snapshot().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        drop(a);
        assert_eq!(
            registry.snapshot().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            vec!["b"]
        );
        drop(b);
        assert!(registry.is_empty());
    }
}
