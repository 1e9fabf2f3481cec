//! The navigation state cell (C2): an observable ordered list of
//! destinations, the current index, and the in-flight transition, if any.

use std::rc::Rc;

use futures::lock::Mutex;

use crate::destination::Destination;
use crate::handlers::LocalBoxFuture;
use crate::transition::TransitionEvent;
use crate::watch::{Watch, Watcher};

/// `entries.len() >= 1`; `0 <= index < entries.len()`; `transition` is
/// `Some` only strictly between Phase 1 (Propose) and the end of Phase 4
/// (Mutate) of an in-flight operation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    pub entries: Vec<Destination>,
    pub index: usize,
    pub transition: Option<TransitionEvent>,
}

impl NavigationState {
    pub fn new(initial: Destination) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
            transition: None,
        }
    }

    pub fn current_entry(&self) -> &Destination {
        &self.entries[self.index]
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Keeps the last `max_entries` entries and clamps `index` into
    /// range. Idempotent, and preserves an in-flight `transition`.
    pub fn clamp(mut self, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        if self.entries.len() > max_entries {
            let drop_count = self.entries.len() - max_entries;
            self.entries.drain(0..drop_count);
            self.index = self.index.saturating_sub(drop_count);
        }
        if self.index >= self.entries.len() {
            self.index = self.entries.len() - 1;
        }
        self
    }
}

/// Handle passed to the closure given to [`NavigationCell::run_updates`].
/// Guarantees no interleaving between the `get` that opens the closure and
/// the final `set` that closes it, because the mutex guard backing it is
/// held for the closure's whole lifetime.
pub struct StateHandle<'a> {
    cell: &'a NavigationCell,
}

impl<'a> StateHandle<'a> {
    pub fn get(&self) -> NavigationState {
        self.cell.watch.get()
    }

    pub fn set(&self, state: NavigationState) {
        self.cell.watch.set(state.clamp(self.cell.max_entries));
    }
}

/// The state cell (C2). Owns the single [`NavigationState`] value and
/// serializes writers FIFO: concurrent `run_updates` calls queue and run
/// one at a time, matching §5's "two concurrent `navigate` calls are
/// linearized" guarantee.
pub struct NavigationCell {
    watch: Watch<NavigationState>,
    lock: Mutex<()>,
    max_entries: usize,
}

impl NavigationCell {
    pub fn new(initial: NavigationState, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            watch: Watch::new(initial.clamp(max_entries)),
            lock: Mutex::new(()),
            max_entries,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Serialized read/update. `f` receives a [`StateHandle`] whose `get`
    /// and `set` operate under the same FIFO-acquired guard.
    pub async fn run_updates<F, T>(&self, f: F) -> T
    where
        F: for<'a> FnOnce(StateHandle<'a>) -> LocalBoxFuture<'a, T>,
    {
        let _guard = self.lock.lock().await;
        let handle = StateHandle { cell: self };
        f(handle).await
    }

    pub fn current(&self) -> NavigationState {
        self.watch.get()
    }

    pub fn current_entry(&self) -> Destination {
        self.watch.get().current_entry().clone()
    }

    pub fn can_go_back(&self) -> bool {
        self.watch.get().can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.watch.get().can_go_forward()
    }

    pub fn transition(&self) -> Option<TransitionEvent> {
        self.watch.get().transition
    }

    pub fn entries(&self) -> Vec<Destination> {
        self.watch.get().entries
    }

    pub fn watch_state(&self) -> Watcher<NavigationState> {
        self.watch.subscribe()
    }
}

pub type SharedNavigationCell = Rc<NavigationCell>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;
    use serde_json::Value;
    use url::Url;

    fn dest(path: &str) -> Destination {
        Destination::make(
            Url::parse(&format!("https://example.com{path}")).unwrap(),
            Value::Null,
            "https://example.com",
        )
    }

    #[test]
    fn clamp_keeps_last_n_and_clamps_index() {
        let mut state = NavigationState::new(dest("/1"));
        for i in 2..=6 {
            state.entries.push(dest(&format!("/{i}")));
        }
        state.index = 5;
        let clamped = state.clamp(3);
        assert_eq!(clamped.entries.len(), 3);
        assert_eq!(clamped.index, 2);
        assert_eq!(clamped.entries.last().unwrap().url.path(), "/6");
    }

    #[test]
    fn clamp_is_idempotent() {
        let state = NavigationState::new(dest("/1")).clamp(3);
        let twice = state.clone().clamp(3);
        assert_eq!(state, twice);
    }
}
