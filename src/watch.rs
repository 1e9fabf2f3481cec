//! A minimal "latest value" change stream, standing in for a
//! `tokio::sync::watch` without pulling in `tokio` (see SPEC_FULL.md,
//! "Async model"). Backs the pull-based projections of §4.2 and the
//! `whenBlocked` subscription of §4.8.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

struct Inner<T> {
    current: RefCell<T>,
    subscribers: RefCell<Vec<UnboundedSender<T>>>,
}

/// A single-writer, multi-reader cell that only notifies subscribers when
/// the new value is structurally different from the last one observed —
/// "two equal values must not emit a change" (§4.2).
#[derive(Clone)]
pub struct Watch<T> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + PartialEq> Watch<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                current: RefCell::new(initial),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.current.borrow().clone()
    }

    /// Updates the held value, notifying subscribers only if it changed.
    pub fn set(&self, value: T) {
        let changed = *self.inner.current.borrow() != value;
        *self.inner.current.borrow_mut() = value.clone();
        if !changed {
            return;
        }
        self.inner
            .subscribers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(value.clone()).is_ok());
    }

    pub fn subscribe(&self) -> Watcher<T> {
        let (tx, rx) = unbounded();
        self.inner.subscribers.borrow_mut().push(tx);
        Watcher { receiver: rx }
    }
}

/// A subscription to a [`Watch`]'s change stream.
pub struct Watcher<T> {
    receiver: UnboundedReceiver<T>,
}

impl<T> Watcher<T> {
    pub async fn next(&mut self) -> Option<T> {
        use futures::StreamExt;
        self.receiver.next().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn skips_duplicate_values() {
        let watch = Watch::new(1);
        let mut watcher = watch.subscribe();
        watch.set(1);
        watch.set(2);
        watch.set(2);
        watch.set(3);
        drop(watch);
        let observed: Vec<i32> = block_on(async {
            let mut out = Vec::new();
            while let Some(v) = watcher.next().await {
                out.push(v);
            }
            out
        });
        assert_eq!(observed, vec![2, 3]);
    }
}
