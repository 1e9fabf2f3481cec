//! End-to-end scenarios over the memory adapter, mirroring the concrete
//! walkthroughs used to validate the transition engine's phase ordering.

use std::cell::Cell;
use std::rc::Rc;

use futures::executor::block_on;
use serde_json::{json, Value};

use typed_navigation::prelude::*;

fn engine_at(url: &str, state: Value, max_entries: usize) -> (NavigationEngine, uuid::Uuid) {
    let config = MemoryAdapterConfigFromUrl::new(url::Url::parse(url).unwrap())
        .with_state(state)
        .with_max_entries(max_entries);
    let (adapter, nav_state, max_entries) = MemoryAdapter::with_url(config);
    let initial_key = nav_state.entries[0].key;
    let cell = Rc::new(NavigationCell::new(nav_state, max_entries));
    (NavigationEngine::new(cell, Rc::new(adapter)), initial_key)
}

#[test]
fn push_back_forward_counter_walkthrough() {
    let (engine, initial_key) = engine_at("https://example.com/foo/1", json!({"x": 0.5}), 3);
    let counter = Rc::new(Cell::new(0_i64));

    let before_counter = counter.clone();
    let _before = engine.before_navigation(Rc::new(
        move |_event: TransitionEvent| -> LocalBoxFuture<'static, Result<Option<DeferredEffect>, BeforeHandlerError>> {
            let counter = before_counter.clone();
            Box::pin(async move {
                counter.set(counter.get() + 10);
                Ok(None)
            })
        },
    ));

    let after_counter = counter.clone();
    let _after = engine.on_navigation(Rc::new(
        move |_event: NavigationEvent| -> LocalBoxFuture<'static, Result<Option<AfterDeferredEffect>, NavigationError>> {
            let counter = after_counter.clone();
            Box::pin(async move {
                counter.set(counter.get() * 2);
                Ok(None)
            })
        },
    ));

    block_on(engine.navigate("/foo/2", NavigateOptions::default())).unwrap();
    assert_eq!(counter.get(), 20);

    block_on(engine.back(Value::Null)).unwrap();
    block_on(engine.forward(Value::Null)).unwrap();
    assert_eq!(counter.get(), 140);

    block_on(engine.navigate("/foo/3", NavigateOptions::default())).unwrap();
    assert_eq!(counter.get(), 300);

    block_on(engine.traverse_to(initial_key, Value::Null)).unwrap();
    block_on(engine.forward(Value::Null)).unwrap();
    assert_eq!(counter.get(), 1260);
}

#[test]
fn max_entries_keeps_last_three_pushes() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 3);
    for path in ["/4", "/5", "/6"] {
        block_on(engine.navigate(path, NavigateOptions::default().with_history(HistoryMode::Push))).unwrap();
    }
    let paths: Vec<_> = engine.entries().iter().map(|d| d.url.path().to_string()).collect();
    assert_eq!(paths, vec!["/4", "/5", "/6"]);
}

#[test]
fn redirect_on_before_handler_commits_as_replace() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let _before = engine.before_navigation(Rc::new(
        |event: TransitionEvent| -> LocalBoxFuture<'static, Result<Option<DeferredEffect>, BeforeHandlerError>> {
            Box::pin(async move {
                if event.to.url().path() == "/foo/1" {
                    return Err(BeforeHandlerError::Redirect(RedirectSignal::new("/bar/42")));
                }
                Ok(None)
            })
        },
    ));

    let result = block_on(engine.navigate("/foo/1", NavigateOptions::default())).unwrap();
    assert_eq!(result.url.path(), "/bar/42");
    assert_eq!(engine.entries().len(), 1);
    assert_eq!(engine.entries()[0].url.path(), "/bar/42");
}

#[test]
fn cancel_on_before_handler_leaves_state_unchanged() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let _before = engine.before_navigation(Rc::new(
        |event: TransitionEvent| -> LocalBoxFuture<'static, Result<Option<DeferredEffect>, BeforeHandlerError>> {
            Box::pin(async move {
                if event.to.url().path() == "/bar/42" {
                    return Err(BeforeHandlerError::Cancel(CancelSignal));
                }
                Ok(None)
            })
        },
    ));

    let result = block_on(engine.navigate("/bar/42", NavigateOptions::default())).unwrap();
    assert_eq!(result.url.path(), "/foo/1");
    assert_eq!(engine.entries().len(), 1);
}

#[test]
fn after_handler_observes_only_the_committed_url() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let before_calls = Rc::new(Cell::new(0_u32));
    let before_calls_handler = before_calls.clone();
    let _before = engine.before_navigation(Rc::new(
        move |event: TransitionEvent| -> LocalBoxFuture<'static, Result<Option<DeferredEffect>, BeforeHandlerError>> {
            let calls = before_calls_handler.clone();
            Box::pin(async move {
                calls.set(calls.get() + 1);
                if event.to.url().path() == "/foo/2" {
                    return Err(BeforeHandlerError::Redirect(RedirectSignal::new("/bar/42")));
                }
                Ok(None)
            })
        },
    ));

    let after_calls = Rc::new(Cell::new(0_u32));
    let observed_url = Rc::new(std::cell::RefCell::new(String::new()));
    let after_calls_handler = after_calls.clone();
    let observed_url_handler = observed_url.clone();
    let _after = engine.on_navigation(Rc::new(
        move |event: NavigationEvent| -> LocalBoxFuture<'static, Result<Option<AfterDeferredEffect>, NavigationError>> {
            let calls = after_calls_handler.clone();
            let observed = observed_url_handler.clone();
            Box::pin(async move {
                calls.set(calls.get() + 1);
                *observed.borrow_mut() = event.destination.url.path().to_string();
                Ok(None)
            })
        },
    ));

    block_on(engine.navigate("/foo/2", NavigateOptions::default())).unwrap();
    assert_eq!(before_calls.get(), 2);
    assert_eq!(after_calls.get(), 1);
    assert_eq!(*observed_url.borrow(), "/bar/42");
}

#[test]
fn back_at_index_zero_is_a_no_op() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let before = engine.current_entry();
    let result = block_on(engine.back(Value::Null)).unwrap();
    assert_eq!(result, before);
}

#[test]
fn forward_at_last_index_is_a_no_op() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let before = engine.current_entry();
    let result = block_on(engine.forward(Value::Null)).unwrap();
    assert_eq!(result, before);
}

#[test]
fn traverse_to_unknown_key_is_a_no_op() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let before = engine.current_entry();
    let result = block_on(engine.traverse_to(uuid::Uuid::new_v4(), Value::Null)).unwrap();
    assert_eq!(result, before);
}

#[test]
fn redirect_chain_deeper_than_bound_is_a_fatal_error() {
    let (engine, _) = engine_at("https://example.com/start", Value::Null, 50);
    let _before = engine.before_navigation(Rc::new(
        |event: TransitionEvent| -> LocalBoxFuture<'static, Result<Option<DeferredEffect>, BeforeHandlerError>> {
            Box::pin(async move {
                let next = event.to.url().path().to_string() + "x";
                Err(BeforeHandlerError::Redirect(RedirectSignal::new(next)))
            })
        },
    ));

    let result = block_on(engine.navigate("/loop", NavigateOptions::default()));
    assert!(matches!(result, Err(NavigationError::RedirectLoop { depth: 26 })));
}

#[test]
fn back_then_forward_round_trips_entries_and_index_but_mints_fresh_id() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    block_on(engine.navigate("/foo/2", NavigateOptions::default())).unwrap();
    let before_id = engine.current_entry().id;

    block_on(engine.back(Value::Null)).unwrap();
    let forward_result = block_on(engine.forward(Value::Null)).unwrap();

    assert_eq!(engine.entries().len(), 2);
    assert_eq!(engine.current_entry().url.path(), "/foo/2");
    assert_ne!(forward_result.id, before_id);
}

#[test]
fn blocking_facade_confirm_lets_navigation_proceed() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let facade = BlockingFacade::install(&engine, BlockNavigationOptions::default());

    // The before-handler sets the blocking state synchronously, before its
    // deferred effect (the oneshot await) ever suspends — so by the time
    // `join` polls the second future below, `facade.current()` is already
    // populated from `navigate`'s first poll.
    let navigate = engine.navigate("/foo/2", NavigateOptions::default());
    let confirm_once_blocked = async {
        if let Some(blocking) = facade.current() {
            blocking.confirm();
        }
    };

    let (result, _) = block_on(futures::future::join(navigate, confirm_once_blocked));
    result.unwrap();
    assert_eq!(engine.current_entry().url.path(), "/foo/2");
}

#[test]
fn blocking_facade_cancel_leaves_engine_at_prior_entry() {
    let (engine, _) = engine_at("https://example.com/foo/1", Value::Null, 50);
    let facade = BlockingFacade::install(&engine, BlockNavigationOptions::default());

    let navigate = engine.navigate("/foo/2", NavigateOptions::default());
    let cancel_once_blocked = async {
        if let Some(blocking) = facade.current() {
            blocking.cancel();
        }
    };

    let (result, _) = block_on(futures::future::join(navigate, cancel_once_blocked));
    let settled = result.unwrap();
    assert_eq!(settled.url.path(), "/foo/1");
    assert_eq!(engine.current_entry().url.path(), "/foo/1");
    assert_eq!(engine.entries().len(), 1);
}
