//! The Platform-Navigation adapter (C7): binds the engine to a host that
//! exposes `window.navigation` as the authoritative source of truth for
//! entries, current index, and identity.

#![cfg(all(feature = "navigation_api", target_arch = "wasm32"))]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use url::Url;
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{NavigateEvent, Navigation, NavigationHistoryEntry};

use crate::adapter::Adapter;
use crate::destination::Destination;
use crate::engine::NavigationEngine;
use crate::error::NavigationError;
use crate::handlers::LocalBoxFuture;
use crate::state::NavigationState;
use crate::transition::{NavigationEvent, TransitionEvent, TransitionType};

fn js_to_value(js: &JsValue) -> Value {
    serde_wasm_bindgen::from_value(js.clone()).unwrap_or(Value::Null)
}

/// Projects one native [`NavigationHistoryEntry`] to a [`Destination`]
/// (§4.7: "reusing its `id`/`key` ... reading `getState()`").
fn project_entry(entry: &NavigationHistoryEntry, origin: &str) -> Option<Destination> {
    let id = Uuid::parse_str(&entry.id()).ok()?;
    let key = Uuid::parse_str(&entry.key()).ok()?;
    let url = Url::parse(&entry.url()?).ok()?;
    let state = js_to_value(&entry.get_state());
    let same_document = url.origin().ascii_serialization() == origin;
    Some(Destination {
        id,
        key,
        url,
        state,
        same_document,
    })
}

/// Binds a [`NavigationEngine`] to `window.navigation`. The host owns
/// entry identity; this adapter's [`Adapter::new_navigation_state`]
/// mirrors it wholesale rather than computing Phase 4's mutation table.
pub struct NavigationApiAdapter {
    navigation: Navigation,
    origin: String,
    base: String,
    engine: RefCell<Option<Rc<NavigationEngine>>>,
    navigate_listener: RefCell<Option<Closure<dyn FnMut(NavigateEvent)>>>,
}

impl NavigationApiAdapter {
    pub fn new(navigation: Navigation, origin: impl Into<String>, base: impl Into<String>) -> Result<(Rc<Self>, NavigationState), NavigationError> {
        let origin = origin.into();
        let adapter = Rc::new(Self {
            navigation,
            origin: origin.clone(),
            base: base.into(),
            engine: RefCell::new(None),
            navigate_listener: RefCell::new(None),
        });
        let state = adapter
            .snapshot()
            .ok_or_else(|| NavigationError::InvalidState("navigation.currentEntry unavailable".into()))?;
        Ok((adapter, state))
    }

    fn snapshot(&self) -> Option<NavigationState> {
        let entries_js = self.navigation.entries();
        let mut entries = Vec::with_capacity(entries_js.length() as usize);
        for entry in entries_js.iter() {
            let entry: NavigationHistoryEntry = entry.dyn_into().ok()?;
            entries.push(project_entry(&entry, &self.origin)?);
        }
        let current = self.navigation.current_entry()?;
        let index = current.index();
        if index < 0 {
            return None;
        }
        Some(NavigationState {
            entries,
            index: index as usize,
            transition: None,
        })
    }

    fn engine(&self) -> Option<Rc<NavigationEngine>> {
        self.engine.borrow().clone()
    }

    /// Intercepts host `navigate` events that the engine did not itself
    /// originate, running only after-handlers (before-handlers already ran
    /// during the engine's own commit) per §4.7. Events the host should
    /// handle itself — hash-only, download, form-data — are left alone.
    pub fn attach(self: &Rc<Self>, engine: Rc<NavigationEngine>) -> Result<(), NavigationError> {
        *self.engine.borrow_mut() = Some(engine);

        let weak = Rc::downgrade(self);
        let listener = Closure::<dyn FnMut(NavigateEvent)>::new(move |event: NavigateEvent| {
            let Some(adapter) = weak.upgrade() else { return };
            adapter.on_navigate(event);
        });
        self.navigation
            .add_event_listener_with_callback("navigate", listener.as_ref().unchecked_ref())
            .map_err(|_| NavigationError::InvalidState("failed to install navigate listener".into()))?;
        *self.navigate_listener.borrow_mut() = Some(listener);
        Ok(())
    }

    fn on_navigate(&self, event: NavigateEvent) {
        if event.hash_change() || event.download_request().is_some() || event.form_data().is_some() || !event.can_intercept() {
            return;
        }
        let Some(engine) = self.engine() else { return };
        let Some(destination) = event.destination() else { return };
        let Ok(url) = Url::parse(&destination.url()) else { return };
        let state = js_to_value(&destination.get_state());
        let same_document = url.origin().ascii_serialization() == self.origin;
        let navigation_type = if destination.same_document() { TransitionType::Replace } else { TransitionType::Push };

        let Some(id) = Uuid::parse_str(&destination.id()).ok() else { return };
        let Some(key) = Uuid::parse_str(&destination.key()).ok() else { return };
        let to = Destination {
            id,
            key,
            url,
            state,
            same_document,
        };

        let navigation_event = NavigationEvent {
            kind: navigation_type,
            destination: to,
            info: Value::Null,
        };
        wasm_bindgen_futures::spawn_local(async move {
            engine.dispatch_after(navigation_event).await;
        });
    }
}

impl Adapter for NavigationApiAdapter {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn base(&self) -> &str {
        &self.base
    }

    /// Delegates to the host's own `navigate`/`reload`/`traverseTo`,
    /// awaiting its "committed" promise (§4.7).
    fn commit<'a>(
        &'a self,
        to: &'a Destination,
        event: &'a TransitionEvent,
        skip_commit: bool,
    ) -> LocalBoxFuture<'a, Result<(), NavigationError>> {
        Box::pin(async move {
            if skip_commit {
                return Ok(());
            }

            let state = serde_wasm_bindgen::to_value(&to.state).unwrap_or(JsValue::NULL);

            let result = match event.kind {
                TransitionType::Reload => {
                    let mut options = web_sys::NavigationReloadOptions::new();
                    options.state(&state);
                    self.navigation.reload_with_options(&options)
                }
                TransitionType::Traverse => {
                    let mut options = web_sys::NavigationOptions::new();
                    options.info(&JsValue::from_str(""));
                    self.navigation.traverse_to(&to.key.to_string(), &options)
                }
                TransitionType::Push | TransitionType::Replace => {
                    let mut options = web_sys::NavigationNavigateOptions::new();
                    options.state(&state);
                    options.history(match event.kind {
                        TransitionType::Replace => web_sys::NavigationHistoryBehavior::Replace,
                        _ => web_sys::NavigationHistoryBehavior::Push,
                    });
                    self.navigation.navigate(to.url.as_str(), &options)
                }
            };

            let outcome = result.map_err(|_| NavigationError::InvalidState("navigation API rejected the call".into()))?;
            let committed = wasm_bindgen_futures::JsFuture::from(outcome.committed());
            committed
                .await
                .map(|_| ())
                .map_err(|_| NavigationError::Commit("host rejected the committed promise".into()))
        })
    }

    fn new_navigation_state(&self) -> Option<NavigationState> {
        self.snapshot()
    }
}

impl Drop for NavigationApiAdapter {
    fn drop(&mut self) {
        if let Some(listener) = self.navigate_listener.borrow_mut().take() {
            let _ = self
                .navigation
                .remove_event_listener_with_callback("navigate", listener.as_ref().unchecked_ref());
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    /// The Navigation API is Chromium-only at the time of writing; skip
    /// gracefully on engines that don't expose `window.navigation` rather
    /// than failing the suite on an environment limitation.
    #[wasm_bindgen_test]
    fn adapter_mirrors_the_hosts_current_entry_on_construction() {
        let window = web_sys::window().expect("browser window");
        let Some(navigation) = window.navigation() else {
            return;
        };
        let origin = window.location().origin().expect("window.location.origin");

        let (_adapter, state) = NavigationApiAdapter::new(navigation, origin, "/").unwrap();
        assert!(!state.entries.is_empty());
        assert!(state.index < state.entries.len());
        assert_eq!(state.entries[state.index].url.as_str(), window.location().href().unwrap());
    }
}
