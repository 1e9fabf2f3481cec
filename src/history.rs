//! The History/location adapter (C6): binds the engine to a host window
//! that only exposes the traditional `history`/`location` pair, no
//! platform Navigation API.
//!
//! Per §4.6 this adapter is the exclusive writer of `history.state` for
//! navigations it originates, listens for motions the *host* can still
//! originate on its own (`popstate`, `hashchange`), and patches the five
//! history mutators (`pushState`/`replaceState`/`go`/`back`/`forward`) plus
//! the `history.state` accessor so that third-party code sees exactly the
//! surface the spec promises: mutators that route through the engine
//! instead of writing the host store directly, and reads that see the
//! caller's own state rather than the patched-marker envelope.

#![cfg(all(feature = "browser_history", target_arch = "wasm32"))]

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object, Reflect};
use serde_json::Value;
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HashChangeEvent, History, PopStateEvent, Window};

use crate::adapter::Adapter;
use crate::destination::{Destination, PatchedMarker};
use crate::engine::NavigationEngine;
use crate::error::NavigationError;
use crate::handlers::LocalBoxFuture;
use crate::state::NavigationState;
use crate::transition::{HistoryMode, TransitionEvent, TransitionType};

/// Reads `<base href>` off `document`, defaulting to `/` when absent
/// (§4.6, "Initialization").
fn detect_base(window: &Window) -> String {
    window
        .document()
        .and_then(|doc| doc.query_selector("base").ok().flatten())
        .and_then(|el| el.get_attribute("href"))
        .map(|href| {
            let trimmed = href.trim_end_matches('/');
            if trimmed.is_empty() {
                "/".to_string()
            } else {
                trimmed.to_string()
            }
        })
        .unwrap_or_else(|| "/".to_string())
}

fn js_to_value(js: &JsValue) -> Value {
    serde_wasm_bindgen::from_value(js.clone()).unwrap_or(Value::Null)
}

fn value_to_js(value: &Value) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

fn get_function(obj: &JsValue, name: &str) -> Result<Function, NavigationError> {
    Reflect::get(obj, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or_else(|| NavigationError::InvalidState(format!("history.{name} unavailable")))
}

/// The native implementations captured before patching, so the adapter's
/// own [`Adapter::commit`] can call straight through to the host instead
/// of re-entering its own patched wrappers.
#[derive(Clone)]
struct OriginalHistoryMethods {
    push_state: Function,
    replace_state: Function,
    go: Function,
    state_getter: Function,
}

/// Binds a [`NavigationEngine`] to `window.history`/`window.location`.
/// Dropping the adapter removes its listeners and un-patches `history`.
pub struct HistoryAdapter {
    window: Window,
    origin: String,
    base: String,
    engine: RefCell<Option<Rc<NavigationEngine>>>,
    popstate: RefCell<Option<Closure<dyn FnMut(PopStateEvent)>>>,
    hashchange: RefCell<Option<Closure<dyn FnMut(HashChangeEvent)>>>,
    originals: RefCell<Option<OriginalHistoryMethods>>,
    push_state_patch: RefCell<Option<Closure<dyn FnMut(JsValue, JsValue, JsValue)>>>,
    replace_state_patch: RefCell<Option<Closure<dyn FnMut(JsValue, JsValue, JsValue)>>>,
    go_patch: RefCell<Option<Closure<dyn FnMut(JsValue)>>>,
    back_patch: RefCell<Option<Closure<dyn FnMut()>>>,
    forward_patch: RefCell<Option<Closure<dyn FnMut()>>>,
    state_getter_patch: RefCell<Option<Closure<dyn Fn() -> JsValue>>>,
}

impl HistoryAdapter {
    /// Builds the adapter plus the seed [`NavigationState`] read from the
    /// current `location`/`history.state` (§4.6, "Initialization").
    pub fn new(window: Window) -> Result<(Rc<Self>, NavigationState), NavigationError> {
        let location = window.location();
        let origin = location
            .origin()
            .map_err(|_| NavigationError::InvalidState("window.location.origin unavailable".into()))?;
        let href = location
            .href()
            .map_err(|_| NavigationError::InvalidState("window.location.href unavailable".into()))?;
        let url = Url::parse(&href).map_err(|e| NavigationError::InvalidState(e.to_string()))?;
        let base = detect_base(&window);

        let raw_state = window
            .history()
            .map_err(|_| NavigationError::InvalidState("window.history unavailable".into()))?
            .state()
            .unwrap_or(JsValue::NULL);
        let state = js_to_value(&raw_state);
        let initial = Destination::make(url, state, &origin);

        let adapter = Rc::new(Self {
            window,
            origin,
            base,
            engine: RefCell::new(None),
            popstate: RefCell::new(None),
            hashchange: RefCell::new(None),
            originals: RefCell::new(None),
            push_state_patch: RefCell::new(None),
            replace_state_patch: RefCell::new(None),
            go_patch: RefCell::new(None),
            back_patch: RefCell::new(None),
            forward_patch: RefCell::new(None),
            state_getter_patch: RefCell::new(None),
        });
        Ok((adapter, NavigationState::new(initial)))
    }

    /// Wires the adapter to the engine it backs, installs the
    /// `popstate`/`hashchange` listeners, and patches `window.history`
    /// (§4.6, "Host patching"). Must be called once, right after
    /// [`NavigationEngine::new`], since the adapter needs a handle back
    /// into the engine it cannot hold at construction time (the engine
    /// holds the adapter, not the reverse).
    pub fn attach(self: &Rc<Self>, engine: Rc<NavigationEngine>) -> Result<(), NavigationError> {
        *self.engine.borrow_mut() = Some(engine);

        let target: web_sys::EventTarget = self.window.clone().into();
        let mut options = web_sys::AddEventListenerOptions::new();
        options.capture(true);

        let weak = Rc::downgrade(self);
        let popstate = Closure::<dyn FnMut(PopStateEvent)>::new(move |event: PopStateEvent| {
            let Some(adapter) = weak.upgrade() else { return };
            adapter.on_popstate(event);
        });
        target
            .add_event_listener_with_event_listener_options(
                "popstate",
                popstate.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|_| NavigationError::InvalidState("failed to install popstate listener".into()))?;

        let weak = Rc::downgrade(self);
        let hashchange = Closure::<dyn FnMut(HashChangeEvent)>::new(move |event: HashChangeEvent| {
            let Some(adapter) = weak.upgrade() else { return };
            adapter.on_hashchange(event);
        });
        target
            .add_event_listener_with_event_listener_options(
                "hashchange",
                hashchange.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|_| NavigationError::InvalidState("failed to install hashchange listener".into()))?;

        *self.popstate.borrow_mut() = Some(popstate);
        *self.hashchange.borrow_mut() = Some(hashchange);

        self.install_patches()
    }

    /// Replaces `history.pushState`/`replaceState`/`go`/`back`/`forward`
    /// with wrappers that route third-party calls through the engine
    /// instead of mutating the host store directly, and replaces the
    /// `history.state` accessor with one that unwraps the patched marker
    /// transparently. The originals are captured first so the adapter's
    /// own [`Adapter::commit`] can still reach the real implementations.
    fn install_patches(self: &Rc<Self>) -> Result<(), NavigationError> {
        let history_object: Object = self.history().unchecked_into();
        let history_js: JsValue = history_object.clone().into();

        let push_state = get_function(&history_js, "pushState")?;
        let replace_state = get_function(&history_js, "replaceState")?;
        let go = get_function(&history_js, "go")?;

        let proto = Object::get_prototype_of(&history_js);
        let state_descriptor = Object::get_own_property_descriptor(&proto, &"state".into());
        let state_getter = Reflect::get(&state_descriptor, &"get".into())
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
            .ok_or_else(|| NavigationError::InvalidState("history.state getter unavailable".into()))?;

        *self.originals.borrow_mut() = Some(OriginalHistoryMethods {
            push_state,
            replace_state,
            go,
            state_getter: state_getter.clone(),
        });

        let weak = Rc::downgrade(self);
        let push_closure = Closure::<dyn FnMut(JsValue, JsValue, JsValue)>::new(move |state: JsValue, _title: JsValue, url: JsValue| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_patched_mutation(state, url, HistoryMode::Push);
            }
        });
        Reflect::set(&history_js, &"pushState".into(), push_closure.as_ref())
            .map_err(|_| NavigationError::InvalidState("failed to patch history.pushState".into()))?;

        let weak = Rc::downgrade(self);
        let replace_closure = Closure::<dyn FnMut(JsValue, JsValue, JsValue)>::new(move |state: JsValue, _title: JsValue, url: JsValue| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_patched_mutation(state, url, HistoryMode::Replace);
            }
        });
        Reflect::set(&history_js, &"replaceState".into(), replace_closure.as_ref())
            .map_err(|_| NavigationError::InvalidState("failed to patch history.replaceState".into()))?;

        let weak = Rc::downgrade(self);
        let go_closure = Closure::<dyn FnMut(JsValue)>::new(move |delta: JsValue| {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_patched_go(delta.as_f64().unwrap_or(0.0) as i64);
            }
        });
        Reflect::set(&history_js, &"go".into(), go_closure.as_ref())
            .map_err(|_| NavigationError::InvalidState("failed to patch history.go".into()))?;

        let weak = Rc::downgrade(self);
        let back_closure = Closure::<dyn FnMut()>::new(move || {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_patched_go(-1);
            }
        });
        Reflect::set(&history_js, &"back".into(), back_closure.as_ref())
            .map_err(|_| NavigationError::InvalidState("failed to patch history.back".into()))?;

        let weak = Rc::downgrade(self);
        let forward_closure = Closure::<dyn FnMut()>::new(move || {
            if let Some(adapter) = weak.upgrade() {
                adapter.on_patched_go(1);
            }
        });
        Reflect::set(&history_js, &"forward".into(), forward_closure.as_ref())
            .map_err(|_| NavigationError::InvalidState("failed to patch history.forward".into()))?;

        let receiver = history_js.clone();
        let getter_closure = Closure::<dyn Fn() -> JsValue>::new(move || -> JsValue {
            let raw = state_getter.call0(&receiver).unwrap_or(JsValue::NULL);
            let value = js_to_value(&raw);
            match PatchedMarker::detect(&value) {
                Some(marker) => value_to_js(&marker.state),
                None => raw,
            }
        });
        let descriptor = Object::new();
        Reflect::set(&descriptor, &"get".into(), getter_closure.as_ref())
            .map_err(|_| NavigationError::InvalidState("failed to build the history.state descriptor".into()))?;
        Reflect::set(&descriptor, &"configurable".into(), &JsValue::TRUE)
            .map_err(|_| NavigationError::InvalidState("failed to build the history.state descriptor".into()))?;
        Object::define_property(&history_object, &"state".into(), &descriptor);

        *self.push_state_patch.borrow_mut() = Some(push_closure);
        *self.replace_state_patch.borrow_mut() = Some(replace_closure);
        *self.go_patch.borrow_mut() = Some(go_closure);
        *self.back_patch.borrow_mut() = Some(back_closure);
        *self.forward_patch.borrow_mut() = Some(forward_closure);
        *self.state_getter_patch.borrow_mut() = Some(getter_closure);
        Ok(())
    }

    fn engine(&self) -> Option<Rc<NavigationEngine>> {
        self.engine.borrow().clone()
    }

    fn history(&self) -> History {
        self.window.history().expect("window.history unavailable")
    }

    /// Resolves `url` (absolute, relative, or absent — `pushState`'s third
    /// argument is optional) against the current `location.href`.
    fn resolve_patched_url(&self, url: &JsValue) -> Option<Url> {
        let href = self.window.location().href().ok()?;
        let base = Url::parse(&href).ok()?;
        match url.as_string() {
            Some(target) if !target.is_empty() => base.join(&target).ok(),
            _ => Some(base),
        }
    }

    /// A third-party call to a patched mutator: routed through the engine
    /// as an external navigation rather than writing the host store
    /// directly (§4.6, "Host patching").
    fn on_patched_mutation(&self, state: JsValue, url: JsValue, mode: HistoryMode) {
        let Some(engine) = self.engine() else { return };
        let Some(url) = self.resolve_patched_url(&url) else { return };
        let value = js_to_value(&state);

        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = engine.navigate_external(url, value, Value::Null, mode).await {
                log::error!("patched history mutation failed: {err}");
            }
        });
    }

    /// A third-party call to the patched `go`/`back`/`forward`.
    fn on_patched_go(&self, delta: i64) {
        let Some(engine) = self.engine() else { return };
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = engine.go(delta, Value::Null).await {
                log::error!("patched history.go failed: {err}");
            }
        });
    }

    /// `popstate` with a patched marker is the browser completing a
    /// traverse the engine itself initiated; without one, some other
    /// script moved the address bar directly — treated as an external
    /// replace (§4.6).
    fn on_popstate(&self, event: PopStateEvent) {
        let Some(engine) = self.engine() else { return };
        let raw_state = event.state();
        let value = js_to_value(&raw_state);

        let href = match self.window.location().href() {
            Ok(href) => href,
            Err(_) => return,
        };
        let Ok(url) = Url::parse(&href) else { return };

        wasm_bindgen_futures::spawn_local(async move {
            let result = if let Some(marker) = PatchedMarker::detect(&value) {
                engine.traverse_to_skip_commit(marker.key, Value::Null).await
            } else {
                engine
                    .navigate_external(url, value, Value::Null, HistoryMode::Replace)
                    .await
            };
            if let Err(err) = result {
                log::error!("popstate handling failed: {err}");
            }
        });
    }

    /// `hashchange` always lands as a replace with the new URL (§4.6).
    fn on_hashchange(&self, event: HashChangeEvent) {
        let Some(engine) = self.engine() else { return };
        let new_url = event.new_url();
        let Ok(url) = Url::parse(&new_url) else { return };

        wasm_bindgen_futures::spawn_local(async move {
            let result = engine
                .navigate_external(url, Value::Null, Value::Null, HistoryMode::Replace)
                .await;
            if let Err(err) = result {
                log::error!("hashchange handling failed: {err}");
            }
        });
    }
}

impl Adapter for HistoryAdapter {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn base(&self) -> &str {
        &self.base
    }

    /// Reconciles a committed transition with the host's `history`
    /// object, calling straight through to the captured originals so the
    /// adapter's own writes never re-enter its patched wrappers.
    /// Suppressed for events the engine is only echoing back from a
    /// motion the host already made (§4.6, "Commit").
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

            let originals = self
                .originals
                .borrow()
                .clone()
                .ok_or_else(|| NavigationError::InvalidState("history adapter not attached".into()))?;

            let marker = PatchedMarker::wrap(to.id, to.key, to.state.clone());
            let marker_js = value_to_js(&marker);
            let history_js: JsValue = self.history().into();
            let url = JsValue::from_str(to.url.as_str());
            let title = JsValue::from_str("");

            let result = match event.kind {
                TransitionType::Push => originals.push_state.call3(&history_js, &marker_js, &title, &url),
                TransitionType::Replace | TransitionType::Reload => {
                    originals.replace_state.call3(&history_js, &marker_js, &title, &url)
                }
                TransitionType::Traverse => originals
                    .go
                    .call1(&history_js, &JsValue::from_f64(event.delta as f64))
                    .and_then(|_| originals.replace_state.call3(&history_js, &marker_js, &title, &url)),
            };
            result
                .map(|_| ())
                .map_err(|_| NavigationError::InvalidState("history mutation rejected by host".into()))
        })
    }
}

impl Drop for HistoryAdapter {
    fn drop(&mut self) {
        let target: web_sys::EventTarget = self.window.clone().into();
        if let Some(popstate) = self.popstate.borrow_mut().take() {
            let _ = target.remove_event_listener_with_callback("popstate", popstate.as_ref().unchecked_ref());
        }
        if let Some(hashchange) = self.hashchange.borrow_mut().take() {
            let _ = target.remove_event_listener_with_callback("hashchange", hashchange.as_ref().unchecked_ref());
        }

        if self.originals.borrow().is_some() {
            if let Ok(history) = self.window.history() {
                let history_object: Object = history.unchecked_into();
                for name in ["pushState", "replaceState", "go", "back", "forward", "state"] {
                    let _ = Reflect::delete_property(&history_object, &JsValue::from_str(name));
                }
            }
        }

        self.push_state_patch.borrow_mut().take();
        self.replace_state_patch.borrow_mut().take();
        self.go_patch.borrow_mut().take();
        self.back_patch.borrow_mut().take();
        self.forward_patch.borrow_mut().take();
        self.state_getter_patch.borrow_mut().take();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::handlers::AfterDeferredEffect;
    use crate::state::NavigationCell;
    use crate::transition::NavigationEvent;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn window() -> Window {
        web_sys::window().expect("browser window")
    }

    fn engine_for(adapter: &Rc<HistoryAdapter>, state: NavigationState) -> Rc<NavigationEngine> {
        let cell = Rc::new(NavigationCell::new(state, 50));
        Rc::new(NavigationEngine::new(cell, adapter.clone()))
    }

    /// Scenario 6 (History adapter popstate): reading `history.state`
    /// through the patched accessor returns the caller's own value, never
    /// the `__typed__navigation__*` envelope the adapter persists.
    #[wasm_bindgen_test]
    fn state_getter_unwraps_patched_marker_transparently() {
        let win = window();
        let marker = PatchedMarker::wrap(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), serde_json::json!({"x": 1}));
        win.history().unwrap().replace_state_with_url(&value_to_js(&marker), "", None).unwrap();

        let (adapter, state) = HistoryAdapter::new(win.clone()).unwrap();
        let engine = engine_for(&adapter, state);
        adapter.attach(engine).unwrap();

        let raw = win.history().unwrap().state().unwrap();
        assert_eq!(js_to_value(&raw), serde_json::json!({"x": 1}));
    }

    /// Scenario 6: a third-party `pushState` call is redirected through
    /// the engine's own pipeline instead of writing `history` directly.
    #[wasm_bindgen_test]
    async fn patched_push_state_routes_through_the_engine() {
        let win = window();
        let (adapter, state) = HistoryAdapter::new(win.clone()).unwrap();
        let engine = engine_for(&adapter, state);
        adapter.attach(engine.clone()).unwrap();

        let (tx, rx) = futures::channel::oneshot::channel();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let _scope = engine.on_navigation(Rc::new(move |event: NavigationEvent| -> LocalBoxFuture<'static, Result<Option<AfterDeferredEffect>, NavigationError>> {
            let tx = tx.clone();
            let path = event.destination.url.path().to_string();
            Box::pin(async move {
                if let Some(sender) = tx.borrow_mut().take() {
                    let _ = sender.send(path);
                }
                Ok(None)
            })
        }));

        win.history()
            .unwrap()
            .push_state_with_url(&JsValue::NULL, "", Some("/patched/target"))
            .unwrap();

        let observed = rx.await.unwrap();
        assert_eq!(observed, "/patched/target");
    }
}
