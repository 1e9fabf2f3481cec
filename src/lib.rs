#![doc(
    html_logo_url = "https://github.com/next-rs/next-rs/assets/62179149/60e6d58f-6749-4308-86f0-fc0ff28c95f6",
    html_favicon_url = "https://github.com/next-rs/next-rs/assets/62179149/8ac122c9-e55c-4204-9b53-6981f17cefcc"
)]

//! # typed-navigation
//!
//! A typed, effectful control plane over browser session history: a
//! five-phase transition engine (propose → before → commit → mutate →
//! after) sitting on one of three bindings.
//!
//! | Feature           | Binding                                    | wasm-only |
//! |-------------------|---------------------------------------------|-----------|
//! | `memory` (default) | No external store. Tests, SSR.             | no        |
//! | `browser_history`   | `window.history` / `window.location`.      | yes       |
//! | `navigation_api`    | `window.navigation` (platform-authoritative).| yes     |
//! | `submit` (default)  | Form-submit helper layered on the engine.  | no        |
//!
//! ```no_run
//! use typed_navigation::prelude::*;
//! use std::rc::Rc;
//!
//! # async fn run() {
//! let (adapter, state, max_entries) = MemoryAdapter::with_url(
//!     MemoryAdapterConfigFromUrl::new(url::Url::parse("https://example.com/").unwrap()),
//! );
//! let cell = Rc::new(NavigationCell::new(state, max_entries));
//! let engine = NavigationEngine::new(cell, Rc::new(adapter));
//!
//! engine.navigate("/foo", NavigateOptions::default()).await.unwrap();
//! # }
//! ```

pub mod adapter;
pub mod blocking;
pub mod destination;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod state;
pub mod transition;
pub mod url_util;
pub mod watch;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "submit")]
pub mod submit;

#[cfg(all(feature = "browser_history", target_arch = "wasm32"))]
pub mod history;

#[cfg(all(feature = "navigation_api", target_arch = "wasm32"))]
pub mod navigation_api;

pub mod prelude {
    //! Re-exports the types a caller typically needs to stand up an
    //! engine and drive it.

    pub use crate::adapter::Adapter;
    pub use crate::blocking::{BlockNavigationOptions, Blocking, BlockingFacade, ShouldBlock};
    pub use crate::destination::{Destination, DestinationOrProposed, ProposedDestination};
    pub use crate::engine::NavigationEngine;
    pub use crate::error::{BeforeHandlerError, CancelSignal, NavigationError, RedirectSignal};
    pub use crate::handlers::{AfterDeferredEffect, AfterHandlerFn, BeforeHandlerFn, DeferredEffect, HandlerScope, LocalBoxFuture};
    pub use crate::state::{NavigationCell, NavigationState, SharedNavigationCell};
    pub use crate::transition::{HistoryMode, NavigateOptions, NavigationEvent, TransitionEvent, TransitionType};
    pub use crate::watch::{Watch, Watcher};

    #[cfg(feature = "memory")]
    pub use crate::memory::{MemoryAdapter, MemoryAdapterConfig, MemoryAdapterConfigFromUrl};

    #[cfg(feature = "submit")]
    pub use crate::submit::{submit, FormClient, FormResponse, FormSubmission, SubmitMethod};
    #[cfg(feature = "submit")]
    pub use crate::error::FormSubmitError;

    #[cfg(all(feature = "browser_history", target_arch = "wasm32"))]
    pub use crate::history::HistoryAdapter;

    #[cfg(all(feature = "navigation_api", target_arch = "wasm32"))]
    pub use crate::navigation_api::NavigationApiAdapter;
}

pub use self::prelude::*;
