//! Error and control-flow-signal types for the transition engine.
//!
//! [`NavigationError`] is the only error type a caller of the public API
//! ever observes. [`RedirectSignal`] and [`CancelSignal`] are recovered
//! internally by the engine (§4.4.8 of the design) and never escape
//! [`crate::engine::NavigationEngine`].

use serde_json::Value;
use thiserror::Error;

/// Terminal failure of a transition: a commit error, an unexpected
/// handler failure, or a host/adapter rejection.
#[derive(Debug, Error, Clone)]
pub enum NavigationError {
    /// The adapter's `commit` step failed.
    #[error("commit failed: {0}")]
    Commit(String),

    /// A before- or after-handler failed with something other than
    /// [`RedirectSignal`]/[`CancelSignal`].
    #[error("handler failed: {0}")]
    Handler(String),

    /// A redirect chain exceeded the loop bound (25 hops).
    #[error("redirect loop detected (depth {depth})")]
    RedirectLoop { depth: u32 },

    /// The adapter reported an invalid or unreachable host state.
    #[error("invalid adapter state: {0}")]
    InvalidState(String),

    /// Serialization of opaque `state`/`info` failed at a host boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Raised by a before-handler to redirect the in-flight transition to a
/// new path instead of letting it commit.
#[derive(Debug, Clone)]
pub struct RedirectSignal {
    pub path: String,
    pub state: Option<Value>,
    pub info: Option<Value>,
}

impl RedirectSignal {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: None,
            info: None,
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }
}

/// Raised by a before-handler to veto the in-flight transition.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal;

/// What a before-handler (or a deferred effect it enqueued) failed with.
#[derive(Debug, Clone)]
pub enum BeforeHandlerError {
    Redirect(RedirectSignal),
    Cancel(CancelSignal),
    Other(NavigationError),
}

impl From<NavigationError> for BeforeHandlerError {
    fn from(value: NavigationError) -> Self {
        BeforeHandlerError::Other(value)
    }
}

/// Failure of the HTTP request issued on behalf of a form by the submit
/// helper (C9). Distinct from [`NavigationError`] because a failed
/// submission never touches navigation state.
#[derive(Debug, Error)]
pub enum FormSubmitError {
    #[error("request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

#[cfg(feature = "submit")]
impl From<gloo_net::Error> for FormSubmitError {
    fn from(value: gloo_net::Error) -> Self {
        FormSubmitError::Request(value.to_string())
    }
}
