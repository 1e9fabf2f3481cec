//! The memory adapter (C5): zero-external-state binding used for tests and
//! server-side rendering. `commit` is a no-op; nothing is read back from an
//! external store.

use serde_json::Value;
use url::Url;

use crate::adapter::Adapter;
use crate::destination::Destination;
use crate::error::NavigationError;
use crate::handlers::LocalBoxFuture;
use crate::state::NavigationState;
use crate::transition::TransitionEvent;

const DEFAULT_MAX_ENTRIES: usize = 50;
const DEFAULT_BASE: &str = "/";

/// Configuration for [`MemoryAdapter::new`]: an explicit entry list plus a
/// starting index.
#[derive(Debug, Clone)]
pub struct MemoryAdapterConfig {
    pub entries: Vec<Destination>,
    pub current_index: usize,
    pub origin: String,
    pub base: String,
    pub max_entries: usize,
}

impl MemoryAdapterConfig {
    pub fn new(entries: Vec<Destination>) -> Self {
        let origin = entries
            .first()
            .map(|d| d.url.origin().ascii_serialization())
            .unwrap_or_default();
        Self {
            entries,
            current_index: 0,
            origin,
            base: DEFAULT_BASE.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_current_index(mut self, index: usize) -> Self {
        self.current_index = index;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Convenience config building a single-entry history from one URL, the
/// shape the spec calls out as the "initial-memory variant" (§6).
#[derive(Debug, Clone)]
pub struct MemoryAdapterConfigFromUrl {
    pub url: Url,
    pub state: Value,
    pub origin: Option<String>,
    pub base: String,
    pub max_entries: usize,
}

impl MemoryAdapterConfigFromUrl {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            state: Value::Null,
            origin: None,
            base: DEFAULT_BASE.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    fn into_config(self) -> MemoryAdapterConfig {
        let origin = self
            .origin
            .unwrap_or_else(|| self.url.origin().ascii_serialization());
        let initial = Destination::make(self.url, self.state, &origin);
        MemoryAdapterConfig {
            entries: vec![initial],
            current_index: 0,
            origin,
            base: self.base,
            max_entries: self.max_entries,
        }
    }
}

pub struct MemoryAdapter {
    origin: String,
    base: String,
}

impl MemoryAdapter {
    pub fn new(origin: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            base: base.into(),
        }
    }

    /// Builds the adapter plus the [`NavigationState`] it should seed the
    /// engine's cell with, from an explicit entry list.
    pub fn with_entries(config: MemoryAdapterConfig) -> (Self, NavigationState, usize) {
        let MemoryAdapterConfig {
            entries,
            current_index,
            origin,
            base,
            max_entries,
        } = config;
        let mut state = NavigationState {
            entries,
            index: current_index,
            transition: None,
        };
        if state.entries.is_empty() {
            state.entries.push(Destination::make(
                Url::parse("about:blank").unwrap(),
                Value::Null,
                &origin,
            ));
            state.index = 0;
        }
        (Self::new(origin, base), state, max_entries)
    }

    /// Builds the adapter plus seed state from a single starting URL.
    pub fn with_url(config: MemoryAdapterConfigFromUrl) -> (Self, NavigationState, usize) {
        let max_entries = config.max_entries;
        let config = config.into_config();
        Self::with_entries(MemoryAdapterConfig {
            max_entries,
            ..config
        })
    }
}

impl Adapter for MemoryAdapter {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn commit<'a>(
        &'a self,
        _to: &'a Destination,
        _event: &'a TransitionEvent,
        _skip_commit: bool,
    ) -> LocalBoxFuture<'a, Result<(), NavigationError>> {
        Box::pin(async { Ok(()) })
    }
}
