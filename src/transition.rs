//! Transition and navigation events (§3), plus the options callers pass to
//! operations on [`crate::engine::NavigationEngine`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::destination::{Destination, DestinationOrProposed};

/// The kind of transition a [`TransitionEvent`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Push,
    Replace,
    Reload,
    Traverse,
}

/// Describes one in-flight transition, from proposal through to commit.
/// Observable on [`crate::state::NavigationState::transition`] strictly
/// between Phase 1 (Propose) and the end of Phase 4 (Mutate).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionEvent {
    #[serde(rename = "type")]
    pub kind: TransitionType,
    pub from: Destination,
    pub to: DestinationOrProposed,
    pub delta: i64,
    pub info: Value,
}

/// Emitted to after-handlers only once a transition has committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationEvent {
    #[serde(rename = "type")]
    pub kind: TransitionType,
    pub destination: Destination,
    pub info: Value,
}

/// `history` option on [`NavigateOptions`]: `auto` resolves to `replace`
/// when the candidate targets the current slot, `push` otherwise (§4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    #[default]
    Auto,
    Push,
    Replace,
}

/// Options accepted by [`crate::engine::NavigationEngine::navigate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigateOptions {
    #[serde(default)]
    pub history: HistoryMode,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub info: Value,
}

impl NavigateOptions {
    pub fn with_history(mut self, mode: HistoryMode) -> Self {
        self.history = mode;
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = info;
        self
    }
}
