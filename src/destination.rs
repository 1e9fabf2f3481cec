//! The destination model (C1): identity, URL, state and document-sameness
//! of one history entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

/// Keys used by the patched-state marker persisted in host `history.state`
/// (see GLOSSARY: "Patched marker"). Kept as constants rather than a
/// `#[serde(rename)]` struct field list so the history adapter can probe an
/// arbitrary `serde_json::Value`/`JsValue` without deserializing eagerly.
pub const MARKER_ID: &str = "__typed__navigation__id__";
pub const MARKER_KEY: &str = "__typed__navigation__key__";
pub const MARKER_STATE: &str = "__typed__navigation__state__";

/// The envelope persisted in host history state to survive a reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchedMarker {
    #[serde(rename = "__typed__navigation__id__")]
    pub id: Uuid,
    #[serde(rename = "__typed__navigation__key__")]
    pub key: Uuid,
    #[serde(rename = "__typed__navigation__state__")]
    pub state: Value,
}

impl PatchedMarker {
    /// Detects a patched marker embedded in an arbitrary state value.
    /// Per §4.1, detection requires the presence of *both* marker fields
    /// on a non-array object; any other shape is raw caller state.
    pub fn detect(value: &Value) -> Option<PatchedMarker> {
        let object = value.as_object()?;
        if !object.contains_key(MARKER_ID) || !object.contains_key(MARKER_KEY) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn wrap(id: Uuid, key: Uuid, state: Value) -> Value {
        serde_json::to_value(PatchedMarker { id, key, state })
            .unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// A materialized history entry with identity.
///
/// `(id, key)` are distinct UUIDs; `id` never repeats across the lifetime
/// of an engine, `key` is preserved across *replace*, *reload*, and
/// *traverse-to* of an existing slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub id: Uuid,
    pub key: Uuid,
    pub url: Url,
    pub state: Value,
    pub same_document: bool,
}

/// A destination without identity yet, produced when a caller expresses
/// intent for a navigation before the engine assigns `id`/`key`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedDestination {
    pub url: Url,
    pub state: Value,
    pub same_document: bool,
}

impl ProposedDestination {
    pub fn new(url: Url, state: Value, origin: &str) -> Self {
        Self {
            same_document: same_origin(&url, origin),
            url,
            state,
        }
    }

    /// Mints fresh `id` and `key`, preserving `url`/`state`/`same_document`.
    pub fn upgrade(self) -> Destination {
        Destination {
            id: Uuid::new_v4(),
            key: Uuid::new_v4(),
            url: self.url,
            state: self.state,
            same_document: self.same_document,
        }
    }
}

fn same_origin(url: &Url, origin: &str) -> bool {
    url.origin().ascii_serialization() == origin
}

/// Same-path check used by [`Destination::make_or_update`]: same origin,
/// same path, only query/hash may differ.
pub(crate) fn same_slot(current: &Url, candidate: &Url) -> bool {
    current.origin() == candidate.origin() && current.path() == candidate.path()
}

impl Destination {
    /// `makeDestination(url, state, origin)`. Mints fresh `id`/`key` unless
    /// `state` carries a patched marker, in which case those identifiers are
    /// adopted instead (this is what lets identity survive a page reload
    /// that rehydrates from host history).
    pub fn make(url: Url, state: Value, origin: &str) -> Destination {
        let same_document = same_origin(&url, origin);
        match PatchedMarker::detect(&state) {
            Some(marker) => Destination {
                id: marker.id,
                key: marker.key,
                url,
                state: marker.state,
                same_document,
            },
            None => Destination {
                id: Uuid::new_v4(),
                key: Uuid::new_v4(),
                url,
                state,
                same_document,
            },
        }
    }

    /// `makeOrUpdateDestination(current, url, new_state, origin)`. A
    /// same-path navigation (differing only in query/hash) reuses the
    /// current entry's `key` and mints only a fresh `id`; anything else
    /// delegates to [`Destination::make`].
    pub fn make_or_update(current: &Destination, url: Url, new_state: Value, origin: &str) -> Destination {
        if same_slot(&current.url, &url) {
            Destination {
                id: Uuid::new_v4(),
                key: current.key,
                same_document: same_origin(&url, origin),
                url,
                state: new_state,
            }
        } else {
            Destination::make(url, new_state, origin)
        }
    }

    /// Produces a traverse-target destination: same `key`, fresh `id`, as
    /// required by `traverseTo` (§4.4.1) and the round-trip law in §8
    /// ("`traverseTo(current.key)` ... regenerates `id`").
    pub fn retarget(&self) -> Destination {
        Destination {
            id: Uuid::new_v4(),
            key: self.key,
            url: self.url.clone(),
            state: self.state.clone(),
            same_document: self.same_document,
        }
    }

    pub fn to_proposed(&self) -> ProposedDestination {
        ProposedDestination {
            url: self.url.clone(),
            state: self.state.clone(),
            same_document: self.same_document,
        }
    }
}

/// Either a materialized or a proposed destination: what `TransitionEvent::to`
/// holds before Phase 3 (Commit) upgrades it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DestinationOrProposed {
    Destination(Destination),
    Proposed(ProposedDestination),
}

impl DestinationOrProposed {
    pub fn url(&self) -> &Url {
        match self {
            DestinationOrProposed::Destination(d) => &d.url,
            DestinationOrProposed::Proposed(p) => &p.url,
        }
    }

    pub fn state(&self) -> &Value {
        match self {
            DestinationOrProposed::Destination(d) => &d.state,
            DestinationOrProposed::Proposed(p) => &p.state,
        }
    }

    pub fn key(&self) -> Option<Uuid> {
        match self {
            DestinationOrProposed::Destination(d) => Some(d.key),
            DestinationOrProposed::Proposed(_) => None,
        }
    }

    /// Upgrades in place if still proposed; no-op if already a destination.
    pub fn into_destination(self) -> Destination {
        match self {
            DestinationOrProposed::Destination(d) => d,
            DestinationOrProposed::Proposed(p) => p.upgrade(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn make_mints_fresh_identity() {
        let a = Destination::make(url("https://example.com/foo/1"), Value::Null, "https://example.com");
        let b = Destination::make(url("https://example.com/foo/1"), Value::Null, "https://example.com");
        assert_ne!(a.id, b.id);
        assert_ne!(a.key, b.key);
        assert!(a.same_document);
    }

    #[test]
    fn make_adopts_patched_marker() {
        let id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let marker = PatchedMarker::wrap(id, key, serde_json::json!({"x": 1}));
        let d = Destination::make(url("https://example.com/foo/1"), marker, "https://example.com");
        assert_eq!(d.id, id);
        assert_eq!(d.key, key);
        assert_eq!(d.state, serde_json::json!({"x": 1}));
    }

    #[test]
    fn make_or_update_reuses_key_for_same_path() {
        let current = Destination::make(url("https://example.com/foo/1?a=1"), Value::Null, "https://example.com");
        let next = Destination::make_or_update(
            &current,
            url("https://example.com/foo/1?a=2"),
            Value::Null,
            "https://example.com",
        );
        assert_eq!(next.key, current.key);
        assert_ne!(next.id, current.id);
    }

    #[test]
    fn make_or_update_mints_new_slot_for_different_path() {
        let current = Destination::make(url("https://example.com/foo/1"), Value::Null, "https://example.com");
        let next = Destination::make_or_update(
            &current,
            url("https://example.com/foo/2"),
            Value::Null,
            "https://example.com",
        );
        assert_ne!(next.key, current.key);
    }

    #[test]
    fn retarget_keeps_key_fresh_id() {
        let current = Destination::make(url("https://example.com/foo/1"), Value::Null, "https://example.com");
        let retargeted = current.retarget();
        assert_eq!(retargeted.key, current.key);
        assert_ne!(retargeted.id, current.id);
    }
}
