//! The submit helper (C9): performs an HTTP request on behalf of a form
//! and translates a redirect response into an internal replace-navigation.
//! Uses C4 only through [`NavigationEngine`]'s public contract.

use serde_json::Value;

use crate::destination::Destination;
use crate::engine::NavigationEngine;
use crate::error::FormSubmitError;
use crate::handlers::LocalBoxFuture;
use crate::transition::{HistoryMode, NavigateOptions};

/// HTTP method a form submission may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMethod {
    Get,
    Post,
}

/// The response an injected [`FormClient`] hands back to the helper.
/// Deliberately narrow: only what §4.9 needs to decide whether to follow a
/// redirect.
#[derive(Debug, Clone)]
pub struct FormResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Option<Value>,
}

impl FormResponse {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }
}

/// `{method, name, action?, body?, ...navOpts}` from §4.9. `name` is the
/// caller-facing label of the form; it is not otherwise interpreted.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub method: SubmitMethod,
    pub name: String,
    pub action: String,
    pub body: Option<Value>,
    pub info: Value,
}

impl FormSubmission {
    pub fn new(method: SubmitMethod, name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            method,
            name: name.into(),
            action: action.into(),
            body: None,
            info: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = info;
        self
    }
}

/// Injected HTTP transport (§4.9: "issue an HTTP request via an injected
/// client"). Lets the helper be exercised without a real network — the
/// `submit` feature's [`GlooNetClient`] is the production implementation.
pub trait FormClient {
    fn send<'a>(&'a self, submission: &'a FormSubmission) -> LocalBoxFuture<'a, Result<FormResponse, FormSubmitError>>;
}

/// Performs `submission` via `client`, returning the destination left
/// current by the call paired with the raw response. A redirect response
/// triggers an internal `navigate(location, {history: replace})`; any
/// other response leaves navigation state untouched.
pub async fn submit(
    engine: &NavigationEngine,
    client: &dyn FormClient,
    submission: FormSubmission,
) -> Result<(Destination, FormResponse), FormSubmitError> {
    let response = client.send(&submission).await?;

    if response.is_redirect() {
        let location = response.location.clone().expect("checked by is_redirect");
        let destination = engine
            .navigate(
                &location,
                NavigateOptions::default()
                    .with_history(HistoryMode::Replace)
                    .with_info(submission.info.clone()),
            )
            .await
            .map_err(FormSubmitError::Navigation)?;
        return Ok((destination, response));
    }

    Ok((engine.current_entry(), response))
}

#[cfg(feature = "submit")]
pub use gloo_client::GlooNetClient;

#[cfg(feature = "submit")]
mod gloo_client {
    use super::*;
    use gloo_net::http::{Method, RequestBuilder};

    /// The production [`FormClient`]: issues the request via `gloo-net`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct GlooNetClient;

    impl FormClient for GlooNetClient {
        fn send<'a>(
            &'a self,
            submission: &'a FormSubmission,
        ) -> LocalBoxFuture<'a, Result<FormResponse, FormSubmitError>> {
            Box::pin(async move {
                let method = match submission.method {
                    SubmitMethod::Get => Method::GET,
                    SubmitMethod::Post => Method::POST,
                };
                let mut builder = RequestBuilder::new(&submission.action).method(method);
                let request = match &submission.body {
                    Some(body) if submission.method == SubmitMethod::Post => {
                        builder = builder.header("content-type", "application/json");
                        builder
                            .body(body.to_string())
                            .map_err(|e| FormSubmitError::Request(e.to_string()))?
                    }
                    _ => builder
                        .build()
                        .map_err(|e| FormSubmitError::Request(e.to_string()))?,
                };

                let response = request.send().await?;
                let status = response.status();
                let location = response.headers().get("location");
                let body = response.text().await.ok().and_then(|text| serde_json::from_str(&text).ok());

                Ok(FormResponse {
                    status,
                    location,
                    body,
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAdapter, MemoryAdapterConfigFromUrl};
    use crate::state::NavigationCell;
    use std::rc::Rc;
    use url::Url;

    struct StaticClient(FormResponse);

    impl FormClient for StaticClient {
        fn send<'a>(
            &'a self,
            _submission: &'a FormSubmission,
        ) -> LocalBoxFuture<'a, Result<FormResponse, FormSubmitError>> {
            let response = self.0.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    fn engine() -> NavigationEngine {
        let (adapter, state, max_entries) =
            MemoryAdapter::with_url(MemoryAdapterConfigFromUrl::new(Url::parse("https://example.com/foo").unwrap()));
        let cell = Rc::new(NavigationCell::new(state, max_entries));
        NavigationEngine::new(cell, Rc::new(adapter))
    }

    #[test]
    fn redirect_response_navigates() {
        let engine = engine();
        let client = StaticClient(FormResponse {
            status: 302,
            location: Some("/bar/42".to_string()),
            body: None,
        });
        let submission = FormSubmission::new(SubmitMethod::Post, "login", "/api/login");
        let (destination, response) =
            futures::executor::block_on(submit(&engine, &client, submission)).unwrap();
        assert_eq!(destination.url.path(), "/bar/42");
        assert_eq!(response.status, 302);
        assert_eq!(engine.current_entry().url.path(), "/bar/42");
    }

    #[test]
    fn non_redirect_response_leaves_state_unchanged() {
        let engine = engine();
        let before = engine.current_entry();
        let client = StaticClient(FormResponse {
            status: 200,
            location: None,
            body: Some(serde_json::json!({"ok": true})),
        });
        let submission = FormSubmission::new(SubmitMethod::Get, "search", "/api/search");
        let (destination, response) =
            futures::executor::block_on(submit(&engine, &client, submission)).unwrap();
        assert_eq!(destination, before);
        assert_eq!(response.status, 200);
    }
}
