//! Minimal connector runtime: endpoint URIs dispatched to registered components.
//!
//! A test sends a body (and optional headers) to a URI such as
//! `google-sheets://data/update?inBody=values`; the [`Context`] looks up the
//! component named by the scheme and hands it the parsed [`Endpoint`].

pub mod sheets;

pub use sheets::SheetsComponent;

use crate::error::{HarnessError, HarnessResult};
use crate::logging::log_debug;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Message headers; values are arbitrary JSON.
pub type Headers = BTreeMap<String, Value>;

/// A parsed `<component>://<api>/<method>?key=value` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    uri: String,
    component: String,
    api: String,
    method: String,
    options: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn parse(uri: &str) -> HarnessResult<Self> {
        let url = Url::parse(uri)
            .map_err(|e| HarnessError::invalid_endpoint(uri, format!("not a valid URI: {e}")))?;

        let api = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HarnessError::invalid_endpoint(uri, "missing api name"))?
            .to_string();
        let method = url.path().trim_matches('/').to_string();
        if method.is_empty() || method.contains('/') {
            return Err(HarnessError::invalid_endpoint(
                uri,
                "expected exactly one method name after the api",
            ));
        }

        Ok(Self {
            uri: uri.to_string(),
            component: url.scheme().to_string(),
            api,
            method,
            options: url.query_pairs().into_owned().collect(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }
}

impl FromStr for Endpoint {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// A connector component able to serve endpoints of its scheme.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Component: Send + Sync {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        body: Value,
        headers: &Headers,
    ) -> HarnessResult<Value>;
}

/// Registry of components, one per scheme.
#[derive(Default)]
pub struct Context {
    components: HashMap<String, Arc<dyn Component>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Context").field("components", &names).finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` under `name`, replacing any previous registration.
    pub fn add_component(&mut self, name: impl Into<String>, component: Arc<dyn Component>) {
        let name = name.into();
        log_debug!(component = %name, "Registered component");
        self.components.insert(name, component);
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub async fn request_body(&self, uri: &str, body: Value) -> HarnessResult<Value> {
        self.request_body_and_headers(uri, body, Headers::new())
            .await
    }

    /// Send `body` and `headers` to the endpoint at `uri` and return the reply body.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidEndpoint`] or [`HarnessError::UnknownComponent`]
    /// before dispatch, and [`HarnessError::ExecutionFailed`] wrapping whatever the
    /// component reported.
    pub async fn request_body_and_headers(
        &self,
        uri: &str,
        body: Value,
        headers: Headers,
    ) -> HarnessResult<Value> {
        let endpoint = Endpoint::parse(uri)?;
        let component = self
            .components
            .get(endpoint.component())
            .cloned()
            .ok_or_else(|| HarnessError::unknown_component(endpoint.component()))?;

        log_debug!(
            endpoint = %endpoint,
            header_count = headers.len(),
            "Dispatching request"
        );

        component
            .execute(&endpoint, body, &headers)
            .await
            .map_err(|e| HarnessError::execution_failed(uri, e))
    }
}
