//! The `google-sheets` component.
//!
//! | Endpoint | Parameters |
//! |---|---|
//! | `spreadsheets/create` | `content` |
//! | `spreadsheets/get` | `spreadsheetId` |
//! | `data/get` | `spreadsheetId`, `range`, `valueRenderOption` |
//! | `data/update`, `data/append` | `spreadsheetId`, `range`, `values`, `valueInputOption` |
//! | `data/clear` | `spreadsheetId`, `range` |
//!
//! A parameter is taken from the endpoint options first, then from a header
//! named `GoogleSheets.<parameter>`, then from the body when the endpoint
//! carries `inBody=<parameter>`.

use super::{Component, Endpoint, Headers};
use crate::client::{ClientFactory, RedirectedClientConfig, SheetsClient};
use crate::error::{HarnessError, HarnessResult};
use crate::model::{Spreadsheet, ValueInputOption, ValueRange, ValueRenderOption};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Scheme the component is registered under.
pub const COMPONENT_NAME: &str = "google-sheets";

/// Prefix of headers that carry endpoint parameters.
pub const HEADER_PREFIX: &str = "GoogleSheets.";

const IN_BODY: &str = "inBody";

/// Serves spreadsheet endpoints through a [`SheetsClient`].
#[derive(Debug)]
pub struct SheetsComponent {
    client: SheetsClient,
}

impl SheetsComponent {
    pub fn new(client: SheetsClient) -> Self {
        Self { client }
    }

    /// Component whose client talks to the mock server described by `config`.
    pub fn redirected(config: &RedirectedClientConfig, timeout: Duration) -> HarnessResult<Self> {
        let client = ClientFactory::redirected(config)?
            .with_timeout(timeout)
            .build(&config.configuration)?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &SheetsClient {
        &self.client
    }
}

#[async_trait]
impl Component for SheetsComponent {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        body: Value,
        headers: &Headers,
    ) -> HarnessResult<Value> {
        let params = Parameters {
            endpoint,
            headers,
            body,
        };

        match (endpoint.api(), endpoint.method()) {
            ("spreadsheets", "create") => {
                let content: Spreadsheet = params.decode("content")?;
                reply(self.client.create_spreadsheet(&content).await?)
            }
            ("spreadsheets", "get") => {
                let id = params.string("spreadsheetId")?;
                reply(self.client.get_spreadsheet(&id).await?)
            }
            ("data", "get") => {
                let id = params.string("spreadsheetId")?;
                let range = params.string("range")?;
                let render = match params.optional_string("valueRenderOption") {
                    Some(raw) => raw
                        .parse::<ValueRenderOption>()
                        .map_err(|e| params.invalid(e))?,
                    None => ValueRenderOption::default(),
                };
                reply(self.client.get_values(&id, &range, render).await?)
            }
            ("data", "update") => {
                let id = params.string("spreadsheetId")?;
                let range = params.string("range")?;
                let values = params.values()?;
                let input = params.input_option()?;
                reply(self.client.update_values(&id, &range, &values, input).await?)
            }
            ("data", "append") => {
                let id = params.string("spreadsheetId")?;
                let range = params.string("range")?;
                let values = params.values()?;
                let input = params.input_option()?;
                reply(self.client.append_values(&id, &range, &values, input).await?)
            }
            ("data", "clear") => {
                let id = params.string("spreadsheetId")?;
                let range = params.string("range")?;
                reply(self.client.clear_values(&id, &range).await?)
            }
            (api, method) => Err(HarnessError::invalid_endpoint(
                endpoint.uri(),
                format!("unsupported operation {api}/{method}"),
            )),
        }
    }
}

struct Parameters<'a> {
    endpoint: &'a Endpoint,
    headers: &'a Headers,
    body: Value,
}

impl Parameters<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(option) = self.endpoint.option(name) {
            return Some(Value::String(option.to_string()));
        }
        if let Some(header) = self.headers.get(&format!("{HEADER_PREFIX}{name}")) {
            return Some(header.clone());
        }
        (self.endpoint.option(IN_BODY) == Some(name)).then(|| self.body.clone())
    }

    fn optional_string(&self, name: &str) -> Option<String> {
        match self.lookup(name)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn string(&self, name: &str) -> HarnessResult<String> {
        self.optional_string(name)
            .ok_or_else(|| HarnessError::missing_parameter(self.endpoint.uri(), name))
    }

    fn decode<T: DeserializeOwned>(&self, name: &str) -> HarnessResult<T> {
        let value = self
            .lookup(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| HarnessError::missing_parameter(self.endpoint.uri(), name))?;
        serde_json::from_value(value).map_err(|e| self.invalid(format!("parameter {name}: {e}")))
    }

    /// `values` as a `ValueRange` or as bare rows.
    fn values(&self) -> HarnessResult<ValueRange> {
        let value = self
            .lookup("values")
            .filter(|v| !v.is_null())
            .ok_or_else(|| HarnessError::missing_parameter(self.endpoint.uri(), "values"))?;
        let parsed = if value.is_array() {
            serde_json::from_value(value).map(|rows| ValueRange {
                values: Some(rows),
                ..Default::default()
            })
        } else {
            serde_json::from_value(value)
        };
        parsed.map_err(|e| self.invalid(format!("parameter values: {e}")))
    }

    fn input_option(&self) -> HarnessResult<ValueInputOption> {
        match self.optional_string("valueInputOption") {
            Some(raw) => raw
                .parse::<ValueInputOption>()
                .map_err(|e| self.invalid(e)),
            None => Ok(ValueInputOption::UserEntered),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> HarnessError {
        HarnessError::invalid_endpoint(self.endpoint.uri(), message)
    }
}

fn reply<T: Serialize>(response: T) -> HarnessResult<Value> {
    serde_json::to_value(response)
        .map_err(|e| HarnessError::response_parsing(format!("Unserializable response: {e}")))
}
