//! HTTP client for the spreadsheet API.
//!
//! [`SheetsClient`] is always built through a [`ClientFactory`], which decides
//! the root URL every request is resolved against. Everything else (auth
//! headers, JSON bodies, query parameters) is the same no matter where the
//! client points.

pub mod redirect;

pub use redirect::{
    ClientFactory, FixedRootUrl, GoogleApisRoot, LocalhostRedirect, RedirectedClientConfig,
    RootUrlPolicy,
};

use crate::config::{Credentials, SheetsConfiguration};
use crate::error::{HarnessError, HarnessResult};
use crate::logging::{log_debug, log_error};
use crate::model::{
    AppendValuesResponse, ApiErrorBody, ClearValuesResponse, Spreadsheet, UpdateValuesResponse,
    ValueInputOption, ValueRange, ValueRenderOption,
};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;

/// Path of the OAuth token endpoint, relative to the root URL.
pub const TOKEN_PATH: [&str; 3] = ["oauth2", "v4", "token"];

/// Spreadsheet API client.
#[derive(Debug)]
pub struct SheetsClient {
    http: reqwest::Client,
    root_url: Url,
    credentials: Credentials,
    access_token: RwLock<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl SheetsClient {
    pub(crate) fn new(http: reqwest::Client, root_url: Url, config: &SheetsConfiguration) -> Self {
        log_debug!(
            root_url = %root_url,
            application_name = %config.application_name,
            client_id = %config.credentials.client_id,
            "Creating spreadsheet client"
        );

        Self {
            http,
            root_url,
            access_token: RwLock::new(config.credentials.access_token.clone()),
            credentials: config.credentials.clone(),
        }
    }

    /// Root URL all requests are resolved against.
    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    /// Access token currently sent with requests.
    pub async fn access_token(&self) -> String {
        self.access_token.read().await.clone()
    }

    pub async fn create_spreadsheet(
        &self,
        spreadsheet: &Spreadsheet,
    ) -> HarnessResult<Spreadsheet> {
        let url = self.api_url(&["v4", "spreadsheets"])?;
        self.send(self.http.post(url).json(spreadsheet)).await
    }

    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> HarnessResult<Spreadsheet> {
        let url = self.api_url(&["v4", "spreadsheets", spreadsheet_id])?;
        self.send(self.http.get(url)).await
    }

    pub async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
    ) -> HarnessResult<ValueRange> {
        let url = self.api_url(&["v4", "spreadsheets", spreadsheet_id, "values", range])?;
        let request = self
            .http
            .get(url)
            .query(&[("valueRenderOption", render.as_str())]);
        self.send(request).await
    }

    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &ValueRange,
        input: ValueInputOption,
    ) -> HarnessResult<UpdateValuesResponse> {
        let url = self.api_url(&["v4", "spreadsheets", spreadsheet_id, "values", range])?;
        let request = self
            .http
            .put(url)
            .query(&[("valueInputOption", input.as_str())])
            .json(values);
        self.send(request).await
    }

    pub async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &ValueRange,
        input: ValueInputOption,
    ) -> HarnessResult<AppendValuesResponse> {
        let target = format!("{range}:append");
        let url = self.api_url(&["v4", "spreadsheets", spreadsheet_id, "values", &target])?;
        let request = self
            .http
            .post(url)
            .query(&[("valueInputOption", input.as_str())])
            .json(values);
        self.send(request).await
    }

    pub async fn clear_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> HarnessResult<ClearValuesResponse> {
        let target = format!("{range}:clear");
        let url = self.api_url(&["v4", "spreadsheets", spreadsheet_id, "values", &target])?;
        self.send(self.http.post(url).json(&serde_json::json!({})))
            .await
    }

    /// Exchange the refresh token for a new access token and use it from now on.
    pub async fn refresh_access_token(&self) -> HarnessResult<String> {
        let url = self.api_url(&TOKEN_PATH)?;
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
        ];

        let response = self.http.post(url.clone()).form(&form).send().await.map_err(|e| {
            log_error!(url = %url, error = %e, "Token request failed");
            HarnessError::request_failed(format!("Token request failed: {e}"), Some(Box::new(e)))
        })?;
        let token: TokenResponse = read_response(response).await?;

        *self.access_token.write().await = token.access_token.clone();
        log_debug!(client_id = %self.credentials.client_id, "Access token refreshed");
        Ok(token.access_token)
    }

    fn api_url(&self, segments: &[&str]) -> HarnessResult<Url> {
        let mut url = self.root_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                HarnessError::configuration_error(format!(
                    "Root URL {} cannot carry a path",
                    self.root_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> HarnessResult<T> {
        let token = self.access_token.read().await.clone();
        let response = request.bearer_auth(token).send().await.map_err(|e| {
            let url = e.url().map(ToString::to_string).unwrap_or_default();
            log_error!(url = %url, error = %e, "HTTP request failed");
            let message = if e.is_timeout() {
                format!("Request to {url} timed out")
            } else {
                format!("Request to {url} failed: {e}")
            };
            HarnessError::request_failed(message, Some(Box::new(e)))
        })?;

        read_response(response).await
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> HarnessResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        HarnessError::response_parsing(format!("Failed to read response body: {e}"))
    })?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .or_else(|_| {
                serde_json::from_str::<serde_json::Value>(&body).map(|v| {
                    v.get("error_description")
                        .or_else(|| v.get("error"))
                        .and_then(|e| e.as_str())
                        .unwrap_or(body.as_str())
                        .to_string()
                })
            })
            .unwrap_or_else(|_| body.clone());
        return Err(HarnessError::api_error(status.as_u16(), message));
    }

    serde_json::from_str(&body).map_err(|e| {
        log_error!(error = %e, raw_body = %body, "Failed to parse response");
        HarnessError::response_parsing(format!("Invalid response: {e}"))
    })
}
