//! Per test class support: the connector context wired to the mock server.

use crate::client::RedirectedClientConfig;
use crate::config::{HarnessConfig, SheetsConfiguration};
use crate::connector::sheets::COMPONENT_NAME;
use crate::connector::{Context, Headers, SheetsComponent};
use crate::error::HarnessResult;
use crate::fixture::{FixtureState, SpreadsheetFixture};
use crate::logging::log_info;
use crate::model::Spreadsheet;
use crate::server::{MockServerHandle, MockServerManager};
use serde_json::Value;
use std::sync::Arc;

/// Everything a test class needs: a context whose `google-sheets` component
/// talks to the shared mock server, and the class's spreadsheet fixture.
///
/// Call [`before_each`](Self::before_each) at the start of every test and
/// [`after_each`](Self::after_each) at its end.
#[derive(Debug)]
pub struct SheetsTestSupport {
    server: Arc<MockServerHandle>,
    configuration: SheetsConfiguration,
    client_config: RedirectedClientConfig,
    context: Context,
    fixture: SpreadsheetFixture,
}

impl SheetsTestSupport {
    /// Build the context for one test class.
    ///
    /// # Errors
    ///
    /// Any error here is a setup failure and should abort the whole class:
    /// unreadable or incomplete options, an unusable keystore, or a server
    /// that does not start.
    pub async fn new(manager: &MockServerManager) -> HarnessResult<Self> {
        let config: &HarnessConfig = manager.config();
        let options = config.load_options()?;
        let configuration = SheetsConfiguration::from_options(&options)?;
        let server = manager.get_or_create().await?;

        let client_config = server.redirected_client_config(configuration.clone());
        let component = SheetsComponent::redirected(&client_config, config.request_timeout)?;

        let mut context = Context::new();
        context.add_component(COMPONENT_NAME, Arc::new(component));

        log_info!(
            port = server.port(),
            base_url = %client_config.base_url(),
            application_name = %configuration.application_name,
            "Test context ready"
        );

        Ok(Self {
            fixture: SpreadsheetFixture::from_config(config),
            server,
            configuration,
            client_config,
            context,
        })
    }

    pub async fn before_each(&self) -> HarnessResult<()> {
        self.server.init().await
    }

    pub async fn after_each(&self) {
        self.server.reset().await;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn server(&self) -> &MockServerHandle {
        &self.server
    }

    pub fn configuration(&self) -> &SheetsConfiguration {
        &self.configuration
    }

    pub fn client_config(&self) -> &RedirectedClientConfig {
        &self.client_config
    }

    pub fn fixture(&self) -> &SpreadsheetFixture {
        &self.fixture
    }

    pub async fn request_body(&self, uri: &str, body: Value) -> HarnessResult<Value> {
        self.context.request_body(uri, body).await
    }

    pub async fn request_body_and_headers(
        &self,
        uri: &str,
        body: Value,
        headers: Headers,
    ) -> HarnessResult<Value> {
        self.context.request_body_and_headers(uri, body, headers).await
    }

    pub async fn spreadsheet(&self) -> HarnessResult<Spreadsheet> {
        self.fixture.spreadsheet(&self.context).await
    }

    pub async fn spreadsheet_with_test_data(&self) -> HarnessResult<Spreadsheet> {
        self.fixture.spreadsheet_with_test_data(&self.context).await
    }

    pub async fn set_spreadsheet(&self, spreadsheet: Spreadsheet) {
        self.fixture.set_spreadsheet(spreadsheet).await;
    }

    pub async fn fixture_state(&self) -> FixtureState {
        self.fixture.state().await
    }
}
