//! Root URL policies and the client factory.
//!
//! Redirecting a client to the mock server is a matter of composing a
//! [`LocalhostRedirect`] policy and the server's certificates into the
//! factory; request construction is untouched.

use super::SheetsClient;
use crate::config::{Credentials, SheetsConfiguration};
use crate::error::{HarnessError, HarnessResult};
use crate::logging::log_debug;
use crate::tls::KeyStore;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Root URL of the real API.
pub const GOOGLE_APIS_ROOT_URL: &str = "https://sheets.googleapis.com/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decides the root URL every outgoing request is resolved against.
pub trait RootUrlPolicy: Send + Sync + fmt::Debug {
    fn resolve_root_url(&self) -> String;
}

/// The real API host.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleApisRoot;

impl RootUrlPolicy for GoogleApisRoot {
    fn resolve_root_url(&self) -> String {
        GOOGLE_APIS_ROOT_URL.to_string()
    }
}

/// `https://localhost:<port>/`, where the mock server listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalhostRedirect {
    pub port: u16,
}

impl RootUrlPolicy for LocalhostRedirect {
    fn resolve_root_url(&self) -> String {
        format!("https://localhost:{}/", self.port)
    }
}

/// An arbitrary root URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRootUrl(pub String);

impl RootUrlPolicy for FixedRootUrl {
    fn resolve_root_url(&self) -> String {
        self.0.clone()
    }
}

/// Everything a client needs to talk to the mock server instead of the real API.
#[derive(Debug, Clone)]
pub struct RedirectedClientConfig {
    pub configuration: SheetsConfiguration,
    pub port: u16,
    pub trust: KeyStore,
}

impl RedirectedClientConfig {
    pub fn new(configuration: SheetsConfiguration, port: u16, trust: KeyStore) -> Self {
        Self {
            configuration,
            port,
            trust,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.configuration.credentials
    }

    pub fn base_url(&self) -> String {
        LocalhostRedirect { port: self.port }.resolve_root_url()
    }
}

/// Builds [`SheetsClient`]s for a root URL policy and a set of trusted certificates.
#[derive(Clone)]
pub struct ClientFactory {
    root_url_policy: Arc<dyn RootUrlPolicy>,
    trusted_certificates: Vec<reqwest::Certificate>,
    timeout: Duration,
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("root_url_policy", &self.root_url_policy)
            .field("trusted_certificates", &self.trusted_certificates.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory {
    /// Factory for the real API.
    pub fn new() -> Self {
        Self {
            root_url_policy: Arc::new(GoogleApisRoot),
            trusted_certificates: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Factory pointed at the mock server described by `config`.
    pub fn redirected(config: &RedirectedClientConfig) -> HarnessResult<Self> {
        Self::new()
            .with_root_url_policy(LocalhostRedirect { port: config.port })
            .trust_certificates_from(&config.trust)
    }

    pub fn with_root_url_policy(mut self, policy: impl RootUrlPolicy + 'static) -> Self {
        self.root_url_policy = Arc::new(policy);
        self
    }

    /// Trust the certificates of `keystore` in addition to the built-in roots.
    pub fn trust_certificates_from(mut self, keystore: &KeyStore) -> HarnessResult<Self> {
        self.trusted_certificates
            .extend(keystore.trust_certificates()?);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root_url_policy(&self) -> &dyn RootUrlPolicy {
        self.root_url_policy.as_ref()
    }

    /// Root URL clients built by this factory will use.
    pub fn root_url(&self) -> HarnessResult<Url> {
        let mut raw = self.root_url_policy.resolve_root_url();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| {
            HarnessError::configuration_error(format!("Invalid root URL '{raw}': {e}"))
        })
    }

    pub fn build(&self, configuration: &SheetsConfiguration) -> HarnessResult<SheetsClient> {
        let root_url = self.root_url()?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.timeout)
            .user_agent(configuration.application_name.clone());
        for certificate in &self.trusted_certificates {
            builder = builder.add_root_certificate(certificate.clone());
        }
        let http = builder.build().map_err(|e| {
            HarnessError::configuration_error(format!("Failed to build HTTP client: {e}"))
        })?;

        log_debug!(
            root_url = %root_url,
            trusted_certificates = self.trusted_certificates.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Built spreadsheet client"
        );

        Ok(SheetsClient::new(http, root_url, configuration))
    }
}
