//! Typed configuration for the harness.
//!
//! Options files are mapped onto [`SheetsConfiguration`] by a pure function
//! that validates the required keys up front. [`HarnessConfig`] holds the
//! harness's own settings (file locations, timeouts, fixture naming).

use crate::error::{HarnessError, HarnessResult};
use crate::logging::log_debug;
use crate::options::OptionSet;
use std::path::PathBuf;
use std::time::Duration;

/// Option key for the OAuth client id.
pub const CLIENT_ID: &str = "clientId";
/// Option key for the OAuth client secret.
pub const CLIENT_SECRET: &str = "clientSecret";
/// Option key for the access token.
pub const ACCESS_TOKEN: &str = "accessToken";
/// Option key for the refresh token.
pub const REFRESH_TOKEN: &str = "refreshToken";
/// Optional key for the application name sent by the client.
pub const APPLICATION_NAME: &str = "applicationName";

/// Keys every options file must provide.
pub const REQUIRED_OPTIONS: [&str; 4] = [CLIENT_ID, CLIENT_SECRET, ACCESS_TOKEN, REFRESH_TOKEN];

const DEFAULT_APPLICATION_NAME: &str = "sheets-harness";

/// Options file shipped in `resources/`, relative to the package root.
pub const DEFAULT_OPTIONS_PATH: &str = "resources/test-options.properties";
/// Keystore shipped in `resources/`, relative to the package root.
pub const DEFAULT_KEYSTORE_PATH: &str = "resources/googleapis.p12";
/// Password of the shipped keystore.
pub const DEFAULT_KEYSTORE_PASSWORD: &str = "secret";

/// OAuth-style credentials shared by the mock server and the client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Map the four required credential keys.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Configuration`] listing every missing key.
    pub fn from_options(options: &OptionSet) -> HarnessResult<Self> {
        let missing: Vec<&str> = REQUIRED_OPTIONS
            .iter()
            .copied()
            .filter(|key| options.get(key).map_or(true, |v| v.trim().is_empty()))
            .collect();

        if !missing.is_empty() {
            return Err(HarnessError::configuration_error(format!(
                "Missing required options in {}: {}",
                options.origin(),
                missing.join(", ")
            )));
        }

        let required = |key: &str| options.get(key).unwrap_or_default().trim().to_string();

        Ok(Self {
            client_id: required(CLIENT_ID),
            client_secret: required(CLIENT_SECRET),
            access_token: required(ACCESS_TOKEN),
            refresh_token: required(REFRESH_TOKEN),
        })
    }
}

/// Configuration of the spreadsheet component under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfiguration {
    pub credentials: Credentials,
    pub application_name: String,
}

impl SheetsConfiguration {
    /// Build the component configuration from loaded options.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Configuration`] if any required key is missing.
    pub fn from_options(options: &OptionSet) -> HarnessResult<Self> {
        let credentials = Credentials::from_options(options)?;
        let application_name = options
            .get(APPLICATION_NAME)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_APPLICATION_NAME)
            .to_string();

        for key in options.keys() {
            if !REQUIRED_OPTIONS.contains(&key) && key != APPLICATION_NAME {
                log_debug!(option = %key, "Ignoring unrecognized option");
            }
        }

        Ok(Self {
            credentials,
            application_name,
        })
    }
}

/// Settings of the harness itself.
#[derive(Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Options file holding the credentials.
    pub options_path: PathBuf,
    /// PKCS#12 keystore holding the mock server's TLS identity.
    pub keystore_path: PathBuf,
    /// Password opening the keystore.
    pub keystore_password: String,
    /// How long the mock server may take to report it is listening.
    pub startup_timeout: Duration,
    /// Per-request timeout of redirected clients.
    pub request_timeout: Duration,
    /// Prefix of generated spreadsheet titles.
    pub title_prefix: String,
    /// Name of the sheet created in the fixture spreadsheet.
    pub test_sheet: String,
}

impl std::fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("options_path", &self.options_path)
            .field("keystore_path", &self.keystore_path)
            .field("keystore_password", &"<redacted>")
            .field("startup_timeout", &self.startup_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("title_prefix", &self.title_prefix)
            .field("test_sheet", &self.test_sheet)
            .finish()
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            options_path: PathBuf::from(DEFAULT_OPTIONS_PATH),
            keystore_path: PathBuf::from(DEFAULT_KEYSTORE_PATH),
            keystore_password: DEFAULT_KEYSTORE_PASSWORD.to_string(),
            startup_timeout: Duration::from_millis(5_000),
            request_timeout: Duration::from_secs(5),
            title_prefix: "camel-sheets-".to_string(),
            test_sheet: "TestData".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables on top of the defaults.
    /// This is the ONLY method that should access environment variables
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `SHEETS_HARNESS_OPTIONS` | `options_path` |
    /// | `SHEETS_HARNESS_KEYSTORE` | `keystore_path` |
    /// | `SHEETS_HARNESS_KEYSTORE_PASSWORD` | `keystore_password` |
    /// | `SHEETS_HARNESS_STARTUP_TIMEOUT_MS` | `startup_timeout` |
    /// | `SHEETS_HARNESS_REQUEST_TIMEOUT_MS` | `request_timeout` |
    /// | `SHEETS_HARNESS_TITLE_PREFIX` | `title_prefix` |
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Configuration`] if a timeout is not a
    /// non-negative integer.
    pub fn from_env() -> HarnessResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SHEETS_HARNESS_OPTIONS") {
            config.options_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SHEETS_HARNESS_KEYSTORE") {
            config.keystore_path = PathBuf::from(path);
        }
        if let Ok(password) = std::env::var("SHEETS_HARNESS_KEYSTORE_PASSWORD") {
            config.keystore_password = password;
        }
        if let Some(timeout) = Self::duration_from_env("SHEETS_HARNESS_STARTUP_TIMEOUT_MS")? {
            config.startup_timeout = timeout;
        }
        if let Some(timeout) = Self::duration_from_env("SHEETS_HARNESS_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = timeout;
        }
        if let Ok(prefix) = std::env::var("SHEETS_HARNESS_TITLE_PREFIX") {
            config.title_prefix = prefix;
        }

        log_debug!(
            options_path = %config.options_path.display(),
            keystore_path = %config.keystore_path.display(),
            startup_timeout_ms = config.startup_timeout.as_millis() as u64,
            request_timeout_ms = config.request_timeout.as_millis() as u64,
            "Harness configuration loaded"
        );

        Ok(config)
    }

    fn duration_from_env(var: &str) -> HarnessResult<Option<Duration>> {
        match std::env::var(var) {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(|ms| Some(Duration::from_millis(ms)))
                .map_err(|e| {
                    HarnessError::configuration_error(format!(
                        "{var} must be a number of milliseconds, got '{raw}': {e}"
                    ))
                }),
            Err(_) => Ok(None),
        }
    }

    pub fn with_options_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options_path = path.into();
        self
    }

    pub fn with_keystore_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.keystore_path = path.into();
        self
    }

    pub fn with_keystore_password(mut self, password: impl Into<String>) -> Self {
        self.keystore_password = password.into();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load the options file named by this configuration.
    pub fn load_options(&self) -> HarnessResult<OptionSet> {
        OptionSet::load(&self.options_path)
    }
}
