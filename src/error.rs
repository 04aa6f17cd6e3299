//! Error types for harness operations.
//!
//! The harness distinguishes failures by *when* they happen:
//! - Configuration errors (missing options, unreadable options file)
//! - Startup errors (keystore problems, port binding, server not running)
//! - Execution errors (a request through the redirected client failed)
//!
//! Setup-level errors (configuration and startup) are fatal for a whole test
//! class; execution errors only fail the current test.
//!
//! # Error Handling Example
//!
//! ```rust,no_run
//! use sheets_harness::{HarnessError, error::ErrorCategory};
//!
//! fn report(err: &HarnessError) {
//!     match err.category() {
//!         ErrorCategory::Configuration | ErrorCategory::Startup => {
//!             eprintln!("harness setup failed, skipping class: {err}");
//!         }
//!         ErrorCategory::Execution => {
//!             eprintln!("test request failed: {err}");
//!         }
//!     }
//! }
//! ```

use crate::logging::{log_error, log_warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// High-level categorization of harness errors.
///
/// Use [`HarnessError::category()`] to get the category for any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Options are missing, malformed, or could not be read.
    Configuration,

    /// The mock server could not be built or started.
    ///
    /// Keystore failures, port binding failures, and servers that never
    /// report a running state all land here.
    Startup,

    /// A request issued through the connector or client failed.
    Execution,
}

/// Convenient result type for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Errors that can occur while building or using the harness.
///
/// | Variant | Category |
/// |---------|----------|
/// | `Configuration` | Configuration |
/// | `OptionsUnreadable` | Configuration |
/// | `KeyStore` | Startup |
/// | `ServerStartup` | Startup |
/// | `RequestFailed` | Execution |
/// | `ApiError` | Execution |
/// | `ResponseParsing` | Execution |
/// | `UnknownComponent` | Execution |
/// | `InvalidEndpoint` | Execution |
/// | `MissingParameter` | Execution |
/// | `ExecutionFailed` | Execution |
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Configuration is invalid or incomplete.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The options file could not be read.
    #[error("{} could not be loaded: {source}", path.display())]
    OptionsUnreadable {
        /// Path of the options file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TLS keystore could not be read or does not hold a usable identity.
    #[error("Key store {} is unusable: {message}", path.display())]
    KeyStore {
        /// Path of the keystore file.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
        /// The underlying I/O error, if the file could not be read.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The mock server failed to bind or did not reach a running state.
    #[error("Mock server startup failed: {message}")]
    ServerStartup {
        /// Description of the failure.
        message: String,
    },

    /// The HTTP request failed at the transport layer.
    #[error("Request failed: {message}")]
    RequestFailed {
        /// Description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the API.
        message: String,
    },

    /// The API response could not be parsed.
    #[error("Response parsing failed: {message}")]
    ResponseParsing {
        /// Details about the parsing failure.
        message: String,
    },

    /// No component is registered under the endpoint's scheme.
    #[error("No component registered under name: {name}")]
    UnknownComponent {
        /// The component name that was requested.
        name: String,
    },

    /// The endpoint URI is malformed or names an unknown operation.
    #[error("Invalid endpoint {uri}: {message}")]
    InvalidEndpoint {
        /// The endpoint URI.
        uri: String,
        /// Why it was rejected.
        message: String,
    },

    /// A required operation parameter was not supplied.
    #[error("Missing parameter '{name}' for endpoint {endpoint}")]
    MissingParameter {
        /// The endpoint URI.
        endpoint: String,
        /// The parameter name.
        name: String,
    },

    /// A component failed while executing an endpoint.
    #[error("Failed to execute {endpoint}: {source}")]
    ExecutionFailed {
        /// The endpoint URI.
        endpoint: String,
        /// The component's error.
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } | Self::OptionsUnreadable { .. } => {
                ErrorCategory::Configuration
            }
            Self::KeyStore { .. } | Self::ServerStartup { .. } => ErrorCategory::Startup,
            Self::RequestFailed { .. }
            | Self::ApiError { .. }
            | Self::ResponseParsing { .. }
            | Self::UnknownComponent { .. }
            | Self::InvalidEndpoint { .. }
            | Self::MissingParameter { .. }
            | Self::ExecutionFailed { .. } => ErrorCategory::Execution,
        }
    }

    /// Whether this error aborts the whole test class rather than a single test.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Startup
        )
    }

    /// HTTP status of an API rejection, looking through execution wrappers.
    pub fn api_status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::ExecutionFailed { source, .. } => source.api_status(),
            _ => None,
        }
    }

    // =========================================================================
    // Constructor methods with automatic logging
    // =========================================================================

    pub fn configuration_error(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "configuration_error",
            message = %message,
            "Harness configuration invalid"
        );
        Self::Configuration { message }
    }

    pub fn options_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        log_error!(
            error_type = "options_unreadable",
            path = %path.display(),
            error = %source,
            "Options file could not be loaded"
        );
        Self::OptionsUnreadable { path, source }
    }

    pub fn key_store(
        path: &Path,
        message: impl Into<String>,
        source: Option<std::io::Error>,
    ) -> Self {
        let message = message.into();
        log_error!(
            error_type = "key_store",
            path = %path.display(),
            message = %message,
            has_source = source.is_some(),
            "Key store unusable"
        );
        Self::KeyStore {
            path: path.to_path_buf(),
            message,
            source,
        }
    }

    pub fn server_startup(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "server_startup",
            message = %message,
            "Mock server failed to start"
        );
        Self::ServerStartup { message }
    }

    pub fn request_failed(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let message = message.into();
        log_error!(
            error_type = "request_failed",
            message = %message,
            has_source = source.is_some(),
            "Request execution failed"
        );
        Self::RequestFailed { message, source }
    }

    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_type = "api_error",
            status = status,
            message = %message,
            "API rejected request"
        );
        Self::ApiError { status, message }
    }

    pub fn response_parsing(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_type = "response_parsing",
            message = %message,
            "API response format invalid"
        );
        Self::ResponseParsing { message }
    }

    pub fn unknown_component(name: impl Into<String>) -> Self {
        let name = name.into();
        log_error!(
            error_type = "unknown_component",
            component = %name,
            "Endpoint names an unregistered component"
        );
        Self::UnknownComponent { name }
    }

    pub fn invalid_endpoint(uri: impl Into<String>, message: impl Into<String>) -> Self {
        let uri = uri.into();
        let message = message.into();
        log_error!(
            error_type = "invalid_endpoint",
            uri = %uri,
            message = %message,
            "Endpoint URI rejected"
        );
        Self::InvalidEndpoint { uri, message }
    }

    pub fn missing_parameter(endpoint: impl Into<String>, name: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let name = name.into();
        log_error!(
            error_type = "missing_parameter",
            endpoint = %endpoint,
            parameter = %name,
            "Endpoint parameter missing"
        );
        Self::MissingParameter { endpoint, name }
    }

    /// Wrap a component failure. Already-wrapped errors are returned unchanged.
    pub fn execution_failed(endpoint: impl Into<String>, source: HarnessError) -> Self {
        if matches!(source, Self::ExecutionFailed { .. }) {
            return source;
        }
        let endpoint = endpoint.into();
        log_error!(
            error_type = "execution_failed",
            endpoint = %endpoint,
            error = %source,
            "Endpoint execution failed"
        );
        Self::ExecutionFailed {
            endpoint,
            source: Box::new(source),
        }
    }
}
