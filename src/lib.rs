//! # sheets-harness
//!
//! Integration-test harness for a spreadsheet connector that never touches the
//! real service.
//!
//! ## Key Features
//!
//! - **TLS Mock Server**: a local HTTPS server impersonating the spreadsheet API,
//!   started once per test run and shared by every test class
//! - **Client Redirection**: clients built through [`ClientFactory`] resolve every
//!   request against `https://localhost:<port>/` and trust the mock's certificate
//! - **Memoized Fixtures**: a test spreadsheet and its seeded data are created on
//!   first use and reused afterwards
//!
//! ## Example
//!
//! The default configuration uses the options file and keystore shipped in
//! `resources/`, relative to the package root.
//!
//! ```rust,no_run
//! use sheets_harness::{HarnessConfig, MockServerManager, SheetsTestSupport};
//!
//! # async fn example() -> sheets_harness::HarnessResult<()> {
//! let manager = MockServerManager::new(HarnessConfig::from_env()?);
//! let support = SheetsTestSupport::new(&manager).await?;
//!
//! support.before_each().await?;
//! let spreadsheet = support.spreadsheet_with_test_data().await?;
//! assert!(spreadsheet.spreadsheet_id.is_some());
//! support.after_each().await;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod model;
pub mod options;
pub mod port;
pub mod server;
pub mod tls;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use client::{
    ClientFactory, FixedRootUrl, GoogleApisRoot, LocalhostRedirect, RedirectedClientConfig,
    RootUrlPolicy, SheetsClient,
};
pub use config::{Credentials, HarnessConfig, SheetsConfiguration};
pub use connector::{Component, Context, Endpoint, Headers, SheetsComponent};
pub use error::{ErrorCategory, HarnessError, HarnessResult};
pub use fixture::{FixtureState, SpreadsheetFixture};
pub use harness::SheetsTestSupport;
pub use model::{Spreadsheet, ValueInputOption, ValueRange, ValueRenderOption};
pub use options::OptionSet;
pub use server::{
    Expectation, MockServerHandle, MockServerManager, MockSheetsServer, RecordedRequest,
};
pub use tls::KeyStore;
