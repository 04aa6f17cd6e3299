//! Shared setup for the harness integration tests.
//!
//! Every test file links this module, so one mock server is started per test
//! binary and shared by all of its tests.

// Not every test file uses every helper
#![allow(dead_code)]

use once_cell::sync::Lazy;
use sheets_harness::{HarnessConfig, MockServerManager};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options file checked into the repository.
pub const OPTIONS_FILE: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/resources/test-options.properties");

/// Keystore checked into the repository, opened with the default password.
pub const KEYSTORE_FILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources/googleapis.p12");

/// The one server manager of this test binary.
pub static SERVER: Lazy<MockServerManager> = Lazy::new(|| MockServerManager::new(harness_config()));

/// Harness configuration pointing at the checked-in options and keystore.
pub fn harness_config() -> HarnessConfig {
    HarnessConfig::default()
        .with_options_path(OPTIONS_FILE)
        .with_keystore_path(KEYSTORE_FILE)
        .with_startup_timeout(Duration::from_secs(10))
        .with_request_timeout(Duration::from_secs(10))
}

/// Write an options file holding only `contents` into `dir`.
pub fn write_options(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("options.properties");
    std::fs::write(&path, contents).expect("write options file");
    path
}

/// Rows of a values reply as strings, for compact assertions.
pub fn rows_of(reply: &serde_json::Value) -> Vec<Vec<String>> {
    reply["values"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|c| {
                                    c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string())
                                })
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}
