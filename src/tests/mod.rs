// Test modules for sheets-harness crate
//
// Each source file has a corresponding test file that focuses on the
// behavior the harness promises to its users.

// Shared fixtures for unit tests
pub mod helpers;

pub mod error;
pub mod port;
pub mod server;

// NOTE: Tests that start the real TLS server live in tests/harness_integration_tests.rs
