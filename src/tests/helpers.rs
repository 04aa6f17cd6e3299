//! Test helper utilities for sheets-harness unit tests
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

#![allow(dead_code)]

use crate::config::{Credentials, SheetsConfiguration};
use crate::options::OptionSet;
use crate::server::routes;
use crate::server::state::ServerState;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;

pub const TEST_CLIENT_ID: &str = "abc";
pub const TEST_CLIENT_SECRET: &str = "xyz";
pub const TEST_ACCESS_TOKEN: &str = "t1";
pub const TEST_REFRESH_TOKEN: &str = "t2";

/// The four required options with the values of the worked example.
pub fn test_options() -> OptionSet {
    [
        ("clientId", TEST_CLIENT_ID),
        ("clientSecret", TEST_CLIENT_SECRET),
        ("accessToken", TEST_ACCESS_TOKEN),
        ("refreshToken", TEST_REFRESH_TOKEN),
    ]
    .into_iter()
    .collect()
}

pub fn test_credentials() -> Credentials {
    Credentials {
        client_id: TEST_CLIENT_ID.to_string(),
        client_secret: TEST_CLIENT_SECRET.to_string(),
        access_token: TEST_ACCESS_TOKEN.to_string(),
        refresh_token: TEST_REFRESH_TOKEN.to_string(),
    }
}

pub fn test_configuration() -> SheetsConfiguration {
    SheetsConfiguration {
        credentials: test_credentials(),
        application_name: "sheets-harness-tests".to_string(),
    }
}

/// Emulator state registered with the test credentials.
pub fn test_state() -> Arc<ServerState> {
    Arc::new(ServerState::new(test_credentials()))
}

/// Router over `state`, driven without sockets.
pub fn test_router(state: Arc<ServerState>) -> Router {
    routes::router(state)
}

/// What the API answers to a create request.
pub fn created_spreadsheet_json(id: &str, title: &str, sheet: &str) -> Value {
    json!({
        "spreadsheetId": id,
        "spreadsheetUrl": format!("https://docs.google.com/spreadsheets/d/{id}/edit"),
        "properties": { "title": title },
        "sheets": [{ "properties": { "sheetId": 0, "title": sheet, "index": 0 } }]
    })
}

/// What the API answers to an update request.
pub fn update_response_json(id: &str, range: &str, rows: u32, columns: u32) -> Value {
    json!({
        "spreadsheetId": id,
        "updatedRange": range,
        "updatedRows": rows,
        "updatedColumns": columns,
        "updatedCells": rows * columns
    })
}
