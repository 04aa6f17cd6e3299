// Unit Tests for the Mock Spreadsheet API
//
// UNIT UNDER TEST: server router and emulator state
//
// BUSINESS RESPONSIBILITY:
//   - Answers the spreadsheet API the way the real service does, closely enough
//     for the client to parse every response
//   - Rejects requests without the registered access token
//   - Journals every request and lets tests override responses
//
// TEST COVERAGE:
//   - Authentication and the OAuth token endpoint
//   - Spreadsheet creation defaults and lookup
//   - Value writes with RAW and USER_ENTERED, reads in both render modes
//   - Append, clear, range errors and unknown spreadsheets
//   - Journal contents and expectation matching
//
// NOTE: These tests drive the router in-process; the TLS listener is covered
// by tests/harness_integration_tests.rs

use crate::server::state::ServerState;
use crate::server::Expectation;
use crate::tests::helpers::{test_router, test_state, TEST_ACCESS_TOKEN};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn authorized(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(router, method, uri, body, Some(TEST_ACCESS_TOKEN)).await
}

/// Create a spreadsheet with one `TestData` sheet and return its id.
async fn create_test_spreadsheet(router: &Router) -> String {
    let (status, body) = authorized(
        router,
        "POST",
        "/v4/spreadsheets",
        Some(json!({
            "properties": { "title": "camel-sheets-42" },
            "sheets": [{ "properties": { "title": "TestData" } }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    body["spreadsheetId"].as_str().unwrap().to_string()
}

fn setup() -> (Arc<ServerState>, Router) {
    let state = test_state();
    let router = test_router(state.clone());
    (state, router)
}

#[cfg(test)]
mod authentication_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_rejected_with_google_error_body() {
        // Arrange
        let (_, router) = setup();

        // Act
        let (status, body) = send(&router, "POST", "/v4/spreadsheets", Some(json!({})), None).await;

        // Assert
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], 401);
        assert_eq!(body["error"]["status"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() {
        // Arrange
        let (_, router) = setup();

        // Act
        let (status, _) = send(
            &router,
            "GET",
            "/v4/spreadsheets/any",
            None,
            Some("not-the-token"),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_endpoint_issues_registered_access_token() {
        // Arrange
        let (_, router) = setup();
        let request = Request::builder()
            .method("POST")
            .uri("/oauth2/v4/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(
                "grant_type=refresh_token&client_id=abc&client_secret=xyz&refresh_token=t2",
            ))
            .unwrap();

        // Act
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
                .unwrap();

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["access_token"], TEST_ACCESS_TOKEN);
        assert_eq!(body["token_type"], "Bearer");
    }

    #[tokio::test]
    async fn test_token_endpoint_rejects_unknown_client_and_bad_grant() {
        // Arrange
        let (_, router) = setup();
        let form = |body: &'static str| {
            Request::builder()
                .method("POST")
                .uri("/oauth2/v4/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap()
        };

        // Act
        let wrong_client = router
            .clone()
            .oneshot(form(
                "grant_type=refresh_token&client_id=abc&client_secret=nope&refresh_token=t2",
            ))
            .await
            .unwrap();
        let wrong_grant = router
            .clone()
            .oneshot(form(
                "grant_type=refresh_token&client_id=abc&client_secret=xyz&refresh_token=old",
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(wrong_client.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_grant.status(), StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod spreadsheet_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_fills_defaults() {
        // Arrange
        let (_, router) = setup();

        // Act
        let (status, body) = authorized(&router, "POST", "/v4/spreadsheets", Some(json!({}))).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert!(body["spreadsheetId"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(body["spreadsheetUrl"]
            .as_str()
            .is_some_and(|url| url.contains(body["spreadsheetId"].as_str().unwrap_or("?"))));
        assert_eq!(body["properties"]["title"], "Untitled spreadsheet");
        let sheet = &body["sheets"][0]["properties"];
        assert_eq!(sheet["title"], "Sheet1");
        assert_eq!(sheet["sheetId"], 0);
        assert_eq!(sheet["index"], 0);
        assert_eq!(sheet["gridProperties"]["rowCount"], 1000);
        assert_eq!(sheet["gridProperties"]["columnCount"], 26);
    }

    #[tokio::test]
    async fn test_created_spreadsheet_can_be_fetched() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        let (status, body) =
            authorized(&router, "GET", &format!("/v4/spreadsheets/{id}"), None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["spreadsheetId"], id.as_str());
        assert_eq!(body["properties"]["title"], "camel-sheets-42");
        assert_eq!(body["sheets"][0]["properties"]["title"], "TestData");
    }

    #[tokio::test]
    async fn test_unknown_spreadsheet_is_not_found() {
        // Arrange
        let (_, router) = setup();

        // Act
        let (status, body) = authorized(&router, "GET", "/v4/spreadsheets/missing", None).await;

        // Assert
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["status"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_duplicate_sheet_titles_are_rejected() {
        // Arrange
        let (_, router) = setup();
        let request = json!({
            "sheets": [
                { "properties": { "title": "Same" } },
                { "properties": { "title": "Same" } }
            ]
        });

        // Act
        let (status, _) = authorized(&router, "POST", "/v4/spreadsheets", Some(request)).await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod values_tests {
    use super::*;

    #[tokio::test]
    async fn test_user_entered_values_are_parsed() {
        // Test verifies USER_ENTERED turns numbers and booleans into typed values
        // while a leading apostrophe keeps text

        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;
        let uri =
            format!("/v4/spreadsheets/{id}/values/TestData!A1:B2?valueInputOption=USER_ENTERED");

        // Act
        let (status, update) = authorized(
            &router,
            "PUT",
            &uri,
            Some(json!({ "values": [["a1", "5"], ["TRUE", "'7"]] })),
        )
        .await;
        let (_, unformatted) = authorized(
            &router,
            "GET",
            &format!(
                "/v4/spreadsheets/{id}/values/TestData!A1:B2?{}",
                "valueRenderOption=UNFORMATTED_VALUE"
            ),
            None,
        )
        .await;
        let (_, formatted) = authorized(
            &router,
            "GET",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B2"),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(update["updatedRange"], "TestData!A1:B2");
        assert_eq!(update["updatedCells"], 4);
        assert!(update.get("updatedData").is_none());
        assert_eq!(unformatted["values"], json!([["a1", 5], [true, "7"]]));
        assert_eq!(formatted["values"], json!([["a1", "5"], ["TRUE", "7"]]));
        assert_eq!(formatted["range"], "TestData!A1:B2");
    }

    #[tokio::test]
    async fn test_raw_values_are_stored_literally() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1?valueInputOption=RAW"),
            Some(json!({ "values": [["5", "'x"]] })),
        )
        .await;
        let (_, read) = authorized(
            &router,
            "GET",
            &format!(
                "/v4/spreadsheets/{id}/values/TestData!A1:B1?{}",
                "valueRenderOption=UNFORMATTED_VALUE"
            ),
            None,
        )
        .await;

        // Assert
        assert_eq!(read["values"], json!([["5", "'x"]]));
    }

    #[tokio::test]
    async fn test_update_requires_value_input_option() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        let (status, body) = authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1"),
            Some(json!({ "values": [["x"]] })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("valueInputOption")));
    }

    #[tokio::test]
    async fn test_include_values_in_response_echoes_data() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        let (_, body) = authorized(
            &router,
            "PUT",
            &format!(
                "/v4/spreadsheets/{id}/values/TestData!A1:B2?{}&{}",
                "valueInputOption=USER_ENTERED",
                "includeValuesInResponse=true"
            ),
            Some(json!({ "values": [["a1", "b1"], ["a2", "b2"]] })),
        )
        .await;

        // Assert
        assert_eq!(body["updatedData"]["range"], "TestData!A1:B2");
        assert_eq!(body["updatedData"]["values"], json!([["a1", "b1"], ["a2", "b2"]]));
    }

    #[tokio::test]
    async fn test_writing_past_range_is_rejected() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        let (status, body) = authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B1?valueInputOption=RAW"),
            Some(json!({ "values": [["a", "b", "c"]] })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("tried writing to")));
    }

    #[tokio::test]
    async fn test_unknown_sheet_cannot_be_parsed() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        let (status, body) = authorized(
            &router,
            "GET",
            &format!("/v4/spreadsheets/{id}/values/Nope!A1"),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Unable to parse range: Nope!A1");
        assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_reads_trim_trailing_empty_cells_and_rows() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;
        authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!B2?valueInputOption=RAW"),
            Some(json!({ "values": [["x"]] })),
        )
        .await;

        // Act
        let (_, body) = authorized(
            &router,
            "GET",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:D5"),
            None,
        )
        .await;

        // Assert
        assert_eq!(body["range"], "TestData!A1:D5");
        assert_eq!(body["values"], json!([[], ["", "x"]]));
    }

    #[tokio::test]
    async fn test_whole_sheet_range_reads_everything() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;
        authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B2?valueInputOption=RAW"),
            Some(json!({ "values": [["a1", "b1"], ["a2", "b2"]] })),
        )
        .await;

        // Act
        let (_, body) = authorized(
            &router,
            "GET",
            &format!("/v4/spreadsheets/{id}/values/TestData"),
            None,
        )
        .await;

        // Assert
        assert_eq!(body["range"], "TestData!A1:Z1000");
        assert_eq!(body["values"], json!([["a1", "b1"], ["a2", "b2"]]));
    }

    #[tokio::test]
    async fn test_append_writes_after_table_and_clear_blanks_range() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;
        authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B2?valueInputOption=RAW"),
            Some(json!({ "values": [["a1", "b1"], ["a2", "b2"]] })),
        )
        .await;

        // Act
        let (status, appended) = authorized(
            &router,
            "POST",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:append?valueInputOption=RAW"),
            Some(json!({ "values": [["a3", "b3"]] })),
        )
        .await;
        let (_, cleared) = authorized(
            &router,
            "POST",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B2:clear"),
            Some(json!({})),
        )
        .await;
        let (_, remaining) = authorized(
            &router,
            "GET",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B3"),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(appended["tableRange"], "TestData!A1:B2");
        assert_eq!(appended["updates"]["updatedRange"], "TestData!A3:B3");
        assert_eq!(cleared["clearedRange"], "TestData!A1:B2");
        assert_eq!(remaining["values"], json!([[], [], ["a3", "b3"]]));
    }

    #[tokio::test]
    async fn test_empty_range_read_omits_values() {
        // Arrange
        let (_, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        let (status, body) = authorized(
            &router,
            "GET",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1:B2"),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("values").is_none());
    }
}

#[cfg(test)]
mod journal_and_expectation_tests {
    use super::*;

    #[tokio::test]
    async fn test_every_request_is_journaled() {
        // Arrange
        let (state, router) = setup();

        // Act
        let id = create_test_spreadsheet(&router).await;
        send(&router, "GET", &format!("/v4/spreadsheets/{id}"), None, None).await;

        // Assert
        let journal = state.journal().await;
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].method, "POST");
        assert_eq!(journal[0].path, "/v4/spreadsheets");
        assert_eq!(
            journal[0].body_json().unwrap()["properties"]["title"],
            "camel-sheets-42"
        );
        assert_eq!(
            journal[0].header("Authorization"),
            Some(format!("Bearer {TEST_ACCESS_TOKEN}").as_str())
        );
        assert_eq!(journal[1].method, "GET");
    }

    #[tokio::test]
    async fn test_query_parameters_are_decoded() {
        // Arrange
        let (state, router) = setup();
        let id = create_test_spreadsheet(&router).await;

        // Act
        authorized(
            &router,
            "PUT",
            &format!("/v4/spreadsheets/{id}/values/TestData!A1?valueInputOption=USER_ENTERED"),
            Some(json!({ "values": [["x"]] })),
        )
        .await;

        // Assert
        let journal = state.journal().await;
        let update = journal.last().unwrap();
        assert_eq!(update.query_param("valueInputOption").as_deref(), Some("USER_ENTERED"));
        assert_eq!(update.query_param("missing"), None);
    }

    #[tokio::test]
    async fn test_expectation_overrides_emulator_for_limited_times() {
        // Test verifies a canned failure is served once, then the emulator answers again

        // Arrange
        let (state, router) = setup();
        state
            .add_expectation(
                Expectation::new(Method::POST, "/v4/spreadsheets")
                    .respond_with(
                        StatusCode::SERVICE_UNAVAILABLE,
                        json!({
                            "error": {
                                "code": 503,
                                "message": "Backend down",
                                "status": "UNAVAILABLE"
                            }
                        }),
                    )
                    .times(1),
            )
            .await;

        // Act
        let (first, body) = authorized(&router, "POST", "/v4/spreadsheets", Some(json!({}))).await;
        let (second, _) = authorized(&router, "POST", "/v4/spreadsheets", Some(json!({}))).await;

        // Assert
        assert_eq!(first, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["message"], "Backend down");
        assert_eq!(second, StatusCode::OK);
        assert_eq!(state.journal().await.len(), 2);
    }

    #[tokio::test]
    async fn test_clearing_journal_and_expectations_keeps_spreadsheets() {
        // Arrange
        let (state, router) = setup();
        let id = create_test_spreadsheet(&router).await;
        state
            .add_expectation(Expectation::new(Method::GET, "/never"))
            .await;

        // Act
        let dropped_requests = state.clear_journal().await;
        let dropped_expectations = state.clear_expectations().await;
        let (status, _) = authorized(&router, "GET", &format!("/v4/spreadsheets/{id}"), None).await;

        // Assert
        assert_eq!(dropped_requests, 1);
        assert_eq!(dropped_expectations, 1);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.journal().await.len(), 1);
    }
}
