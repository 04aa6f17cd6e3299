//! axum router of the mock server.

use super::state::{ApiFailure, RecordedRequest, SharedState};
use crate::logging::{log_debug, log_warn};
use crate::model::{
    ApiErrorBody, ApiErrorDetail, Spreadsheet, ValueInputOption, ValueRange, ValueRenderOption,
};
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const TOKEN_LIFETIME_SECS: u64 = 3600;

pub(crate) fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/v4/spreadsheets", post(create_spreadsheet))
        .route("/v4/spreadsheets/{spreadsheet_id}", get(get_spreadsheet))
        .route(
            "/v4/spreadsheets/{spreadsheet_id}/values/{*range}",
            get(get_values).put(update_values).post(modify_values),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/oauth2/v4/token", post(issue_token))
        .merge(api)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), journal))
        .with_state(state)
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = match self.status {
            StatusCode::BAD_REQUEST => "INVALID_ARGUMENT",
            StatusCode::UNAUTHORIZED => "UNAUTHENTICATED",
            StatusCode::FORBIDDEN => "PERMISSION_DENIED",
            StatusCode::NOT_FOUND => "NOT_FOUND",
            _ => "INTERNAL",
        };
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.status.as_u16(),
                message: self.message,
                status: status.to_string(),
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ----------------------------------------------------------------------
// Middleware
// ----------------------------------------------------------------------

/// Record every request, then answer from a matching expectation or fall through.
async fn journal(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log_warn!(error = %e, path = %parts.uri.path(), "Rejected request body");
            return ApiFailure::bad_request(format!("Unreadable request body: {e}"))
                .into_response();
        }
    };

    let recorded = RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: String::from_utf8_lossy(&bytes).into_owned(),
        received_at: Utc::now(),
    };
    log_debug!(
        method = %recorded.method,
        path = %recorded.path,
        body_bytes = bytes.len(),
        "Mock server received request"
    );
    state.record(recorded).await;

    if let Some((status, body)) = state.take_expectation(&parts.method, parts.uri.path()).await {
        log_debug!(path = %parts.uri.path(), status = status.as_u16(), "Answered from expectation");
        return (status, Json(body)).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn require_bearer(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented != Some(state.credentials.access_token.as_str()) {
        log_debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "Request had invalid authentication credentials. Expected OAuth 2 access token, \
             login cookie or other valid authentication credential.",
        )
        .into_response();
    }

    next.run(request).await
}

// ----------------------------------------------------------------------
// OAuth
// ----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenRequest {
    grant_type: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

async fn issue_token(State(state): State<SharedState>, Form(form): Form<TokenRequest>) -> Response {
    let credentials = &state.credentials;

    if form.client_id.as_deref() != Some(credentials.client_id.as_str())
        || form.client_secret.as_deref() != Some(credentials.client_secret.as_str())
    {
        return oauth_error(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "The OAuth client was not found.",
        );
    }
    if form.grant_type.as_deref() != Some("refresh_token")
        || form.refresh_token.as_deref() != Some(credentials.refresh_token.as_str())
    {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "Bad Request");
    }

    Json(json!({
        "access_token": credentials.access_token,
        "token_type": "Bearer",
        "expires_in": TOKEN_LIFETIME_SECS,
    }))
    .into_response()
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}

// ----------------------------------------------------------------------
// Spreadsheets
// ----------------------------------------------------------------------

async fn create_spreadsheet(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Spreadsheet>, ApiFailure> {
    let request: Spreadsheet = parse_body(&body)?;
    let created = state.create_spreadsheet(request).await?;
    log_debug!(
        spreadsheet_id = created.spreadsheet_id.as_deref().unwrap_or_default(),
        title = created.title().unwrap_or_default(),
        "Created emulated spreadsheet"
    );
    Ok(Json(created))
}

async fn get_spreadsheet(
    State(state): State<SharedState>,
    Path(spreadsheet_id): Path<String>,
) -> Result<Json<Spreadsheet>, ApiFailure> {
    state.get_spreadsheet(&spreadsheet_id).await.map(Json)
}

// ----------------------------------------------------------------------
// Values
// ----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ValuesQuery {
    value_input_option: Option<String>,
    value_render_option: Option<String>,
    include_values_in_response: Option<bool>,
}

impl ValuesQuery {
    fn input_option(&self) -> Result<ValueInputOption, ApiFailure> {
        self.value_input_option
            .as_deref()
            .ok_or_else(|| {
                ApiFailure::bad_request("'valueInputOption' is required but not specified")
            })?
            .parse()
            .map_err(ApiFailure::bad_request)
    }

    fn render_option(&self) -> Result<ValueRenderOption, ApiFailure> {
        match self.value_render_option.as_deref() {
            Some(raw) => raw.parse().map_err(ApiFailure::bad_request),
            None => Ok(ValueRenderOption::default()),
        }
    }
}

async fn get_values(
    State(state): State<SharedState>,
    Path((spreadsheet_id, range)): Path<(String, String)>,
    Query(query): Query<ValuesQuery>,
) -> Result<Response, ApiFailure> {
    let render = query.render_option()?;
    let values = state.get_values(&spreadsheet_id, &range, render).await?;
    Ok(Json(values).into_response())
}

async fn update_values(
    State(state): State<SharedState>,
    Path((spreadsheet_id, range)): Path<(String, String)>,
    Query(query): Query<ValuesQuery>,
    body: Bytes,
) -> Result<Response, ApiFailure> {
    let input = query.input_option()?;
    let values: ValueRange = parse_body(&body)?;
    let include_values = query.include_values_in_response.unwrap_or(false);
    let response = state
        .update_values(&spreadsheet_id, &range, values, input, include_values)
        .await?;
    Ok(Json(response).into_response())
}

/// `POST .../values/{range}:append` and `POST .../values/{range}:clear`.
async fn modify_values(
    State(state): State<SharedState>,
    Path((spreadsheet_id, target)): Path<(String, String)>,
    Query(query): Query<ValuesQuery>,
    body: Bytes,
) -> Result<Response, ApiFailure> {
    if let Some(range) = target.strip_suffix(":append") {
        let input = query.input_option()?;
        let values: ValueRange = parse_body(&body)?;
        let response = state
            .append_values(&spreadsheet_id, range, values, input)
            .await?;
        return Ok(Json(response).into_response());
    }

    if let Some(range) = target.strip_suffix(":clear") {
        let response = state.clear_values(&spreadsheet_id, range).await?;
        return Ok(Json(response).into_response());
    }

    Err(ApiFailure::not_found())
}

async fn not_found() -> ApiFailure {
    ApiFailure::not_found()
}

fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiFailure::bad_request(format!("Invalid JSON payload received. {e}")))
}
