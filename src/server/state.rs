//! In-memory state of the mock server: emulated spreadsheets, the request
//! journal, and configured expectations.

use super::a1::{self, A1Range, Bounds};
use crate::config::Credentials;
use crate::model::{
    AppendValuesResponse, ClearValuesResponse, GridProperties, Sheet, SheetProperties,
    Spreadsheet, SpreadsheetProperties, UpdateValuesResponse, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_ROW_COUNT: u32 = 1000;
const DEFAULT_COLUMN_COUNT: u32 = 26;

pub(crate) type SharedState = Arc<ServerState>;

/// A request as received by the mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl RecordedRequest {
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        let mut url = Url::parse("http://localhost/").ok()?;
        url.set_query(Some(query));
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A canned response returned instead of the emulated one.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    method: Method,
    path: String,
    status: StatusCode,
    body: Value,
    remaining: Option<usize>,
}

impl Expectation {
    /// Match requests with `method` on exactly `path`; responds `200 {}` until configured.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            status: StatusCode::OK,
            body: Value::Object(Default::default()),
            remaining: None,
        }
    }

    pub fn respond_with(mut self, status: StatusCode, body: Value) -> Self {
        self.status = status;
        self.body = body;
        self
    }

    /// Only answer the next `n` matching requests.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    pub(crate) fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.path == path
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// A failure answered with the API's error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Requested entity was not found.")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

#[derive(Debug, Default)]
struct Grid {
    rows: Vec<Vec<Value>>,
}

impl Grid {
    fn cell(&self, row: u32, col: u32) -> &Value {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .unwrap_or(&Value::Null)
    }

    fn set(&mut self, row: u32, col: u32, value: Value) {
        let (row, col) = (row as usize, col as usize);
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, Value::Null);
        }
        cells[col] = value;
    }

    fn height(&self) -> u32 {
        self.rows.len() as u32
    }

    fn width(&self) -> u32 {
        self.rows.iter().map(Vec::len).max().unwrap_or(0) as u32
    }

    fn row_has_data(&self, row: u32, first_col: u32, last_col: Option<u32>) -> bool {
        self.rows.get(row as usize).is_some_and(|cells| {
            cells
                .iter()
                .enumerate()
                .skip(first_col as usize)
                .take_while(|(idx, _)| last_col.map_or(true, |last| *idx as u32 <= last))
                .any(|(_, v)| !v.is_null())
        })
    }
}

#[derive(Debug)]
struct Workbook {
    spreadsheet: Spreadsheet,
    grids: HashMap<String, Grid>,
}

impl Workbook {
    fn first_sheet(&self) -> Option<&str> {
        self.spreadsheet.sheet_titles().first().copied()
    }

    fn grid_size(&self, sheet: &str) -> (u32, u32) {
        self.spreadsheet
            .sheets
            .iter()
            .flatten()
            .filter_map(|s| s.properties.as_ref())
            .find(|p| p.title.as_deref() == Some(sheet))
            .and_then(|p| p.grid_properties.as_ref())
            .map(|g| {
                (
                    g.row_count.unwrap_or(DEFAULT_ROW_COUNT),
                    g.column_count.unwrap_or(DEFAULT_COLUMN_COUNT),
                )
            })
            .unwrap_or((DEFAULT_ROW_COUNT, DEFAULT_COLUMN_COUNT))
    }

    /// Sheet name and bounds addressed by `range`.
    fn resolve(&self, range: &str) -> ApiResult<(String, Bounds)> {
        let unparsable = || ApiFailure::bad_request(format!("Unable to parse range: {range}"));

        if self.grids.contains_key(range) {
            return Ok((
                range.to_string(),
                A1Range {
                    sheet: None,
                    start: None,
                    end: None,
                }
                .bounds(),
            ));
        }

        let parsed = A1Range::parse(range).map_err(|_| unparsable())?;
        let sheet = match parsed.sheet.clone() {
            Some(sheet) => sheet,
            None => self.first_sheet().ok_or_else(unparsable)?.to_string(),
        };
        if !self.grids.contains_key(&sheet) {
            return Err(unparsable());
        }
        Ok((sheet, parsed.bounds()))
    }

    fn write(
        &mut self,
        sheet: &str,
        bounds: Bounds,
        first_row: u32,
        values: &[Vec<Value>],
        input: ValueInputOption,
        requested: &str,
    ) -> ApiResult<UpdateValuesResponse> {
        let height = values.len() as u32;
        let width = values.iter().map(Vec::len).max().unwrap_or(0) as u32;

        if height > 0 && width > 0 {
            let last_row = first_row + height - 1;
            let last_col = bounds.first_col + width - 1;
            if bounds.last_row.is_some_and(|max| last_row > max)
                || bounds.last_col.is_some_and(|max| last_col > max)
            {
                return Err(ApiFailure::bad_request(format!(
                    "Requested writing within range [{requested}], but tried writing to [{}]",
                    a1::format_range(sheet, first_row, bounds.first_col, last_row, last_col)
                )));
            }
        }

        let grid = self.grids.entry(sheet.to_string()).or_default();
        let mut written = Vec::with_capacity(values.len());
        for (r, row) in values.iter().enumerate() {
            let mut written_row = Vec::with_capacity(row.len());
            for (c, raw) in row.iter().enumerate() {
                let value = interpret(raw, input);
                grid.set(first_row + r as u32, bounds.first_col + c as u32, value.clone());
                written_row.push(value);
            }
            written.push(written_row);
        }

        let updated_range = if height > 0 && width > 0 {
            a1::format_range(
                sheet,
                first_row,
                bounds.first_col,
                first_row + height - 1,
                bounds.first_col + width - 1,
            )
        } else {
            a1::format_range(sheet, first_row, bounds.first_col, first_row, bounds.first_col)
        };
        let cells = values.iter().map(Vec::len).sum::<usize>() as u32;

        Ok(UpdateValuesResponse {
            spreadsheet_id: self.spreadsheet.spreadsheet_id.clone(),
            updated_range: Some(updated_range.clone()),
            updated_rows: Some(height),
            updated_columns: Some(width),
            updated_cells: Some(cells),
            updated_data: Some(ValueRange {
                range: Some(updated_range),
                major_dimension: Some("ROWS".to_string()),
                values: Some(written),
            }),
        })
    }
}

/// Shared state behind the mock server's router.
#[derive(Debug)]
pub(crate) struct ServerState {
    pub credentials: Credentials,
    journal: Mutex<Vec<RecordedRequest>>,
    expectations: Mutex<Vec<Expectation>>,
    workbooks: Mutex<HashMap<String, Workbook>>,
}

impl ServerState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            journal: Mutex::new(Vec::new()),
            expectations: Mutex::new(Vec::new()),
            workbooks: Mutex::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Journal and expectations
    // ------------------------------------------------------------------

    pub async fn record(&self, request: RecordedRequest) {
        self.journal.lock().await.push(request);
    }

    pub async fn journal(&self) -> Vec<RecordedRequest> {
        self.journal.lock().await.clone()
    }

    /// Clear the journal, returning how many entries were dropped.
    pub async fn clear_journal(&self) -> usize {
        let mut journal = self.journal.lock().await;
        let dropped = journal.len();
        journal.clear();
        dropped
    }

    pub async fn add_expectation(&self, expectation: Expectation) {
        self.expectations.lock().await.push(expectation);
    }

    pub async fn clear_expectations(&self) -> usize {
        let mut expectations = self.expectations.lock().await;
        let dropped = expectations.len();
        expectations.clear();
        dropped
    }

    /// Consume the first expectation matching the request, if any.
    pub async fn take_expectation(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(StatusCode, Value)> {
        let mut expectations = self.expectations.lock().await;
        let idx = expectations.iter().position(|e| e.matches(method, path))?;
        let expectation = &mut expectations[idx];
        let answer = (expectation.status, expectation.body.clone());

        let exhausted = match expectation.remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            expectations.remove(idx);
        }
        Some(answer)
    }

    // ------------------------------------------------------------------
    // Emulated API
    // ------------------------------------------------------------------

    pub async fn create_spreadsheet(&self, request: Spreadsheet) -> ApiResult<Spreadsheet> {
        let spreadsheet_id = uuid::Uuid::new_v4().simple().to_string();

        let requested = request.properties.unwrap_or_default();
        let properties = SpreadsheetProperties {
            title: requested
                .title
                .or_else(|| Some("Untitled spreadsheet".to_string())),
            locale: requested.locale.or_else(|| Some("en_US".to_string())),
            time_zone: requested.time_zone.or_else(|| Some("Etc/GMT".to_string())),
        };

        let mut requested_sheets = request.sheets.unwrap_or_default();
        if requested_sheets.is_empty() {
            requested_sheets.push(Sheet::default());
        }

        let mut sheets = Vec::with_capacity(requested_sheets.len());
        let mut grids = HashMap::new();
        for (index, sheet) in requested_sheets.into_iter().enumerate() {
            let requested = sheet.properties.unwrap_or_default();
            let title = requested
                .title
                .unwrap_or_else(|| format!("Sheet{}", index + 1));
            if grids.contains_key(&title) {
                return Err(ApiFailure::bad_request(format!(
                    "Invalid requests: A sheet with the name \"{title}\" already exists."
                )));
            }
            grids.insert(title.clone(), Grid::default());

            let sheet_id = requested.sheet_id.unwrap_or_else(|| {
                if index == 0 {
                    0
                } else {
                    fastrand::i64(1..i64::from(i32::MAX))
                }
            });
            sheets.push(Sheet {
                properties: Some(SheetProperties {
                    sheet_id: Some(sheet_id),
                    title: Some(title),
                    index: Some(index as i64),
                    sheet_type: Some("GRID".to_string()),
                    grid_properties: Some(requested.grid_properties.unwrap_or(GridProperties {
                        row_count: Some(DEFAULT_ROW_COUNT),
                        column_count: Some(DEFAULT_COLUMN_COUNT),
                    })),
                }),
            });
        }

        let spreadsheet = Spreadsheet {
            spreadsheet_url: Some(format!(
                "https://docs.google.com/spreadsheets/d/{spreadsheet_id}/edit"
            )),
            spreadsheet_id: Some(spreadsheet_id.clone()),
            properties: Some(properties),
            sheets: Some(sheets),
        };

        self.workbooks.lock().await.insert(
            spreadsheet_id,
            Workbook {
                spreadsheet: spreadsheet.clone(),
                grids,
            },
        );
        Ok(spreadsheet)
    }

    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> ApiResult<Spreadsheet> {
        self.workbooks
            .lock()
            .await
            .get(spreadsheet_id)
            .map(|w| w.spreadsheet.clone())
            .ok_or_else(ApiFailure::not_found)
    }

    pub async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
    ) -> ApiResult<ValueRange> {
        let workbooks = self.workbooks.lock().await;
        let workbook = workbooks.get(spreadsheet_id).ok_or_else(ApiFailure::not_found)?;
        let (sheet, bounds) = workbook.resolve(range)?;
        let grid = workbook.grids.get(&sheet).ok_or_else(ApiFailure::not_found)?;
        let (row_count, col_count) = workbook.grid_size(&sheet);

        let last_row = bounds
            .last_row
            .unwrap_or_else(|| row_count.max(grid.height()).saturating_sub(1));
        let last_col = bounds
            .last_col
            .unwrap_or_else(|| col_count.max(grid.width()).saturating_sub(1));

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for row in bounds.first_row..=last_row.min(grid.height().saturating_sub(1)) {
            if grid.height() == 0 {
                break;
            }
            let mut cells: Vec<Value> = (bounds.first_col..=last_col.min(grid.width()))
                .map(|col| render_value(grid.cell(row, col), render))
                .collect();
            while cells.last().is_some_and(Value::is_null) {
                cells.pop();
            }
            for cell in cells.iter_mut().filter(|c| c.is_null()) {
                *cell = Value::String(String::new());
            }
            rows.push(cells);
        }
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }

        Ok(ValueRange {
            range: Some(a1::format_range(
                &sheet,
                bounds.first_row,
                bounds.first_col,
                last_row,
                last_col,
            )),
            major_dimension: Some("ROWS".to_string()),
            values: (!rows.is_empty()).then_some(rows),
        })
    }

    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        body: ValueRange,
        input: ValueInputOption,
        include_values: bool,
    ) -> ApiResult<UpdateValuesResponse> {
        let mut workbooks = self.workbooks.lock().await;
        let workbook = workbooks
            .get_mut(spreadsheet_id)
            .ok_or_else(ApiFailure::not_found)?;
        let (sheet, bounds) = workbook.resolve(range)?;
        let bounds = anchor(bounds);

        let values = body.values.unwrap_or_default();
        let mut response =
            workbook.write(&sheet, bounds, bounds.first_row, &values, input, range)?;
        if !include_values {
            response.updated_data = None;
        }
        Ok(response)
    }

    pub async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        body: ValueRange,
        input: ValueInputOption,
    ) -> ApiResult<AppendValuesResponse> {
        let mut workbooks = self.workbooks.lock().await;
        let workbook = workbooks
            .get_mut(spreadsheet_id)
            .ok_or_else(ApiFailure::not_found)?;
        let (sheet, bounds) = workbook.resolve(range)?;
        let bounds = anchor(bounds);

        let grid = workbook.grids.get(&sheet).ok_or_else(ApiFailure::not_found)?;
        let table_end = (bounds.first_row..grid.height())
            .take_while(|row| grid.row_has_data(*row, bounds.first_col, bounds.last_col))
            .last();
        let table_width = grid.width().max(bounds.first_col + 1) - 1;
        let table_range = table_end.map(|last| {
            a1::format_range(
                &sheet,
                bounds.first_row,
                bounds.first_col,
                last,
                bounds.last_col.unwrap_or(table_width),
            )
        });
        let next_row = table_end.map_or(bounds.first_row, |last| last + 1);

        let values = body.values.unwrap_or_default();
        let open_rows = Bounds {
            last_row: None,
            ..bounds
        };
        let mut updates = workbook.write(&sheet, open_rows, next_row, &values, input, range)?;
        updates.updated_data = None;

        Ok(AppendValuesResponse {
            spreadsheet_id: Some(spreadsheet_id.to_string()),
            table_range,
            updates: Some(updates),
        })
    }

    pub async fn clear_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> ApiResult<ClearValuesResponse> {
        let mut workbooks = self.workbooks.lock().await;
        let workbook = workbooks
            .get_mut(spreadsheet_id)
            .ok_or_else(ApiFailure::not_found)?;
        let (sheet, bounds) = workbook.resolve(range)?;
        let (row_count, col_count) = workbook.grid_size(&sheet);

        let grid = workbook.grids.entry(sheet.clone()).or_default();
        let last_row = bounds.last_row.unwrap_or(row_count.saturating_sub(1));
        let last_col = bounds.last_col.unwrap_or(col_count.saturating_sub(1));
        for row in bounds.first_row..=last_row.min(grid.height().saturating_sub(1)) {
            if let Some(cells) = grid.rows.get_mut(row as usize) {
                for col in bounds.first_col..=last_col {
                    if let Some(cell) = cells.get_mut(col as usize) {
                        *cell = Value::Null;
                    }
                }
            }
        }

        Ok(ClearValuesResponse {
            spreadsheet_id: Some(spreadsheet_id.to_string()),
            cleared_range: Some(a1::format_range(
                &sheet,
                bounds.first_row,
                bounds.first_col,
                last_row,
                last_col,
            )),
        })
    }
}

/// A single-cell range only anchors a write; the block extends from it.
fn anchor(bounds: Bounds) -> Bounds {
    if bounds.last_row == Some(bounds.first_row) && bounds.last_col == Some(bounds.first_col) {
        Bounds {
            last_row: None,
            last_col: None,
            ..bounds
        }
    } else {
        bounds
    }
}

/// Apply the input option to a submitted value.
pub(crate) fn interpret(value: &Value, input: ValueInputOption) -> Value {
    match (input, value) {
        (ValueInputOption::UserEntered, Value::String(text)) => parse_user_entered(text),
        _ => value.clone(),
    }
}

fn parse_user_entered(text: &str) -> Value {
    if let Some(literal) = text.strip_prefix('\'') {
        return Value::String(literal.to_string());
    }

    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return Value::Bool(false);
    }

    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && !trimmed.is_empty() => {
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                Value::from(n as i64)
            } else {
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(text.to_string()))
            }
        }
        _ => Value::String(text.to_string()),
    }
}

fn render_value(value: &Value, render: ValueRenderOption) -> Value {
    match (render, value) {
        (_, Value::Null) => Value::Null,
        (ValueRenderOption::UnformattedValue, other) => other.clone(),
        (ValueRenderOption::FormattedValue, Value::String(s)) => Value::String(s.clone()),
        (ValueRenderOption::FormattedValue, Value::Bool(b)) => {
            Value::String(if *b { "TRUE" } else { "FALSE" }.to_string())
        }
        (ValueRenderOption::FormattedValue, other) => Value::String(other.to_string()),
    }
}
