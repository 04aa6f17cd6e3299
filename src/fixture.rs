//! Lazily created, memoized spreadsheet fixture.
//!
//! The fixture moves one way through [`FixtureState`]: `Absent` →
//! `SpreadsheetOnly` → `SpreadsheetWithData`. Each step issues its request
//! once; later calls return the stored representation. No operation moves
//! the state back.

use crate::config::HarnessConfig;
use crate::connector::sheets::HEADER_PREFIX;
use crate::connector::{Context, Headers};
use crate::error::{HarnessError, HarnessResult};
use crate::logging::{log_debug, log_info};
use crate::model::{Spreadsheet, UpdateValuesResponse, ValueInputOption, ValueRange};
use crate::server::a1::quote_sheet;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

/// Endpoint creating the spreadsheet from the body.
pub const CREATE_URI: &str = "google-sheets://spreadsheets/create?inBody=content";

/// Endpoint writing the body as values.
pub const UPDATE_URI: &str = "google-sheets://data/update?inBody=values";

/// Cells of the seeded block, row by row.
pub const TEST_VALUES: [[&str; 2]; 2] = [["a1", "b1"], ["a2", "b2"]];

/// Cells of the seeded block, relative to the test sheet.
pub const TEST_CELLS: &str = "A1:B2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    Absent,
    SpreadsheetOnly,
    SpreadsheetWithData,
}

#[derive(Debug, Default)]
struct Memo {
    spreadsheet: Option<Spreadsheet>,
    test_data: Option<ValueRange>,
}

/// Test spreadsheet shared by the tests of one test class.
#[derive(Debug)]
pub struct SpreadsheetFixture {
    title_prefix: String,
    sheet_name: String,
    memo: Mutex<Memo>,
}

impl SpreadsheetFixture {
    pub fn new(title_prefix: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            title_prefix: title_prefix.into(),
            sheet_name: sheet_name.into(),
            memo: Mutex::new(Memo::default()),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.title_prefix.clone(), config.test_sheet.clone())
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Range the seeded block occupies, e.g. `TestData!A1:B2`.
    pub fn test_range(&self) -> String {
        format!("{}!{}", quote_sheet(&self.sheet_name), TEST_CELLS)
    }

    pub async fn state(&self) -> FixtureState {
        let memo = self.memo.lock().await;
        match (&memo.spreadsheet, &memo.test_data) {
            (None, _) => FixtureState::Absent,
            (Some(_), None) => FixtureState::SpreadsheetOnly,
            (Some(_), Some(_)) => FixtureState::SpreadsheetWithData,
        }
    }

    /// The seeded block, once it has been written.
    pub async fn test_data(&self) -> Option<ValueRange> {
        self.memo.lock().await.test_data.clone()
    }

    /// The test spreadsheet, created on first use.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the create request; nothing is retried.
    pub async fn spreadsheet(&self, context: &Context) -> HarnessResult<Spreadsheet> {
        let mut memo = self.memo.lock().await;
        self.ensure_spreadsheet(&mut memo, context).await
    }

    /// The test spreadsheet with the 2×2 test block written to it.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the create or update request.
    pub async fn spreadsheet_with_test_data(
        &self,
        context: &Context,
    ) -> HarnessResult<Spreadsheet> {
        let mut memo = self.memo.lock().await;
        let spreadsheet = self.ensure_spreadsheet(&mut memo, context).await?;
        if memo.test_data.is_some() {
            return Ok(spreadsheet);
        }

        let spreadsheet_id = spreadsheet.spreadsheet_id.clone().ok_or_else(|| {
            HarnessError::response_parsing("Created spreadsheet carries no spreadsheetId")
        })?;
        let range = self.test_range();
        let values = ValueRange::from_rows(TEST_VALUES);

        let mut headers = Headers::new();
        headers.insert(
            format!("{HEADER_PREFIX}spreadsheetId"),
            Value::String(spreadsheet_id.clone()),
        );
        headers.insert(format!("{HEADER_PREFIX}range"), Value::String(range.clone()));
        headers.insert(
            format!("{HEADER_PREFIX}valueInputOption"),
            Value::String(ValueInputOption::UserEntered.to_string()),
        );

        let reply = context
            .request_body_and_headers(UPDATE_URI, to_body(&values)?, headers)
            .await?;
        let update: UpdateValuesResponse = from_reply(reply)?;

        log_debug!(
            spreadsheet_id = %spreadsheet_id,
            updated_range = update.updated_range.as_deref().unwrap_or_default(),
            updated_cells = update.updated_cells.unwrap_or_default(),
            "Seeded test data"
        );

        memo.test_data = Some(ValueRange {
            range: update.updated_range.or(Some(range)),
            major_dimension: Some("ROWS".to_string()),
            values: values.values,
        });
        Ok(spreadsheet)
    }

    /// Use `spreadsheet` as the fixture from now on.
    ///
    /// Only the memoized spreadsheet is substituted. Nothing is sent and the
    /// state does not move back, so a seeded fixture stays seeded.
    pub async fn set_spreadsheet(&self, spreadsheet: Spreadsheet) {
        let mut memo = self.memo.lock().await;
        log_debug!(
            spreadsheet_id = spreadsheet.spreadsheet_id.as_deref().unwrap_or_default(),
            seeded = memo.test_data.is_some(),
            "Fixture spreadsheet replaced"
        );
        memo.spreadsheet = Some(spreadsheet);
    }

    async fn ensure_spreadsheet(
        &self,
        memo: &mut Memo,
        context: &Context,
    ) -> HarnessResult<Spreadsheet> {
        if let Some(spreadsheet) = &memo.spreadsheet {
            return Ok(spreadsheet.clone());
        }

        let title = format!("{}{}", self.title_prefix, fastrand::u32(..) & 0x7fff_ffff);
        let request = Spreadsheet::with_title(title, self.sheet_name.clone());
        let reply = context.request_body(CREATE_URI, to_body(&request)?).await?;
        let created: Spreadsheet = from_reply(reply)?;

        log_info!(
            spreadsheet_id = created.spreadsheet_id.as_deref().unwrap_or_default(),
            title = created.title().unwrap_or_default(),
            "Created test spreadsheet"
        );

        memo.spreadsheet = Some(created.clone());
        Ok(created)
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> HarnessResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| HarnessError::response_parsing(format!("Unserializable request: {e}")))
}

fn from_reply<T: DeserializeOwned>(reply: Value) -> HarnessResult<T> {
    serde_json::from_value(reply)
        .map_err(|e| HarnessError::response_parsing(format!("Unexpected reply: {e}")))
}
