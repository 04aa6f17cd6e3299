//! Wire types of the mocked spreadsheet API.
//!
//! Field names follow the API's camelCase JSON; absent fields are omitted
//! on serialization so request bodies match what real clients send.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<SpreadsheetProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Vec<Sheet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_url: Option<String>,
}

impl Spreadsheet {
    /// A new, not yet created spreadsheet with one sheet.
    pub fn with_title(title: impl Into<String>, sheet_title: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: None,
            properties: Some(SpreadsheetProperties {
                title: Some(title.into()),
                ..Default::default()
            }),
            sheets: Some(vec![Sheet {
                properties: Some(SheetProperties {
                    title: Some(sheet_title.into()),
                    ..Default::default()
                }),
            }]),
            spreadsheet_url: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.properties.as_ref()?.title.as_deref()
    }

    /// Titles of all sheets, in order.
    pub fn sheet_titles(&self) -> Vec<&str> {
        self.sheets
            .iter()
            .flatten()
            .filter_map(|s| s.properties.as_ref()?.title.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<SheetProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_properties: Option<GridProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u32>,
}

/// A rectangular block of cell values and the range it covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Vec<Value>>>,
}

impl ValueRange {
    /// Rows of string cells.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            range: None,
            major_dimension: None,
            values: Some(
                rows.into_iter()
                    .map(|row| row.into_iter().map(|cell| Value::String(cell.into())).collect())
                    .collect(),
            ),
        }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        self.values.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_columns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_cells: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_data: Option<ValueRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendValuesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearValuesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_range: Option<String>,
}

/// How input values are interpreted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    /// Values are stored as-is.
    Raw,
    /// Values are parsed as if typed into the UI (numbers, booleans, ...).
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::UserEntered => "USER_ENTERED",
        }
    }
}

impl fmt::Display for ValueInputOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueInputOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RAW" => Ok(Self::Raw),
            "USER_ENTERED" => Ok(Self::UserEntered),
            other => Err(format!("Invalid valueInputOption: {other}")),
        }
    }
}

/// How values are rendered when read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueRenderOption {
    #[default]
    FormattedValue,
    UnformattedValue,
}

impl ValueRenderOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormattedValue => "FORMATTED_VALUE",
            Self::UnformattedValue => "UNFORMATTED_VALUE",
        }
    }
}

impl fmt::Display for ValueRenderOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueRenderOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FORMATTED_VALUE" => Ok(Self::FormattedValue),
            "UNFORMATTED_VALUE" => Ok(Self::UnformattedValue),
            other => Err(format!("Invalid valueRenderOption: {other}")),
        }
    }
}

/// Error body returned by the API for non-success responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
    pub status: String,
}
