//! A1 notation ranges (`Sheet!A1:B2`, `A:B`, `'My Sheet'!3:4`, `Sheet`).

use once_cell::sync::Lazy;
use regex::Regex;

static CELL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?P<col>[A-Za-z]{0,3})(?P<row>[0-9]{0,7})$").ok());

/// A cell reference; either part may be open (`A` is a column, `3` a row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    /// Zero-based column.
    pub column: Option<u32>,
    /// Zero-based row.
    pub row: Option<u32>,
}

/// A parsed A1 range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: Option<String>,
    pub start: Option<CellRef>,
    pub end: Option<CellRef>,
}

/// Zero-based, inclusive grid bounds; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: Option<u32>,
    pub last_col: Option<u32>,
}

impl A1Range {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty range".to_string());
        }

        let (sheet, cells) = match split_sheet(text)? {
            (Some(sheet), cells) => (Some(sheet), cells),
            // Without '!', a valid cell reference wins over a sheet name.
            (None, cells) if parse_cells(cells).is_ok() => (None, cells),
            (None, name) => (Some(name.to_string()), ""),
        };

        let (start, end) = if cells.is_empty() {
            (None, None)
        } else {
            parse_cells(cells)?
        };

        Ok(Self { sheet, start, end })
    }

    pub fn bounds(&self) -> Bounds {
        match (self.start, self.end) {
            (None, _) => Bounds {
                first_row: 0,
                first_col: 0,
                last_row: None,
                last_col: None,
            },
            (Some(start), None) => Bounds {
                first_row: start.row.unwrap_or(0),
                first_col: start.column.unwrap_or(0),
                last_row: start.row,
                last_col: start.column,
            }
            .single(start),
            (Some(start), Some(end)) => {
                let first_row = start.row.unwrap_or(0);
                let first_col = start.column.unwrap_or(0);
                Bounds {
                    first_row: end.row.map_or(first_row, |r| r.min(first_row)),
                    first_col: end.column.map_or(first_col, |c| c.min(first_col)),
                    last_row: end.row.map(|r| r.max(first_row)),
                    last_col: end.column.map(|c| c.max(first_col)),
                }
            }
        }
    }
}

impl Bounds {
    /// Bounds of a lone reference: a cell, a whole column, or a whole row.
    fn single(self, cell: CellRef) -> Self {
        match (cell.column, cell.row) {
            (Some(_), Some(_)) => self,
            (Some(col), None) => Self {
                first_row: 0,
                first_col: col,
                last_row: None,
                last_col: Some(col),
            },
            (None, Some(row)) => Self {
                first_row: row,
                first_col: 0,
                last_row: Some(row),
                last_col: None,
            },
            (None, None) => self,
        }
    }
}

fn split_sheet(text: &str) -> Result<(Option<String>, &str), String> {
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted sheet name; '' escapes a quote.
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                name.push('\'');
                continue;
            }
            let after = &rest[idx + 1..];
            return match after.strip_prefix('!') {
                Some(cells) => Ok((Some(name), cells)),
                None if after.is_empty() => Ok((Some(name), "")),
                None => Err(format!("unexpected text after sheet name: {after}")),
            };
        }
        return Err("unterminated quoted sheet name".to_string());
    }

    match text.rsplit_once('!') {
        Some((sheet, cells)) if !sheet.is_empty() => Ok((Some(sheet.to_string()), cells)),
        Some(_) => Err("empty sheet name".to_string()),
        None => Ok((None, text)),
    }
}

fn parse_cells(cells: &str) -> Result<(Option<CellRef>, Option<CellRef>), String> {
    match cells.split_once(':') {
        Some((start, end)) => Ok((Some(parse_cell(start)?), Some(parse_cell(end)?))),
        None => Ok((Some(parse_cell(cells)?), None)),
    }
}

fn parse_cell(text: &str) -> Result<CellRef, String> {
    let invalid = || format!("invalid cell reference: {text}");
    let regex = CELL.as_ref().ok_or_else(invalid)?;
    let caps = regex.captures(text).ok_or_else(invalid)?;

    let letters = caps.name("col").map_or("", |m| m.as_str());
    let digits = caps.name("row").map_or("", |m| m.as_str());
    if letters.is_empty() && digits.is_empty() {
        return Err(invalid());
    }

    let column = if letters.is_empty() {
        None
    } else {
        Some(column_index(letters).ok_or_else(invalid)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<u32>() {
            Ok(n) if n > 0 => Some(n - 1),
            _ => return Err(invalid()),
        }
    };

    Ok(CellRef { column, row })
}

/// `A` → 0, `Z` → 25, `AA` → 26.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase()
            .then(|| acc * 26 + (c as u32 - 'A' as u32 + 1))
    })
    .map(|n| n - 1)
}

/// 0 → `A`, 25 → `Z`, 26 → `AA`.
pub fn column_letters(index: u32) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quote a sheet name when it contains anything but letters, digits or `_`.
pub fn quote_sheet(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Render `Sheet!A1:B2` for a concrete, zero-based rectangle.
pub fn format_range(
    sheet: &str,
    first_row: u32,
    first_col: u32,
    last_row: u32,
    last_col: u32,
) -> String {
    let start = format!("{}{}", column_letters(first_col), first_row + 1);
    let end = format!("{}{}", column_letters(last_col), last_row + 1);
    if start == end {
        format!("{}!{}", quote_sheet(sheet), start)
    } else {
        format!("{}!{}:{}", quote_sheet(sheet), start, end)
    }
}
