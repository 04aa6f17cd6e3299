//! Flat key/value option loading.
//!
//! Options files use the properties format: one `key=value`, `key: value` or
//! `key value` entry per logical line, `#`/`!` comment lines, and a trailing
//! backslash to continue a value on the next line.

use crate::error::{HarnessError, HarnessResult};
use crate::logging::log_debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Read-only mapping of option keys to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl OptionSet {
    /// Load and parse an options file.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::OptionsUnreadable`] naming the file and the
    /// underlying I/O cause if it cannot be read.
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::options_unreadable(path, e))?;

        let mut options = Self::parse(&text);
        options.source = Some(path.to_path_buf());

        log_debug!(
            path = %path.display(),
            option_count = options.len(),
            "Loaded options file"
        );

        Ok(options)
    }

    /// Parse options from text.
    pub fn parse(text: &str) -> Self {
        let values = logical_lines(text)
            .into_iter()
            .map(|line| split_entry(&line))
            .collect();

        Self {
            values,
            source: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// File the options were loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Human-readable origin used in error messages.
    pub fn origin(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline options>".to_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source: None,
        }
    }
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let trimmed = raw.trim_start();

        let mut current = match pending.take() {
            Some(mut buf) => {
                buf.push_str(trimmed);
                buf
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        if ends_with_continuation(&current) {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }

    if let Some(rest) = pending {
        if !rest.is_empty() {
            lines.push(rest);
        }
    }

    lines
}

/// A line continues when it ends in an odd number of backslashes.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let chars: Vec<char> = line.chars().collect();
    let mut idx = 0;
    let mut key_end = chars.len();

    while idx < chars.len() {
        match chars[idx] {
            '\\' => idx += 2,
            '=' | ':' => {
                key_end = idx;
                break;
            }
            c if c.is_whitespace() => {
                key_end = idx;
                break;
            }
            _ => idx += 1,
        }
    }

    let key_end = key_end.min(chars.len());
    let mut value_start = key_end;
    while value_start < chars.len() && chars[value_start].is_whitespace() {
        value_start += 1;
    }
    if value_start < chars.len() && matches!(chars[value_start], '=' | ':') {
        value_start += 1;
        while value_start < chars.len() && chars[value_start].is_whitespace() {
            value_start += 1;
        }
    }

    let key: String = chars[..key_end].iter().collect();
    let value: String = chars[value_start.min(chars.len())..].iter().collect();

    (unescape(&key), unescape(&value))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
