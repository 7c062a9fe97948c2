//! Uploaded sensor datasets: CSV parsing and numeric cell handling.

use crate::error::{Error, Result};
use serde_json::{Number, Value};
use std::collections::HashSet;

/// A numeric cell as written in the upload.
///
/// Integral cells are kept as integers so they are echoed back as `60`
/// rather than `60.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
}

impl CellValue {
    /// Parse a trimmed CSV field; `None` for empty, non-numeric or non-finite input
    pub fn parse(field: &str) -> Option<Self> {
        if let Ok(v) = field.parse::<i64>() {
            return Some(CellValue::Integer(v));
        }
        field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(CellValue::Float)
    }

    pub fn as_f64(self) -> f64 {
        match self {
            CellValue::Integer(v) => v as f64,
            CellValue::Float(v) => v,
        }
    }

    pub fn to_json(self) -> Value {
        match self {
            CellValue::Integer(v) => Value::Number(v.into()),
            // parse() only admits finite floats
            CellValue::Float(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

/// Parsed upload: header plus raw records, not yet interpreted as numbers
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl Dataset {
    /// Parse CSV bytes with a header row.
    ///
    /// Empty payloads, header-only payloads, ragged rows and invalid UTF-8
    /// are all reported as unparseable input.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(unparseable("empty payload"));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(unparseable)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(unparseable("missing header row"));
        }

        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = headers
            .iter()
            .filter(|h| !seen.insert(h.as_str()))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            return Err(Error::validation(format!(
                "Duplicate column names: {}",
                duplicates.join(", ")
            )));
        }

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(unparseable)?;

        if records.is_empty() {
            return Err(unparseable("no data rows"));
        }

        Ok(Self { headers, records })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Names from `required` that are absent from the header, in `required` order
    pub fn missing_columns<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Interpret every cell as a number.
    ///
    /// Row numbers in errors are 1-based data rows (the header is not counted).
    pub fn cells(&self) -> Result<Vec<Vec<CellValue>>> {
        self.records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                record
                    .iter()
                    .zip(&self.headers)
                    .map(|(field, column)| {
                        CellValue::parse(field).ok_or_else(|| {
                            Error::validation(format!(
                                "Non-numeric value '{}' in column '{}' at row {}",
                                field,
                                column,
                                row + 1
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}

fn unparseable(detail: impl std::fmt::Display) -> Error {
    Error::validation(format!("unparseable input: {}", detail))
}
