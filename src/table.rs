// 📄 Raw Tables - CSV in, string cells out
//
// Source files disagree on column names, so nothing is deserialized into
// structs at this layer. The schema module decides which columns mean what.

use crate::error::LoadError;
use csv::{ByteRecord, StringRecord};
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Tokens that read as a missing value
const NULL_TOKENS: [&str; 5] = ["NA", "NaN", "nan", "null", "None"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Table label used in errors and quality issues ("claims", "encounters", ...)
    pub name: String,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
    /// Rows with at least one cell that was not valid UTF-8
    lossy_rows: usize,
}

impl RawTable {
    /// Load a table from a CSV file
    ///
    /// A file that does not exist is a `MissingTable` error, never an empty table.
    pub fn from_path(name: &str, path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::MissingTable {
                table: name.to_string(),
                path: path.to_path_buf(),
            });
        }

        let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
            table: name.to_string(),
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_reader(name, file)
    }

    /// Load a table from any CSV reader (files, in-memory fixtures)
    ///
    /// Invalid UTF-8 inside a cell is replaced with U+FFFD and the row is
    /// kept; see `lossy_rows`.
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, LoadError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .byte_headers()
            .map_err(|source| LoadError::Csv {
                table: name.to_string(),
                source,
            })?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(LoadError::EmptyHeader {
                table: name.to_string(),
            });
        }

        let mut rows = Vec::new();
        let mut lossy_rows = 0;
        for result in rdr.byte_records() {
            let record = result.map_err(|source| LoadError::Csv {
                table: name.to_string(),
                source,
            })?;
            let (row, lossy) = decode_record(&record);
            if lossy {
                lossy_rows += 1;
            }
            rows.push(row);
        }

        if lossy_rows > 0 {
            warn!(table = name, rows = lossy_rows, "invalid UTF-8 replaced in cells");
        }

        Ok(RawTable {
            name: name.to_string(),
            headers,
            rows,
            lossy_rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lossy_rows(&self) -> usize {
        self.lossy_rows
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Cell value, or None when the column is absent, the row is short,
    /// or the cell holds a null token
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let value = self.rows.get(row)?.get(column)?.trim();
        if is_null(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Rename a column in place. Returns false when `from` is absent.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }
}

/// Decode every field, flagging the record when any field needed replacement
fn decode_record(record: &ByteRecord) -> (StringRecord, bool) {
    let mut lossy = false;
    let mut row = StringRecord::with_capacity(record.as_slice().len(), record.len());
    for field in record.iter() {
        let value = String::from_utf8_lossy(field);
        if let Cow::Owned(_) = value {
            lossy = true;
        }
        row.push_field(&value);
    }
    (row, lossy)
}

pub fn is_null(value: &str) -> bool {
    value.is_empty() || NULL_TOKENS.contains(&value)
}

// ============================================================================
// TESTS
// ============================================================================
