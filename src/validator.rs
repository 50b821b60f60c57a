//! Schema validation for uploaded submission files.
//!
//! Tabular uploads (CSV/JSON) are parsed into an ordered column list plus row
//! records and checked against the challenge's expected columns. Model artifacts
//! and scripts pass through untouched.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    challenges::Challenge,
    classifier::{self, FileCategory, SUPPORTED_EXTENSIONS, TabularFormat},
};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

fn megabytes(bytes: &usize) -> f64 {
    *bytes as f64 / BYTES_PER_MB
}

/// Renders the supported extensions as a bracketed, quoted list.
fn extension_list() -> String {
    let quoted: Vec<String> = SUPPORTED_EXTENSIONS.iter().map(|ext| format!("'{ext}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// ValidationError
///
/// Every way an upload can be rejected. `code()` is the stable identifier
/// returned to clients; the `Display` text is the human-readable message that is
/// also persisted on the INVALID submission record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("No file uploaded.")]
    MissingFile,
    #[error("File type '.{extension}' is not supported. Use one of: {}.", extension_list())]
    UnsupportedFileType { extension: String },
    #[error("File is {:.2} MB, maximum allowed is {} MB.", megabytes(.size_bytes), megabytes(.limit_bytes))]
    FileTooLarge { size_bytes: usize, limit_bytes: usize },
    #[error("{0}")]
    InvalidCsv(String),
    #[error("{0}")]
    InvalidJson(String),
    #[error("Expected columns {expected:?}, got {got:?}.")]
    SchemaMismatch { expected: Vec<String>, got: Vec<String> },
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
    #[error("File contains a header but no data rows.")]
    NoRows,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFile => "MISSING_FILE",
            Self::UnsupportedFileType { .. } => "UNSUPPORTED_FILE_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::InvalidCsv(_) => "INVALID_CSV",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::NoRows => "NO_ROWS",
        }
    }
}

/// Parsed contents of a tabular upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
}

/// ValidatedFile
///
/// Successful validation outcome. `table` is `None` for model artifacts and
/// scripts; `content` is the raw upload, handed back for storage.
#[derive(Debug)]
pub struct ValidatedFile {
    pub category: FileCategory,
    pub table: Option<ParsedTable>,
    pub content: Vec<u8>,
}

impl ValidatedFile {
    pub fn row_count(&self) -> Option<usize> {
        self.table.as_ref().map(|t| t.rows.len())
    }

    pub fn columns(&self) -> Option<Vec<String>> {
        self.table.as_ref().map(|t| t.columns.clone())
    }
}

/// validate
///
/// Runs the full check sequence: extension, size, parse (including the row
/// check), schema. An empty filename counts as no file at all.
pub fn validate(
    filename: &str,
    content: Vec<u8>,
    challenge: &Challenge,
    max_bytes: usize,
) -> Result<ValidatedFile, ValidationError> {
    let size_bytes = content.len();
    validate_sized(filename, content, size_bytes, challenge, max_bytes)
}

/// validate_sized
///
/// Same as `validate`, for uploads whose buffered `content` may have been cut
/// short. `size_bytes` is the full size as received and drives the size check.
pub fn validate_sized(
    filename: &str,
    content: Vec<u8>,
    size_bytes: usize,
    challenge: &Challenge,
    max_bytes: usize,
) -> Result<ValidatedFile, ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError::MissingFile);
    }

    let category = classifier::classify(filename).ok_or_else(|| ValidationError::UnsupportedFileType {
        extension: classifier::extension(filename),
    })?;

    if size_bytes > max_bytes || content.len() > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size_bytes: size_bytes.max(content.len()),
            limit_bytes: max_bytes,
        });
    }

    let format = match category {
        FileCategory::Tabular(format) => format,
        FileCategory::Model | FileCategory::Script => {
            return Ok(ValidatedFile {
                category,
                table: None,
                content,
            });
        }
    };

    let table = match format {
        TabularFormat::Csv => parse_csv(&content)?,
        TabularFormat::Json => parse_json(&content)?,
    };

    check_schema(&table.columns, &challenge.expected_columns, challenge.order_matters)?;

    Ok(ValidatedFile {
        category,
        table: Some(table),
        content,
    })
}

/// parse_csv
///
/// First record is the header. Rows become JSON objects keyed by header name;
/// short rows simply omit trailing keys. A header with no data rows is NO_ROWS.
pub fn parse_csv(content: &[u8]) -> Result<ParsedTable, ValidationError> {
    let text = std::str::from_utf8(content)
        .map_err(|_| ValidationError::InvalidCsv("Could not decode CSV as UTF-8.".to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ValidationError::InvalidCsv(format!("CSV parsing failed: {e}")))?
        .clone();

    if headers.is_empty() {
        return Err(ValidationError::InvalidCsv("CSV file is missing a header row.".to_string()));
    }

    let columns: Vec<String> = headers.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ValidationError::InvalidCsv(format!("CSV parsing failed: {e}")))?;
        let row: Map<String, Value> = columns
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.clone(), Value::String(value.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }

    if rows.is_empty() {
        return Err(ValidationError::NoRows);
    }

    Ok(ParsedTable { columns, rows })
}

/// parse_json
///
/// Expects a non-empty array whose first element is an object; its keys, in
/// document order, are the columns.
pub fn parse_json(content: &[u8]) -> Result<ParsedTable, ValidationError> {
    let data: Value = serde_json::from_slice(content)
        .map_err(|e| ValidationError::InvalidJson(format!("JSON parsing failed: {e}")))?;

    let rows = match data {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(ValidationError::InvalidJson(
                r#"Expected a JSON array of objects, e.g. [{"id": 1, "prediction": 0.5}, ...]"#.to_string(),
            ));
        }
    };

    let columns = match rows.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        _ => {
            return Err(ValidationError::InvalidJson(
                r#"Each JSON entry must be an object with named fields, e.g. {"id": 1, "prediction": 0.5}."#
                    .to_string(),
            ));
        }
    };

    Ok(ParsedTable { columns, rows })
}

/// check_schema
///
/// Exact ordered match when `order_matters`, subset check otherwise.
pub fn check_schema(columns: &[String], expected: &[String], order_matters: bool) -> Result<(), ValidationError> {
    if order_matters {
        if columns != expected {
            return Err(ValidationError::SchemaMismatch {
                expected: expected.to_vec(),
                got: columns.to_vec(),
            });
        }
        return Ok(());
    }

    let missing: Vec<String> = expected.iter().filter(|c| !columns.contains(c)).cloned().collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing));
    }
    Ok(())
}
