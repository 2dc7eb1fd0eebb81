//! JSON Schema validation for normalized output rows.
//!
//! The row schema (`schemas/normalized-row.json`, Draft 7) is embedded at
//! compile time and compiled once:
//! - `metric`: non-empty string
//! - `date`: `YYYY-MM-DD`
//! - `value`: number
//! - every other column: string or null
//!
//! A date left as raw text by a `pass` action is valid for the interpreter
//! but fails here, which is how such rows get flagged.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::interpreter::NormalizedTable;

const ROW_SCHEMA: &str = include_str!("../../schemas/normalized-row.json");

static ROW_VALIDATOR: Lazy<Result<jsonschema::Validator, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(ROW_SCHEMA).map_err(|e| format!("Invalid embedded schema: {}", e))?;
    jsonschema::draft7::new(&schema).map_err(|e| format!("Invalid embedded schema: {}", e))
});

fn collect_errors(validator: &jsonschema::Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one normalized row.
pub fn validate_row(row: &Value) -> Result<(), Vec<String>> {
    match &*ROW_VALIDATOR {
        Ok(validator) => collect_errors(validator, row),
        Err(e) => Err(vec![e.clone()]),
    }
}

pub fn is_valid_row(row: &Value) -> bool {
    validate_row(row).is_ok()
}

/// A row that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// Zero-based row index in the table
    pub row: usize,
    pub errors: Vec<String>,
}

/// Validate every row of `table`. Returns the failures, empty if all pass.
pub fn validate_table(table: &NormalizedTable) -> Vec<RowError> {
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            validate_row(&Value::Object(row.clone()))
                .err()
                .map(|errors| RowError { row: i, errors })
        })
        .collect()
}
