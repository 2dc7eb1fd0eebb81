//! Rule document interpreter.
//!
//! Evaluates a [`ParserDefinition`] against a [`Grid`] and produces
//! normalized records. Evaluation is deterministic: the same document and
//! grid always give the same records in the same order.
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌───────────┐    ┌──────────────┐
//! │ resolve  │───▶│ extract  │───▶│   area    │───▶│ post-process │
//! │ sources  │    │ params   │    │ records   │    │ skip / alias │
//! └──────────┘    └──────────┘    └───────────┘    └──────────────┘
//! ```

pub mod area;
pub mod dates;
pub mod extract;
pub mod postprocess;
pub mod resolve;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExtractionResult;
use crate::grid::Grid;
use crate::rules::{ParserDefinition, TitleIdKind};

pub use area::parse_number;
pub use resolve::{Axis, RawValue};

/// One normalized observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub metric: String,
    /// `YYYY-MM-01`, or the raw text when passed through.
    pub date: String,
    pub title: Option<String>,
    pub title_ids: BTreeMap<TitleIdKind, String>,
    /// Dimension name and value, in document order.
    pub dimensions: Vec<(String, String)>,
    pub organization: Option<String>,
    pub value: f64,
}

/// Evaluate every area, concatenate the records and post-process them.
pub fn execute(definition: &ParserDefinition, grid: &Grid) -> ExtractionResult<Vec<Record>> {
    let mut records = Vec::new();
    for (index, area) in definition.areas.iter().enumerate() {
        records.extend(area::evaluate_area(index, area, grid)?);
    }
    postprocess::post_process(definition, records)
}

/// [`execute`], rendered as a table.
pub fn execute_table(definition: &ParserDefinition, grid: &Grid) -> ExtractionResult<NormalizedTable> {
    execute(definition, grid).map(|records| NormalizedTable::from_records(&records))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub field: String,
    pub header: String,
}

impl Column {
    fn new(field: &str, header: &str) -> Self {
        Self {
            field: field.to_string(),
            header: header.to_string(),
        }
    }
}

/// Output table: ordered columns plus one JSON object per record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Map<String, Value>>,
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

impl NormalizedTable {
    /// Columns: organization, title, title id kinds, dimensions, metric,
    /// date, value. Optional columns only appear when some record has them.
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns = Vec::new();
        if records.iter().any(|r| r.organization.is_some()) {
            columns.push(Column::new("organization", "Organization"));
        }
        if records.iter().any(|r| r.title.is_some()) {
            columns.push(Column::new("title", "Title"));
        }
        let kinds: BTreeSet<TitleIdKind> = records
            .iter()
            .flat_map(|r| r.title_ids.keys().copied())
            .collect();
        for kind in &kinds {
            columns.push(Column::new(kind.as_str(), kind.as_str()));
        }
        let mut dimension_names: Vec<&str> = Vec::new();
        for record in records {
            for (name, _) in &record.dimensions {
                if !dimension_names.contains(&name.as_str()) {
                    dimension_names.push(name);
                }
            }
        }
        for name in &dimension_names {
            columns.push(Column::new(name, name));
        }
        columns.push(Column::new("metric", "Metric"));
        columns.push(Column::new("date", "Date"));
        columns.push(Column::new("value", "Value"));

        let rows = records
            .iter()
            .map(|record| {
                let mut row = Map::new();
                if let Some(organization) = &record.organization {
                    row.insert("organization".into(), Value::from(organization.as_str()));
                }
                if let Some(title) = &record.title {
                    row.insert("title".into(), Value::from(title.as_str()));
                }
                for (kind, id) in &record.title_ids {
                    row.insert(kind.as_str().into(), Value::from(id.as_str()));
                }
                for (name, value) in &record.dimensions {
                    row.insert(name.clone(), Value::from(value.as_str()));
                }
                row.insert("metric".into(), Value::from(record.metric.as_str()));
                row.insert("date".into(), Value::from(record.date.as_str()));
                row.insert("value".into(), number(record.value));
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV with a header row. Missing cells are empty.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.header.as_str()))?;
        for row in &self.rows {
            writer.write_record(self.columns.iter().map(|c| match row.get(&c.field) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
