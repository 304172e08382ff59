//! Row-keyed feature tables and their CSV decoding
//!
//! A [`Table`] is the in-memory form of both a training file and an
//! inference request: one row key per row plus an `n_rows x n_features`
//! matrix of `f64` values.

use crate::error::{PreprocessError, Result};
use crate::schema::FeatureSchema;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ndarray::{Array2, ArrayView2, Axis};
use std::fmt;
use std::io::Read;
use tracing::warn;

/// Datetime layouts tried, in order, when parsing a row key
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Row key of an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    /// The key parsed as a calendar datetime
    Time(NaiveDateTime),
    /// The raw key when it is not a recognizable datetime
    Text(String),
}

impl RowKey {
    /// Parses a key, falling back to the raw text
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        for format in DATETIME_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
                return RowKey::Time(ts);
            }
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return RowKey::Time(ts.naive_utc());
        }
        if let Some(ts) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return RowKey::Time(ts);
        }
        RowKey::Text(raw.to_string())
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            RowKey::Time(ts) => Some(*ts),
            RowKey::Text(_) => None,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Time(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}

/// A single time-series record
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: RowKey,
    pub values: Vec<f64>,
}

/// Row-keyed matrix of feature values
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index: Vec<RowKey>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Table {
    pub fn new(index: Vec<RowKey>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if index.len() != values.nrows() || columns.len() != values.ncols() {
            return Err(PreprocessError::MalformedInput(format!(
                "table shape mismatch: {} keys and {} columns for a {}x{} matrix",
                index.len(),
                columns.len(),
                values.nrows(),
                values.ncols()
            )));
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    /// Builds a table from observations that all carry `columns.len()` values
    pub fn from_observations(columns: Vec<String>, observations: Vec<Observation>) -> Result<Self> {
        let width = columns.len();
        let mut index = Vec::with_capacity(observations.len());
        let mut flat = Vec::with_capacity(observations.len() * width);

        for (row, obs) in observations.into_iter().enumerate() {
            if obs.values.len() != width {
                return Err(PreprocessError::MalformedInput(format!(
                    "row {}: expected {} value(s), found {}",
                    row + 1,
                    width,
                    obs.values.len()
                )));
            }
            index.push(obs.timestamp);
            flat.extend(obs.values);
        }

        let values = Array2::from_shape_vec((index.len(), width), flat)
            .map_err(|e| PreprocessError::MalformedInput(e.to_string()))?;
        Self::new(index, columns, values)
    }

    /// Stacks tables row-wise; all tables must have the same column count
    pub fn concat(tables: Vec<Table>) -> Result<Table> {
        let mut tables = tables.into_iter();
        let Some(first) = tables.next() else {
            return Err(PreprocessError::MalformedInput(
                "no tables to concatenate".to_string(),
            ));
        };

        let Table {
            mut index,
            columns,
            values,
        } = first;
        let mut blocks = vec![values];

        for table in tables {
            if table.n_columns() != columns.len() {
                return Err(PreprocessError::MalformedInput(format!(
                    "cannot stack a table with {} column(s) onto one with {}",
                    table.n_columns(),
                    columns.len()
                )));
            }
            index.extend(table.index);
            blocks.push(table.values);
        }

        let views: Vec<ArrayView2<'_, f64>> = blocks.iter().map(|b| b.view()).collect();
        let values = ndarray::concatenate(Axis(0), &views)
            .map_err(|e| PreprocessError::MalformedInput(e.to_string()))?;
        Table::new(index, columns, values)
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn index(&self) -> &[RowKey] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.index
            .iter()
            .zip(self.values.rows())
            .map(|(key, row)| Observation {
                timestamp: key.clone(),
                values: row.to_vec(),
            })
    }
}

/// Decodes delimited text into a table shaped by `schema`
///
/// `source` only labels error messages. With `has_headers`, a header whose
/// names differ from the schema is tolerated; the field count is not.
pub fn read_csv<R: Read>(
    reader: R,
    schema: &FeatureSchema,
    has_headers: bool,
    source: &str,
) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    if has_headers {
        let header = reader.headers()?.clone();
        if header.len() != schema.width() {
            return Err(PreprocessError::MalformedInput(format!(
                "{}: header has {} column(s), expected {}",
                source,
                header.len(),
                schema.width()
            )));
        }
        if !schema.matches_header(header.iter()) {
            warn!(
                source = %source,
                header = ?header.iter().collect::<Vec<_>>(),
                expected_index = %schema.index_column,
                expected_features = ?schema.feature_columns,
                "Header names differ from the feature schema, using schema names"
            );
        }
    }

    let mut observations = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(row as u64 + 1);

        if record.len() != schema.width() {
            return Err(PreprocessError::MalformedInput(format!(
                "{} line {}: expected {} field(s), found {}",
                source,
                line,
                schema.width(),
                record.len()
            )));
        }

        let timestamp = RowKey::parse(&record[0]);
        let values = record
            .iter()
            .skip(1)
            .map(|field| match field.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                Ok(_) => Err(PreprocessError::MalformedInput(format!(
                    "{} line {}: {:?} is not a finite number",
                    source, line, field
                ))),
                Err(_) => Err(PreprocessError::MalformedInput(format!(
                    "{} line {}: {:?} is not a number",
                    source, line, field
                ))),
            })
            .collect::<Result<Vec<f64>>>()?;

        observations.push(Observation { timestamp, values });
    }

    Table::from_observations(schema.feature_columns.clone(), observations)
}
