//! Static description of the tabular input shared by training and serving

use serde::{Deserialize, Serialize};

/// Default name of the row-key column
pub const DEFAULT_INDEX_COLUMN: &str = "timestamp";

/// Default feature columns, all parsed as `f64`
pub const DEFAULT_FEATURE_COLUMNS: &[&str] = &["value"];

/// Column layout of every input table
///
/// The first column is always the row key (text, parsed as a datetime when
/// possible); the remaining columns are numeric features in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub index_column: String,
    pub feature_columns: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::new(
            DEFAULT_INDEX_COLUMN,
            DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()),
        )
    }
}

impl FeatureSchema {
    pub fn new(
        index_column: impl Into<String>,
        feature_columns: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            index_column: index_column.into(),
            feature_columns: feature_columns.into_iter().collect(),
        }
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.feature_columns.len()
    }

    /// Total number of delimited fields per row, row key included
    pub fn width(&self) -> usize {
        self.feature_columns.len() + 1
    }

    /// Checks a header row against the declared column names
    pub fn matches_header<'a>(&self, header: impl IntoIterator<Item = &'a str>) -> bool {
        let expected = std::iter::once(self.index_column.as_str())
            .chain(self.feature_columns.iter().map(String::as_str));
        header.into_iter().map(str::trim).eq(expected)
    }
}
