//! Media types understood by the inference adapter

use crate::error::{PreprocessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TEXT_CSV: &str = "text/csv";
pub const APPLICATION_JSON: &str = "application/json";
pub const ANY: &str = "*/*";

/// Payload encodings with a codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "text/csv")]
    Csv,
    #[serde(rename = "application/json")]
    Json,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Csv => TEXT_CSV,
            MediaType::Json => APPLICATION_JSON,
        }
    }

    /// Parses a single declared type, ignoring case and parameters
    pub fn parse(raw: &str) -> Result<Self> {
        match essence(raw).as_str() {
            TEXT_CSV => Ok(MediaType::Csv),
            APPLICATION_JSON => Ok(MediaType::Json),
            _ => Err(PreprocessError::UnsupportedMediaType(raw.trim().to_string())),
        }
    }

    /// Resolves an accept value to one response encoding
    ///
    /// A missing, empty or wildcard value selects `default`; in a list the
    /// first supported entry wins.
    pub fn from_accept(raw: Option<&str>, default: MediaType) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(default);
        };

        for candidate in raw.split(',') {
            if essence(candidate) == ANY {
                return Ok(default);
            }
            if let Ok(media_type) = MediaType::parse(candidate) {
                return Ok(media_type);
            }
        }

        Err(PreprocessError::UnsupportedMediaType(raw.to_string()))
    }
}

impl FromStr for MediaType {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self> {
        MediaType::parse(s)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn essence(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
