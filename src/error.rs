use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizerError {
    #[error("Invalid period '{0}': no 4-digit year or month could be established")]
    InvalidPeriod(String),

    #[error("Invalid month {month} in '{input}': must be between 1 and 12")]
    InvalidMonth { input: String, month: u32 },

    #[error("Source file not found: {0}")]
    MissingSourceFile(String),

    #[error("{file}: missing required columns {missing:?} (found {found:?})")]
    MissingColumns {
        file: String,
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Table validation failed: {}", .0.join("; "))]
    InvalidTables(Vec<String>),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NormalizerError>;

/// Why a single row was left out. Row-level problems are counted, never
/// raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidPeriod,
    MissingCompany,
    MissingAccount,
    MissingPeriod,
    InvalidAmount,
    InvalidYear,
    InvalidMonth,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::InvalidPeriod => "invalid period",
            SkipReason::MissingCompany => "missing company",
            SkipReason::MissingAccount => "missing account",
            SkipReason::MissingPeriod => "missing period",
            SkipReason::InvalidAmount => "invalid amount",
            SkipReason::InvalidYear => "invalid year",
            SkipReason::InvalidMonth => "invalid month",
        };
        f.write_str(text)
    }
}
