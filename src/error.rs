// src/error.rs

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Everything that can abort an extraction or pipeline run.
///
/// Soft conditions (degenerate table keys, unmatched join rows) are not
/// errors; they are reported on the returned values and logged.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("archive not found: {}", .path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("archive unreadable: {}: {source}", .path.display())]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to read member {member} from {}: {source}", .path.display())]
    MemberRead {
        path: PathBuf,
        member: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no members of {} match prefix {prefix:?} / suffix {suffix:?}", .path.display())]
    NoMatchingMembers {
        path: PathBuf,
        prefix: String,
        suffix: String,
    },

    #[error("member {member}: {token:?} is not a month token like Mar_23")]
    PeriodParse { member: String, token: String },

    #[error("archive path {path:?} is too short to carry a range token")]
    RangeToken { path: String },

    #[error("member {member} is not valid {encoding}")]
    Decode {
        member: String,
        encoding: &'static str,
    },

    #[error("malformed row in {member} at line {line}: {message}")]
    MalformedRow {
        member: String,
        line: u64,
        message: String,
    },

    #[error("schema mismatch while combining {context}: expected [{expected}], found [{found}]")]
    SchemaMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("period {period} has no {table} table")]
    MissingTable { period: String, table: String },

    #[error("column {column} not found")]
    MissingColumn { column: String },

    #[error("column {column}: {value:?} does not match {format}")]
    DateParse {
        column: String,
        value: String,
        format: String,
    },

    #[error("config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
