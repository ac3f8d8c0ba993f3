use std::path::PathBuf;

use thiserror::Error;

/// Failures that deserve a precise message instead of a bare context chain.
///
/// Everything else (I/O, Parquet decoding, malformed CSV cells) travels as
/// `anyhow::Error` with `.context(..)` attached at the call site.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("dataset store is missing {}", .0.display())]
    MissingStoreFile(PathBuf),

    #[error(
        "unsupported schema: expected parameter column '{expected}' at position {position}, found {found:?}"
    )]
    UnsupportedSchema {
        expected: &'static str,
        position: usize,
        found: Vec<String>,
    },

    #[error("example index {index} is out of range for a store with {rows} rows")]
    IndexOutOfRange { index: usize, rows: usize },

    #[error("{} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{} contains no prediction rows", .0.display())]
    EmptyTable(PathBuf),

    #[error("cannot borrow snr: donor table has {donor} rows, recipient has {recipient}")]
    RowCountMismatch { donor: usize, recipient: usize },

    #[error("cannot borrow snr: y_true differs at row {row} ({donor} vs {recipient})")]
    RowIdentityMismatch {
        row: usize,
        donor: f64,
        recipient: f64,
    },
}
