//! Error types for the disclosure pipeline.

use std::path::PathBuf;

use crate::shape::ColumnRole;

/// Failures a single program's pipeline branch can hit.
///
/// An undefined allocation fraction is not an error; see
/// [`crate::aggregate::AllocationFraction::Undefined`].
#[derive(Debug, thiserror::Error)]
pub enum FedTrackError {
    #[error("cannot read workbook {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("sheet `{sheet}` not found in {path}")]
    SheetNotFound { path: PathBuf, sheet: String },

    #[error("sheet `{sheet}` row {row} has {found} cells, header row has {expected}")]
    RowShapeMismatch {
        sheet: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("sheet `{sheet}` has no usable column for role {role}")]
    MissingRole { sheet: String, role: ColumnRole },

    #[error("sheet `{sheet}` column {column} is headed `{found}`, expected `{expected}`")]
    HeaderMismatch {
        sheet: String,
        column: usize,
        expected: String,
        found: String,
    },

    #[error("sheet `{sheet}` row {row} column {column} holds `{value}`, not a non-negative amount")]
    InvalidAmount {
        sheet: String,
        row: usize,
        column: usize,
        value: String,
    },

    #[error("sheet `{sheet}` amounts add up past the decimal range")]
    AmountOverflow { sheet: String },

    #[error("program `{0}` is registered twice")]
    DuplicateProgram(String),

    #[error("upstream page structure changed: {0}")]
    UpstreamStructureChanged(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FedTrackResult<T> = Result<T, FedTrackError>;
