//! Per-object error classification.

use crate::decoder::DecodeError;
use crate::error::ObjectError;

/// Message fragments produced by files that are not valid Parquet.
const MALFORMED_SIGNATURES: &[&str] = &[
    "not a parquet file",
    "invalid parquet",
    "parquet: invalid",
    "magic number",
    "failed to open parquet",
];

/// What a per-object failure means for the table's sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Deleted between listing and fetch; counts as done
    Vanished,
    /// Not decodable; skipped
    Malformed,
    /// Aborts the table and the run
    Fatal,
}

impl ErrorClass {
    /// Only decode failures can be malformed, and only the decoder's own
    /// text is inspected, never the object key.
    pub fn of(error: &ObjectError) -> Self {
        match error {
            ObjectError::Fetch(e) if e.is_not_found() => ErrorClass::Vanished,
            ObjectError::Decode(DecodeError::Open { .. }) => ErrorClass::Malformed,
            ObjectError::Decode(DecodeError::Read { source, .. }) => {
                Self::from_message(&source.to_string())
            }
            _ => ErrorClass::Fatal,
        }
    }

    /// Classify by error text alone. Never returns `Vanished`.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if MALFORMED_SIGNATURES.iter().any(|s| lower.contains(s)) {
            ErrorClass::Malformed
        } else {
            ErrorClass::Fatal
        }
    }
}
