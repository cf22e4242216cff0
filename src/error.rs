//! Error types for marcmap operations.
//!
//! This module provides the [`MapError`] type for all schema and record
//! loading failures and the [`Result`] convenience type.
//!
//! Decoding itself is total: unknown tags and unmatched fixed-field layouts
//! degrade to raw passthrough rather than producing errors. Only malformed
//! input documents (schema, overlay, record) are fatal, and only at load
//! time.

use thiserror::Error;

/// Error type for all marcmap operations.
#[derive(Error, Debug)]
pub enum MapError {
    /// Error indicating an invalid or malformed field-map schema.
    #[error("Invalid field map: {0}")]
    InvalidFieldMap(String),

    /// Error indicating an invalid or malformed overlay document.
    #[error("Invalid overlay: {0}")]
    InvalidOverlay(String),

    /// Error indicating an invalid or malformed record document.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Error indicating an invalid field structure within a record.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// JSON parse or structure error from the underlying document.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MapError`].
pub type Result<T> = std::result::Result<T, MapError>;
