//! S1AP Error Types

use thiserror::Error;

/// Errors that can occur while encoding or decoding S1AP PDUs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum S1apError {
    /// Buffer ended before a complete field could be read
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    /// PDU choice byte is not one of the three S1AP-PDU alternatives
    #[error("Invalid S1AP-PDU choice: {0:#04x}")]
    InvalidPduChoice(u8),

    /// Missing mandatory IE
    #[error("Missing mandatory IE: {ie_name} (id={ie_id})")]
    MissingMandatoryIe { ie_name: &'static str, ie_id: u16 },

    /// Invalid IE value
    #[error("Invalid IE value for {ie_name}: {reason}")]
    InvalidIeValue {
        ie_name: &'static str,
        reason: String,
    },

    /// Bytes left over after the last IE
    #[error("Trailing data after PDU: {0} bytes")]
    TrailingData(usize),

    /// Encoding error
    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// S1AP result type
pub type S1apResult<T> = Result<T, S1apError>;
