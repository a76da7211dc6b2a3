//! Typed errors for malformed chain input.

use thiserror::Error;

/// Raised when an address supplied by a chain or by configuration fails
/// normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address '{0}' is not valid hex")]
    InvalidHex(String),

    #[error("address '{value}' has {actual} bytes, expected {expected}")]
    InvalidLength {
        value: String,
        expected: usize,
        actual: usize,
    },

    #[error("word '{0}' does not hold a 20-byte settlement-chain address")]
    NotAnL1Address(String),
}
