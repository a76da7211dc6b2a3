//! Address normalization for both chains.
//!
//! Settlement-chain addresses are 20 bytes and are stored as canonical
//! lowercase `0x` hex; they are the join key of the `tokens` table. Rollup
//! addresses are 32-byte field elements, also stored lowercase.

use alloy_primitives::{Address, B256};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

const L2_ADDRESS_BYTES: usize = 32;

/// Canonical storage key for a settlement-chain address.
pub fn l1_key(address: &Address) -> String {
    format!("{address:?}")
}

/// Parse and normalize a settlement-chain address string.
pub fn normalize_l1_address(value: &str) -> Result<String, AddressError> {
    let address =
        Address::from_str(value.trim()).map_err(|_| AddressError::InvalidHex(value.to_string()))?;
    Ok(l1_key(&address))
}

/// Extract a settlement-chain address from a 32-byte rollup field.
///
/// The address occupies the low 20 bytes; the upper 12 must be zero.
pub fn l1_address_from_field(value: &str) -> Result<Address, AddressError> {
    let word = parse_word(value)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(AddressError::NotAnL1Address(value.to_string()));
    }
    Ok(Address::from_word(word))
}

/// A 32-byte rollup address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct L2Address(B256);

impl FromStr for L2Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word(s).map(L2Address)
    }
}

impl fmt::Display for L2Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

fn parse_word(value: &str) -> Result<B256, AddressError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::InvalidHex(value.to_string()));
    }
    if digits.len() != L2_ADDRESS_BYTES * 2 {
        return Err(AddressError::InvalidLength {
            value: value.to_string(),
            expected: L2_ADDRESS_BYTES,
            actual: digits.len().div_ceil(2),
        });
    }

    B256::from_str(digits).map_err(|_| AddressError::InvalidHex(value.to_string()))
}
