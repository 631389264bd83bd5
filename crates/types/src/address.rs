//! Native account addresses.
//!
//! Accounts on both lanes are identified by the same 20 bytes: an Ethereum
//! sender recovered from a signature and a Cosmos signer derived from an
//! `eth_secp256k1` public key resolve to the same [`AccAddress`]. The text
//! form used inside messages is bech32 with the chain's account prefix.

use alloy_primitives::{Address, FixedBytes};
use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADDRESS_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid address length: expected {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid bech32 prefix: expected {expected}, got {got}")]
    PrefixMismatch { expected: String, got: String },
    #[error("invalid bech32 prefix {0:?}")]
    InvalidPrefix(String),
    #[error("invalid bech32 address {address:?}: {reason}")]
    Bech32 { address: String, reason: String },
}

/// A 20 byte account address.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Deref,
    derive_more::From,
    derive_more::Into,
)]
#[repr(transparent)]
pub struct AccAddress(pub FixedBytes<ADDRESS_LENGTH>);

impl AccAddress {
    pub const ZERO: Self = Self(FixedBytes::ZERO);

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let bytes: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(FixedBytes(bytes)))
    }

    /// Encodes the address with the given human readable prefix.
    pub fn to_bech32(&self, prefix: &str) -> Result<String, AddressError> {
        let hrp = Hrp::parse(prefix).map_err(|_| AddressError::InvalidPrefix(prefix.to_owned()))?;
        bech32::encode::<Bech32>(hrp, self.0.as_slice()).map_err(|e| AddressError::Bech32 {
            address: self.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decodes a bech32 address, requiring `expected_prefix`.
    pub fn from_bech32(address: &str, expected_prefix: &str) -> Result<Self, AddressError> {
        let (hrp, data) = bech32::decode(address).map_err(|e| AddressError::Bech32 {
            address: address.to_owned(),
            reason: e.to_string(),
        })?;
        if hrp.as_str() != expected_prefix {
            return Err(AddressError::PrefixMismatch {
                expected: expected_prefix.to_owned(),
                got: hrp.as_str().to_owned(),
            });
        }
        Self::from_slice(&data)
    }

    pub fn as_eth_address(&self) -> Address {
        Address::from(self.0)
    }
}

impl From<Address> for AccAddress {
    fn from(value: Address) -> Self {
        Self(value.0)
    }
}

impl From<AccAddress> for Address {
    fn from(value: AccAddress) -> Self {
        Self(value.0)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for AccAddress {
    fn from(value: [u8; ADDRESS_LENGTH]) -> Self {
        Self(FixedBytes(value))
    }
}

impl fmt::Debug for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
