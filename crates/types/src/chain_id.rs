//! Cosmos-style chain identifiers that embed an EIP-155 chain id.
//!
//! Format: `{identifier}_{eip155}-{epoch}`, e.g. `everlast_97-1`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainIdError {
    #[error("chain id {0:?} does not match the `identifier_eip155-epoch` format")]
    Malformed(String),
    #[error("chain id {chain_id:?} has an invalid EIP-155 number: {reason}")]
    InvalidEip155 { chain_id: String, reason: String },
    #[error("chain id {chain_id:?} has an invalid epoch: {reason}")]
    InvalidEpoch { chain_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    raw: String,
    eip155: u64,
    epoch: u64,
}

impl ChainId {
    pub(crate) fn new_unchecked(raw: &str, eip155: u64, epoch: u64) -> Self {
        Self {
            raw: raw.to_owned(),
            eip155,
            epoch,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The numeric id Ethereum-formatted transactions must be signed for.
    pub fn eip155(&self) -> u64 {
        self.eip155
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ChainIdError::Malformed(s.to_owned());

        let (identifier, rest) = s.rsplit_once('_').ok_or_else(malformed)?;
        let (eip155, epoch) = rest.split_once('-').ok_or_else(malformed)?;

        let identifier_ok = !identifier.is_empty()
            && identifier
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !identifier_ok {
            return Err(malformed());
        }

        let eip155: u64 = eip155.parse().map_err(|e: std::num::ParseIntError| {
            ChainIdError::InvalidEip155 {
                chain_id: s.to_owned(),
                reason: e.to_string(),
            }
        })?;
        if eip155 == 0 {
            return Err(ChainIdError::InvalidEip155 {
                chain_id: s.to_owned(),
                reason: "must be non-zero".to_owned(),
            });
        }

        let epoch = epoch
            .parse()
            .map_err(|e: std::num::ParseIntError| ChainIdError::InvalidEpoch {
                chain_id: s.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            raw: s.to_owned(),
            eip155,
            epoch,
        })
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
