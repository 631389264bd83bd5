use alloy_primitives::B256;
use prost::Message as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

use crate::proto::{AuthInfo, Fee, MsgEthereumTx, TxBody, TxRaw};

pub mod ethereum;
pub use ethereum::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxDecodeError {
    #[error("malformed tx envelope: {0}")]
    Envelope(String),
    #[error("malformed tx body: {0}")]
    Body(String),
    #[error("malformed auth info: {0}")]
    AuthInfo(String),
    #[error("malformed ethereum message: {0}")]
    EthereumMessage(String),
    #[error("malformed ethereum transaction: {0}")]
    EthereumTx(String),
    #[error("unsupported ethereum transaction type {0:#04x}")]
    UnsupportedEthTxType(u8),
    #[error("{0} trailing bytes after ethereum transaction")]
    TrailingBytes(usize),
}

/// A transaction envelope with its body and auth info decoded.
///
/// The original byte encodings are kept: sign bytes are built from them and
/// re-encoding a decoded body is not guaranteed to be byte-identical.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<Vec<u8>>,
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub encoded_len: usize,
    pub hash: B256,
}

impl DecodedTx {
    pub fn decode(bytes: &[u8]) -> Result<Self, TxDecodeError> {
        let raw = TxRaw::decode(bytes).map_err(|e| TxDecodeError::Envelope(e.to_string()))?;
        Self::from_raw_with_bytes(raw, bytes)
    }

    pub fn from_raw(raw: TxRaw) -> Result<Self, TxDecodeError> {
        let bytes = raw.encode_to_vec();
        Self::from_raw_with_bytes(raw, &bytes)
    }

    fn from_raw_with_bytes(raw: TxRaw, bytes: &[u8]) -> Result<Self, TxDecodeError> {
        let body = TxBody::decode(raw.body_bytes.as_slice())
            .map_err(|e| TxDecodeError::Body(e.to_string()))?;
        let auth_info = AuthInfo::decode(raw.auth_info_bytes.as_slice())
            .map_err(|e| TxDecodeError::AuthInfo(e.to_string()))?;
        Ok(Self {
            body,
            auth_info,
            signatures: raw.signatures,
            body_bytes: raw.body_bytes,
            auth_info_bytes: raw.auth_info_bytes,
            encoded_len: bytes.len(),
            hash: B256::from_slice(&Sha256::digest(bytes)),
        })
    }

    pub fn to_raw(&self) -> TxRaw {
        TxRaw {
            body_bytes: self.body_bytes.clone(),
            auth_info_bytes: self.auth_info_bytes.clone(),
            signatures: self.signatures.clone(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_raw().encode_to_vec()
    }

    pub fn fee(&self) -> Option<&Fee> {
        self.auth_info.fee.as_ref()
    }

    pub fn gas_limit(&self) -> u64 {
        self.fee().map_or(0, |fee| fee.gas_limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    CosmosNative,
    EthereumFormatted,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CosmosNative => f.write_str("cosmos"),
            Self::EthereumFormatted => f.write_str("ethereum"),
        }
    }
}

/// An Ethereum-formatted transaction: the envelope plus its single decoded
/// `MsgEthereumTx`.
#[derive(Debug, Clone, PartialEq)]
pub struct EthereumTx {
    pub envelope: DecodedTx,
    /// Sender declared in the message, bech32. Unverified.
    pub declared_from: String,
    pub signed: SignedEthTx,
}

impl EthereumTx {
    pub fn from_envelope(envelope: DecodedTx, msg: &MsgEthereumTx) -> Result<Self, TxDecodeError> {
        let signed = SignedEthTx::decode(&msg.marshalled_tx)?;
        Ok(Self {
            envelope,
            declared_from: msg.from.clone(),
            signed,
        })
    }
}

/// A transaction tagged with its lane.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    CosmosNative(DecodedTx),
    EthereumFormatted(EthereumTx),
}

impl Transaction {
    pub fn lane(&self) -> Lane {
        match self {
            Self::CosmosNative(_) => Lane::CosmosNative,
            Self::EthereumFormatted(_) => Lane::EthereumFormatted,
        }
    }

    pub fn envelope(&self) -> &DecodedTx {
        match self {
            Self::CosmosNative(tx) => tx,
            Self::EthereumFormatted(tx) => &tx.envelope,
        }
    }

    pub fn hash(&self) -> B256 {
        self.envelope().hash
    }

    /// Gas limit declared by the transaction. Ethereum-formatted transactions
    /// declare it inside the embedded transaction.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Self::CosmosNative(tx) => tx.gas_limit(),
            Self::EthereumFormatted(tx) => tx.signed.gas_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Any, Coin, ModeInfo, SignerInfo};
    use pretty_assertions::assert_eq;

    fn sample_raw() -> TxRaw {
        let body = TxBody {
            messages: vec![Any {
                type_url: crate::proto::MSG_SEND_TYPE_URL.to_owned(),
                value: vec![1, 2, 3],
            }],
            memo: "memo".to_owned(),
            ..Default::default()
        };
        let auth_info = AuthInfo {
            signer_infos: vec![SignerInfo {
                public_key: None,
                mode_info: Some(ModeInfo::direct()),
                sequence: 7,
            }],
            fee: Some(Fee {
                amount: vec![Coin {
                    denom: "aevl".to_owned(),
                    amount: "100".to_owned(),
                }],
                gas_limit: 200_000,
                ..Default::default()
            }),
        };
        TxRaw {
            body_bytes: body.encode_to_vec(),
            auth_info_bytes: auth_info.encode_to_vec(),
            signatures: vec![vec![9; 64]],
        }
    }

    #[test]
    fn decode_keeps_original_bytes() {
        let raw = sample_raw();
        let bytes = raw.encode_to_vec();
        let decoded = DecodedTx::decode(&bytes).unwrap();

        assert_eq!(decoded.encode(), bytes);
        assert_eq!(decoded.encoded_len, bytes.len());
        assert_eq!(decoded.gas_limit(), 200_000);
        assert_eq!(decoded.auth_info.signer_infos[0].sequence, 7);
        assert_eq!(decoded.body.memo, "memo");
        assert_eq!(decoded, DecodedTx::from_raw(raw).unwrap());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            DecodedTx::decode(&[0xff, 0xff, 0xff]),
            Err(TxDecodeError::Envelope(_))
        ));

        let raw = TxRaw {
            body_bytes: vec![0x0a, 0x05, 0x01],
            ..Default::default()
        };
        assert!(matches!(
            DecodedTx::from_raw(raw),
            Err(TxDecodeError::Body(_))
        ));
    }

    #[test]
    fn missing_fee_means_zero_gas() {
        let raw = TxRaw {
            body_bytes: TxBody::default().encode_to_vec(),
            ..Default::default()
        };
        assert_eq!(DecodedTx::from_raw(raw).unwrap().gas_limit(), 0);
    }
}
