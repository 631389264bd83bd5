//! Signed Ethereum transactions embedded in `MsgEthereumTx`.

use alloy_consensus::{
    Signed, Transaction as _, TxEip1559, TxEip2930, TxEnvelope, TxLegacy,
};
use alloy_eips::{
    eip2718::{Decodable2718 as _, Encodable2718 as _},
    eip2930::AccessList,
};
use alloy_primitives::{uint, Address, Bytes, Signature, B256, U256};

use super::TxDecodeError;

/// Half of the secp256k1 group order. Signatures with a larger `s` are
/// malleable and rejected (EIP-2).
pub const SECP256K1N_HALF: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// The transaction types admitted on the Ethereum lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedEthTx {
    Legacy(Signed<TxLegacy>),
    Eip2930(Signed<TxEip2930>),
    Eip1559(Signed<TxEip1559>),
}

macro_rules! with_tx {
    ($self:ident, $signed:ident => $body:expr) => {
        match $self {
            Self::Legacy($signed) => $body,
            Self::Eip2930($signed) => $body,
            Self::Eip1559($signed) => $body,
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EthTxType {
    Legacy,
    Eip2930,
    Eip1559,
}

impl SignedEthTx {
    /// Decodes an EIP-2718 envelope (or a bare legacy RLP list). All bytes
    /// must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxDecodeError> {
        let mut buf = bytes;
        let envelope = TxEnvelope::decode_2718(&mut buf)
            .map_err(|e| TxDecodeError::EthereumTx(e.to_string()))?;
        if !buf.is_empty() {
            return Err(TxDecodeError::TrailingBytes(buf.len()));
        }
        match envelope {
            TxEnvelope::Legacy(tx) => Ok(Self::Legacy(tx)),
            TxEnvelope::Eip2930(tx) => Ok(Self::Eip2930(tx)),
            TxEnvelope::Eip1559(tx) => Ok(Self::Eip1559(tx)),
            other => Err(TxDecodeError::UnsupportedEthTxType(other.tx_type() as u8)),
        }
    }

    pub fn encoded_2718(&self) -> Vec<u8> {
        TxEnvelope::from(self.clone()).encoded_2718()
    }

    pub fn tx_type(&self) -> EthTxType {
        match self {
            Self::Legacy(_) => EthTxType::Legacy,
            Self::Eip2930(_) => EthTxType::Eip2930,
            Self::Eip1559(_) => EthTxType::Eip1559,
        }
    }

    pub fn tx_hash(&self) -> B256 {
        with_tx!(self, signed => *signed.hash())
    }

    pub fn signature(&self) -> &Signature {
        with_tx!(self, signed => signed.signature())
    }

    /// Hash the sender signed over.
    pub fn signature_hash(&self) -> B256 {
        with_tx!(self, signed => signed.signature_hash())
    }

    /// Chain id the transaction is bound to; `None` for pre-EIP-155 legacy
    /// transactions.
    pub fn chain_id(&self) -> Option<u64> {
        with_tx!(self, signed => signed.tx().chain_id())
    }

    pub fn is_protected(&self) -> bool {
        self.chain_id().is_some()
    }

    pub fn is_low_s(&self) -> bool {
        self.signature().s() <= SECP256K1N_HALF
    }

    pub fn recover_signer(&self) -> Result<Address, alloy_primitives::SignatureError> {
        self.signature()
            .recover_address_from_prehash(&self.signature_hash())
    }

    pub fn recover_public_key(
        &self,
    ) -> Result<k256::ecdsa::VerifyingKey, alloy_primitives::SignatureError> {
        self.signature()
            .recover_from_prehash(&self.signature_hash())
    }

    pub fn nonce(&self) -> u64 {
        with_tx!(self, signed => signed.tx().nonce())
    }

    pub fn gas_limit(&self) -> u64 {
        with_tx!(self, signed => signed.tx().gas_limit())
    }

    /// Gas price for legacy and 2930 transactions, max fee per gas for 1559.
    pub fn fee_cap(&self) -> u128 {
        with_tx!(self, signed => signed.tx().max_fee_per_gas())
    }

    /// Max priority fee per gas; only dynamic-fee transactions declare one.
    pub fn priority_fee_cap(&self) -> Option<u128> {
        match self {
            Self::Eip1559(signed) => Some(signed.tx().max_priority_fee_per_gas),
            Self::Legacy(_) | Self::Eip2930(_) => None,
        }
    }

    /// `gas_limit × fee_cap`, `None` on overflow.
    pub fn declared_fee(&self) -> Option<U256> {
        U256::from(self.gas_limit()).checked_mul(U256::from(self.fee_cap()))
    }

    pub fn value(&self) -> U256 {
        with_tx!(self, signed => signed.tx().value())
    }

    pub fn is_create(&self) -> bool {
        with_tx!(self, signed => signed.tx().is_create())
    }

    pub fn input(&self) -> &Bytes {
        with_tx!(self, signed => signed.tx().input())
    }

    pub fn access_list(&self) -> Option<&AccessList> {
        match self {
            Self::Legacy(_) => None,
            Self::Eip2930(signed) => Some(&signed.tx().access_list),
            Self::Eip1559(signed) => Some(&signed.tx().access_list),
        }
    }
}

impl From<SignedEthTx> for TxEnvelope {
    fn from(value: SignedEthTx) -> Self {
        match value {
            SignedEthTx::Legacy(tx) => Self::Legacy(tx),
            SignedEthTx::Eip2930(tx) => Self::Eip2930(tx),
            SignedEthTx::Eip1559(tx) => Self::Eip1559(tx),
        }
    }
}
