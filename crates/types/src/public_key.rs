//! Public keys a Cosmos-lane signer may declare.
//!
//! Three key types are accepted: `eth_secp256k1`, `ed25519` and a legacy
//! amino threshold multisig whose members are single keys. A multisig member
//! that is itself a multisig is rejected while decoding, so verification cost
//! is bounded by the member count.

use alloy_primitives::{keccak256, Address};
use k256::ecdsa::signature::hazmat::PrehashVerifier as _;
use prost::Message as _;
use sha2::{Digest as _, Sha256};

use crate::{
    proto::{
        Any, CompactBitArray, LegacyAminoPubKey, MultiSignature, PubKey,
        ED25519_PUBKEY_TYPE_URL, ETH_SECP256K1_PUBKEY_TYPE_URL, MULTISIG_PUBKEY_TYPE_URL,
    },
    AccAddress,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublicKeyError {
    #[error("unsupported public key type {0:?}")]
    UnsupportedType(String),
    #[error("malformed {type_url} public key: {reason}")]
    Malformed { type_url: String, reason: String },
    #[error("multisig member is itself a multisig")]
    NestedMultisig,
    #[error("multisig threshold {threshold} is invalid for {members} members")]
    InvalidThreshold { threshold: u32, members: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature: {0}")]
    Malformed(String),
    #[error("signature s value is not in the lower half of the curve order")]
    HighS,
    #[error("signature does not verify")]
    Mismatch,
    #[error("multisig bitarray has {bits} bits for {members} members")]
    BitArrayLength { bits: usize, members: usize },
    #[error("multisig carries {signatures} signatures for {signers} flagged signers")]
    SignatureCount { signatures: usize, signers: usize },
    #[error("multisig has {valid} valid signatures, threshold is {threshold}")]
    BelowThreshold { valid: usize, threshold: u32 },
    #[error("single-key signature used for a multisig key or vice versa")]
    ModeMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    EthSecp256k1(k256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
    Multisig {
        threshold: u32,
        members: Vec<PublicKey>,
    },
}

impl PublicKey {
    pub fn from_any(any: &Any) -> Result<Self, PublicKeyError> {
        Self::decode_at(any, false)
    }

    fn decode_at(any: &Any, nested: bool) -> Result<Self, PublicKeyError> {
        let malformed = |reason: String| PublicKeyError::Malformed {
            type_url: any.type_url.clone(),
            reason,
        };
        match any.type_url.as_str() {
            ETH_SECP256K1_PUBKEY_TYPE_URL => {
                let key = PubKey::decode(any.value.as_slice()).map_err(|e| malformed(e.to_string()))?;
                if key.key.len() != 33 {
                    return Err(malformed(format!(
                        "expected 33 byte compressed key, got {}",
                        key.key.len()
                    )));
                }
                let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&key.key)
                    .map_err(|e| malformed(e.to_string()))?;
                Ok(Self::EthSecp256k1(key))
            }
            ED25519_PUBKEY_TYPE_URL => {
                let key = PubKey::decode(any.value.as_slice()).map_err(|e| malformed(e.to_string()))?;
                let bytes: [u8; 32] = key.key.as_slice().try_into().map_err(|_| {
                    malformed(format!("expected 32 byte key, got {}", key.key.len()))
                })?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| malformed(e.to_string()))?;
                Ok(Self::Ed25519(key))
            }
            MULTISIG_PUBKEY_TYPE_URL => {
                if nested {
                    return Err(PublicKeyError::NestedMultisig);
                }
                let multisig = LegacyAminoPubKey::decode(any.value.as_slice())
                    .map_err(|e| malformed(e.to_string()))?;
                let members = multisig
                    .public_keys
                    .iter()
                    .map(|member| Self::decode_at(member, true))
                    .collect::<Result<Vec<_>, _>>()?;
                if multisig.threshold == 0 || multisig.threshold as usize > members.len() {
                    return Err(PublicKeyError::InvalidThreshold {
                        threshold: multisig.threshold,
                        members: members.len(),
                    });
                }
                Ok(Self::Multisig {
                    threshold: multisig.threshold,
                    members,
                })
            }
            other => Err(PublicKeyError::UnsupportedType(other.to_owned())),
        }
    }

    pub fn to_any(&self) -> Any {
        match self {
            Self::EthSecp256k1(key) => Any::pack(
                ETH_SECP256K1_PUBKEY_TYPE_URL,
                &PubKey {
                    key: key.to_encoded_point(true).as_bytes().to_vec(),
                },
            ),
            Self::Ed25519(key) => Any::pack(
                ED25519_PUBKEY_TYPE_URL,
                &PubKey {
                    key: key.to_bytes().to_vec(),
                },
            ),
            Self::Multisig { threshold, members } => Any::pack(
                MULTISIG_PUBKEY_TYPE_URL,
                &LegacyAminoPubKey {
                    threshold: *threshold,
                    public_keys: members.iter().map(Self::to_any).collect(),
                },
            ),
        }
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            Self::EthSecp256k1(_) => ETH_SECP256K1_PUBKEY_TYPE_URL,
            Self::Ed25519(_) => ED25519_PUBKEY_TYPE_URL,
            Self::Multisig { .. } => MULTISIG_PUBKEY_TYPE_URL,
        }
    }

    pub fn address(&self) -> AccAddress {
        match self {
            Self::EthSecp256k1(key) => Address::from_public_key(key).into(),
            Self::Ed25519(key) => truncated_sha256(key.as_bytes()),
            Self::Multisig { .. } => truncated_sha256(&self.to_any().value),
        }
    }

    /// Verifies a single-key signature over `msg`.
    ///
    /// `eth_secp256k1` signs `keccak256(msg)` and accepts `r || s` with an
    /// optional trailing recovery byte; `ed25519` signs `msg` directly.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        match self {
            Self::EthSecp256k1(key) => {
                if signature.len() != 64 && signature.len() != 65 {
                    return Err(SignatureError::Malformed(format!(
                        "expected 64 or 65 bytes, got {}",
                        signature.len()
                    )));
                }
                let sig = k256::ecdsa::Signature::from_slice(&signature[..64])
                    .map_err(|e| SignatureError::Malformed(e.to_string()))?;
                if sig.normalize_s().is_some() {
                    return Err(SignatureError::HighS);
                }
                key.verify_prehash(keccak256(msg).as_slice(), &sig)
                    .map_err(|_| SignatureError::Mismatch)
            }
            Self::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|e| SignatureError::Malformed(e.to_string()))?;
                key.verify_strict(msg, &sig)
                    .map_err(|_| SignatureError::Mismatch)
            }
            Self::Multisig { .. } => Err(SignatureError::ModeMismatch),
        }
    }

    /// Verifies a threshold multisig signature and returns the members that
    /// signed, in member order.
    pub fn verify_multisig(
        &self,
        msg: &[u8],
        signature: &[u8],
        bitarray: &CompactBitArray,
    ) -> Result<Vec<&Self>, SignatureError> {
        let Self::Multisig { threshold, members } = self else {
            return Err(SignatureError::ModeMismatch);
        };
        if bitarray.len() != members.len() {
            return Err(SignatureError::BitArrayLength {
                bits: bitarray.len(),
                members: members.len(),
            });
        }
        let multi = MultiSignature::decode(signature)
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;
        let signers = bitarray.count_ones();
        if multi.signatures.len() != signers {
            return Err(SignatureError::SignatureCount {
                signatures: multi.signatures.len(),
                signers,
            });
        }
        if signers < *threshold as usize {
            return Err(SignatureError::BelowThreshold {
                valid: signers,
                threshold: *threshold,
            });
        }

        let signing_members = members
            .iter()
            .enumerate()
            .filter(|(i, _)| bitarray.get(*i))
            .map(|(_, member)| member);
        for (member, sig) in signing_members.clone().zip(&multi.signatures) {
            member.verify(msg, sig)?;
        }
        Ok(signing_members.collect())
    }
}

fn truncated_sha256(bytes: &[u8]) -> AccAddress {
    let digest = Sha256::digest(bytes);
    let mut address = [0_u8; 20];
    address.copy_from_slice(&digest[..20]);
    address.into()
}
