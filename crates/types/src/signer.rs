//! Client-side signing helpers: build and sign transactions for both lanes.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEip2930, TxLegacy};
use alloy_primitives::keccak256;
use alloy_signer::SignerSync as _;
use alloy_signer_local::LocalSigner;
use ed25519_dalek::Signer as _;
use eyre::Result;
use k256::ecdsa::{signature::hazmat::PrehashSigner as _, SigningKey};
use prost::Message as _;
use sha2::{Digest as _, Sha256};

use crate::{
    proto::{
        mode_info, Any, AuthInfo, Coin, CompactBitArray, Fee, ModeInfo, MsgEthereumTx,
        MultiSignature, SignDoc, SignerInfo, TxBody, TxRaw, MSG_ETHEREUM_TX_TYPE_URL,
    },
    AccAddress, PublicKey, SignedEthTx,
};

fn seed_bytes(seed: u64) -> [u8; 32] {
    Sha256::digest(seed.to_be_bytes()).into()
}

fn secp_key_from_seed(seed: u64) -> SigningKey {
    let mut bytes = seed_bytes(seed);
    loop {
        if let Ok(key) = SigningKey::from_bytes(&bytes.into()) {
            return key;
        }
        bytes = Sha256::digest(bytes).into();
    }
}

/// Signs Ethereum transactions with a secp256k1 key.
#[derive(Debug, Clone)]
pub struct EthSigner {
    pub signer: LocalSigner<SigningKey>,
}

impl EthSigner {
    pub fn random() -> Self {
        use rand::rngs::OsRng;

        Self {
            signer: LocalSigner::from_signing_key(SigningKey::random(&mut OsRng)),
        }
    }

    /// Deterministic key, for reproducible fixtures.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            signer: LocalSigner::from_signing_key(secp_key_from_seed(seed)),
        }
    }

    pub fn address(&self) -> alloy_primitives::Address {
        self.signer.address()
    }

    pub fn acc_address(&self) -> AccAddress {
        self.address().into()
    }

    /// The same key viewed as a Cosmos `eth_secp256k1` key.
    pub fn cosmos_key(&self) -> CosmosKey {
        CosmosKey::Secp(self.signer.credential().clone())
    }

    fn sign_tx<T: SignableTransaction<alloy_primitives::Signature>>(
        &self,
        tx: T,
    ) -> Result<alloy_consensus::Signed<T>> {
        let signature = self.signer.sign_hash_sync(&tx.signature_hash())?;
        Ok(tx.into_signed(signature))
    }

    pub fn sign_legacy(&self, tx: TxLegacy) -> Result<SignedEthTx> {
        Ok(SignedEthTx::Legacy(self.sign_tx(tx)?))
    }

    pub fn sign_eip2930(&self, tx: TxEip2930) -> Result<SignedEthTx> {
        Ok(SignedEthTx::Eip2930(self.sign_tx(tx)?))
    }

    pub fn sign_eip1559(&self, tx: TxEip1559) -> Result<SignedEthTx> {
        Ok(SignedEthTx::Eip1559(self.sign_tx(tx)?))
    }
}

/// Wraps a signed Ethereum transaction into a Cosmos envelope carrying a
/// single `MsgEthereumTx`.
pub fn wrap_ethereum_tx(tx: &SignedEthTx, from: &str) -> TxRaw {
    let msg = MsgEthereumTx {
        marshalled_tx: tx.encoded_2718(),
        from: from.to_owned(),
    };
    TxRaw {
        body_bytes: TxBody {
            messages: vec![Any::pack(MSG_ETHEREUM_TX_TYPE_URL, &msg)],
            ..Default::default()
        }
        .encode_to_vec(),
        auth_info_bytes: AuthInfo::default().encode_to_vec(),
        signatures: vec![],
    }
}

/// A Cosmos-lane signing key.
#[derive(Debug, Clone)]
pub enum CosmosKey {
    Secp(SigningKey),
    Ed(ed25519_dalek::SigningKey),
}

impl CosmosKey {
    pub fn random_secp() -> Self {
        Self::Secp(SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn secp_from_seed(seed: u64) -> Self {
        Self::Secp(secp_key_from_seed(seed))
    }

    pub fn ed_from_seed(seed: u64) -> Self {
        Self::Ed(ed25519_dalek::SigningKey::from_bytes(&seed_bytes(seed)))
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Secp(key) => PublicKey::EthSecp256k1(*key.verifying_key()),
            Self::Ed(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    pub fn address(&self) -> AccAddress {
        self.public_key().address()
    }

    /// `eth_secp256k1` signs `keccak256(msg)`, `ed25519` signs `msg`.
    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Secp(key) => {
                let signature: k256::ecdsa::Signature =
                    key.sign_prehash(keccak256(msg).as_slice())?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::Ed(key) => Ok(key.sign(msg).to_bytes().to_vec()),
        }
    }
}

#[derive(Debug, Clone)]
enum TxSigner {
    Single {
        key: CosmosKey,
        account_number: u64,
        sequence: u64,
    },
    Multisig {
        threshold: u32,
        members: Vec<CosmosKey>,
        signing: Vec<bool>,
        account_number: u64,
        sequence: u64,
    },
    Raw {
        public_key: Option<Any>,
        mode_info: ModeInfo,
        sequence: u64,
        signature: Vec<u8>,
    },
}

/// Builds signed Cosmos-lane transactions (`SIGN_MODE_DIRECT`).
#[derive(Debug, Clone)]
pub struct CosmosTxBuilder {
    chain_id: String,
    body: TxBody,
    fee: Fee,
    signers: Vec<TxSigner>,
}

impl CosmosTxBuilder {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_owned(),
            body: TxBody::default(),
            fee: Fee::default(),
            signers: vec![],
        }
    }

    pub fn message(mut self, msg: Any) -> Self {
        self.body.messages.push(msg);
        self
    }

    pub fn extension_option(mut self, option: Any) -> Self {
        self.body.extension_options.push(option);
        self
    }

    pub fn memo(mut self, memo: &str) -> Self {
        memo.clone_into(&mut self.body.memo);
        self
    }

    pub fn fee(mut self, denom: &str, amount: &str, gas_limit: u64) -> Self {
        self.fee.amount = vec![Coin {
            denom: denom.to_owned(),
            amount: amount.to_owned(),
        }];
        self.fee.gas_limit = gas_limit;
        self
    }

    pub fn fee_payer(mut self, payer: &str) -> Self {
        payer.clone_into(&mut self.fee.payer);
        self
    }

    pub fn fee_granter(mut self, granter: &str) -> Self {
        granter.clone_into(&mut self.fee.granter);
        self
    }

    pub fn signer(mut self, key: &CosmosKey, account_number: u64, sequence: u64) -> Self {
        self.signers.push(TxSigner::Single {
            key: key.clone(),
            account_number,
            sequence,
        });
        self
    }

    /// Adds a threshold multisig signer; `signing[i]` selects which members sign.
    pub fn multisig_signer(
        mut self,
        threshold: u32,
        members: &[CosmosKey],
        signing: &[bool],
        account_number: u64,
        sequence: u64,
    ) -> Self {
        self.signers.push(TxSigner::Multisig {
            threshold,
            members: members.to_vec(),
            signing: signing.to_vec(),
            account_number,
            sequence,
        });
        self
    }

    /// Adds a signer with an arbitrary public key and signature, bypassing
    /// signing entirely.
    pub fn raw_signer(
        mut self,
        public_key: Option<Any>,
        mode_info: ModeInfo,
        sequence: u64,
        signature: Vec<u8>,
    ) -> Self {
        self.signers.push(TxSigner::Raw {
            public_key,
            mode_info,
            sequence,
            signature,
        });
        self
    }

    pub fn build(&self) -> Result<TxRaw> {
        let body_bytes = self.body.encode_to_vec();
        let signer_infos = self.signers.iter().map(signer_info).collect();
        let auth_info_bytes = AuthInfo {
            signer_infos,
            fee: Some(self.fee.clone()),
        }
        .encode_to_vec();

        let sign_bytes = |account_number: u64| {
            SignDoc {
                body_bytes: body_bytes.clone(),
                auth_info_bytes: auth_info_bytes.clone(),
                chain_id: self.chain_id.clone(),
                account_number,
            }
            .encode_to_vec()
        };

        let mut signatures = Vec::with_capacity(self.signers.len());
        for signer in &self.signers {
            let signature = match signer {
                TxSigner::Single {
                    key,
                    account_number,
                    ..
                } => key.sign(&sign_bytes(*account_number))?,
                TxSigner::Multisig {
                    members,
                    signing,
                    account_number,
                    ..
                } => {
                    eyre::ensure!(
                        members.len() == signing.len(),
                        "multisig signing flags ({}) must match member count ({})",
                        signing.len(),
                        members.len()
                    );
                    let doc = sign_bytes(*account_number);
                    MultiSignature {
                        signatures: members
                            .iter()
                            .zip(signing)
                            .filter(|(_, signs)| **signs)
                            .map(|(key, _)| key.sign(&doc))
                            .collect::<Result<_>>()?,
                    }
                    .encode_to_vec()
                }
                TxSigner::Raw { signature, .. } => signature.clone(),
            };
            signatures.push(signature);
        }

        Ok(TxRaw {
            body_bytes,
            auth_info_bytes,
            signatures,
        })
    }

    pub fn build_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.build()?.encode_to_vec())
    }
}

fn signer_info(signer: &TxSigner) -> SignerInfo {
    match signer {
        TxSigner::Single { key, sequence, .. } => SignerInfo {
            public_key: Some(key.public_key().to_any()),
            mode_info: Some(ModeInfo::direct()),
            sequence: *sequence,
        },
        TxSigner::Multisig {
            threshold,
            members,
            signing,
            sequence,
            ..
        } => {
            let public_key = PublicKey::Multisig {
                threshold: *threshold,
                members: members.iter().map(CosmosKey::public_key).collect(),
            };
            let mode_infos = signing
                .iter()
                .filter(|signs| **signs)
                .map(|_| ModeInfo::direct())
                .collect();
            SignerInfo {
                public_key: Some(public_key.to_any()),
                mode_info: Some(ModeInfo {
                    sum: Some(mode_info::Sum::Multi(mode_info::Multi {
                        bitarray: Some(CompactBitArray::from_bits(signing)),
                        mode_infos,
                    })),
                }),
                sequence: *sequence,
            }
        }
        TxSigner::Raw {
            public_key,
            mode_info,
            sequence,
            ..
        } => SignerInfo {
            public_key: public_key.clone(),
            mode_info: Some(mode_info.clone()),
            sequence: *sequence,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodedTx;

    #[test]
    fn eth_signer_and_cosmos_key_share_an_address() {
        let signer = EthSigner::from_seed(11);
        assert_eq!(signer.acc_address(), signer.cosmos_key().address());
    }

    #[test]
    fn built_tx_carries_one_signature_per_signer() {
        let alice = CosmosKey::secp_from_seed(1);
        let bob = CosmosKey::ed_from_seed(2);
        let raw = CosmosTxBuilder::new("everlast_97-1")
            .fee("aevl", "1000", 100_000)
            .signer(&alice, 0, 0)
            .signer(&bob, 1, 4)
            .build()
            .unwrap();
        let decoded = DecodedTx::from_raw(raw).unwrap();

        assert_eq!(decoded.signatures.len(), 2);
        assert_eq!(decoded.auth_info.signer_infos.len(), 2);
        assert_eq!(decoded.auth_info.signer_infos[1].sequence, 4);
    }

    #[test]
    fn multisig_flags_must_match_members() {
        let keys = [CosmosKey::secp_from_seed(1), CosmosKey::secp_from_seed(2)];
        let builder =
            CosmosTxBuilder::new("everlast_97-1").multisig_signer(1, &keys, &[true], 0, 0);
        assert!(builder.build().is_err());
    }
}
