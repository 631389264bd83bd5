//! Protobuf wire types for the signed transaction envelope.
//!
//! Field numbers follow the Cosmos SDK / ethermint definitions so that the
//! encoded bytes (and therefore sign bytes) are identical to what clients
//! produce.

pub const MSG_ETHEREUM_TX_TYPE_URL: &str = "/ethermint.evm.v1.MsgEthereumTx";
pub const MSG_EXEC_TYPE_URL: &str = "/cosmos.authz.v1beta1.MsgExec";
pub const MSG_SUBMIT_PROPOSAL_TYPE_URL: &str = "/cosmos.gov.v1.MsgSubmitProposal";
pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

pub const ETH_SECP256K1_PUBKEY_TYPE_URL: &str = "/ethermint.crypto.v1.ethsecp256k1.PubKey";
pub const ED25519_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.ed25519.PubKey";
pub const MULTISIG_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.multisig.LegacyAminoPubKey";

pub const DYNAMIC_FEE_EXTENSION_TYPE_URL: &str = "/ethermint.types.v1.ExtensionOptionDynamicFeeTx";

/// `SIGN_MODE_DIRECT`
pub const SIGN_MODE_DIRECT: i32 = 1;

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

impl Any {
    pub fn pack<M: ::prost::Message>(type_url: &str, msg: &M) -> Self {
        Self {
            type_url: type_url.to_owned(),
            value: msg.encode_to_vec(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
    #[prost(message, repeated, tag = "1023")]
    pub extension_options: Vec<Any>,
    #[prost(message, repeated, tag = "2047")]
    pub non_critical_extension_options: Vec<Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfo>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModeInfo {
    #[prost(oneof = "mode_info::Sum", tags = "1, 2")]
    pub sum: Option<mode_info::Sum>,
}

pub mod mode_info {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Sum {
        #[prost(message, tag = "1")]
        Single(Single),
        #[prost(message, tag = "2")]
        Multi(Multi),
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Single {
        #[prost(int32, tag = "1")]
        pub mode: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Multi {
        #[prost(message, optional, tag = "1")]
        pub bitarray: Option<super::CompactBitArray>,
        #[prost(message, repeated, tag = "2")]
        pub mode_infos: Vec<super::ModeInfo>,
    }
}

impl ModeInfo {
    pub fn direct() -> Self {
        Self {
            sum: Some(mode_info::Sum::Single(mode_info::Single {
                mode: SIGN_MODE_DIRECT,
            })),
        }
    }
}

/// Bit array used by multisig mode info to flag which members signed.
///
/// Bits are stored most significant bit first within each byte;
/// `extra_bits_stored` is the number of meaningful bits in the last byte
/// (zero meaning all eight).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CompactBitArray {
    #[prost(uint32, tag = "1")]
    pub extra_bits_stored: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub elems: Vec<u8>,
}

impl CompactBitArray {
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut elems = vec![0_u8; bits.len().div_ceil(8)];
        for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            elems[i / 8] |= 1 << (7 - (i % 8));
        }
        Self {
            extra_bits_stored: (bits.len() % 8) as u32,
            elems,
        }
    }

    pub fn len(&self) -> usize {
        match self.extra_bits_stored {
            0 => self.elems.len() * 8,
            extra => self.elems.len().saturating_sub(1) * 8 + extra as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        self.elems
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (7 - (index % 8))) != 0)
    }

    pub fn count_ones(&self) -> usize {
        (0..self.len()).filter(|i| self.get(*i)).count()
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    /// Decimal string, arbitrary precision on the wire.
    #[prost(string, tag = "2")]
    pub amount: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

/// Shared shape of single-key public keys (`eth_secp256k1` and `ed25519`).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LegacyAminoPubKey {
    #[prost(uint32, tag = "1")]
    pub threshold: u32,
    #[prost(message, repeated, tag = "2")]
    pub public_keys: Vec<Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiSignature {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgEthereumTx {
    /// EIP-2718 encoded signed transaction.
    #[prost(bytes = "vec", tag = "1")]
    pub marshalled_tx: Vec<u8>,
    /// Bech32 sender declared by the submitter.
    #[prost(string, tag = "2")]
    pub from: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgExec {
    #[prost(string, tag = "1")]
    pub grantee: String,
    #[prost(message, repeated, tag = "2")]
    pub msgs: Vec<Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSubmitProposal {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(message, repeated, tag = "2")]
    pub initial_deposit: Vec<Coin>,
    #[prost(string, tag = "3")]
    pub proposer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtensionOptionDynamicFeeTx {
    /// Decimal string.
    #[prost(string, tag = "1")]
    pub max_priority_price: String,
}
