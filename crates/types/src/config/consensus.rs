use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    fee_market::{FeeMarketParams, FeeMarketState},
    proto::{
        DYNAMIC_FEE_EXTENSION_TYPE_URL, MSG_ETHEREUM_TX_TYPE_URL, MSG_EXEC_TYPE_URL,
        MSG_SUBMIT_PROPOSAL_TYPE_URL,
    },
    serde_utils, ChainId,
};

/// # Consensus Configuration
///
/// Parameters every validating node must agree on. Any divergence between
/// nodes in these values produces diverging admission verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsensusConfig {
    /// Cosmos chain id, `identifier_EIP155-epoch`
    pub chain_id: ChainId,

    /// The only denomination fees are paid in
    pub fee_denom: String,

    /// Human readable part of bech32 account addresses
    pub bech32_prefix: String,

    /// Flat minimum gas price for the Cosmos lane
    #[serde(with = "serde_utils::u256_decimal")]
    pub min_gas_price: U256,

    /// Genesis base fee and updater parameters
    pub fee_market: FeeMarketState,

    /// Heights at which Ethereum signing rules activate
    pub evm_forks: EvmForks,

    pub gas: GasConfig,

    pub ante: AnteConfig,
}

/// # EVM Fork Activation
///
/// Each field is the first block height at which the fork applies; an unset
/// field means the fork is never activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvmForks {
    #[serde(default)]
    pub eip155_block: Option<u64>,
    #[serde(default)]
    pub berlin_block: Option<u64>,
    #[serde(default)]
    pub london_block: Option<u64>,
}

/// Ethereum signer rule selected by block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EthSignerRule {
    /// Pre-EIP-155: legacy transactions without replay protection only
    Homestead,
    /// Chain-id bound legacy transactions
    Eip155,
    /// Adds access-list transactions (EIP-2930)
    Berlin,
    /// Adds dynamic-fee transactions (EIP-1559)
    London,
}

impl EvmForks {
    pub fn signer_rule_at(&self, height: u64) -> EthSignerRule {
        let active = |fork: Option<u64>| fork.is_some_and(|at| at <= height);
        if active(self.london_block) {
            EthSignerRule::London
        } else if active(self.berlin_block) {
            EthSignerRule::Berlin
        } else if active(self.eip155_block) {
            EthSignerRule::Eip155
        } else {
            EthSignerRule::Homestead
        }
    }

    pub fn all_active() -> Self {
        Self {
            eip155_block: Some(0),
            berlin_block: Some(0),
            london_block: Some(0),
        }
    }
}

/// # Gas Costs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GasConfig {
    /// Charged per byte of the encoded Cosmos transaction
    pub tx_size_cost_per_byte: u64,
    /// Charged per verified `eth_secp256k1` signature
    pub sig_verify_cost_secp256k1: u64,
    /// Charged per verified `ed25519` signature
    pub sig_verify_cost_ed25519: u64,
    /// Charged per account or balance read
    pub read_cost_flat: u64,
    /// Charged per account or balance write
    pub write_cost_flat: u64,
}

/// # Ante Handler Limits
///
/// Structural limits enforced before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnteConfig {
    /// Message types that may wrap other messages, unwrapped one level
    pub allowed_wrapper_messages: Vec<String>,
    /// Message types that may never appear inside a wrapper
    #[serde(default)]
    pub disabled_nested_messages: Vec<String>,
    /// Extension options a transaction envelope may carry
    #[serde(default)]
    pub allowed_extension_options: Vec<String>,
    /// Upper bound on multisig member count
    pub max_multisig_members: u32,
}

impl AnteConfig {
    pub fn is_wrapper(&self, type_url: &str) -> bool {
        self.allowed_wrapper_messages.iter().any(|t| t == type_url)
    }

    pub fn is_disabled_nested(&self, type_url: &str) -> bool {
        self.disabled_nested_messages.iter().any(|t| t == type_url)
    }

    pub fn is_allowed_extension(&self, type_url: &str) -> bool {
        self.allowed_extension_options.iter().any(|t| t == type_url)
    }
}

impl ConsensusConfig {
    // spellchecker:off
    pub const TESTING_CHAIN_ID: &'static str = "everlast_9000-1";
    // spellchecker:on

    pub fn testing() -> Self {
        Self {
            chain_id: ChainId::testing(),
            fee_denom: "aevl".to_owned(),
            bech32_prefix: "evl".to_owned(),
            min_gas_price: U256::from(100_u64),
            fee_market: FeeMarketState::new(U256::from(1_000_u64), FeeMarketParams::testing()),
            evm_forks: EvmForks::all_active(),
            gas: GasConfig {
                tx_size_cost_per_byte: 10,
                sig_verify_cost_secp256k1: 1_000,
                sig_verify_cost_ed25519: 590,
                read_cost_flat: 1_000,
                write_cost_flat: 2_000,
            },
            ante: AnteConfig {
                allowed_wrapper_messages: vec![
                    MSG_EXEC_TYPE_URL.to_owned(),
                    MSG_SUBMIT_PROPOSAL_TYPE_URL.to_owned(),
                ],
                disabled_nested_messages: vec![MSG_ETHEREUM_TX_TYPE_URL.to_owned()],
                allowed_extension_options: vec![DYNAMIC_FEE_EXTENSION_TYPE_URL.to_owned()],
                max_multisig_members: 7,
            },
        }
    }
}

impl ChainId {
    pub fn testing() -> Self {
        Self::new_unchecked(ConsensusConfig::TESTING_CHAIN_ID, 9000, 1)
    }
}
