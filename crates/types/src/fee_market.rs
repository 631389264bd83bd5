use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::serde_utils;

/// Tuning parameters of the base-fee updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeMarketParams {
    /// Disables the base fee entirely; the updater then pins it to zero
    #[serde(default)]
    pub no_base_fee: bool,

    /// Gas a block is expected to use; usage above it raises the base fee
    pub target_gas_per_block: u64,

    /// Bounds the per-block change to `base_fee / max_change_denominator`
    pub max_change_denominator: u64,

    /// Block gas ceiling is `target_gas_per_block × elasticity_multiplier`
    pub elasticity_multiplier: u64,

    /// The base fee never drops below this value
    #[serde(with = "serde_utils::u256_decimal")]
    pub min_base_fee: U256,

    /// Blocks below this height keep the base fee unchanged
    #[serde(default)]
    pub enable_height: u64,
}

impl FeeMarketParams {
    pub fn testing() -> Self {
        Self {
            no_base_fee: false,
            target_gas_per_block: 15_000_000,
            max_change_denominator: 8,
            elasticity_multiplier: 2,
            min_base_fee: U256::ZERO,
            enable_height: 0,
        }
    }
}

/// Persisted fee market state. Written once per block by the updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeMarketState {
    #[serde(with = "serde_utils::u256_decimal")]
    pub base_fee: U256,
    pub params: FeeMarketParams,
}

impl FeeMarketState {
    pub fn new(base_fee: U256, params: FeeMarketParams) -> Self {
        Self { base_fee, params }
    }

    /// The base fee transactions are priced against; zero when disabled.
    pub fn effective_base_fee(&self) -> U256 {
        if self.params.no_base_fee {
            U256::ZERO
        } else {
            self.base_fee
        }
    }
}
