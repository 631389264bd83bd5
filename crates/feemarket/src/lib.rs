//! Base-fee updater for the dynamic-fee lane.
//!
//! Runs once per block, before any transaction of that block is admitted,
//! and derives the next base fee from the gas used by the previous block:
//!
//! ```text
//! delta    = base_fee × |gas_used − target| / target / max_change_denominator
//! next     = base_fee ± delta          (sign of gas_used − target)
//! next     = max(next, min_base_fee)
//! ```
//!
//! All arithmetic is 256-bit integer math truncating toward zero. Every node
//! must produce the same value bit for bit.
#![deny(clippy::float_arithmetic)]

use evl_types::{FeeMarketParams, FeeMarketState, U256};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeMarketError {
    #[error("target_gas_per_block must be non-zero")]
    ZeroTarget,
    #[error("max_change_denominator must be non-zero")]
    ZeroDenominator,
    #[error("elasticity_multiplier must be non-zero")]
    ZeroElasticity,
    #[error("arithmetic overflow computing the base fee ({0})")]
    Overflow(&'static str),
}

/// Outcome of one base-fee update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseFeeUpdate {
    pub height: u64,
    pub previous: U256,
    pub next: U256,
    /// Gas used after clamping to the block gas ceiling
    pub gas_used: u64,
}

fn check_params(params: &FeeMarketParams) -> Result<(), FeeMarketError> {
    if params.target_gas_per_block == 0 {
        return Err(FeeMarketError::ZeroTarget);
    }
    if params.max_change_denominator == 0 {
        return Err(FeeMarketError::ZeroDenominator);
    }
    if params.elasticity_multiplier == 0 {
        return Err(FeeMarketError::ZeroElasticity);
    }
    Ok(())
}

/// Previous-block gas clamped to `target × elasticity`.
pub fn clamp_gas_used(params: &FeeMarketParams, gas_used: u64) -> Result<u64, FeeMarketError> {
    let ceiling = params
        .target_gas_per_block
        .checked_mul(params.elasticity_multiplier)
        .ok_or(FeeMarketError::Overflow("block gas ceiling"))?;
    Ok(gas_used.min(ceiling))
}

/// Computes the base fee for the block at `height` given the gas used by
/// the block before it.
pub fn next_base_fee(
    state: &FeeMarketState,
    height: u64,
    prev_gas_used: u64,
) -> Result<U256, FeeMarketError> {
    let params = &state.params;
    check_params(params)?;

    if params.no_base_fee {
        return Ok(U256::ZERO);
    }
    if height < params.enable_height {
        return Ok(state.base_fee);
    }

    let gas_used = clamp_gas_used(params, prev_gas_used)?;
    let target = params.target_gas_per_block;
    if gas_used == target {
        return Ok(state.base_fee);
    }

    let gas_delta = gas_used.abs_diff(target);
    let delta = state
        .base_fee
        .checked_mul(U256::from(gas_delta))
        .ok_or(FeeMarketError::Overflow("base_fee × gas delta"))?
        / U256::from(target)
        / U256::from(params.max_change_denominator);

    let next = if gas_used > target {
        state
            .base_fee
            .checked_add(delta)
            .ok_or(FeeMarketError::Overflow("base fee increase"))?
    } else {
        state
            .base_fee
            .checked_sub(delta)
            .ok_or(FeeMarketError::Overflow("base fee decrease"))?
    };

    Ok(next.max(params.min_base_fee))
}

/// Applies [`next_base_fee`] to `state` in place.
///
/// An error leaves `state` untouched; callers must halt block processing
/// rather than continue with a stale base fee.
pub fn advance(
    state: &mut FeeMarketState,
    height: u64,
    prev_gas_used: u64,
) -> Result<BaseFeeUpdate, FeeMarketError> {
    let previous = state.base_fee;
    let next = next_base_fee(state, height, prev_gas_used)?;
    let gas_used = clamp_gas_used(&state.params, prev_gas_used)?;
    state.base_fee = next;

    if next == previous {
        debug!(height, base_fee = %next, gas_used, "base fee unchanged");
    } else {
        info!(height, previous = %previous, base_fee = %next, gas_used, "base fee updated");
    }

    Ok(BaseFeeUpdate {
        height,
        previous,
        next,
        gas_used,
    })
}
