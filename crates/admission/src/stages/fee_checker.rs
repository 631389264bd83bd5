//! Dual-lane fee check.
//!
//! The effective gas price of a transaction is `floor(declared_fee /
//! gas_limit)`. The Cosmos lane requires it to reach the configured minimum
//! gas price, the Ethereum lane requires it to reach the current base fee.
//! Everything above the floor is the tip, which orders the mempool.
//!
//! All arithmetic is on 256-bit integers with explicit overflow checks.

use evl_types::{
    amount_of, parse_amount,
    proto::{ExtensionOptionDynamicFeeTx, DYNAMIC_FEE_EXTENSION_TYPE_URL},
    CoinAmountError, DecodedTx, Lane, Transaction, U256,
};
use prost::Message as _;
use tracing::trace;

use crate::{
    context::ValidationContext,
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::{StateReader as _, TxScope},
};

/// Everything the fee decision depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeInput {
    pub lane: Lane,
    pub gas_limit: u64,
    pub declared_fee: U256,
    pub base_fee: U256,
    pub min_gas_price: U256,
    /// Upper bound on the per-gas tip, if the transaction declares one
    pub priority_cap: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeOutcome {
    /// Amount to debit from the fee payer
    pub fee: U256,
    pub effective_gas_price: U256,
    pub tip: U256,
    pub priority: U256,
}

/// Pure fee decision; identical inputs give identical outcomes in every mode.
pub fn check_fee(input: &FeeInput) -> Result<FeeOutcome, AdmissionError> {
    let gas = U256::from(input.gas_limit);
    let effective_gas_price = input
        .declared_fee
        .checked_div(gas)
        .unwrap_or_default();
    let floor = match input.lane {
        Lane::CosmosNative => input.min_gas_price,
        Lane::EthereumFormatted => input.base_fee,
    };

    if effective_gas_price < floor {
        let required = floor
            .checked_mul(gas)
            .ok_or_else(|| AdmissionError::Overflow("required fee".to_owned()))?;
        return Err(AdmissionError::InsufficientFee {
            required,
            given: input.declared_fee,
        });
    }
    gas.checked_mul(effective_gas_price)
        .ok_or_else(|| AdmissionError::Overflow("gas limit × effective gas price".to_owned()))?;

    let tip = effective_gas_price - floor;
    let (priority, fee) = match input.priority_cap {
        Some(cap) => {
            let priority = tip.min(cap);
            // dynamic-fee transactions pay the floor plus their capped tip
            let fee = gas
                .checked_mul(floor + priority)
                .ok_or_else(|| AdmissionError::Overflow("effective fee".to_owned()))?;
            (priority, fee)
        }
        None => (tip, input.declared_fee),
    };

    Ok(FeeOutcome {
        fee,
        effective_gas_price,
        tip,
        priority,
    })
}

/// Applies [`check_fee`] against the current fee market state.
#[derive(Debug, Clone)]
pub struct FeeChecker {
    fee_denom: String,
    min_gas_price: U256,
}

fn dynamic_fee_cap(tx: &DecodedTx) -> Result<Option<U256>, AdmissionError> {
    let Some(option) = tx
        .body
        .extension_options
        .iter()
        .find(|option| option.type_url == DYNAMIC_FEE_EXTENSION_TYPE_URL)
    else {
        return Ok(None);
    };
    let option = ExtensionOptionDynamicFeeTx::decode(option.value.as_slice())
        .map_err(|e| AdmissionError::unsupported_shape(format!("dynamic fee option: {e}")))?;
    parse_amount(&option.max_priority_price)
        .map(Some)
        .map_err(coin_error)
}

fn coin_error(err: CoinAmountError) -> AdmissionError {
    match err {
        CoinAmountError::Overflow(_) => AdmissionError::Overflow(err.to_string()),
        CoinAmountError::Invalid(_) | CoinAmountError::DuplicateDenom(_) => {
            AdmissionError::unsupported_shape(err)
        }
    }
}

impl FeeChecker {
    pub fn new(fee_denom: impl Into<String>, min_gas_price: U256) -> Self {
        Self {
            fee_denom: fee_denom.into(),
            min_gas_price,
        }
    }

    fn input(&self, tx: &Transaction, base_fee: U256) -> Result<FeeInput, AdmissionError> {
        let (declared_fee, priority_cap) = match tx {
            Transaction::CosmosNative(decoded) => {
                let coins = decoded.fee().map(|fee| fee.amount.as_slice()).unwrap_or_default();
                let declared = amount_of(coins, &self.fee_denom).map_err(coin_error)?;
                (declared, dynamic_fee_cap(decoded)?)
            }
            Transaction::EthereumFormatted(eth) => {
                let declared = eth
                    .signed
                    .declared_fee()
                    .ok_or_else(|| AdmissionError::Overflow("gas limit × fee cap".to_owned()))?;
                (declared, eth.signed.priority_fee_cap().map(U256::from))
            }
        };
        Ok(FeeInput {
            lane: tx.lane(),
            gas_limit: tx.gas_limit(),
            declared_fee,
            base_fee,
            min_gas_price: self.min_gas_price,
            priority_cap,
        })
    }
}

impl AdmissionStage for FeeChecker {
    fn name(&self) -> &'static str {
        "fee_checker"
    }

    fn process(
        &self,
        tx: &Transaction,
        mut ctx: ValidationContext,
        scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let base_fee = scope.fee_market()?.effective_base_fee();
        let outcome = check_fee(&self.input(tx, base_fee)?)?;
        trace!(
            fee = %outcome.fee,
            effective_gas_price = %outcome.effective_gas_price,
            tip = %outcome.tip,
            "fee accepted"
        );
        ctx.fee = outcome.fee;
        ctx.effective_gas_price = outcome.effective_gas_price;
        ctx.tip = outcome.tip;
        ctx.priority = outcome.priority;
        Ok(ctx)
    }
}
