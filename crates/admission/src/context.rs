use evl_types::{AccAddress, Lane, PublicKey, B256, U256};
use std::fmt;

use crate::error::AdmissionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Mempool admission of a new transaction
    Check,
    /// Mempool re-validation after a block commits
    ReCheck,
    /// Gas estimation; write-effecting stages are skipped
    Simulate,
    /// Authoritative execution during block finalization
    Finalize,
}

impl ExecutionMode {
    pub fn is_simulate(self) -> bool {
        matches!(self, Self::Simulate)
    }

    /// Only finalization persists state changes.
    pub fn commits(self) -> bool {
        matches!(self, Self::Finalize)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Check => f.write_str("check"),
            Self::ReCheck => f.write_str("recheck"),
            Self::Simulate => f.write_str("simulate"),
            Self::Finalize => f.write_str("finalize"),
        }
    }
}

/// A signer proven by a signature verification stage. Never built from
/// unverified request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerBinding {
    pub address: AccAddress,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    /// `None` for an infinite meter
    limit: Option<u64>,
    consumed: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    pub fn infinite() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.consumed))
    }

    /// Charges `amount`. An overrun leaves the meter untouched.
    pub fn consume(&mut self, amount: u64, descriptor: &'static str) -> Result<(), AdmissionError> {
        let consumed = self
            .consumed
            .checked_add(amount)
            .ok_or_else(|| AdmissionError::Overflow(format!("gas consumed in {descriptor}")))?;
        if let Some(limit) = self.limit {
            if consumed > limit {
                return Err(AdmissionError::OutOfGas {
                    descriptor,
                    limit,
                    consumed: self.consumed,
                    wanted: amount,
                });
            }
        }
        self.consumed = consumed;
        Ok(())
    }
}

/// Per-transaction state accumulated by the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    pub tx_hash: B256,
    pub lane: Lane,
    pub mode: ExecutionMode,
    /// Height of the block the transaction is validated for
    pub height: u64,
    pub gas_meter: GasMeter,
    pub signers: Vec<SignerBinding>,
    /// Fee accepted by the fee checker, in the fee denom
    pub fee: U256,
    pub effective_gas_price: U256,
    /// Effective gas price above the applicable floor
    pub tip: U256,
    /// Mempool ordering only, not consensus critical
    pub priority: U256,
    /// Account the fee was debited from
    pub fee_payer: Option<AccAddress>,
}

impl ValidationContext {
    pub fn new(tx_hash: B256, lane: Lane, mode: ExecutionMode, height: u64, gas_meter: GasMeter) -> Self {
        Self {
            tx_hash,
            lane,
            mode,
            height,
            gas_meter,
            signers: vec![],
            fee: U256::ZERO,
            effective_gas_price: U256::ZERO,
            tip: U256::ZERO,
            priority: U256::ZERO,
            fee_payer: None,
        }
    }

    pub fn consume_gas(&mut self, amount: u64, descriptor: &'static str) -> Result<(), AdmissionError> {
        self.gas_meter.consume(amount, descriptor)
    }

    pub fn is_bound(&self, address: &AccAddress) -> bool {
        self.signers.iter().any(|signer| signer.address == *address)
    }
}
