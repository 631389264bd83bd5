use evl_types::Transaction;

use crate::{
    context::ValidationContext,
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::TxScope,
};

/// Charges gas proportional to the encoded envelope size.
#[derive(Debug, Clone)]
pub struct TxSizeGas {
    cost_per_byte: u64,
}

impl TxSizeGas {
    pub fn new(cost_per_byte: u64) -> Self {
        Self { cost_per_byte }
    }
}

impl AdmissionStage for TxSizeGas {
    fn name(&self) -> &'static str {
        "tx_size_gas"
    }

    fn process(
        &self,
        tx: &Transaction,
        mut ctx: ValidationContext,
        _scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let size = tx.envelope().encoded_len as u64;
        let cost = size
            .checked_mul(self.cost_per_byte)
            .ok_or_else(|| AdmissionError::Overflow(format!("size gas for {size} bytes")))?;
        ctx.consume_gas(cost, "tx size")?;
        Ok(ctx)
    }
}
