use evl_types::{Config, Lane, Transaction};
use tracing::{debug, error, trace};

use crate::{
    context::{ExecutionMode, GasMeter, ValidationContext},
    error::{AdmissionError, ErrorKind, StageError, StateCorruption},
    stage::AdmissionStage,
    stages::{
        CosmosSigVerify, DeductFee, EthBasic, EthSigVerify, FeeChecker, NestedMessageGuard, TxSizeGas,
    },
    state::TxScope,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Accepted(ValidationContext),
    Rejected(AdmissionError),
}

impl PipelineResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn context(&self) -> Option<&ValidationContext> {
        match self {
            Self::Accepted(ctx) => Some(ctx),
            Self::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AdmissionError> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(err) => Some(err),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.error().map(AdmissionError::kind)
    }

    pub fn into_result(self) -> Result<ValidationContext, AdmissionError> {
        match self {
            Self::Accepted(ctx) => Ok(ctx),
            Self::Rejected(err) => Err(err),
        }
    }
}

/// Ordered stage lists, one per lane, fixed at construction.
#[derive(Debug)]
pub struct Pipeline {
    cosmos: Vec<Box<dyn AdmissionStage>>,
    ethereum: Vec<Box<dyn AdmissionStage>>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        let consensus = &config.consensus;
        let fee_checker = FeeChecker::new(&consensus.fee_denom, consensus.min_gas_price);
        let deduct_fee = DeductFee::new(&consensus.bech32_prefix, consensus.gas.clone());

        Self {
            cosmos: vec![
                Box::new(TxSizeGas::new(consensus.gas.tx_size_cost_per_byte)),
                Box::new(CosmosSigVerify::new(
                    consensus.chain_id.as_str(),
                    &consensus.bech32_prefix,
                    consensus.gas.clone(),
                    consensus.ante.max_multisig_members,
                )),
                Box::new(NestedMessageGuard::new(consensus.ante.clone())),
                Box::new(fee_checker.clone()),
                Box::new(deduct_fee.clone()),
            ],
            ethereum: vec![
                Box::new(EthSigVerify::new(
                    consensus.chain_id.eip155(),
                    &consensus.bech32_prefix,
                    consensus.evm_forks.clone(),
                )),
                Box::new(EthBasic),
                Box::new(fee_checker),
                Box::new(deduct_fee),
            ],
        }
    }

    pub fn stages(&self, lane: Lane) -> &[Box<dyn AdmissionStage>] {
        match lane {
            Lane::CosmosNative => &self.cosmos,
            Lane::EthereumFormatted => &self.ethereum,
        }
    }

    pub fn stage_names(&self, lane: Lane) -> Vec<&'static str> {
        self.stages(lane).iter().map(|stage| stage.name()).collect()
    }

    fn gas_meter(tx: &Transaction, mode: ExecutionMode) -> GasMeter {
        match tx {
            Transaction::CosmosNative(_) if mode.is_simulate() => GasMeter::infinite(),
            Transaction::CosmosNative(decoded) => GasMeter::new(decoded.gas_limit()),
            Transaction::EthereumFormatted(eth) => GasMeter::new(eth.signed.gas_limit()),
        }
    }

    /// Runs every stage of the transaction's lane in order, stopping at the
    /// first failure. Writes land in `scope`; committing them is up to the
    /// caller.
    #[tracing::instrument(level = "trace", skip_all, fields(tx.hash = %tx.hash(), tx.lane = %tx.lane(), mode = %mode, height = height))]
    pub fn run(
        &self,
        tx: &Transaction,
        mode: ExecutionMode,
        height: u64,
        scope: &mut TxScope<'_>,
    ) -> Result<PipelineResult, StateCorruption> {
        let mut ctx = ValidationContext::new(tx.hash(), tx.lane(), mode, height, Self::gas_meter(tx, mode));

        for stage in self.stages(tx.lane()) {
            if mode.is_simulate() && stage.writes_state() {
                trace!(stage = stage.name(), "skipped in simulate mode");
                continue;
            }
            ctx = match stage.process(tx, ctx, scope) {
                Ok(ctx) => ctx,
                Err(StageError::Rejected(err)) => {
                    debug!(stage = stage.name(), kind = %err.kind(), error = %err, "transaction rejected");
                    return Ok(PipelineResult::Rejected(err));
                }
                Err(StageError::Fatal(err)) => {
                    error!(stage = stage.name(), error = %err, "state corruption during admission");
                    return Err(err);
                }
            };
            trace!(stage = stage.name(), gas_consumed = ctx.gas_meter.consumed(), "stage passed");
        }
        Ok(PipelineResult::Accepted(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evl_types::NodeConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn lanes_have_fixed_stage_order() {
        let pipeline = Pipeline::new(&Config::new(NodeConfig::testing()));
        assert_eq!(
            pipeline.stage_names(Lane::CosmosNative),
            vec![
                "tx_size_gas",
                "cosmos_sig_verify",
                "nested_message_guard",
                "fee_checker",
                "deduct_fee"
            ]
        );
        assert_eq!(
            pipeline.stage_names(Lane::EthereumFormatted),
            vec!["eth_sig_verify", "eth_basic", "fee_checker", "deduct_fee"]
        );
    }
}
