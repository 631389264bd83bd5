use evl_types::{AccAddress, GasConfig, Lane, Transaction};
use sha2::{Digest as _, Sha256};
use tracing::trace;

use crate::{
    context::ValidationContext,
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::{FeeAllowance, StateReader as _, TxScope},
};

/// Module account credited with every deducted fee.
pub fn fee_collector() -> AccAddress {
    let digest = Sha256::digest(b"fee_collector");
    let mut address = [0_u8; 20];
    address.copy_from_slice(&digest[..20]);
    address.into()
}

/// Debits the accepted fee from the payer, or from a granter whose
/// allowance covers it.
#[derive(Debug, Clone)]
pub struct DeductFee {
    bech32_prefix: String,
    gas: GasConfig,
}

impl DeductFee {
    pub fn new(bech32_prefix: impl Into<String>, gas: GasConfig) -> Self {
        Self {
            bech32_prefix: bech32_prefix.into(),
            gas,
        }
    }

    /// The declared payer must be a bound signer; without one the first
    /// signer pays.
    fn payer(&self, tx: &Transaction, ctx: &ValidationContext) -> Result<AccAddress, AdmissionError> {
        let first = ctx
            .signers
            .first()
            .map(|signer| signer.address)
            .ok_or_else(|| AdmissionError::invalid_signer("no verified signer to pay the fee"))?;
        let declared = match tx {
            Transaction::CosmosNative(decoded) => decoded.fee().map(|fee| fee.payer.as_str()),
            Transaction::EthereumFormatted(_) => None,
        };
        match declared {
            Some(payer) if !payer.is_empty() => {
                let payer = AccAddress::from_bech32(payer, &self.bech32_prefix)
                    .map_err(AdmissionError::invalid_signer)?;
                if !ctx.is_bound(&payer) {
                    return Err(AdmissionError::invalid_signer(format!(
                        "fee payer {payer} did not sign the transaction"
                    )));
                }
                Ok(payer)
            }
            _ => Ok(first),
        }
    }

    fn granter(&self, tx: &Transaction) -> Result<Option<AccAddress>, AdmissionError> {
        let Transaction::CosmosNative(decoded) = tx else {
            return Ok(None);
        };
        match decoded.fee().map(|fee| fee.granter.as_str()) {
            Some(granter) if !granter.is_empty() => AccAddress::from_bech32(granter, &self.bech32_prefix)
                .map(Some)
                .map_err(|e| AdmissionError::FeeGrantRejected(e.to_string())),
            _ => Ok(None),
        }
    }

    fn charge_state_gas(
        &self,
        ctx: &mut ValidationContext,
        amount: u64,
        descriptor: &'static str,
    ) -> Result<(), AdmissionError> {
        // the ethereum meter only covers intrinsic gas
        if ctx.lane == Lane::CosmosNative {
            ctx.consume_gas(amount, descriptor)?;
        }
        Ok(())
    }
}

impl AdmissionStage for DeductFee {
    fn name(&self) -> &'static str {
        "deduct_fee"
    }

    fn writes_state(&self) -> bool {
        true
    }

    fn process(
        &self,
        tx: &Transaction,
        mut ctx: ValidationContext,
        scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let fee = ctx.fee;
        let payer = self.payer(tx, &ctx)?;

        let debited = match self.granter(tx)? {
            Some(granter) => {
                let allowance = scope.fee_allowance(&granter, &payer)?.ok_or_else(|| {
                    AdmissionError::FeeGrantRejected(format!("{granter} granted no allowance to {payer}"))
                })?;
                let remaining = match allowance.spend_limit {
                    Some(limit) if limit < fee => {
                        return Err(AdmissionError::FeeGrantRejected(format!(
                            "allowance of {limit} does not cover fee {fee}"
                        ))
                        .into());
                    }
                    Some(limit) => Some(limit - fee),
                    None => None,
                };
                let allowance = match remaining {
                    Some(left) if left.is_zero() => None,
                    spend_limit => Some(FeeAllowance { spend_limit }),
                };
                scope.set_fee_allowance(granter, payer, allowance);
                granter
            }
            None => payer,
        };

        self.charge_state_gas(&mut ctx, self.gas.read_cost_flat, "balance read")?;
        let balance = scope.balance(&debited)?;
        if balance < fee {
            return Err(AdmissionError::InsufficientFunds {
                address: debited,
                balance,
                required: fee,
            }
            .into());
        }
        scope.set_balance(debited, balance - fee);

        let collector = fee_collector();
        let collected = scope
            .balance(&collector)?
            .checked_add(fee)
            .ok_or_else(|| AdmissionError::Overflow("fee collector balance".to_owned()))?;
        scope.set_balance(collector, collected);
        self.charge_state_gas(&mut ctx, self.gas.write_cost_flat, "balance write")?;

        trace!(payer = %debited, %fee, "fee deducted");
        ctx.fee_payer = Some(debited);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{ExecutionMode, GasMeter, SignerBinding},
        state::{MemoryStore, StateChanges},
    };
    use assert_matches::assert_matches;
    use evl_types::{
        proto::{Any, MsgSend, MSG_SEND_TYPE_URL},
        signer::{CosmosKey, CosmosTxBuilder},
        ConsensusConfig, DecodedTx, U256,
    };
    use pretty_assertions::assert_eq;

    fn stage() -> DeductFee {
        let consensus = ConsensusConfig::testing();
        DeductFee::new(consensus.bech32_prefix, consensus.gas)
    }

    fn bech32(key: &CosmosKey) -> String {
        key.address().to_bech32("evl").unwrap()
    }

    fn run(
        builder: CosmosTxBuilder,
        signers: &[&CosmosKey],
        fee: u64,
        store: &MemoryStore,
    ) -> Result<(ValidationContext, StateChanges), StageError> {
        let builder = signers
            .iter()
            .fold(builder, |builder, key| builder.signer(key, 0, 0));
        let tx = Transaction::CosmosNative(DecodedTx::from_raw(builder.build().unwrap()).unwrap());
        let mut ctx = ValidationContext::new(tx.hash(), tx.lane(), ExecutionMode::Finalize, 1, GasMeter::new(200_000));
        ctx.fee = U256::from(fee);
        ctx.signers = signers
            .iter()
            .map(|key| SignerBinding {
                address: key.address(),
                public_key: key.public_key(),
            })
            .collect();
        let mut scope = TxScope::new(store);
        let ctx = stage().process(&tx, ctx, &mut scope)?;
        Ok((ctx, scope.into_changes()))
    }

    fn builder() -> CosmosTxBuilder {
        CosmosTxBuilder::new(ConsensusConfig::TESTING_CHAIN_ID)
            .message(Any::pack(MSG_SEND_TYPE_URL, &MsgSend::default()))
            .fee("aevl", "1000", 10)
    }

    #[test]
    fn first_signer_pays_by_default() {
        let alice = CosmosKey::secp_from_seed(1);
        let mut store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        store.fund(alice.address(), U256::from(5_000_u64));

        let (ctx, changes) = run(builder(), &[&alice], 1_000, &store).unwrap();
        assert_eq!(ctx.fee_payer, Some(alice.address()));
        assert_eq!(changes.balances[&alice.address()], U256::from(4_000_u64));
        assert_eq!(changes.balances[&fee_collector()], U256::from(1_000_u64));
        assert_eq!(ctx.gas_meter.consumed(), 3_000);
    }

    #[test]
    fn declared_payer_must_have_signed() {
        let alice = CosmosKey::secp_from_seed(1);
        let bob = CosmosKey::secp_from_seed(2);
        let store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        assert_matches!(
            run(builder().fee_payer(&bech32(&bob)), &[&alice], 1_000, &store),
            Err(StageError::Rejected(AdmissionError::InvalidSigner(_)))
        );
    }

    #[test]
    fn second_signer_can_pay() {
        let alice = CosmosKey::secp_from_seed(1);
        let bob = CosmosKey::ed_from_seed(2);
        let mut store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        store.fund(bob.address(), U256::from(1_000_u64));

        let (ctx, changes) = run(builder().fee_payer(&bech32(&bob)), &[&alice, &bob], 1_000, &store).unwrap();
        assert_eq!(ctx.fee_payer, Some(bob.address()));
        assert_eq!(changes.balances[&bob.address()], U256::ZERO);
    }

    #[test]
    fn insufficient_balance_is_rejected() {
        let alice = CosmosKey::secp_from_seed(1);
        let mut store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        store.fund(alice.address(), U256::from(999_u64));
        assert_matches!(
            run(builder(), &[&alice], 1_000, &store),
            Err(StageError::Rejected(AdmissionError::InsufficientFunds { .. }))
        );
    }

    #[test]
    fn granter_pays_within_allowance() {
        let alice = CosmosKey::secp_from_seed(1);
        let granter = CosmosKey::secp_from_seed(9);
        let mut store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        store
            .fund(granter.address(), U256::from(10_000_u64))
            .grant_fee_allowance(granter.address(), alice.address(), Some(U256::from(1_500_u64)));

        let (ctx, changes) = run(builder().fee_granter(&bech32(&granter)), &[&alice], 1_000, &store).unwrap();
        assert_eq!(ctx.fee_payer, Some(granter.address()));
        assert_eq!(changes.balances[&granter.address()], U256::from(9_000_u64));
        assert_eq!(
            changes.allowances[&(granter.address(), alice.address())],
            Some(FeeAllowance {
                spend_limit: Some(U256::from(500_u64))
            })
        );
    }

    #[test]
    fn exhausted_allowance_is_removed() {
        let alice = CosmosKey::secp_from_seed(1);
        let granter = CosmosKey::secp_from_seed(9);
        let mut store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        store
            .fund(granter.address(), U256::from(10_000_u64))
            .grant_fee_allowance(granter.address(), alice.address(), Some(U256::from(1_000_u64)));

        let (_, changes) = run(builder().fee_granter(&bech32(&granter)), &[&alice], 1_000, &store).unwrap();
        assert_eq!(changes.allowances[&(granter.address(), alice.address())], None);
    }

    #[test]
    fn missing_or_small_allowance_is_rejected() {
        let alice = CosmosKey::secp_from_seed(1);
        let granter = CosmosKey::secp_from_seed(9);
        let mut store = MemoryStore::genesis(&ConsensusConfig::testing(), 1);
        store.fund(granter.address(), U256::from(10_000_u64));
        assert_matches!(
            run(builder().fee_granter(&bech32(&granter)), &[&alice], 1_000, &store),
            Err(StageError::Rejected(AdmissionError::FeeGrantRejected(_)))
        );

        store.grant_fee_allowance(granter.address(), alice.address(), Some(U256::from(999_u64)));
        assert_matches!(
            run(builder().fee_granter(&bech32(&granter)), &[&alice], 1_000, &store),
            Err(StageError::Rejected(AdmissionError::FeeGrantRejected(_)))
        );
    }
}
