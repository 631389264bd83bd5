use evl_types::{EthSignerRule, EthTxType, EvmForks, PublicKey, Transaction};
use tracing::trace;

use super::ethereum_tx;
use crate::{
    context::{SignerBinding, ValidationContext},
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::TxScope,
};

/// Recovers the sender of an Ethereum-formatted transaction and binds it.
///
/// Runs in every execution mode: the recovered sender pays the fee, so an
/// unverified `from` must never reach later stages.
#[derive(Debug, Clone)]
pub struct EthSigVerify {
    chain_id: u64,
    bech32_prefix: String,
    forks: EvmForks,
}

fn rule_admits(rule: EthSignerRule, tx_type: EthTxType) -> bool {
    match rule {
        EthSignerRule::Homestead => false,
        EthSignerRule::Eip155 => tx_type == EthTxType::Legacy,
        EthSignerRule::Berlin => tx_type != EthTxType::Eip1559,
        EthSignerRule::London => true,
    }
}

impl EthSigVerify {
    pub fn new(chain_id: u64, bech32_prefix: impl Into<String>, forks: EvmForks) -> Self {
        Self {
            chain_id,
            bech32_prefix: bech32_prefix.into(),
            forks,
        }
    }
}

impl AdmissionStage for EthSigVerify {
    fn name(&self) -> &'static str {
        "eth_sig_verify"
    }

    #[tracing::instrument(level = "trace", skip_all, fields(tx.hash = %ctx.tx_hash))]
    fn process(
        &self,
        tx: &Transaction,
        mut ctx: ValidationContext,
        _scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let eth = ethereum_tx(tx, self.name())?;
        let signed = &eth.signed;

        let Some(chain_id) = signed.chain_id() else {
            return Err(AdmissionError::UnprotectedTransaction.into());
        };
        if chain_id != self.chain_id {
            return Err(AdmissionError::invalid_signer(format!(
                "signed for chain id {chain_id}, expected {}",
                self.chain_id
            ))
            .into());
        }
        let rule = self.forks.signer_rule_at(ctx.height);
        if !rule_admits(rule, signed.tx_type()) {
            return Err(AdmissionError::invalid_signer(format!(
                "{:?} transactions are not valid under the {rule:?} signer at height {}",
                signed.tx_type(),
                ctx.height
            ))
            .into());
        }
        if !signed.is_low_s() {
            return Err(AdmissionError::invalid_signer("signature s value is in the upper half order").into());
        }

        let key = signed
            .recover_public_key()
            .map_err(|e| AdmissionError::invalid_signer(format!("sender recovery failed: {e}")))?;
        let public_key = PublicKey::EthSecp256k1(key);
        let address = public_key.address();
        let recovered = address
            .to_bech32(&self.bech32_prefix)
            .map_err(AdmissionError::invalid_signer)?;
        if recovered != eth.declared_from {
            return Err(AdmissionError::SignerMismatch {
                declared: eth.declared_from.clone(),
                recovered,
            }
            .into());
        }

        trace!(sender = %recovered, ?rule, "ethereum sender recovered");
        ctx.signers.push(SignerBinding {
            address,
            public_key,
        });
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{ExecutionMode, GasMeter},
        state::MemoryStore,
    };
    use alloy_consensus::{TxEip1559, TxEip2930, TxLegacy};
    use alloy_primitives::{Address, Bytes, TxKind, U256};
    use assert_matches::assert_matches;
    use evl_types::{
        signer::{wrap_ethereum_tx, EthSigner},
        DecodedTx, EthereumTx, SignedEthTx,
    };
    use rstest::rstest;

    const CHAIN: u64 = 9000;

    fn legacy(chain_id: Option<u64>) -> TxLegacy {
        TxLegacy {
            chain_id,
            nonce: 0,
            gas_price: 1_000,
            gas_limit: 21_000,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            value: U256::from(1_u64),
            input: Bytes::new(),
        }
    }

    fn dynamic() -> TxEip1559 {
        TxEip1559 {
            chain_id: CHAIN,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 2_000,
            max_priority_fee_per_gas: 10,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            ..Default::default()
        }
    }

    fn wrap(signed: SignedEthTx, from: &str) -> Transaction {
        let envelope = DecodedTx::from_raw(wrap_ethereum_tx(&signed, from)).unwrap();
        Transaction::EthereumFormatted(EthereumTx {
            envelope,
            declared_from: from.to_owned(),
            signed,
        })
    }

    fn run(stage: &EthSigVerify, tx: &Transaction, height: u64) -> Result<ValidationContext, StageError> {
        let ctx = ValidationContext::new(tx.hash(), tx.lane(), ExecutionMode::ReCheck, height, GasMeter::new(21_000));
        let store = MemoryStore::default();
        stage.process(tx, ctx, &mut TxScope::new(&store))
    }

    fn stage() -> EthSigVerify {
        EthSigVerify::new(CHAIN, "evl", EvmForks::all_active())
    }

    #[test]
    fn binds_the_recovered_sender() {
        let signer = EthSigner::from_seed(1);
        let from = signer.acc_address().to_bech32("evl").unwrap();
        let tx = wrap(signer.sign_legacy(legacy(Some(CHAIN))).unwrap(), &from);

        let ctx = run(&stage(), &tx, 1).unwrap();
        assert_eq!(ctx.signers.len(), 1);
        assert_eq!(ctx.signers[0].address, signer.acc_address());
    }

    #[test]
    fn unprotected_is_rejected_before_anything_else() {
        let signer = EthSigner::from_seed(1);
        let tx = wrap(signer.sign_legacy(legacy(None)).unwrap(), "not even bech32");
        assert_matches!(
            run(&stage(), &tx, 1),
            Err(StageError::Rejected(AdmissionError::UnprotectedTransaction))
        );
    }

    #[test]
    fn mismatched_sender_reports_both_forms() {
        let signer = EthSigner::from_seed(1);
        let impostor = EthSigner::from_seed(2).acc_address().to_bech32("evl").unwrap();
        let tx = wrap(signer.sign_legacy(legacy(Some(CHAIN))).unwrap(), &impostor);

        let recovered = signer.acc_address().to_bech32("evl").unwrap();
        assert_matches!(
            run(&stage(), &tx, 1),
            Err(StageError::Rejected(AdmissionError::SignerMismatch { declared, recovered: got }))
                if declared == impostor && got == recovered
        );
    }

    #[test]
    fn foreign_chain_id_is_rejected() {
        let signer = EthSigner::from_seed(1);
        let from = signer.acc_address().to_bech32("evl").unwrap();
        let tx = wrap(signer.sign_legacy(legacy(Some(1))).unwrap(), &from);
        assert_matches!(
            run(&stage(), &tx, 1),
            Err(StageError::Rejected(AdmissionError::InvalidSigner(_)))
        );
    }

    #[rstest]
    #[case::legacy_before_eip155(0, false, false, false)]
    #[case::legacy_at_eip155(10, true, false, false)]
    #[case::access_list_at_berlin(20, true, true, false)]
    #[case::dynamic_at_london(30, true, true, true)]
    fn fork_heights_gate_tx_types(
        #[case] height: u64,
        #[case] legacy_ok: bool,
        #[case] access_list_ok: bool,
        #[case] dynamic_ok: bool,
    ) {
        let forks = EvmForks {
            eip155_block: Some(10),
            berlin_block: Some(20),
            london_block: Some(30),
        };
        let stage = EthSigVerify::new(CHAIN, "evl", forks);
        let signer = EthSigner::from_seed(3);
        let from = signer.acc_address().to_bech32("evl").unwrap();

        let txs = [
            (signer.sign_legacy(legacy(Some(CHAIN))).unwrap(), legacy_ok),
            (
                signer
                    .sign_eip2930(TxEip2930 {
                        chain_id: CHAIN,
                        gas_limit: 21_000,
                        gas_price: 1_000,
                        to: TxKind::Call(Address::repeat_byte(0x22)),
                        ..Default::default()
                    })
                    .unwrap(),
                access_list_ok,
            ),
            (signer.sign_eip1559(dynamic()).unwrap(), dynamic_ok),
        ];
        for (signed, ok) in txs {
            let result = run(&stage, &wrap(signed, &from), height);
            assert_eq!(result.is_ok(), ok, "height {height}: {result:?}");
        }
    }
}
