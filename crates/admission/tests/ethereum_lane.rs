mod common;

use assert_matches::assert_matches;
use common::{bech32, dynamic_transfer, ethereum_bytes, transfer, validator, CHAIN_EIP155};
use evl_admission::{
    stages::{check_fee, fee_collector, FeeInput},
    AdmissionError, ErrorKind, ExecutionMode, PipelineResult, StateReader as _,
};
use evl_types::{signer::wrap_ethereum_tx, signer::EthSigner, Lane, SignedEthTx, U256};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use prost::Message as _;

const FUNDS: u64 = 1_000_000_000;

#[test_log::test(test)]
fn transfer_at_base_fee_is_accepted_and_committed() {
    let alice = EthSigner::from_seed(1);
    let validator = validator(|store| {
        store.fund(alice.acc_address(), U256::from(FUNDS));
    });
    let tx = ethereum_bytes(&alice, transfer(Some(CHAIN_EIP155), 0, 1_000));

    let ctx = validator
        .admit_bytes(&tx, ExecutionMode::Finalize)
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(ctx.lane, Lane::EthereumFormatted);
    assert_eq!(ctx.effective_gas_price, U256::from(1_000_u64));
    assert_eq!(ctx.tip, U256::ZERO);
    assert_eq!(ctx.fee, U256::from(21_000_000_u64));
    // the intrinsic cost uses the whole limit
    assert_eq!(ctx.gas_meter.consumed(), 21_000);
    assert_eq!(ctx.gas_meter.remaining(), Some(0));
    assert_eq!(ctx.fee_payer, Some(alice.acc_address()));

    validator
        .with_state(|state| {
            let account = state.account(&alice.acc_address()).unwrap().unwrap();
            assert_eq!(account.sequence, 1);
            assert_eq!(
                state.balance(&alice.acc_address()).unwrap(),
                U256::from(FUNDS - 21_000_000)
            );
            assert_eq!(state.balance(&fee_collector()).unwrap(), U256::from(21_000_000_u64));
        })
        .unwrap();

    // the nonce is spent
    assert_matches!(
        validator.admit_bytes(&tx, ExecutionMode::Check).unwrap(),
        PipelineResult::Rejected(AdmissionError::SequenceMismatch { expected: 1, got: 0, .. })
    );
}

#[test_log::test(test)]
fn gas_price_below_base_fee_is_rejected() {
    let alice = EthSigner::from_seed(2);
    let validator = validator(|store| {
        store.fund(alice.acc_address(), U256::from(FUNDS));
    });
    let tx = ethereum_bytes(&alice, transfer(Some(CHAIN_EIP155), 0, 999));

    assert_eq!(
        validator.admit_bytes(&tx, ExecutionMode::Check).unwrap(),
        PipelineResult::Rejected(AdmissionError::InsufficientFee {
            required: U256::from(21_000_000_u64),
            given: U256::from(20_979_000_u64),
        })
    );
}

#[test]
fn declared_fee_one_unit_per_gas_short_is_rejected() {
    let input = FeeInput {
        lane: Lane::EthereumFormatted,
        gas_limit: 21_000,
        declared_fee: U256::from(20_999_000_u64),
        base_fee: U256::from(1_000_u64),
        min_gas_price: U256::from(100_u64),
        priority_cap: None,
    };
    assert_matches!(
        check_fee(&input),
        Err(AdmissionError::InsufficientFee { required, .. }) if required == U256::from(21_000_000_u64)
    );
}

#[test_log::test(test)]
fn dynamic_fee_priority_is_capped_by_the_tip_cap() {
    let alice = EthSigner::from_seed(3);
    let validator = validator(|store| {
        store.fund(alice.acc_address(), U256::from(FUNDS));
    });
    let signed = alice.sign_eip1559(dynamic_transfer(0, 2_000, 10)).unwrap();
    let tx = wrap_ethereum_tx(&signed, &bech32(alice.acc_address())).encode_to_vec();

    let ctx = validator
        .admit_bytes(&tx, ExecutionMode::Finalize)
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(ctx.tip, U256::from(1_000_u64));
    assert_eq!(ctx.priority, U256::from(10_u64));
    assert_eq!(ctx.fee, U256::from(21_000_u64 * 1_010));
    let balance = validator
        .with_state(|state| state.balance(&alice.acc_address()).unwrap())
        .unwrap();
    assert_eq!(balance, U256::from(FUNDS - 21_000 * 1_010));
}

#[test_log::test(test)]
fn declared_sender_must_match_recovered_signer() {
    let alice = EthSigner::from_seed(4);
    let mallory = EthSigner::from_seed(5);
    let validator = validator(|store| {
        store.fund(alice.acc_address(), U256::from(FUNDS));
        store.fund(mallory.acc_address(), U256::from(FUNDS));
    });
    let signed = alice
        .sign_legacy(transfer(Some(CHAIN_EIP155), 0, 1_000))
        .unwrap();
    let tx = wrap_ethereum_tx(&signed, &bech32(mallory.acc_address())).encode_to_vec();

    let result = validator.admit_bytes(&tx, ExecutionMode::Finalize).unwrap();
    assert_matches!(
        result,
        PipelineResult::Rejected(AdmissionError::SignerMismatch { ref declared, ref recovered })
            if *declared == bech32(mallory.acc_address()) && *recovered == bech32(alice.acc_address())
    );
    assert_eq!(
        validator
            .with_state(|state| state.balance(&mallory.acc_address()).unwrap())
            .unwrap(),
        U256::from(FUNDS)
    );
}

#[test_log::test(test)]
fn foreign_chain_id_is_an_invalid_signer() {
    let alice = EthSigner::from_seed(6);
    let validator = validator(|store| {
        store.fund(alice.acc_address(), U256::from(FUNDS));
    });
    let tx = ethereum_bytes(&alice, transfer(Some(1), 0, 1_000));
    assert_eq!(
        validator
            .admit_bytes(&tx, ExecutionMode::Check)
            .unwrap()
            .kind(),
        Some(ErrorKind::InvalidSigner)
    );
}

#[test_log::test(test)]
fn unfunded_sender_leaves_no_account_behind() {
    let alice = EthSigner::from_seed(7);
    let validator = validator(|_| {});
    let tx = ethereum_bytes(&alice, transfer(Some(CHAIN_EIP155), 0, 1_000));

    assert_eq!(
        validator
            .admit_bytes(&tx, ExecutionMode::Finalize)
            .unwrap()
            .kind(),
        Some(ErrorKind::InsufficientFunds)
    );
    let account = validator
        .with_state(|state| state.account(&alice.acc_address()).unwrap())
        .unwrap();
    assert_eq!(account, None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn unprotected_transactions_are_always_rejected(seed in 1_u64..1_000, nonce in 0_u64..8, price in 0_u128..10_000) {
        let signer = EthSigner::from_seed(seed);
        let validator = validator(|store| {
            store.fund(signer.acc_address(), U256::from(FUNDS));
        });
        let tx = ethereum_bytes(&signer, transfer(None, nonce, price));
        for mode in [ExecutionMode::Check, ExecutionMode::Simulate, ExecutionMode::Finalize] {
            prop_assert_eq!(
                validator.admit_bytes(&tx, mode).unwrap(),
                PipelineResult::Rejected(AdmissionError::UnprotectedTransaction)
            );
        }
    }

    #[test]
    fn signed_transactions_recover_their_signer(seed in 1_u64..1_000, chain_id in 1_u64..100_000) {
        let signer = EthSigner::from_seed(seed);
        let signed = signer.sign_legacy(transfer(Some(chain_id), 0, 1_000)).unwrap();
        let decoded = SignedEthTx::decode(&signed.encoded_2718()).unwrap();

        prop_assert_eq!(decoded.chain_id(), Some(chain_id));
        prop_assert!(decoded.is_low_s());
        prop_assert_eq!(decoded.recover_signer().unwrap(), signer.address());
    }
}
