use evl_types::{SignedEthTx, Transaction};
use tracing::trace;

use super::ethereum_tx;
use crate::{
    context::ValidationContext,
    error::{AdmissionError, StageError},
    stage::AdmissionStage,
    state::{StateReader as _, TxScope},
};

pub const TX_GAS: u64 = 21_000;
pub const TX_CREATE_GAS: u64 = 32_000;
pub const TX_DATA_ZERO_GAS: u64 = 4;
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;
pub const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// Gas every Ethereum transaction pays before execution.
pub fn intrinsic_gas(tx: &SignedEthTx) -> Result<u64, AdmissionError> {
    let overflow = || AdmissionError::Overflow("intrinsic gas".to_owned());

    let mut gas = TX_GAS;
    if tx.is_create() {
        gas = gas.checked_add(TX_CREATE_GAS).ok_or_else(overflow)?;
    }

    let zeros = tx.input().iter().filter(|byte| **byte == 0).count() as u64;
    let non_zeros = tx.input().len() as u64 - zeros;
    let data_gas = zeros
        .checked_mul(TX_DATA_ZERO_GAS)
        .zip(non_zeros.checked_mul(TX_DATA_NON_ZERO_GAS))
        .and_then(|(zero, non_zero)| zero.checked_add(non_zero))
        .ok_or_else(overflow)?;
    gas = gas.checked_add(data_gas).ok_or_else(overflow)?;

    if let Some(access_list) = tx.access_list() {
        for item in access_list.iter() {
            let keys = (item.storage_keys.len() as u64)
                .checked_mul(TX_ACCESS_LIST_STORAGE_KEY_GAS)
                .ok_or_else(overflow)?;
            gas = gas
                .checked_add(TX_ACCESS_LIST_ADDRESS_GAS)
                .and_then(|gas| gas.checked_add(keys))
                .ok_or_else(overflow)?;
        }
    }
    Ok(gas)
}

/// Intrinsic gas and nonce checks for Ethereum-formatted transactions.
#[derive(Debug, Clone, Default)]
pub struct EthBasic;

impl AdmissionStage for EthBasic {
    fn name(&self) -> &'static str {
        "eth_basic"
    }

    fn process(
        &self,
        tx: &Transaction,
        mut ctx: ValidationContext,
        scope: &mut TxScope<'_>,
    ) -> Result<ValidationContext, StageError> {
        let signed = &ethereum_tx(tx, self.name())?.signed;
        ctx.consume_gas(intrinsic_gas(signed)?, "intrinsic gas")?;

        let Some(sender) = ctx.signers.first().cloned() else {
            return Err(AdmissionError::invalid_signer("ethereum sender is not bound").into());
        };
        let mut account = match scope.account(&sender.address)? {
            Some(account) => account,
            None => scope.create_account(sender.address)?,
        };
        if signed.nonce() != account.sequence {
            return Err(AdmissionError::SequenceMismatch {
                address: sender.address,
                expected: account.sequence,
                got: signed.nonce(),
            }
            .into());
        }
        account.sequence = account
            .sequence
            .checked_add(1)
            .ok_or_else(|| AdmissionError::Overflow(format!("nonce of {}", sender.address)))?;
        account.public_key.get_or_insert(sender.public_key);
        trace!(sender = %sender.address, nonce = signed.nonce(), "nonce accepted");
        scope.set_account(account);
        Ok(ctx)
    }
}
