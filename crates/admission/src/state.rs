//! State the admission pipeline reads and, for fee deduction and sequence
//! bumps, writes.
//!
//! Stages never touch the backing store directly. Each transaction runs
//! against a [`TxScope`] overlay whose [`StateChanges`] are applied only when
//! the whole pipeline succeeds in finalize mode.

use evl_types::{AccAddress, FeeMarketState, PublicKey, U256};
use std::collections::BTreeMap;

use crate::error::StoreError;

pub mod memory;
pub mod scope;

pub use memory::MemoryStore;
pub use scope::TxScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: AccAddress,
    /// Recorded on the first signature the account produces
    pub public_key: Option<PublicKey>,
    pub account_number: u64,
    /// Next expected sequence (nonce)
    pub sequence: u64,
}

/// Permission for a grantee to pay fees from the granter's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeAllowance {
    /// Remaining spendable amount; `None` means unlimited
    pub spend_limit: Option<U256>,
}

pub trait StateReader {
    fn account(&self, address: &AccAddress) -> Result<Option<Account>, StoreError>;

    /// Balance in the fee denom.
    fn balance(&self, address: &AccAddress) -> Result<U256, StoreError>;

    fn fee_allowance(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
    ) -> Result<Option<FeeAllowance>, StoreError>;

    fn fee_market(&self) -> Result<FeeMarketState, StoreError>;

    fn next_account_number(&self) -> Result<u64, StoreError>;

    /// Height of the block currently being built.
    fn block_height(&self) -> Result<u64, StoreError>;
}

pub trait StateWriter: StateReader {
    fn set_account(&mut self, account: Account) -> Result<(), StoreError>;

    fn set_balance(&mut self, address: AccAddress, amount: U256) -> Result<(), StoreError>;

    /// `None` revokes the allowance.
    fn set_fee_allowance(
        &mut self,
        granter: AccAddress,
        grantee: AccAddress,
        allowance: Option<FeeAllowance>,
    ) -> Result<(), StoreError>;

    fn set_fee_market(&mut self, state: FeeMarketState) -> Result<(), StoreError>;

    fn set_next_account_number(&mut self, next: u64) -> Result<(), StoreError>;

    fn set_block_height(&mut self, height: u64) -> Result<(), StoreError>;

    /// Persists the writes of one successful transaction.
    fn apply(&mut self, changes: StateChanges) -> Result<(), StoreError> {
        for account in changes.accounts.into_values() {
            self.set_account(account)?;
        }
        for (address, amount) in changes.balances {
            self.set_balance(address, amount)?;
        }
        for ((granter, grantee), allowance) in changes.allowances {
            self.set_fee_allowance(granter, grantee, allowance)?;
        }
        if let Some(next) = changes.next_account_number {
            self.set_next_account_number(next)?;
        }
        Ok(())
    }
}

/// Writes buffered by a [`TxScope`], ordered for deterministic application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateChanges {
    pub accounts: BTreeMap<AccAddress, Account>,
    pub balances: BTreeMap<AccAddress, U256>,
    pub allowances: BTreeMap<(AccAddress, AccAddress), Option<FeeAllowance>>,
    pub next_account_number: Option<u64>,
}

impl StateChanges {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.balances.is_empty()
            && self.allowances.is_empty()
            && self.next_account_number.is_none()
    }
}
