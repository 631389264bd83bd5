use evl_types::{AccAddress, FeeMarketState, U256};

use super::{Account, FeeAllowance, StateChanges, StateReader};
use crate::error::StoreError;

/// Copy-on-write overlay over a read-only state view, scoped to one
/// transaction. Dropping it discards every write.
pub struct TxScope<'a> {
    base: &'a dyn StateReader,
    changes: StateChanges,
}

impl<'a> TxScope<'a> {
    pub fn new(base: &'a dyn StateReader) -> Self {
        Self {
            base,
            changes: StateChanges::default(),
        }
    }

    pub fn changes(&self) -> &StateChanges {
        &self.changes
    }

    pub fn into_changes(self) -> StateChanges {
        self.changes
    }

    pub fn set_account(&mut self, account: Account) {
        self.changes.accounts.insert(account.address, account);
    }

    pub fn set_balance(&mut self, address: AccAddress, amount: U256) {
        self.changes.balances.insert(address, amount);
    }

    pub fn set_fee_allowance(
        &mut self,
        granter: AccAddress,
        grantee: AccAddress,
        allowance: Option<FeeAllowance>,
    ) {
        self.changes
            .allowances
            .insert((granter, grantee), allowance);
    }

    /// Creates a fresh account with the next account number.
    pub fn create_account(&mut self, address: AccAddress) -> Result<Account, StoreError> {
        let account_number = self.next_account_number()?;
        let next = account_number.checked_add(1).ok_or_else(|| StoreError::Corrupt {
            key: "next_account_number".to_owned(),
            reason: "exhausted".to_owned(),
        })?;
        self.changes.next_account_number = Some(next);
        let account = Account {
            address,
            public_key: None,
            account_number,
            sequence: 0,
        };
        self.set_account(account.clone());
        Ok(account)
    }
}

impl StateReader for TxScope<'_> {
    fn account(&self, address: &AccAddress) -> Result<Option<Account>, StoreError> {
        match self.changes.accounts.get(address) {
            Some(account) => Ok(Some(account.clone())),
            None => self.base.account(address),
        }
    }

    fn balance(&self, address: &AccAddress) -> Result<U256, StoreError> {
        match self.changes.balances.get(address) {
            Some(balance) => Ok(*balance),
            None => self.base.balance(address),
        }
    }

    fn fee_allowance(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
    ) -> Result<Option<FeeAllowance>, StoreError> {
        match self.changes.allowances.get(&(*granter, *grantee)) {
            Some(allowance) => Ok(*allowance),
            None => self.base.fee_allowance(granter, grantee),
        }
    }

    fn fee_market(&self) -> Result<FeeMarketState, StoreError> {
        self.base.fee_market()
    }

    fn next_account_number(&self) -> Result<u64, StoreError> {
        match self.changes.next_account_number {
            Some(next) => Ok(next),
            None => self.base.next_account_number(),
        }
    }

    fn block_height(&self) -> Result<u64, StoreError> {
        self.base.block_height()
    }
}
