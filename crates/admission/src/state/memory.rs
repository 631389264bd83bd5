use evl_types::{AccAddress, ConsensusConfig, FeeMarketState, PublicKey, U256};
use std::collections::BTreeMap;

use super::{Account, FeeAllowance, StateReader, StateWriter};
use crate::error::StoreError;

/// Ordered in-memory state, used by the CLI and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    accounts: BTreeMap<AccAddress, Account>,
    balances: BTreeMap<AccAddress, U256>,
    allowances: BTreeMap<(AccAddress, AccAddress), FeeAllowance>,
    fee_market: Option<FeeMarketState>,
    next_account_number: u64,
    block_height: u64,
}

impl MemoryStore {
    /// Empty state seeded with the genesis fee market.
    pub fn genesis(consensus: &ConsensusConfig, height: u64) -> Self {
        Self {
            fee_market: Some(consensus.fee_market.clone()),
            block_height: height,
            ..Default::default()
        }
    }

    /// Credits `amount` to `address`.
    pub fn fund(&mut self, address: AccAddress, amount: U256) -> &mut Self {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
        self
    }

    /// Registers an account, optionally with a known public key. Returns its
    /// account number.
    pub fn create_account(&mut self, address: AccAddress, public_key: Option<PublicKey>) -> u64 {
        let account_number = self.next_account_number;
        self.next_account_number += 1;
        self.accounts.insert(
            address,
            Account {
                address,
                public_key,
                account_number,
                sequence: 0,
            },
        );
        account_number
    }

    pub fn grant_fee_allowance(
        &mut self,
        granter: AccAddress,
        grantee: AccAddress,
        spend_limit: Option<U256>,
    ) -> &mut Self {
        self.allowances
            .insert((granter, grantee), FeeAllowance { spend_limit });
        self
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }
}

impl StateReader for MemoryStore {
    fn account(&self, address: &AccAddress) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(address).cloned())
    }

    fn balance(&self, address: &AccAddress) -> Result<U256, StoreError> {
        Ok(self.balances.get(address).copied().unwrap_or_default())
    }

    fn fee_allowance(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
    ) -> Result<Option<FeeAllowance>, StoreError> {
        Ok(self.allowances.get(&(*granter, *grantee)).copied())
    }

    fn fee_market(&self) -> Result<FeeMarketState, StoreError> {
        self.fee_market
            .clone()
            .ok_or_else(|| StoreError::Missing("fee market state".to_owned()))
    }

    fn next_account_number(&self) -> Result<u64, StoreError> {
        Ok(self.next_account_number)
    }

    fn block_height(&self) -> Result<u64, StoreError> {
        Ok(self.block_height)
    }
}

impl StateWriter for MemoryStore {
    fn set_account(&mut self, account: Account) -> Result<(), StoreError> {
        self.accounts.insert(account.address, account);
        Ok(())
    }

    fn set_balance(&mut self, address: AccAddress, amount: U256) -> Result<(), StoreError> {
        if amount.is_zero() {
            self.balances.remove(&address);
        } else {
            self.balances.insert(address, amount);
        }
        Ok(())
    }

    fn set_fee_allowance(
        &mut self,
        granter: AccAddress,
        grantee: AccAddress,
        allowance: Option<FeeAllowance>,
    ) -> Result<(), StoreError> {
        match allowance {
            Some(allowance) => self.allowances.insert((granter, grantee), allowance),
            None => self.allowances.remove(&(granter, grantee)),
        };
        Ok(())
    }

    fn set_fee_market(&mut self, state: FeeMarketState) -> Result<(), StoreError> {
        self.fee_market = Some(state);
        Ok(())
    }

    fn set_next_account_number(&mut self, next: u64) -> Result<(), StoreError> {
        self.next_account_number = next;
        Ok(())
    }

    fn set_block_height(&mut self, height: u64) -> Result<(), StoreError> {
        self.block_height = height;
        Ok(())
    }
}
