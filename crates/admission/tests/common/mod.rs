use alloy_consensus::{TxEip1559, TxLegacy};
use alloy_primitives::{Address, Bytes, TxKind, U256};
use evl_admission::{
    Account, FeeAllowance, MemoryStore, StateReader, StateWriter, StoreError, Validator,
};
use evl_types::{
    proto::{Any, MsgSend, MSG_SEND_TYPE_URL},
    signer::{wrap_ethereum_tx, CosmosKey, CosmosTxBuilder, EthSigner},
    AccAddress, Config, ConsensusConfig, FeeMarketState, NodeConfig,
};
use prost::Message as _;

pub(crate) const CHAIN_EIP155: u64 = 9000;

pub(crate) fn config() -> Config {
    Config::new(NodeConfig::testing())
}

/// A validator at height 1 over a genesis store prepared by `setup`.
pub(crate) fn validator(setup: impl FnOnce(&mut MemoryStore)) -> Validator<MemoryStore> {
    let config = config();
    let mut store = MemoryStore::genesis(&config.consensus, 1);
    setup(&mut store);
    Validator::new(config, store)
}

pub(crate) fn bech32(address: AccAddress) -> String {
    address
        .to_bech32(&ConsensusConfig::testing().bech32_prefix)
        .unwrap()
}

pub(crate) fn send(sender: AccAddress) -> Any {
    Any::pack(
        MSG_SEND_TYPE_URL,
        &MsgSend {
            from_address: bech32(sender),
            to_address: bech32(AccAddress::from_slice(&[0x42; 20]).unwrap()),
            amount: vec![],
        },
    )
}

/// A bank send from `sender` paying exactly the minimum gas price for 200k gas.
pub(crate) fn cosmos_builder(sender: AccAddress) -> CosmosTxBuilder {
    CosmosTxBuilder::new(ConsensusConfig::TESTING_CHAIN_ID)
        .message(send(sender))
        .fee("aevl", "20000000", 200_000)
}

pub(crate) fn signed_cosmos(key: &CosmosKey, account_number: u64, sequence: u64) -> Vec<u8> {
    cosmos_builder(key.address())
        .signer(key, account_number, sequence)
        .build_bytes()
        .unwrap()
}

pub(crate) fn transfer(chain_id: Option<u64>, nonce: u64, gas_price: u128) -> TxLegacy {
    TxLegacy {
        chain_id,
        nonce,
        gas_price,
        gas_limit: 21_000,
        to: TxKind::Call(Address::repeat_byte(0x42)),
        value: U256::from(1_u64),
        input: Bytes::new(),
    }
}

pub(crate) fn dynamic_transfer(nonce: u64, max_fee: u128, max_priority: u128) -> TxEip1559 {
    TxEip1559 {
        chain_id: CHAIN_EIP155,
        nonce,
        gas_limit: 21_000,
        max_fee_per_gas: max_fee,
        max_priority_fee_per_gas: max_priority,
        to: TxKind::Call(Address::repeat_byte(0x42)),
        value: U256::from(1_u64),
        ..Default::default()
    }
}

/// Wraps a signed legacy transfer declaring its true sender.
pub(crate) fn ethereum_bytes(signer: &EthSigner, tx: TxLegacy) -> Vec<u8> {
    let signed = signer.sign_legacy(tx).unwrap();
    wrap_ethereum_tx(&signed, &bech32(signer.acc_address())).encode_to_vec()
}

/// Memory store whose account records can be flagged unreadable.
#[derive(Debug, Default)]
pub(crate) struct CorruptibleStore {
    pub(crate) inner: MemoryStore,
    pub(crate) corrupt_accounts: bool,
}

impl StateReader for CorruptibleStore {
    fn account(&self, address: &AccAddress) -> Result<Option<Account>, StoreError> {
        if self.corrupt_accounts {
            return Err(StoreError::Corrupt {
                key: format!("account/{address}"),
                reason: "truncated record".to_owned(),
            });
        }
        self.inner.account(address)
    }

    fn balance(&self, address: &AccAddress) -> Result<U256, StoreError> {
        self.inner.balance(address)
    }

    fn fee_allowance(
        &self,
        granter: &AccAddress,
        grantee: &AccAddress,
    ) -> Result<Option<FeeAllowance>, StoreError> {
        self.inner.fee_allowance(granter, grantee)
    }

    fn fee_market(&self) -> Result<FeeMarketState, StoreError> {
        self.inner.fee_market()
    }

    fn next_account_number(&self) -> Result<u64, StoreError> {
        self.inner.next_account_number()
    }

    fn block_height(&self) -> Result<u64, StoreError> {
        self.inner.block_height()
    }
}

impl StateWriter for CorruptibleStore {
    fn set_account(&mut self, account: Account) -> Result<(), StoreError> {
        self.inner.set_account(account)
    }

    fn set_balance(&mut self, address: AccAddress, amount: U256) -> Result<(), StoreError> {
        self.inner.set_balance(address, amount)
    }

    fn set_fee_allowance(
        &mut self,
        granter: AccAddress,
        grantee: AccAddress,
        allowance: Option<FeeAllowance>,
    ) -> Result<(), StoreError> {
        self.inner.set_fee_allowance(granter, grantee, allowance)
    }

    fn set_fee_market(&mut self, state: FeeMarketState) -> Result<(), StoreError> {
        self.inner.set_fee_market(state)
    }

    fn set_next_account_number(&mut self, next: u64) -> Result<(), StoreError> {
        self.inner.set_next_account_number(next)
    }

    fn set_block_height(&mut self, height: u64) -> Result<(), StoreError> {
        self.inner.set_block_height(height)
    }
}
