//! Dual-lane transaction admission.
//!
//! A decoded transaction is classified into the Cosmos-native or the
//! Ethereum-formatted lane and run through that lane's ordered stage list.
//! The first failing stage decides the verdict. All arithmetic is integer
//! and every input comes from the transaction, the configuration or the
//! state snapshot, so every node reaches the same verdict.

pub mod classifier;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod state;
pub mod validator;

pub use classifier::{classify, classify_bytes};
pub use context::{ExecutionMode, GasMeter, SignerBinding, ValidationContext};
pub use error::{AdmissionError, ErrorKind, StageError, StateCorruption, StoreError};
pub use pipeline::{Pipeline, PipelineResult};
pub use stage::AdmissionStage;
pub use state::{Account, FeeAllowance, MemoryStore, StateChanges, StateReader, StateWriter, TxScope};
pub use validator::{Validator, ValidatorError};

#[cfg(test)]
pub(crate) mod test_utils {
    use evl_types::{AccAddress, FeeMarketState, U256};

    use crate::{
        error::StoreError,
        state::{Account, FeeAllowance, StateReader},
    };

    /// Delegates to an inner store but reports every account record as
    /// corrupt.
    pub(crate) struct FailingStore<'a> {
        inner: &'a dyn StateReader,
    }

    impl<'a> FailingStore<'a> {
        pub(crate) fn new(inner: &'a dyn StateReader) -> Self {
            Self { inner }
        }
    }

    impl StateReader for FailingStore<'_> {
        fn account(&self, address: &AccAddress) -> Result<Option<Account>, StoreError> {
            Err(StoreError::Corrupt {
                key: format!("account/{address}"),
                reason: "checksum mismatch".to_owned(),
            })
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
}
